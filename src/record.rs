//! Zone-file style record text.
//!
//! ```text
//! owner [TTL] [class] type rdata...   ; comment
//! test.aib7cwwdeob2vtnqf2cfnm7ilq.meshname. 1h IN AAAA 201:1697:567c:1375:3fd1:3a2b:4b85:cd1e
//! ```
//!
//! The owner, TTL and class are read here so TTL and class can be left out.
//! The rdata goes to hickory's zone-file rdata parser.

use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::txt::{Parser, RDataParser};
use std::str::FromStr;

use crate::error::DnsError;

/// TTL used when a record line does not carry one.
pub const DEFAULT_TTL: u32 = 3600;

/// Parse one record line.
pub fn parse_record(text: &str) -> Result<Record, DnsError> {
    let invalid = |reason: String| DnsError::InvalidRecord {
        record: text.to_string(),
        reason,
    };

    let mut rest = strip_comment(text).map_err(invalid)?;

    let (owner, tail) = next_token(rest).ok_or_else(|| invalid("empty record".to_string()))?;
    let owner = parse_name(owner).map_err(invalid)?;
    rest = tail;

    let mut ttl = None;
    let mut class = None;
    let rtype = loop {
        let (token, tail) =
            next_token(rest).ok_or_else(|| invalid("missing record type".to_string()))?;
        rest = tail;

        if ttl.is_none() && token.starts_with(|c: char| c.is_ascii_digit()) {
            let value = Parser::parse_time(token)
                .map_err(|e| invalid(format!("invalid TTL {token:?}: {e}")))?;
            ttl = Some(value);
            continue;
        }
        if class.is_none() {
            if let Some(value) = parse_class(token) {
                class = Some(value);
                continue;
            }
        }

        break RecordType::from_str(&token.to_ascii_uppercase())
            .map_err(|_| invalid(format!("unknown record type {token:?}")))?;
    };

    let rdata = rest.trim();
    if rdata.is_empty() {
        return Err(invalid(format!("{rtype} record has no data")));
    }
    let rdata = RData::try_from_str(rtype, rdata).map_err(|e| invalid(e.to_string()))?;

    let mut record = Record::from_rdata(owner, ttl.unwrap_or(DEFAULT_TTL), rdata);
    record.set_dns_class(class.unwrap_or(DNSClass::IN));
    Ok(record)
}

fn parse_class(token: &str) -> Option<DNSClass> {
    match token.to_ascii_uppercase().as_str() {
        "IN" => Some(DNSClass::IN),
        "CH" => Some(DNSClass::CH),
        "HS" => Some(DNSClass::HS),
        _ => None,
    }
}

/// Owners are always treated as fully qualified.
fn parse_name(text: &str) -> Result<Name, String> {
    let mut name = Name::from_ascii(text).map_err(|e| format!("invalid name {text:?}: {e}"))?;
    if name.is_root() {
        return Err(format!("invalid name {text:?}"));
    }
    name.set_fqdn(true);
    Ok(name)
}

/// First whitespace-separated token of `text` and what follows it.
fn next_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    Some(text.split_at(end))
}

/// Cut a trailing `; comment`. Semicolons inside quotes or after a
/// backslash are data.
fn strip_comment(text: &str) -> Result<&str, String> {
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => return Ok(&text[..i]),
            _ => {}
        }
    }

    if quoted {
        return Err("unterminated quoted string".to_string());
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    const OWNER: &str = "test.aib7cwwdeob2vtnqf2cfnm7ilq.meshname.";

    #[test]
    fn test_parse_minimal_aaaa() {
        let record =
            parse_record(&format!("{OWNER} AAAA 201:1697:567c:1375:3fd1:3a2b:4b85:cd1e")).unwrap();

        assert_eq!(record.name(), &Name::from_ascii(OWNER).unwrap());
        assert_eq!(record.record_type(), RecordType::AAAA);
        assert_eq!(record.dns_class(), DNSClass::IN);
        assert_eq!(record.ttl(), DEFAULT_TTL);
        match record.data() {
            RData::AAAA(aaaa) => assert_eq!(
                Ipv6Addr::from(*aaaa),
                "201:1697:567c:1375:3fd1:3a2b:4b85:cd1e".parse::<Ipv6Addr>().unwrap()
            ),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[test]
    fn test_parse_ttl_and_class_in_either_order() {
        let a = parse_record(&format!("{OWNER} 300 IN A 10.0.0.1")).unwrap();
        let b = parse_record(&format!("{OWNER} in 300 a 10.0.0.1")).unwrap();

        for record in [a, b] {
            assert_eq!(record.ttl(), 300);
            assert_eq!(record.dns_class(), DNSClass::IN);
            assert_eq!(record.record_type(), RecordType::A);
        }
    }

    #[test]
    fn test_owner_is_made_fully_qualified() {
        let record = parse_record("www.aib7cwwdeob2vtnqf2cfnm7ilq.meshname A 10.0.0.1").unwrap();
        assert!(record.name().is_fqdn());
    }

    #[test]
    fn test_parse_name_targets() {
        let cname = parse_record(&format!("{OWNER} CNAME other.meshname.")).unwrap();
        assert_eq!(cname.record_type(), RecordType::CNAME);

        let mx = parse_record(&format!("{OWNER} MX 10 mail.{OWNER}")).unwrap();
        assert_eq!(mx.record_type(), RecordType::MX);

        let srv = parse_record(&format!("_xmpp-client._tcp.{OWNER} SRV 0 5 5222 {OWNER}")).unwrap();
        match srv.data() {
            RData::SRV(srv) => {
                assert_eq!(srv.port(), 5222);
                assert_eq!(srv.weight(), 5);
            }
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[test]
    fn test_parse_quoted_txt() {
        let record = parse_record(&format!(r#"{OWNER} TXT "hello world" "say \"hi\"""#)).unwrap();
        assert_eq!(txt_strings(&record), vec!["hello world", "say \"hi\""]);
    }

    fn txt_strings(record: &Record) -> Vec<String> {
        match record.data() {
            RData::TXT(txt) => txt
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
            other => panic!("unexpected rdata {other:?}"),
        }
    }

    #[test]
    fn test_trailing_comment_ignored() {
        let record = parse_record(&format!("{OWNER} 300 IN AAAA ::1 ; self")).unwrap();
        assert_eq!(record.ttl(), 300);
        match record.data() {
            RData::AAAA(aaaa) => assert_eq!(Ipv6Addr::from(*aaaa), Ipv6Addr::LOCALHOST),
            other => panic!("unexpected rdata {other:?}"),
        }

        let record = parse_record(&format!(r#"{OWNER} TXT "a;b" ; note"#)).unwrap();
        assert_eq!(txt_strings(&record), vec!["a;b"]);
    }

    #[test]
    fn test_decimal_escape_in_txt() {
        let record = parse_record(&format!(r#"{OWNER} TXT "a\065b""#)).unwrap();
        assert_eq!(txt_strings(&record), vec!["aAb"]);
    }

    #[test]
    fn test_ttl_units() {
        let record = parse_record(&format!("{OWNER} 1h IN AAAA ::1")).unwrap();
        assert_eq!(record.ttl(), 3600);

        let record = parse_record(&format!("{OWNER} IN 1h30m AAAA ::1")).unwrap();
        assert_eq!(record.ttl(), 5400);
    }

    #[test]
    fn test_other_record_types() {
        let caa = parse_record(&format!(r#"{OWNER} CAA 0 issue "ca.example.net""#)).unwrap();
        assert_eq!(caa.record_type(), RecordType::CAA);
    }

    #[test]
    fn test_parse_errors() {
        let bad_records = vec![
            String::new(),
            OWNER.to_string(),
            format!("{OWNER} 300"),
            format!("{OWNER} AAAA"),
            format!("{OWNER} AAAA 10.0.0.1"),
            format!("{OWNER} 1x AAAA ::1"),
            format!("{OWNER} AAAA ; only a comment"),
            format!("{OWNER} BOGUS 1"),
            format!("{OWNER} MX mail.example."),
            format!("{OWNER} TXT \"unterminated"),
            ". A 10.0.0.1".to_string(),
        ];

        for bad in &bad_records {
            assert!(
                matches!(parse_record(bad), Err(DnsError::InvalidRecord { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
