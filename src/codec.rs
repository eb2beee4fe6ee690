//! Address ⇄ label codec.
//!
//! A meshname label is the standard base32 encoding of the 16 address bytes
//! with the padding stripped and the result lowercased:
//!
//! ```text
//! 203:f15a:c323:83aa:cdb0:2e84:56b3:e85c  ⇄  aib7cwwdeob2vtnqf2cfnm7ilq
//! ```

use data_encoding::BASE32;
use std::net::Ipv6Addr;

use crate::error::{DecodeError, QuestionError};

/// Length of an encoded label.
pub const LABEL_LEN: usize = 26;

/// Padding appended to a label to complete the last base32 block.
const PADDING: &str = "======";

/// Encode an address as a lowercase 26-character label.
pub fn encode_label(addr: &Ipv6Addr) -> String {
    let mut encoded = BASE32.encode(&addr.octets());
    encoded.truncate(LABEL_LEN);
    encoded.make_ascii_lowercase();
    encoded
}

/// Decode a label back into the address it encodes.
///
/// Case-insensitive. Labels whose unused trailing bits are not zero are
/// rejected, so every address has exactly one label.
pub fn decode_label(label: &str) -> Result<Ipv6Addr, DecodeError> {
    if label.len() != LABEL_LEN {
        return Err(DecodeError::InvalidLength(label.len()));
    }

    let mut padded = label.to_ascii_uppercase();
    padded.push_str(PADDING);

    let data = BASE32
        .decode(padded.as_bytes())
        .map_err(|e| DecodeError::InvalidAlphabet(e.to_string()))?;

    let octets: [u8; 16] = data
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::InvalidSize(data.len()))?;

    Ok(Ipv6Addr::from(octets))
}

/// Full domain name for an address inside `zone`, with trailing dot.
pub fn domain_for(addr: &Ipv6Addr, zone: &str) -> String {
    format!("{}.{}.", encode_label(addr), zone.trim_matches('.'))
}

/// Decode the address encoded in a domain name.
///
/// The label is the one right before the zone suffix, so
/// `www.<label>.meshname` and `<label>.meshname.` both resolve.
pub fn address_from_domain(domain: &str) -> Result<Ipv6Addr, QuestionError> {
    let labels: Vec<&str> = domain.trim_end_matches('.').split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(QuestionError::TooFewLabels(domain.to_string()));
    }

    Ok(decode_label(labels[labels.len() - 2])?)
}
