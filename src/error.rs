//! Error types for meshname-dns.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur in the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed zone config; the load is aborted.
    #[error("Syntax error in zone config: {0}")]
    ConfigSyntax(String),

    /// Malformed `suffix=CIDR` binding.
    #[error("Invalid network binding: {0}")]
    InvalidNetwork(String),

    /// Record text that could not be parsed.
    #[error("Invalid DNS record {record:?}: {reason}")]
    InvalidRecord {
        /// The offending record text.
        record: String,
        /// What was wrong with it.
        reason: String,
    },

    /// `start()` called on a running server.
    #[error("DNS server is already started")]
    AlreadyStarted,

    /// `stop()` called on a stopped server.
    #[error("DNS server is not running")]
    NotRunning,
}

/// A label that does not decode to an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Labels are exactly 26 characters.
    #[error("invalid label length {0}, expected 26")]
    InvalidLength(usize),

    /// Character outside the base32 alphabet, or non-canonical trailing bits.
    #[error("invalid base32 label: {0}")]
    InvalidAlphabet(String),

    /// Decoded data is not a 16-byte address.
    #[error("decoded {0} bytes, expected 16")]
    InvalidSize(usize),
}

/// Why a single question was left out of the reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// The name has no sub-label in front of the zone suffix.
    #[error("invalid domain requested: {0}")]
    TooFewLabels(String),

    /// The zone suffix is not served by this instance.
    #[error("zone suffix {0:?} is not served")]
    UnroutedSuffix(String),

    /// The sub-label is neither a local zone nor an address.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Remote lookups are not allowed for this client.
    #[error("remote lookup denied for client {0}")]
    RemoteLookupDenied(SocketAddr),

    /// The decoded address lies outside the subnet bound to the suffix.
    #[error("subnet doesn't match: {addr} is not allowed for {suffix:?}")]
    SubnetMismatch {
        /// Zone suffix of the question.
        suffix: String,
        /// Address decoded from the label.
        addr: std::net::Ipv6Addr,
    },
}

/// Failure of one outbound forward exchange.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No response within the forward timeout.
    #[error("timed out waiting for {0}")]
    Timeout(SocketAddr),

    /// Socket error while talking to the target.
    #[error("transport error talking to {target}: {source}")]
    Io {
        /// Forward target.
        target: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The query could not be encoded or the response could not be parsed.
    #[error("malformed message: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// The response answered a different query.
    #[error("response id {got} does not match query id {expected}")]
    IdMismatch {
        /// ID of the outbound query.
        expected: u16,
        /// ID carried by the response.
        got: u16,
    },
}
