//! Outbound forwarding to the address a name encodes.
//!
//! One exchange is one UDP query/response pair with the target acting as its
//! own authoritative server. There are no retries; the caller drops the batch
//! on any error.

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::ForwardError;

/// Standard DNS port forward targets listen on.
pub const DNS_PORT: u16 = 53;

/// Fixed timeout for one forward exchange.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest response accepted over UDP.
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Sends one batch of questions to a target and returns its response.
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    /// Query `target` for all of `queries` in a single message.
    async fn exchange(&self, target: Ipv6Addr, queries: Vec<Query>)
        -> Result<Message, ForwardError>;
}

/// Build the outbound query: fresh ID, recursion desired, one question per
/// entry of `queries`.
pub fn build_forward_query(queries: Vec<Query>) -> Message {
    let mut message = Message::new();
    message.set_id(fastrand::u16(..));
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_queries(queries);
    message
}

/// Socket address for a forward target. IPv4-mapped addresses are reached
/// over IPv4.
pub fn target_socket_addr(target: Ipv6Addr, port: u16) -> SocketAddr {
    match target.to_ipv4_mapped() {
        Some(v4) => SocketAddr::new(IpAddr::V4(v4), port),
        None => SocketAddr::new(IpAddr::V6(target), port),
    }
}

/// Forwarder over plain DNS/UDP.
#[derive(Debug, Clone)]
pub struct UdpForwarder {
    port: u16,
    timeout: Duration,
}

impl Default for UdpForwarder {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARD_TIMEOUT)
    }
}

impl UdpForwarder {
    /// Forwarder to port 53 with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            port: DNS_PORT,
            timeout,
        }
    }

    /// Use a port other than 53 on the target.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Timeout for one exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exchange_with(
        &self,
        target: SocketAddr,
        query: &Message,
    ) -> Result<Message, ForwardError> {
        let io_err = |source| ForwardError::Io { target, source };

        let bind_addr: SocketAddr = if target.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(bind_addr).await.map_err(io_err)?;
        // Connected so the kernel drops datagrams from anyone but the target.
        socket.connect(target).await.map_err(io_err)?;

        let bytes = query.to_vec()?;
        socket.send(&bytes).await.map_err(io_err)?;
        trace!(%target, bytes = bytes.len(), "forward query sent");

        let mut buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        let len = socket.recv(&mut buf).await.map_err(io_err)?;
        let response = Message::from_vec(&buf[..len])?;
        trace!(%target, bytes = len, "forward response received");

        if response.id() != query.id() {
            return Err(ForwardError::IdMismatch {
                expected: query.id(),
                got: response.id(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Forwarder for UdpForwarder {
    async fn exchange(
        &self,
        target: Ipv6Addr,
        queries: Vec<Query>,
    ) -> Result<Message, ForwardError> {
        let target = target_socket_addr(target, self.port);
        let query = build_forward_query(queries);

        tokio::time::timeout(self.timeout, self.exchange_with(target, &query))
            .await
            .map_err(|_| ForwardError::Timeout(target))?
    }
}
