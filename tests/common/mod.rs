//! Shared test infrastructure for meshname-dns integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::rdata::AAAA;
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use tokio::net::UdpSocket;

use meshname_dns::error::ForwardError;
use meshname_dns::forward::Forwarder;
use meshname_dns::handler::MeshnameHandler;
use meshname_dns::network::NetworkRegistry;
use meshname_dns::resolver::{Resolver, ResolverOptions};
use meshname_dns::state::DnsState;
use meshname_dns::zone::ZoneTable;

// --- Constants ---

/// Label of `203:f15a:c323:83aa:cdb0:2e84:56b3:e85c`.
pub const TEST_LABEL: &str = "aib7cwwdeob2vtnqf2cfnm7ilq";
pub const TEST_NAME: &str = "test.aib7cwwdeob2vtnqf2cfnm7ilq.meshname.";
pub const TEST_RECORD_ADDR: &str = "201:1697:567c:1375:3fd1:3a2b:4b85:cd1e";

/// Address every fake upstream answers with.
pub const UPSTREAM_ANSWER: &str = "fd00::53";

pub fn test_record_addr() -> Ipv6Addr {
    TEST_RECORD_ADDR.parse().unwrap()
}

pub fn upstream_answer() -> Ipv6Addr {
    UPSTREAM_ANSWER.parse().unwrap()
}

/// Zone config with the single test record.
pub fn test_zone_config() -> String {
    format!(r#"{{"Domain": "{TEST_LABEL}", "Records": ["{TEST_NAME} AAAA {TEST_RECORD_ADDR}"]}}"#)
}

pub fn test_zones() -> ZoneTable {
    meshname_dns::parse_zone_config(test_zone_config().as_bytes()).unwrap()
}

// --- Source addresses ---

pub fn local_src() -> SocketAddr {
    "127.0.0.1:12345".parse().unwrap()
}

pub fn local_v6_src() -> SocketAddr {
    "[::1]:12345".parse().unwrap()
}

pub fn remote_src() -> SocketAddr {
    "[203:f15a:c323:83aa:cdb0:2e84:56b3:e85c]:12345".parse().unwrap()
}

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as raw wire-format bytes, which can then be parsed with
/// `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(io::Error::other)?;
        Ok(info)
    }
}

// --- RecordingForwarder ---

/// In-process forwarder that records every exchange.
///
/// Answers each question with [`UPSTREAM_ANSWER`], or fails every exchange
/// when built with [`RecordingForwarder::failing`].
pub struct RecordingForwarder {
    calls: Mutex<Vec<(Ipv6Addr, Vec<Query>)>>,
    fail: bool,
}

impl RecordingForwarder {
    pub fn answering() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<(Ipv6Addr, Vec<Query>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn exchange(
        &self,
        target: Ipv6Addr,
        queries: Vec<Query>,
    ) -> Result<Message, ForwardError> {
        self.calls.lock().unwrap().push((target, queries.clone()));
        if self.fail {
            return Err(ForwardError::Timeout(SocketAddr::new(target.into(), 53)));
        }
        Ok(answer_all(fastrand::u16(..), &queries))
    }
}

/// A response answering every query with [`UPSTREAM_ANSWER`].
pub fn answer_all(id: u16, queries: &[Query]) -> Message {
    let mut response = Message::new();
    response.set_id(id);
    response.set_message_type(MessageType::Response);
    response.set_op_code(OpCode::Query);
    response.add_queries(queries.to_vec());
    for query in queries {
        response.add_answer(Record::from_rdata(
            query.name().clone(),
            60,
            RData::AAAA(AAAA(upstream_answer())),
        ));
    }
    response
}

// --- Handler construction ---

pub fn build_handler(
    zones: ZoneTable,
    networks: &str,
    forwarder: Arc<dyn Forwarder>,
    options: ResolverOptions,
) -> (MeshnameHandler, DnsState) {
    let networks: NetworkRegistry = networks.parse().unwrap();
    let state = DnsState::new(zones, networks);
    let resolver = Resolver::new(state.clone(), forwarder, options);
    (MeshnameHandler::new(Arc::new(resolver)), state)
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS message with one question per entry.
pub fn build_query_bytes(questions: &[(&str, RecordType)], id: u16, op_code: OpCode) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(op_code);
    msg.set_recursion_desired(true);
    for (name, record_type) in questions {
        let mut query = Query::new();
        query.set_name(Name::from_ascii(name).unwrap());
        query.set_query_type(*record_type);
        query.set_query_class(DNSClass::IN);
        msg.add_query(query);
    }
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` with a crafted source address.
pub fn build_request(
    questions: &[(&str, RecordType)],
    src: SocketAddr,
    id: u16,
    op_code: OpCode,
) -> Request {
    let bytes = build_query_bytes(questions, id, op_code);
    let msg = parse_message_request(&bytes);
    Request::new(msg, src, Protocol::Udp)
}

// --- Response helpers ---

/// Execute a query through the handler and return the parsed response.
pub async fn execute_query(
    handler: &MeshnameHandler,
    questions: &[(&str, RecordType)],
    src: SocketAddr,
    id: u16,
) -> Message {
    let request = build_request(questions, src, id, OpCode::Query);
    let response = TestResponseHandler::new();
    handler.handle_request(&request, response.clone()).await;
    response.into_message()
}

/// Send one query over UDP to `server` and parse the reply.
pub async fn query_udp(server: SocketAddr, name: &str, record_type: RecordType, id: u16) -> Message {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let bytes = build_query_bytes(&[(name, record_type)], id, OpCode::Query);
    sock.send_to(&bytes, server).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(std::time::Duration::from_secs(2), sock.recv_from(&mut buf))
        .await
        .expect("timed out waiting for DNS response")
        .unwrap();
    Message::from_vec(&buf[..len]).unwrap()
}

/// Extract AAAA addresses from a response.
pub fn extract_aaaa_ips(msg: &Message) -> Vec<Ipv6Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::AAAA(aaaa) => Some(Ipv6Addr::from(*aaaa)),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected IPs, in order.
pub fn assert_aaaa_response(msg: &Message, expected_ips: &[Ipv6Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let actual = extract_aaaa_ips(msg);
    assert_eq!(
        actual, expected_ips,
        "AAAA records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected_ips
    );
}

// --- Fake upstream ---

/// Authoritative server stand-in on 127.0.0.1 answering with
/// [`UPSTREAM_ANSWER`]. Reached through `::ffff:127.0.0.1` encoded names.
pub struct FakeUpstream {
    pub port: u16,
    requests: Arc<AtomicUsize>,
    task: tokio::task::JoinHandle<()>,
}

impl FakeUpstream {
    pub async fn start() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        let requests = Arc::new(AtomicUsize::new(0));

        let counter = requests.clone();
        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, src)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let response = answer_all(request.id(), request.queries());
                let _ = socket.send_to(&response.to_vec().unwrap(), src).await;
            }
        });

        Self {
            port,
            requests,
            task,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Name under `meshname.` whose label encodes `::ffff:127.0.0.1`.
pub fn loopback_target_name(prefix: &str) -> String {
    let target: Ipv6Addr = "::ffff:127.0.0.1".parse().unwrap();
    format!("{}{}", prefix, meshname_dns::domain_for(&target, "meshname"))
}
