//! Hickory request handler routing datagrams by zone suffix.

use async_trait::async_trait;
use hickory_proto::op::{Header, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::Record;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::{debug, error};

use crate::metrics::{self, Timer};
use crate::resolver::{is_routed, Resolver};

/// Serves every zone suffix bound in the live network registry.
///
/// The registry is consulted per packet, so a reload that binds or unbinds
/// a suffix takes effect for the next datagram.
#[derive(Clone)]
pub struct MeshnameHandler {
    resolver: Arc<Resolver>,
}

impl MeshnameHandler {
    /// Create a handler around `resolver`.
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// The resolver answering requests.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }
}

#[async_trait]
impl RequestHandler for MeshnameHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        if request.message_type() != MessageType::Query || request.op_code() != OpCode::Query {
            debug!(
                src = %request.src(),
                op_code = ?request.op_code(),
                "unsupported message"
            );
            return send_error_response(request, &mut response_handle, ResponseCode::NotImp).await;
        }

        let queries: Vec<Query> = request
            .queries()
            .iter()
            .map(|q| q.original().clone())
            .collect();

        let networks = self.resolver.state().networks();
        if !queries.iter().any(|q| is_routed(&networks, q)) {
            debug!(src = %request.src(), questions = queries.len(), "no served zone in request");
            metrics::record_refused();
            return send_error_response(request, &mut response_handle, ResponseCode::Refused)
                .await;
        }
        drop(networks);

        let resolution = self.resolver.resolve(request.src(), &queries).await;

        debug!(
            src = %request.src(),
            id = request.id(),
            questions = queries.len(),
            answers = resolution.answers.len(),
            "sending response"
        );
        metrics::record_request(resolution.answers.len(), timer.elapsed());

        let header = Header::response_from_request(request.header());
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            resolution.answers.iter(),
            resolution.name_servers.iter(),
            &[] as &[Record],
            resolution.additionals.iter(),
        );

        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to send response");
                ResponseInfo::from(header)
            }
        }
    }
}

async fn send_error_response<R: ResponseHandler>(
    request: &Request,
    response_handle: &mut R,
    code: ResponseCode,
) -> ResponseInfo {
    let response =
        MessageResponseBuilder::from_message_request(request).error_msg(request.header(), code);

    match response_handle.send_response(response).await {
        Ok(info) => info,
        Err(e) => {
            error!(error = %e, "failed to send error response");
            let mut header = Header::response_from_request(request.header());
            header.set_response_code(code);
            ResponseInfo::from(header)
        }
    }
}
