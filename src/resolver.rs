//! Per-question dispatch: answer locally, forward, or drop.
//!
//! ```text
//! test.aib7cwwdeob2vtnqf2cfnm7ilq.meshname.
//!      └──────── sub-label ─────┘ └suffix┘
//!
//!   sub-label in zone table        → local records
//!   else decode sub-label → addr
//!   client may trigger lookups?    → else drop
//!   addr inside suffix's subnet?   → else drop
//!   queue question under addr      → one forward per distinct addr
//! ```
//!
//! Every question is handled on its own; a fault in one never affects the
//! others or the reply.

use futures::future::join_all;
use hickory_proto::op::Query;
use hickory_proto::rr::Record;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::codec::decode_label;
use crate::error::{ForwardError, QuestionError};
use crate::forward::Forwarder;
use crate::metrics::{self, ForwardResult, QuestionOutcome, Timer};
use crate::network::NetworkRegistry;
use crate::state::{DnsState, Snapshot};

/// Which clients may cause outbound forwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteLookupPolicy {
    /// Any client.
    Always,
    /// Only clients connecting from a loopback address.
    #[default]
    #[serde(alias = "loopback_only")]
    Loopback,
}

impl RemoteLookupPolicy {
    /// Whether a datagram from `src` may trigger forwarding.
    pub fn allows(&self, src: &SocketAddr) -> bool {
        match self {
            RemoteLookupPolicy::Always => true,
            RemoteLookupPolicy::Loopback => match src.ip() {
                IpAddr::V4(v4) => v4.is_loopback(),
                IpAddr::V6(v6) => {
                    v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
                }
            },
        }
    }
}

/// Resolver behaviour switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverOptions {
    /// Who may trigger forwards.
    pub remote_lookups: RemoteLookupPolicy,
    /// Merge Authority and Additional sections of forwarded responses, not
    /// only Answers.
    pub merge_all_sections: bool,
}

/// Records collected for one reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Answer section.
    pub answers: Vec<Record>,
    /// Authority section (forwarded responses only).
    pub name_servers: Vec<Record>,
    /// Additional section (forwarded responses only).
    pub additionals: Vec<Record>,
}

/// Decision for a single question.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Served from the zone table, possibly with no matching records.
    Local(Vec<Record>),
    /// To be forwarded to this address.
    Forward(Ipv6Addr),
}

/// Last two labels of a name, lowercased: (sub-label, suffix).
fn split_name(query: &Query) -> Result<(String, String), QuestionError> {
    let labels: Vec<&[u8]> = query.name().iter().collect();
    if labels.len() < 2 {
        return Err(QuestionError::TooFewLabels(query.name().to_string()));
    }

    let lower = |label: &[u8]| String::from_utf8_lossy(label).to_ascii_lowercase();
    Ok((
        lower(labels[labels.len() - 2]),
        lower(labels[labels.len() - 1]),
    ))
}

/// Whether the question's zone suffix is served by `networks`.
pub fn is_routed(networks: &NetworkRegistry, query: &Query) -> bool {
    query
        .name()
        .iter()
        .last()
        .is_some_and(|suffix| networks.contains_suffix(&String::from_utf8_lossy(suffix)))
}

/// Classify one question against a snapshot.
///
/// `remote_allowed` is the remote-lookup decision for the client, `src` is
/// only used for diagnostics.
pub fn classify(
    snapshot: &Snapshot,
    query: &Query,
    remote_allowed: bool,
    src: SocketAddr,
) -> Result<Classification, QuestionError> {
    let (sub_label, suffix) = split_name(query)?;

    if !snapshot.networks.contains_suffix(&suffix) {
        return Err(QuestionError::UnroutedSuffix(suffix));
    }

    if snapshot.zones.contains(&sub_label) {
        return Ok(Classification::Local(snapshot.zones.lookup(
            &sub_label,
            query.name(),
            query.query_type(),
            query.query_class(),
        )));
    }

    let addr = decode_label(&sub_label)?;

    if !remote_allowed {
        return Err(QuestionError::RemoteLookupDenied(src));
    }

    if !snapshot.networks.validate(&suffix, &addr) {
        return Err(QuestionError::SubnetMismatch { suffix, addr });
    }

    Ok(Classification::Forward(addr))
}

fn outcome_of(err: &QuestionError) -> QuestionOutcome {
    match err {
        QuestionError::TooFewLabels(_) | QuestionError::UnroutedSuffix(_) => {
            QuestionOutcome::InvalidName
        }
        QuestionError::Decode(_) => QuestionOutcome::DecodeError,
        QuestionError::RemoteLookupDenied(_) => QuestionOutcome::RemoteDenied,
        QuestionError::SubnetMismatch { .. } => QuestionOutcome::SubnetMismatch,
    }
}

/// Drives classification and forwarding for whole queries.
pub struct Resolver {
    state: DnsState,
    forwarder: Arc<dyn Forwarder>,
    options: ResolverOptions,
}

impl Resolver {
    /// Create a resolver over `state`.
    pub fn new(state: DnsState, forwarder: Arc<dyn Forwarder>, options: ResolverOptions) -> Self {
        Self {
            state,
            forwarder,
            options,
        }
    }

    /// The shared state this resolver reads.
    pub fn state(&self) -> &DnsState {
        &self.state
    }

    /// Resolver options.
    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Resolve every question of one request from `src`.
    ///
    /// Questions that cannot be answered are left out; the result may be
    /// empty but this never fails.
    pub async fn resolve(&self, src: SocketAddr, queries: &[Query]) -> Resolution {
        let snapshot = self.state.snapshot();
        let remote_allowed = self.options.remote_lookups.allows(&src);

        let mut resolution = Resolution::default();
        let mut batches: Vec<(Ipv6Addr, Vec<Query>)> = Vec::new();

        for query in queries {
            let rtype = query.query_type().to_string();
            match classify(&snapshot, query, remote_allowed, src) {
                Ok(Classification::Local(records)) => {
                    trace!(name = %query.name(), rtype = %rtype, count = records.len(), "local answer");
                    metrics::record_question(&rtype, QuestionOutcome::Local);
                    resolution.answers.extend(records);
                }
                Ok(Classification::Forward(addr)) => {
                    trace!(name = %query.name(), rtype = %rtype, target = %addr, "queued for forwarding");
                    metrics::record_question(&rtype, QuestionOutcome::Forwarded);
                    match batches.iter_mut().find(|(target, _)| *target == addr) {
                        Some((_, batch)) => batch.push(query.clone()),
                        None => batches.push((addr, vec![query.clone()])),
                    }
                }
                Err(e) => {
                    debug!(name = %query.name(), rtype = %rtype, %src, "skipping question: {}", e);
                    metrics::record_question(&rtype, outcome_of(&e));
                }
            }
        }

        // The snapshot is not needed while waiting on the network.
        drop(snapshot);

        let exchanges = batches
            .into_iter()
            .map(|(target, batch)| self.forward_batch(target, batch));

        for response in join_all(exchanges).await.into_iter().flatten() {
            resolution.answers.extend_from_slice(response.answers());
            if self.options.merge_all_sections {
                resolution
                    .name_servers
                    .extend_from_slice(response.name_servers());
                resolution
                    .additionals
                    .extend_from_slice(response.additionals());
            }
        }

        resolution
    }

    /// One forward exchange; `None` when the batch is dropped.
    async fn forward_batch(
        &self,
        target: Ipv6Addr,
        batch: Vec<Query>,
    ) -> Option<hickory_proto::op::Message> {
        let timer = Timer::start();
        let questions = batch.len();

        match self.forwarder.exchange(target, batch).await {
            Ok(response) => {
                debug!(
                    %target,
                    questions,
                    answers = response.answers().len(),
                    "forward succeeded"
                );
                metrics::record_forward(ForwardResult::Success, questions, timer.elapsed());
                Some(response)
            }
            Err(e) => {
                debug!(%target, questions, "forward failed: {}", e);
                let result = match e {
                    ForwardError::Timeout(_) => ForwardResult::Timeout,
                    _ => ForwardResult::Error,
                };
                metrics::record_forward(result, questions, timer.elapsed());
                None
            }
        }
    }
}
