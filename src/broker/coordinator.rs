//! Fan-out Coordinator
//!
//! Executes client operations that may touch keys owned by several nodes.
//!
//! ## Flow
//! 1. Keys are grouped by owner, one sub-request per distinct owner.
//! 2. The local group runs directly against the stores.
//! 3. Every remote group is sent to its owner concurrently, each call with its own
//!    retry budget, all bounded by one request deadline.
//! 4. Results are merged by key once every owner has answered or the deadline passed.
//!
//! An owner that cannot be reached only fails its own keys; they are listed in the
//! reply's `failed` map next to the results of every other key.

use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

use super::error::BrokerError;
use super::protocol::{NodeStats, Request, Response};
use super::transport::{PeerTransport, TransportError};
use crate::membership::types::NodeId;
use crate::storage::commit_store::LocalCommitStore;
use crate::storage::log_store::{LocalLogStore, LogEntry, Offset};
use crate::storage::partitioner::PartitionResolver;

/// How a single remote sub-call is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, the first one included.
    pub attempts: usize,
    pub attempt_timeout: Duration,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        self.base_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            attempt_timeout: Duration::from_millis(500),
            base_backoff: Duration::from_millis(150),
            max_backoff: Duration::from_millis(1200),
            max_jitter: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub retry: RetryPolicy,
    /// Upper bound for a whole client request, fan-out included.
    pub request_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Merged result of a fan-out: per-key values plus the keys whose owner failed.
#[derive(Debug)]
pub struct FanoutOutcome<T> {
    pub values: BTreeMap<String, T>,
    pub failed: BTreeMap<String, BrokerError>,
}

impl<T> Default for FanoutOutcome<T> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            failed: BTreeMap::new(),
        }
    }
}

impl<T> FanoutOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_reasons(&self) -> BTreeMap<String, String> {
        self.failed
            .iter()
            .map(|(key, err)| (key.clone(), err.to_string()))
            .collect()
    }

    fn absorb(
        &mut self,
        node: &NodeId,
        keys: Vec<String>,
        result: Result<Response, BrokerError>,
        extract: fn(&[String], Response) -> Option<BTreeMap<String, T>>,
    ) {
        let merged = result.and_then(|response| {
            extract(&keys, response).ok_or_else(|| {
                BrokerError::Internal(format!("unexpected reply type from {}", node))
            })
        });

        match merged {
            Ok(values) => self.values.extend(values),
            Err(err) => {
                for key in keys {
                    self.failed.insert(key, err.clone());
                }
            }
        }
    }
}

/// Routes client operations to key owners and joins their answers.
///
/// Holds no state across requests besides the partitioner and the two local stores.
pub struct FanoutCoordinator {
    resolver: PartitionResolver,
    logs: Arc<LocalLogStore>,
    commits: Arc<LocalCommitStore>,
    transport: Arc<dyn PeerTransport>,
    config: CoordinatorConfig,
}

impl FanoutCoordinator {
    pub fn new(
        resolver: PartitionResolver,
        logs: Arc<LocalLogStore>,
        commits: Arc<LocalCommitStore>,
        transport: Arc<dyn PeerTransport>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            resolver,
            logs,
            commits,
            transport,
            config,
        }
    }

    pub fn local_id(&self) -> &NodeId {
        self.resolver.membership().local_id()
    }

    /// Entry point for client requests arriving at this node.
    pub async fn handle_client(&self, request: Request) -> Response {
        if let Err(err) = request.validate() {
            return err.to_response();
        }

        match request {
            Request::Send { key, msg } => match self.send(key, msg).await {
                Ok(offset) => Response::SendOk { offset },
                Err(err) => err.to_response(),
            },
            Request::Poll { offsets } => {
                let outcome = self.poll(offsets).await;
                Response::PollOk {
                    failed: outcome.failed_reasons(),
                    msgs: outcome.values,
                }
            }
            Request::CommitOffsets { offsets } => {
                let outcome = self.commit_offsets(offsets).await;
                Response::CommitOffsetsOk {
                    failed: outcome.failed_reasons(),
                }
            }
            Request::ListCommittedOffsets { keys } => {
                let outcome = self.list_committed_offsets(keys).await;
                Response::ListCommittedOffsetsOk {
                    failed: outcome.failed_reasons(),
                    offsets: outcome.values,
                }
            }
        }
    }

    /// Entry point for sub-requests sent by a coordinating peer.
    ///
    /// Only keys owned by this node are accepted; the stores of a key are never
    /// touched on behalf of another owner.
    pub fn handle_peer(&self, request: Request) -> Result<Response, BrokerError> {
        request.validate()?;

        for key in request.keys() {
            if !self.resolver.is_local(key) {
                return Err(BrokerError::NotOwner {
                    key: key.to_string(),
                    owner: self.resolver.resolve(key).clone(),
                });
            }
        }

        Ok(self.execute_local(&request))
    }

    /// Appends `value` to `key`, forwarding to the owner when it is not this node.
    pub async fn send(&self, key: String, value: i64) -> Result<Offset, BrokerError> {
        if self.resolver.is_local(&key) {
            return Ok(self.logs.append(&key, value));
        }
        let owner = self.resolver.resolve(&key).clone();

        let request_id = new_request_id();
        tracing::debug!("[{}] Forwarding send for key {} to {}", request_id, key, owner);

        let request = Request::Send { key, msg: value };
        let deadline = Instant::now() + self.config.request_timeout;
        let response = call_with_retry(
            self.transport.as_ref(),
            &self.config.retry,
            &owner,
            &request_id,
            &request,
            deadline,
        )
        .await?;

        match response {
            Response::SendOk { offset } => Ok(offset),
            _ => Err(BrokerError::Internal(format!(
                "unexpected reply type from {}",
                owner
            ))),
        }
    }

    /// Reads every entry at or after the requested offset for each key.
    ///
    /// Keys without a log are present in the result with an empty list.
    pub async fn poll(&self, offsets: BTreeMap<String, Offset>) -> FanoutOutcome<Vec<LogEntry>> {
        self.fan_out(
            "poll",
            offsets,
            |group| Request::Poll {
                offsets: group.into_iter().collect(),
            },
            |keys, response| match response {
                Response::PollOk { mut msgs, .. } => Some(
                    keys.iter()
                        .map(|key| (key.clone(), msgs.remove(key).unwrap_or_default()))
                        .collect(),
                ),
                _ => None,
            },
        )
        .await
    }

    /// Overwrites the committed offset of each key at its owner.
    pub async fn commit_offsets(&self, offsets: BTreeMap<String, Offset>) -> FanoutOutcome<()> {
        self.fan_out(
            "commit_offsets",
            offsets,
            |group| Request::CommitOffsets {
                offsets: group.into_iter().collect(),
            },
            |keys, response| match response {
                Response::CommitOffsetsOk { .. } => {
                    Some(keys.iter().map(|key| (key.clone(), ())).collect())
                }
                _ => None,
            },
        )
        .await
    }

    /// Reads the committed offset of each key; keys never committed report 0.
    pub async fn list_committed_offsets(&self, keys: Vec<String>) -> FanoutOutcome<Offset> {
        self.fan_out(
            "list_committed_offsets",
            keys.into_iter().map(|key| (key, ())),
            |group| Request::ListCommittedOffsets {
                keys: group.into_iter().map(|(key, _)| key).collect(),
            },
            |keys, response| match response {
                Response::ListCommittedOffsetsOk { mut offsets, .. } => Some(
                    keys.iter()
                        .map(|key| (key.clone(), offsets.remove(key).unwrap_or(0)))
                        .collect(),
                ),
                _ => None,
            },
        )
        .await
    }

    pub fn stats(&self) -> NodeStats {
        NodeStats {
            node_id: self.local_id().to_string(),
            cluster_size: self.resolver.membership().len(),
            log_keys: self.logs.key_count(),
            log_entries: self.logs.entry_count(),
            committed_keys: self.commits.key_count(),
        }
    }

    fn execute_local(&self, request: &Request) -> Response {
        match request {
            Request::Send { key, msg } => Response::SendOk {
                offset: self.logs.append(key, *msg),
            },
            Request::Poll { offsets } => Response::PollOk {
                msgs: offsets
                    .iter()
                    .map(|(key, from)| (key.clone(), self.logs.range(key, *from)))
                    .collect(),
                failed: BTreeMap::new(),
            },
            Request::CommitOffsets { offsets } => {
                for (key, offset) in offsets {
                    self.commits.set_commit(key, *offset);
                }
                Response::CommitOffsetsOk {
                    failed: BTreeMap::new(),
                }
            }
            Request::ListCommittedOffsets { keys } => Response::ListCommittedOffsetsOk {
                offsets: self.commits.get_commits(keys.iter().map(String::as_str)),
                failed: BTreeMap::new(),
            },
        }
    }

    async fn fan_out<V, T>(
        &self,
        op: &'static str,
        items: impl IntoIterator<Item = (String, V)>,
        build: fn(Vec<(String, V)>) -> Request,
        extract: fn(&[String], Response) -> Option<BTreeMap<String, T>>,
    ) -> FanoutOutcome<T> {
        let request_id = new_request_id();
        let deadline = Instant::now() + self.config.request_timeout;
        let groups = self.resolver.group_by_owner(items);

        let mut outcome = FanoutOutcome::default();
        let mut pending: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
        let mut in_flight = JoinSet::new();
        let mut local = None;

        for (owner, group) in groups {
            let keys: Vec<String> = group.iter().map(|(key, _)| key.clone()).collect();
            let request = build(group);

            if self.resolver.membership().is_local(&owner) {
                local = Some((keys, request));
                continue;
            }

            tracing::debug!(
                "[{}] {}: {} key(s) routed to {}",
                request_id,
                op,
                keys.len(),
                owner
            );

            let transport = self.transport.clone();
            let retry = self.config.retry.clone();
            let request_id = request_id.clone();
            let node = owner.clone();
            in_flight.spawn(async move {
                let result = call_with_retry(
                    transport.as_ref(),
                    &retry,
                    &node,
                    &request_id,
                    &request,
                    deadline,
                )
                .await;
                (node, result)
            });
            pending.insert(owner, keys);
        }

        // Remote calls are already running while the local group executes.
        if let Some((keys, request)) = local {
            let response = self.execute_local(&request);
            outcome.absorb(self.local_id(), keys, Ok(response), extract);
        }

        let mut timed_out = false;
        while !in_flight.is_empty() {
            let joined = tokio::time::timeout_at(deadline, in_flight.join_next()).await;
            match joined {
                Ok(Some(Ok((node, result)))) => {
                    let keys = pending.remove(&node).unwrap_or_default();
                    outcome.absorb(&node, keys, result, extract);
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("[{}] {}: sub-call task failed: {}", request_id, op, e);
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    in_flight.abort_all();
                    break;
                }
            }
        }

        for (node, keys) in pending {
            let err = if timed_out {
                BrokerError::Timeout { node }
            } else {
                BrokerError::Internal(format!("sub-call to {} was aborted", node))
            };
            for key in keys {
                outcome.failed.insert(key, err.clone());
            }
        }

        if !outcome.is_complete() {
            tracing::warn!(
                "[{}] {}: {} key(s) failed, {} succeeded",
                request_id,
                op,
                outcome.failed.len(),
                outcome.values.len()
            );
        }

        outcome
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Sends `request` to `node`, retrying within the policy's budget and `deadline`.
async fn call_with_retry(
    transport: &dyn PeerTransport,
    retry: &RetryPolicy,
    node: &NodeId,
    request_id: &str,
    request: &Request,
    deadline: Instant,
) -> Result<Response, BrokerError> {
    let idempotent = request.is_idempotent();
    let attempts = retry.attempts.max(1);

    for attempt in 1..=attempts {
        let now = Instant::now();
        if now >= deadline {
            return Err(BrokerError::Timeout { node: node.clone() });
        }
        let timeout = retry.attempt_timeout.min(deadline - now);

        let result = match tokio::time::timeout(
            timeout,
            transport.call(node, request_id, request, timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };

        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if attempt == attempts || !err.is_retryable(idempotent) {
            tracing::error!(
                "[{}] {} to {} failed after {} attempt(s): {}",
                request_id,
                request.method(),
                node,
                attempt,
                err
            );
            return Err(err.into_broker_error(node));
        }

        let delay = retry.backoff(attempt) + retry.jitter();
        tracing::warn!(
            "[{}] {} to {} failed (attempt {}/{}): {}, retrying in {:?}",
            request_id,
            request.method(),
            node,
            attempt,
            attempts,
            err,
            delay
        );
        tokio::time::sleep_until((Instant::now() + delay).min(deadline)).await;
    }

    Err(BrokerError::Timeout { node: node.clone() })
}
