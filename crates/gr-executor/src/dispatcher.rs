//! Dispatch orchestrator.
//!
//! One invocation walks a fixed chain sequentially. Cooled-down endpoints are
//! skipped without being counted as tried. Each eligible endpoint gets a call,
//! plus a bounded number of in-place retries for transient and malformed
//! failures. Only rate-limit failures mutate the cooldown store, and no lock
//! is held across a network call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gr_config::{MAX_IN_PLACE_RETRIES, RouterConfig};
use gr_core::{EndpointId, ErrorKind, Policy, RouterError, Turn};
use gr_scheduler::{ChainSelector, CooldownStore, FailoverAction, RetryBudget, decide_action};
use gr_session::{ExpectedShape, validate, with_input};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{BackendRequest, Transport};

/// Process-wide knobs for the walk. Never varied per call.
///
/// Retry counts above [`MAX_IN_PLACE_RETRIES`] are clamped when the walk
/// builds each endpoint's budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub cooldown: Duration,
    pub transient_retries: u32,
    pub malformed_retries: u32,
    pub quality_first_timeout: Duration,
    pub latency_first_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &RouterConfig) -> Self {
        Self {
            cooldown: config.dispatch.cooldown(),
            transient_retries: config.dispatch.transient_retries,
            malformed_retries: config.dispatch.malformed_retries,
            quality_first_timeout: config.policy(Policy::QualityFirst).attempt_timeout(),
            latency_first_timeout: config.policy(Policy::LatencyFirst).attempt_timeout(),
        }
    }

    pub fn attempt_timeout(&self, policy: Policy) -> Duration {
        match policy {
            Policy::QualityFirst => self.quality_first_timeout,
            Policy::LatencyFirst => self.latency_first_timeout,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

/// Everything a collaborator supplies for one user action.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub policy: Policy,
    pub history: Vec<Turn>,
    pub input: String,
    pub shape: ExpectedShape,
    pub system: Option<String>,
}

impl DispatchRequest {
    pub fn new(policy: Policy, input: impl Into<String>, shape: ExpectedShape) -> Self {
        Self {
            policy,
            history: Vec::new(),
            input: input.into(),
            shape,
            system: None,
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed { kind: ErrorKind, detail: String },
}

/// One call issued to one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub endpoint: EndpointId,
    /// 1-based attempt number on this endpoint.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

/// Successful dispatch: a payload that matched the expected shape.
#[derive(Debug, Clone, Serialize)]
pub struct Dispatched {
    pub payload: Value,
    pub endpoint: EndpointId,
    pub attempts: Vec<AttemptRecord>,
}

struct Failure {
    kind: ErrorKind,
    detail: String,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    cooldowns: Arc<dyn CooldownStore>,
    selector: ChainSelector,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        cooldowns: Arc<dyn CooldownStore>,
        selector: ChainSelector,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            transport,
            cooldowns,
            selector,
            settings,
        }
    }

    pub fn from_config(
        config: &RouterConfig,
        transport: Arc<dyn Transport>,
        cooldowns: Arc<dyn CooldownStore>,
    ) -> Self {
        Self::new(
            transport,
            cooldowns,
            ChainSelector::from_config(config),
            DispatchSettings::from_config(config),
        )
    }

    pub fn selector(&self) -> &ChainSelector {
        &self.selector
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Run one invocation.
    ///
    /// Returns on the first endpoint that yields a valid payload. `cancel`
    /// is checked before every attempt and raced against every in-flight
    /// call; cancellation never marks an endpoint cooling.
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
        cancel: &CancellationToken,
    ) -> Result<Dispatched, RouterError> {
        let chain = self.selector.build_chain(request.policy);
        let backend_request = BackendRequest {
            system: request.system.clone(),
            turns: with_input(&request.history, &request.input),
            shape: request.shape.clone(),
        };
        let timeout = self.settings.attempt_timeout(request.policy);

        let mut tried: Vec<EndpointId> = Vec::new();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for endpoint in chain {
            if cancel.is_cancelled() {
                info!(policy = %request.policy, tried = tried.len(), "dispatch cancelled");
                return Err(RouterError::Cancelled { tried });
            }
            if !self.cooldowns.is_eligible(&endpoint) {
                debug!(tier = %endpoint.tier, slot = endpoint.slot, "skipping cooled-down endpoint");
                continue;
            }

            tried.push(endpoint.clone());
            let mut budget = RetryBudget::new(
                self.settings.transient_retries.min(MAX_IN_PLACE_RETRIES),
                self.settings.malformed_retries.min(MAX_IN_PLACE_RETRIES),
            );
            let mut attempt = 0u32;

            loop {
                if attempt > 0 && cancel.is_cancelled() {
                    info!(policy = %request.policy, tried = tried.len(), "dispatch cancelled");
                    return Err(RouterError::Cancelled { tried });
                }
                attempt += 1;

                let started = Instant::now();
                let result = self
                    .attempt(&endpoint, &backend_request, timeout, cancel)
                    .await;
                let elapsed_ms = started.elapsed().as_millis() as u64;

                let failure = match result {
                    Ok(payload) => {
                        attempts.push(AttemptRecord {
                            endpoint: endpoint.clone(),
                            attempt,
                            outcome: AttemptOutcome::Success,
                            elapsed_ms,
                        });
                        info!(
                            tier = %endpoint.tier,
                            slot = endpoint.slot,
                            attempt,
                            elapsed_ms,
                            "dispatch succeeded"
                        );
                        return Ok(Dispatched {
                            payload,
                            endpoint,
                            attempts,
                        });
                    }
                    Err(failure) => failure,
                };

                attempts.push(AttemptRecord {
                    endpoint: endpoint.clone(),
                    attempt,
                    outcome: AttemptOutcome::Failed {
                        kind: failure.kind,
                        detail: failure.detail.clone(),
                    },
                    elapsed_ms,
                });

                if failure.kind == ErrorKind::Cancelled {
                    info!(
                        tier = %endpoint.tier,
                        slot = endpoint.slot,
                        tried = tried.len(),
                        "dispatch cancelled mid-call"
                    );
                    return Err(RouterError::Cancelled { tried });
                }

                warn!(
                    tier = %endpoint.tier,
                    slot = endpoint.slot,
                    attempt,
                    kind = %failure.kind,
                    detail = %failure.detail,
                    "attempt failed"
                );

                match decide_action(failure.kind, &mut budget) {
                    FailoverAction::RetrySame => continue,
                    FailoverAction::Advance => break,
                    FailoverAction::CoolDownAndAdvance => {
                        self.cooldowns.mark_cooling(&endpoint, self.settings.cooldown);
                        info!(
                            tier = %endpoint.tier,
                            slot = endpoint.slot,
                            cooldown_secs = self.settings.cooldown.as_secs(),
                            "endpoint marked cooling"
                        );
                        break;
                    }
                    FailoverAction::Abort => {
                        info!(tried = tried.len(), "dispatch cancelled");
                        return Err(RouterError::Cancelled { tried });
                    }
                }
            }
        }

        warn!(
            policy = %request.policy,
            tried = tried.len(),
            attempts = attempts.len(),
            "all endpoints exhausted"
        );
        for record in &attempts {
            debug!(
                endpoint = %record.endpoint,
                attempt = record.attempt,
                outcome = ?record.outcome,
                elapsed_ms = record.elapsed_ms,
                "attempt record"
            );
        }
        Err(RouterError::ExhaustedAllEndpoints {
            tried,
            retry_after_secs: self.settings.cooldown.as_secs(),
        })
    }

    async fn attempt(
        &self,
        endpoint: &EndpointId,
        request: &BackendRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value, Failure> {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Failure {
                    kind: ErrorKind::Cancelled,
                    detail: "caller cancelled".to_string(),
                });
            }
            sent = tokio::time::timeout(timeout, self.transport.send(endpoint, request, cancel)) => sent,
        };

        let raw = match sent {
            Err(_) => {
                return Err(Failure {
                    kind: ErrorKind::TransientUnavailable,
                    detail: format!("attempt timed out after {}s", timeout.as_secs()),
                });
            }
            Ok(Err(err)) => {
                return Err(Failure {
                    kind: err.classify(),
                    detail: err.to_string(),
                });
            }
            Ok(Ok(raw)) => raw,
        };

        validate(&raw, &request.shape).map_err(|err| Failure {
            kind: ErrorKind::MalformedResponse,
            detail: err.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
