//! Session driver — the scenario-facing protocol sequence.
//!
//! One [`SessionDriver`] owns one transport/correlator pair and issues each
//! request with a fresh identifier, enforcing the one-outstanding-request
//! invariant.  The three operations mirror the droid session protocol:
//! initialise a session, send a user message (followed by an assistant-text
//! capture), and load an existing session by identifier.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::rpc::aggregator::TurnAggregator;
use crate::rpc::codec;
use crate::rpc::correlator::Correlator;
use crate::rpc::transport::ProcessTransport;
use crate::rpc::wire::{methods, Request, Response};
use crate::{AppError, Result};

/// Parameters for `droid.initialize_session`.
#[derive(Debug, Clone)]
pub struct InitializeParams {
    /// Stable machine identifier reported to the agent.
    pub machine_id: String,
    /// Session working directory.
    pub cwd: PathBuf,
    /// Model identifier.
    pub model_id: String,
    /// Autonomy level (e.g. `auto-low`).
    pub autonomy_level: String,
}

/// Outcome of a `droid.load_session` attempt.
///
/// Rejection is an expected, testable outcome — the whole point of the probe
/// is to observe whether the agent refuses to resume a session created under
/// a different credential — so it is returned as data, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The agent attached to the existing session.
    Accepted,
    /// The agent refused, with the remote error text.
    Rejected {
        /// Remote error message; `"unknown"` when the agent omitted one.
        message: String,
    },
}

/// Drives the droid session protocol over one agent process.
#[derive(Debug)]
pub struct SessionDriver {
    transport: ProcessTransport,
    correlator: Correlator,
    aggregator: TurnAggregator,
    next_id: u64,
    response_timeout: Duration,
}

impl SessionDriver {
    /// Wrap a launched transport.  `response_timeout` bounds every
    /// request/response wait issued by this driver.
    #[must_use]
    pub fn new(transport: ProcessTransport, response_timeout: Duration) -> Self {
        Self {
            transport,
            correlator: Correlator::new(),
            aggregator: TurnAggregator::new(),
            next_id: 0,
            response_timeout,
        }
    }

    /// Create a new session; returns its opaque identifier.
    ///
    /// # Errors
    ///
    /// [`AppError::Remote`] if the response carries an error descriptor or
    /// lacks a non-empty `sessionId`; transport and timeout faults propagate.
    pub async fn initialize_session(&mut self, params: &InitializeParams) -> Result<String> {
        let response = self
            .request(
                methods::INITIALIZE_SESSION,
                json!({
                    "machineId": params.machine_id,
                    "cwd": params.cwd,
                    "modelId": params.model_id,
                    "autonomyLevel": params.autonomy_level,
                }),
            )
            .await?;

        if let Some(error) = &response.error {
            return Err(AppError::Remote(format!(
                "initialize_session failed: {}",
                error.message
            )));
        }

        let session_id = response
            .result
            .as_ref()
            .and_then(|result| result.get("sessionId"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Remote("initialize_session response missing sessionId".into())
            })?
            .to_owned();

        info!(session_id, "session initialised");
        Ok(session_id)
    }

    /// Send a user message and capture the assistant's streamed reply.
    ///
    /// The capture begins before the acknowledgement wait, since text deltas
    /// may race the ack on the wire; it then drains until the end-of-turn
    /// heuristic fires or `capture_timeout` elapses.  The returned text may
    /// be partial or empty — a capture timeout is a reportable outcome, not
    /// an error.
    ///
    /// # Errors
    ///
    /// [`AppError::Remote`] if the acknowledgement carries an error
    /// descriptor; transport and ack-timeout faults propagate.
    pub async fn send_user_message(
        &mut self,
        text: &str,
        capture_timeout: Duration,
    ) -> Result<String> {
        let id = self.fresh_id();
        let request = Request::new(&id, methods::ADD_USER_MESSAGE, json!({ "text": text }));

        self.aggregator.begin_capture();
        self.transport.write_line(&codec::encode(&request)?).await?;

        let ack = self
            .correlator
            .await_response(
                &mut self.transport,
                Some(&mut self.aggregator),
                &id,
                self.response_timeout,
            )
            .await?;

        if let Some(error) = &ack.error {
            return Err(AppError::Remote(format!(
                "add_user_message failed: {}",
                error.message
            )));
        }

        self.correlator
            .drain_capture(&mut self.transport, &mut self.aggregator, capture_timeout)
            .await?;

        Ok(self.aggregator.finish())
    }

    /// Attempt to attach to an existing session.
    ///
    /// # Errors
    ///
    /// Only transport and timeout faults — a remote rejection is returned as
    /// [`LoadOutcome::Rejected`].
    pub async fn load_session(&mut self, session_id: &str) -> Result<LoadOutcome> {
        let response = self
            .request(methods::LOAD_SESSION, json!({ "sessionId": session_id }))
            .await?;

        match &response.error {
            Some(error) => {
                let message = if error.message.trim().is_empty() {
                    "unknown".to_owned()
                } else {
                    error.message.clone()
                };
                debug!(session_id, message, "load_session rejected");
                Ok(LoadOutcome::Rejected { message })
            }
            None => {
                debug!(session_id, "load_session accepted");
                Ok(LoadOutcome::Accepted)
            }
        }
    }

    /// Tear down the agent process; see [`ProcessTransport::stop`].
    ///
    /// Idempotent and infallible — called on every scenario exit path.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.transport.stop(grace).await;
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    /// Issue one request with a fresh identifier and await its response.
    async fn request(&mut self, method: &str, params: Value) -> Result<Response> {
        let id = self.fresh_id();
        let request = Request::new(&id, method, params);
        self.transport.write_line(&codec::encode(&request)?).await?;
        self.correlator
            .await_response(&mut self.transport, None, &id, self.response_timeout)
            .await
    }

    /// Next request identifier; fresh per request, never reused.
    fn fresh_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}
