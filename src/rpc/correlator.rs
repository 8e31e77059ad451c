//! Request/response correlation over the agent's notification traffic.
//!
//! The harness keeps exactly one request outstanding at a time, but the agent
//! interleaves broadcast notifications freely with responses.  The correlator
//! owns the shared read loop: every decoded notification is forwarded to the
//! currently active capture (if any), every response is either delivered to
//! the waiter, surfaced as a transport-level fault (`id: null` errors), or
//! parked for a later waiter.
//!
//! Both loops enforce an absolute deadline: reads happen in short slices so
//! worst-case wait time is bounded by the caller's timeout, not reset by
//! partial progress.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::rpc::aggregator::TurnAggregator;
use crate::rpc::codec;
use crate::rpc::transport::ProcessTransport;
use crate::rpc::wire::{Message, Response};
use crate::{AppError, Result};

/// Upper bound on a single blocking read inside the deadline loops.
const READ_SLICE: Duration = Duration::from_millis(200);

/// Matches inbound responses to outstanding request identifiers.
#[derive(Debug, Default)]
pub struct Correlator {
    /// Single-slot delivery points for responses that arrived before their
    /// waiter: first response per id wins, duplicates are logged and dropped.
    parked: HashMap<String, Response>,
}

impl Correlator {
    /// Create a correlator with no parked responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the read loop until the response for `id` arrives.
    ///
    /// Notifications seen along the way are forwarded to `capture` when one
    /// is active; at most one aggregator is ever active per transport.
    ///
    /// A response whose `id` matches is returned as-is, error descriptor
    /// included — interpreting a matched error is the caller's business.  A
    /// response with a null id carrying an error is a transport-level fault
    /// and surfaces immediately.
    ///
    /// # Errors
    ///
    /// - [`AppError::Timeout`] if no matching response arrives within
    ///   `timeout` — the dominant failure mode when the agent hangs or dies
    ///   silently.
    /// - [`AppError::Remote`] for an unmatched (`id: null`) error response.
    /// - [`AppError::Io`] on a transport stream failure.
    pub async fn await_response(
        &mut self,
        transport: &mut ProcessTransport,
        mut capture: Option<&mut TurnAggregator>,
        id: &str,
        timeout: Duration,
    ) -> Result<Response> {
        if let Some(parked) = self.parked.remove(id) {
            return Ok(parked);
        }

        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AppError::Timeout(format!(
                    "no response for request id {id} within {timeout:?}"
                )));
            }

            let Some(line) = transport.read_line(remaining.min(READ_SLICE)).await? else {
                // At EOF the read returns immediately; pace the loop so a
                // dead agent does not spin it until the deadline.
                if transport.has_exited() {
                    tokio::time::sleep(remaining.min(READ_SLICE)).await;
                }
                continue;
            };

            match codec::decode(&line) {
                None => {}
                Some(Message::Notification(notification)) => {
                    if let Some(aggregator) = capture.as_deref_mut() {
                        aggregator.on_notification(&notification);
                    }
                }
                Some(Message::Response(response)) => {
                    if response.id.as_deref() == Some(id) {
                        return Ok(response);
                    }
                    if response.id.is_none() {
                        if let Some(error) = &response.error {
                            return Err(AppError::Remote(format!(
                                "unmatched transport-level error: {}",
                                error.message
                            )));
                        }
                        debug!("correlator: discarding response with null id and no error");
                        continue;
                    }
                    self.park(response);
                }
            }
        }
    }

    /// Drive the read loop until the active capture completes or `timeout`
    /// elapses.
    ///
    /// This is the end-of-capture path: a timeout is **not** an error here —
    /// partial text is a valid, reportable outcome, and the caller collects
    /// whatever the aggregator buffered.  The loop also ends early when the
    /// agent process has exited and no further output is buffered.
    ///
    /// Stray responses seen during the capture window are parked for their
    /// waiters, not lost.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] only on a transport stream failure.
    pub async fn drain_capture(
        &mut self,
        transport: &mut ProcessTransport,
        aggregator: &mut TurnAggregator,
        timeout: Duration,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;

        while !aggregator.is_done() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("correlator: capture window elapsed, returning partial text");
                break;
            }

            match transport.read_line(remaining.min(READ_SLICE)).await? {
                None => {
                    if transport.has_exited() {
                        debug!("correlator: agent exited during capture");
                        break;
                    }
                }
                Some(line) => match codec::decode(&line) {
                    None => {}
                    Some(Message::Notification(notification)) => {
                        aggregator.on_notification(&notification);
                    }
                    Some(Message::Response(response)) => self.park(response),
                },
            }
        }

        Ok(())
    }

    /// Hold a response for a different pending wait.
    ///
    /// Duplicate delivery for an already-parked id is a protocol error on the
    /// agent's side: logged and dropped, never propagated.
    fn park(&mut self, response: Response) {
        let Some(id) = response.id.clone() else {
            debug!("correlator: dropping unparkable response without id");
            return;
        };
        if self.parked.contains_key(&id) {
            warn!(id, "correlator: duplicate response for parked id, dropping");
            return;
        }
        self.parked.insert(id, response);
    }
}
