//! Stream-jsonrpc client harness for the droid CLI.
//!
//! The droid agent speaks newline-delimited JSON over its stdio when started
//! with `--input-format stream-jsonrpc --output-format stream-jsonrpc`.  This
//! module owns the whole client side of that conversation:
//!
//! - [`transport`] — child process lifecycle and bounded line I/O.
//! - [`wire`] / [`codec`] — typed message shapes and line (de)serialisation.
//! - [`correlator`] — request/response matching under notification traffic.
//! - [`aggregator`] — streamed assistant-text capture with heuristic
//!   end-of-turn detection.

pub mod aggregator;
pub mod codec;
pub mod correlator;
pub mod transport;
pub mod wire;

pub use aggregator::{CaptureState, TurnAggregator};
pub use correlator::Correlator;
pub use transport::{LaunchSpec, ProcessTransport};
pub use wire::{Message, Notification, RemoteError, Request, Response};
