#![forbid(unsafe_code)]

//! `droid-session-probe` — validates droid CLI session credential isolation.
//!
//! The reusable core is [`rpc`]: a client harness for the droid agent's
//! line-delimited JSON-RPC stdio protocol.  [`driver`] sequences the session
//! operations on top of it, and [`scenario`] is the thin two-credential probe
//! built from both.

pub mod config;
pub mod driver;
pub mod errors;
pub mod rpc;
pub mod scenario;

pub use config::ProbeConfig;
pub use errors::{AppError, Result};
