//! Probe configuration: environment loading, validation, and launch specs.
//!
//! The probe is configured entirely through the environment (matching how it
//! is run from CI) with CLI overrides applied in `main`:
//!
//! | Variable      | Meaning                              | Default                    |
//! |---------------|--------------------------------------|----------------------------|
//! | `DROID_BIN`   | droid CLI executable                 | `~/.local/bin/droid`       |
//! | `DROID_MODEL` | model identifier                     | `kimi-k2.5`                |
//! | `KEY1`        | credential for the originating turn  | *(required)*               |
//! | `KEY2`        | credential for the resuming turn     | *(required)*               |
//!
//! Credentials reach the agent only through the per-process environment
//! overlay in [`ProbeConfig::launch_spec`]; they are never logged and the
//! harness never mutates its own global environment.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rpc::transport::LaunchSpec;
use crate::{AppError, Result};

/// Environment variable carrying the credential into the agent process.
pub const API_KEY_ENV: &str = "FACTORY_API_KEY";

/// Default model when `DROID_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "kimi-k2.5";

/// Machine identifier reported on session initialisation.
pub const MACHINE_ID: &str = "m-apikey-reuse";

/// Autonomy level requested on session initialisation.
pub const AUTONOMY_LEVEL: &str = "auto-low";

/// Timeout set for one probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    /// Request/response wait.
    pub response: Duration,
    /// Capture window for the originating turn's reply.
    pub turn_one_capture: Duration,
    /// Capture window for the resuming turn's reply (longer: the model must
    /// recall content rather than echo an acknowledgement).
    pub turn_two_capture: Duration,
    /// Grace window between SIGTERM and SIGKILL on teardown.
    pub stop_grace: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            response: Duration::from_secs(30),
            turn_one_capture: Duration::from_secs(40),
            turn_two_capture: Duration::from_secs(60),
            stop_grace: Duration::from_secs(3),
        }
    }
}

/// Validated probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// droid CLI executable.
    pub droid_bin: PathBuf,
    /// Model identifier passed on the agent command line.
    pub model: String,
    /// Credential under which the session is created.
    pub key_primary: String,
    /// Credential under which resumption is attempted.
    pub key_secondary: String,
    /// Machine identifier for `initialize_session`.
    pub machine_id: String,
    /// Autonomy level for `initialize_session`.
    pub autonomy_level: String,
    /// Timeout set.
    pub timeouts: ProbeTimeouts,
}

impl ProbeConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when `KEY1` or `KEY2` is missing or
    /// blank.
    pub fn from_env() -> Result<Self> {
        let key_primary = trimmed_env("KEY1");
        let key_secondary = trimmed_env("KEY2");
        if key_primary.is_empty() || key_secondary.is_empty() {
            return Err(AppError::Config(
                "missing KEY1/KEY2 environment variables".into(),
            ));
        }

        let droid_bin = env::var_os("DROID_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(default_droid_bin);

        let model = {
            let value = trimmed_env("DROID_MODEL");
            if value.is_empty() {
                DEFAULT_MODEL.to_owned()
            } else {
                value
            }
        };

        Ok(Self {
            droid_bin,
            model,
            key_primary,
            key_secondary,
            machine_id: MACHINE_ID.to_owned(),
            autonomy_level: AUTONOMY_LEVEL.to_owned(),
            timeouts: ProbeTimeouts::default(),
        })
    }

    /// Build the launch spec for one agent process under `api_key`, working
    /// in `cwd`.
    #[must_use]
    pub fn launch_spec(&self, api_key: &str, cwd: &Path) -> LaunchSpec {
        LaunchSpec {
            program: self.droid_bin.clone(),
            args: vec![
                "exec".to_owned(),
                "--input-format".to_owned(),
                "stream-jsonrpc".to_owned(),
                "--output-format".to_owned(),
                "stream-jsonrpc".to_owned(),
                "--cwd".to_owned(),
                cwd.to_string_lossy().into_owned(),
                "--model".to_owned(),
                self.model.clone(),
            ],
            env: vec![(API_KEY_ENV.to_owned(), api_key.to_owned())],
            cwd: cwd.to_path_buf(),
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Read an environment variable, trimming whitespace; empty when unset.
fn trimmed_env(key: &str) -> String {
    env::var(key).map(|v| v.trim().to_owned()).unwrap_or_default()
}

/// `~/.local/bin/droid`, falling back to a bare `droid` PATH lookup when the
/// home directory is unknown.
fn default_droid_bin() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || PathBuf::from("droid"),
        |home| PathBuf::from(home).join(".local/bin/droid"),
    )
}
