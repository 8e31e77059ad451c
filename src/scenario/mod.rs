//! Two-credential session reuse scenario.
//!
//! Turn 1 creates a session under the primary credential and plants a secret
//! token in it.  Turn 2 starts a fresh agent under the secondary credential,
//! attempts to resume the session by identifier, and asks for the token back.
//! Whether resumption is rejected, and whether the token surfaces in the
//! second turn's reply, is the probe's whole output.
//!
//! Each turn owns its agent process for exactly the scope of the turn:
//! teardown runs on every exit path (and `kill_on_drop` backstops panics), so
//! a failed initialise never leaks a child process.

pub mod fixture;
pub mod report;

use std::path::Path;

use tracing::info;

use crate::config::ProbeConfig;
use crate::driver::{InitializeParams, LoadOutcome, SessionDriver};
use crate::rpc::transport::ProcessTransport;
use crate::scenario::fixture::{secret_token, ScratchRepo};
use crate::scenario::report::ProbeReport;
use crate::Result;

/// Execute the full two-credential probe.
///
/// # Errors
///
/// Propagates launch, transport, and response-timeout faults from either
/// turn.  A rejected `load_session` and an empty capture are outcomes, not
/// errors.
pub async fn run(config: &ProbeConfig) -> Result<ProbeReport> {
    let repo = ScratchRepo::create().await?;
    let token = secret_token();
    info!(cwd = %repo.path().display(), "scratch repository ready");

    let (session_id, turn_one_text) =
        originating_turn(config, repo.path(), &token).await?;
    let (load_outcome, turn_two_text) =
        resuming_turn(config, repo.path(), &session_id).await?;

    Ok(ProbeReport {
        session_id,
        turn_one_text,
        load_outcome,
        turn_two_text,
        token,
    })
}

/// Turn 1: create the session under the primary credential and plant the
/// token.
async fn originating_turn(
    config: &ProbeConfig,
    cwd: &Path,
    token: &str,
) -> Result<(String, String)> {
    let transport =
        ProcessTransport::launch(&config.launch_spec(&config.key_primary, cwd)).await?;
    let mut driver = SessionDriver::new(transport, config.timeouts.response);

    let outcome = async {
        let session_id = driver
            .initialize_session(&init_params(config, cwd))
            .await?;
        let reply = driver
            .send_user_message(
                &format!("Remember this token: {token}. Reply ONLY OK."),
                config.timeouts.turn_one_capture,
            )
            .await?;
        Ok((session_id, reply))
    }
    .await;

    driver.shutdown(config.timeouts.stop_grace).await;
    outcome
}

/// Turn 2: attempt resumption under the secondary credential and ask for the
/// token back.
///
/// The recall question is sent even when `load_session` is rejected — a
/// rejected load followed by a token-bearing reply would be the worst
/// possible leak, so the probe always looks.
async fn resuming_turn(
    config: &ProbeConfig,
    cwd: &Path,
    session_id: &str,
) -> Result<(LoadOutcome, String)> {
    let transport =
        ProcessTransport::launch(&config.launch_spec(&config.key_secondary, cwd)).await?;
    let mut driver = SessionDriver::new(transport, config.timeouts.response);

    let outcome = async {
        driver.initialize_session(&init_params(config, cwd)).await?;
        let load_outcome = driver.load_session(session_id).await?;
        let reply = driver
            .send_user_message(
                "What token did I ask you to remember? Reply ONLY the token.",
                config.timeouts.turn_two_capture,
            )
            .await?;
        Ok((load_outcome, reply))
    }
    .await;

    driver.shutdown(config.timeouts.stop_grace).await;
    outcome
}

fn init_params(config: &ProbeConfig, cwd: &Path) -> InitializeParams {
    InitializeParams {
        machine_id: config.machine_id.clone(),
        cwd: cwd.to_path_buf(),
        model_id: config.model.clone(),
        autonomy_level: config.autonomy_level.clone(),
    }
}
