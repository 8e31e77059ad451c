//! End-to-end probe run against a fake droid executable.
//!
//! A shell script standing in for the droid CLI is written to a tempdir and
//! marked executable, so the scenario exercises the real launch path,
//! including the credential environment overlay.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use droid_session_probe::config::{ProbeConfig, ProbeTimeouts};
use droid_session_probe::driver::LoadOutcome;
use droid_session_probe::scenario;
use droid_session_probe::scenario::fixture::ScratchRepo;

/// Fake droid CLI: ignores its arguments, speaks the stream protocol on
/// stdio, and rejects `load_session` unless launched under the primary key.
const FAKE_DROID: &str = r#"#!/bin/sh
n=0
while IFS= read -r line; do
  n=$((n+1))
  case "$line" in
    *initialize_session*)
      printf '{"type":"response","id":"%s","result":{"sessionId":"sess-e2e-1"}}\n' "$n"
      ;;
    *load_session*)
      if [ "$FACTORY_API_KEY" = "fk-primary" ]; then
        printf '{"type":"response","id":"%s","result":{}}\n' "$n"
      else
        printf '{"type":"response","id":"%s","error":{"message":"session not owned by this account"}}\n' "$n"
      fi
      ;;
    *add_user_message*)
      printf '{"type":"response","id":"%s","result":{}}\n' "$n"
      printf '{"type":"notification","method":"droid.session_notification","params":{"notification":{"type":"assistant_text_delta","textDelta":"OK."}}}\n'
      ;;
  esac
done
"#;

fn install_fake_droid(dir: &std::path::Path) -> PathBuf {
    let path = dir.join("fake-droid");
    std::fs::write(&path, FAKE_DROID).expect("write fake droid");
    let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn probe_config(droid_bin: PathBuf) -> ProbeConfig {
    ProbeConfig {
        droid_bin,
        model: "test-model".into(),
        key_primary: "fk-primary".into(),
        key_secondary: "fk-secondary".into(),
        machine_id: "m-test".into(),
        autonomy_level: "auto-low".into(),
        timeouts: ProbeTimeouts {
            response: Duration::from_secs(5),
            turn_one_capture: Duration::from_secs(5),
            turn_two_capture: Duration::from_secs(5),
            stop_grace: Duration::from_millis(500),
        },
    }
}

#[tokio::test]
async fn full_probe_reports_rejected_resume_and_no_leak() {
    let bin_dir = tempfile::tempdir().expect("tempdir");
    let config = probe_config(install_fake_droid(bin_dir.path()));

    let report = scenario::run(&config).await.expect("probe run");

    assert_eq!(report.session_id, "sess-e2e-1");
    assert_eq!(report.turn_one_text, "OK.");
    assert_eq!(
        report.load_outcome,
        LoadOutcome::Rejected {
            message: "session not owned by this account".into()
        }
    );
    assert!(!report.token_leaked());

    let rendered = report.render();
    assert!(rendered.contains("turn1.sessionId sess-e2e-1\n"));
    assert!(rendered.contains("turn2.load_session.ok false\n"));
    assert!(rendered.contains("token.found_in_turn2 False\n"));
}

#[tokio::test]
async fn launch_failure_does_not_leak_a_fixture_error() {
    let config = probe_config(PathBuf::from("/nonexistent/droid"));
    let err = scenario::run(&config).await.expect_err("must fail");
    assert!(
        err.to_string().starts_with("launch:"),
        "expected a launch error, got: {err}"
    );
}

#[tokio::test]
async fn scratch_repo_fixture_is_a_committed_git_repository() {
    let repo = ScratchRepo::create().await.expect("fixture");

    assert!(repo.path().join(".git").is_dir());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("README.md")).expect("readme"),
        "test\n"
    );

    let head = tokio::process::Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .current_dir(repo.path())
        .output()
        .await
        .expect("git rev-parse");
    assert!(head.status.success(), "fixture must have an initial commit");
}
