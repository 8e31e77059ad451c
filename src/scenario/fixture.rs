//! Scratch repository fixture and secret token generation.
//!
//! Each probe run works inside a throwaway git repository so the agent sees a
//! realistic workspace.  The fixture lives in a [`TempDir`] and is removed on
//! drop.

use std::path::Path;
use std::process::Stdio;

use chrono::Utc;
use tempfile::TempDir;
use tokio::process::Command;
use uuid::Uuid;

use crate::{AppError, Result};

/// Throwaway git repository used as the agent's working directory.
#[derive(Debug)]
pub struct ScratchRepo {
    /// Owns the directory tree; dropping it deletes the fixture.
    _dir: TempDir,
    repo: std::path::PathBuf,
}

impl ScratchRepo {
    /// Create the fixture: a tempdir containing `repo/` with one committed
    /// `README.md`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Fixture`] when a git command fails, or
    /// [`AppError::Io`] on filesystem failures.
    pub async fn create() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("droid-apikey-reuse-")
            .tempdir()?;
        let repo = dir.path().join("repo");

        tokio::fs::create_dir_all(&repo).await?;
        git(&repo, &["init"]).await?;
        tokio::fs::write(repo.join("README.md"), "test\n").await?;
        git(&repo, &["add", "."]).await?;
        // Identity flags keep the commit working on machines with no global
        // git config.
        git(
            &repo,
            &[
                "-c",
                "user.name=droid-session-probe",
                "-c",
                "user.email=probe@localhost",
                "commit",
                "-m",
                "init",
            ],
        )
        .await?;

        Ok(Self { _dir: dir, repo })
    }

    /// Path of the repository root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.repo
    }
}

/// Generate the secret token planted in the originating session:
/// `TOKEN-<unix-seconds>-<6 hex chars>`.
#[must_use]
pub fn secret_token() -> String {
    let timestamp = Utc::now().timestamp();
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
    format!("TOKEN-{timestamp}-{suffix}")
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Run one git command in `cwd`, discarding its output.
async fn git(cwd: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| AppError::Fixture(format!("failed to run git {}: {e}", args.join(" "))))?;

    if status.success() {
        Ok(())
    } else {
        Err(AppError::Fixture(format!(
            "git {} exited with {status}",
            args.join(" ")
        )))
    }
}
