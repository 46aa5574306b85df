use std::path::Path;
use std::process::Command;

use shipwright_core::Revision;

/// Length of abbreviated commit hashes used as revisions.
const SHORT_SHA_LEN: usize = 7;

/// Resolves the revision of `HEAD` as an abbreviated commit hash.
pub fn head_revision(project_dir: &Path) -> Result<Revision, RevisionError> {
    let short = format!("--short={SHORT_SHA_LEN}");
    let stdout = git(project_dir, &["rev-parse", &short, "HEAD"])?;
    let sha = stdout.trim();
    Revision::parse(sha).map_err(|e| RevisionError::Invalid { source: e })
}

/// Checks whether the git working tree has uncommitted changes.
pub fn is_dirty(project_dir: &Path) -> Result<bool, RevisionError> {
    let stdout = git(project_dir, &["status", "--porcelain"])?;
    Ok(!stdout.trim().is_empty())
}

fn git(project_dir: &Path, args: &[&str]) -> Result<String, RevisionError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(project_dir)
        .output()
        .map_err(|e| RevisionError::GitCommand {
            detail: format!("failed to execute git {}", args.join(" ")),
            source: e,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RevisionError::GitFailed {
            detail: format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("git command failed: {detail}")]
    GitCommand {
        detail: String,
        source: std::io::Error,
    },
    #[error("git failed: {detail}")]
    GitFailed { detail: String },
    #[error("HEAD does not resolve to a usable revision")]
    Invalid { source: shipwright_core::Error },
}
