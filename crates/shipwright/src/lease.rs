use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use shipwright_core::{Environment, LeaseConfig, LeaseMode};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// Hands out per-environment leases backed by OS advisory locks.
///
/// One lock file per environment under `dir`. The lock belongs to the open
/// file, so it is released when the [`EnvironmentLease`] drops or the
/// process dies.
///
/// Leases only exclude runs that see the same lock file: processes on one
/// host, or hosts sharing `dir` over a filesystem that honours `flock`. Two
/// CI workers with separate checkouts do not block each other; serialize
/// those in the CI system, or point `[lease].dir` at shared storage.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    dir: PathBuf,
    mode: LeaseMode,
    wait_timeout: Duration,
    poll_interval: Duration,
}

/// Exclusive claim on one environment.
#[derive(Debug)]
pub struct EnvironmentLease {
    file: File,
    path: PathBuf,
    environment: Environment,
}

impl EnvironmentLease {
    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvironmentLease {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            tracing::debug!(path = %self.path.display(), error = %e, "could not clear lease holder");
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "lease unlock failed; released on close");
        }
        tracing::debug!(environment = %self.environment, "lease released");
    }
}

impl LeaseManager {
    /// `config.dir` is resolved against `project_dir` when relative.
    pub fn from_config(project_dir: &Path, config: &LeaseConfig) -> Self {
        Self {
            dir: project_dir.join(&config.dir),
            mode: config.mode,
            wait_timeout: config.wait_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    pub fn mode(&self) -> LeaseMode {
        self.mode
    }

    pub fn lock_path(&self, environment: Environment) -> PathBuf {
        self.dir.join(format!("{environment}.lock"))
    }

    /// Acquire the lease for `environment` according to the configured mode.
    ///
    /// `fail-fast` returns `LockContention` at once if the lease is held;
    /// `wait` retries until `wait_timeout` elapses or `cancel` fires.
    pub async fn acquire(
        &self,
        environment: Environment,
        holder: &str,
        cancel: &CancellationToken,
    ) -> Result<EnvironmentLease, PipelineError> {
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        loop {
            let current = match self.try_acquire(environment, holder)? {
                Acquired::Lease(lease) => return Ok(lease),
                Acquired::HeldBy(current) => current,
            };

            if self.mode == LeaseMode::FailFast || tokio::time::Instant::now() >= deadline {
                return Err(PipelineError::LockContention {
                    environment,
                    holder: current,
                });
            }

            tracing::info!(%environment, holder = %current, "environment leased, waiting");
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(PipelineError::Cancelled {
                        stage: shipwright_core::Stage::Pending,
                    });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One non-blocking attempt.
    pub fn try_acquire(&self, environment: Environment, holder: &str) -> Result<Acquired, PipelineError> {
        let path = self.lock_path(environment);
        let io_err = |source: io::Error| PipelineError::Lease {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if e.kind() != fs2::lock_contended_error().kind() {
                return Err(io_err(e));
            }
            return Ok(Acquired::HeldBy(read_holder(&mut file)));
        }

        write_holder(&mut file, holder).map_err(io_err)?;
        tracing::debug!(%environment, path = %path.display(), "lease acquired");

        Ok(Acquired::Lease(EnvironmentLease {
            file,
            path,
            environment,
        }))
    }
}

/// Outcome of [`LeaseManager::try_acquire`].
#[derive(Debug)]
pub enum Acquired {
    Lease(EnvironmentLease),
    /// Lease is taken; holder description as written by its owner
    HeldBy(String),
}

fn write_holder(file: &mut File, holder: &str) -> io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(
        file,
        "run_id={holder} pid={pid} acquired_at={at}",
        pid = std::process::id(),
        at = chrono::Utc::now().to_rfc3339(),
    )?;
    file.sync_data()
}

fn read_holder(file: &mut File) -> String {
    let mut contents = String::new();
    match file.read_to_string(&mut contents) {
        Ok(_) if !contents.trim().is_empty() => contents.trim().to_owned(),
        Ok(_) => "unknown holder".to_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "could not read lease holder");
            "unknown holder".to_owned()
        }
    }
}
