use crate::config::RepositoryEntry;
use log::{debug, error, info};
use mockall::automock;
use std::{
    collections::HashMap,
    fmt::Display,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;

/// Verify and pull repositories with the git command line.
pub mod git;

use git::command::CommandError;

/// A custom error for describing why the current branch couldn't be inspected.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Listing the branches failed, e.g. the directory is not a git repository.
    #[error("cannot list branches in {0}: {1}")]
    ListFailed(String, CommandError),
}

/// A custom error for describing why the pull failed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pulling failed: this can be a network failure, a merge conflict or missing permissions.
    #[error("cannot pull {0}: {1}")]
    PullFailed(String, CommandError),
}

impl VerifyError {
    fn is_timeout(&self) -> bool {
        match self {
            VerifyError::ListFailed(_, err) => err.is_timeout(),
        }
    }
}

impl SyncError {
    fn is_timeout(&self) -> bool {
        match self {
            SyncError::PullFailed(_, err) => err.is_timeout(),
        }
    }
}

/// Checks whether a working copy is checked out on a branch.
#[automock]
pub trait BranchVerifier: Send + Sync {
    /// Returns true if the repository at `location` is currently on `branch`.
    fn currently_on(&self, location: &Path, branch: &str) -> Result<bool, VerifyError>;
}

/// Pulls the remote changes into a working copy.
#[automock]
pub trait SyncExecutor: Send + Sync {
    /// Pull `branch` from origin into the repository at `location`.
    fn pull(&self, location: &Path, branch: &str) -> Result<(), SyncError>;
}

/// The category of a failed sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The working copy is on a different branch than expected.
    BranchMismatch,
    /// The working copy cannot be inspected.
    VerifyFailed,
    /// The pull itself failed.
    SyncFailed,
    /// A git command did not finish in the configured time.
    TimedOut,
}

/// The result of one sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    Failure { reason: FailureKind, detail: String },
}

impl SyncOutcome {
    fn failure(reason: FailureKind, detail: impl Display) -> Self {
        SyncOutcome::Failure {
            reason,
            detail: detail.to_string(),
        }
    }
}

/// Verify the branch, then pull, one repository at a time.
///
/// The verification always precedes the pull, and two syncs of the same location never
/// run at the same time.
pub struct SyncOrchestrator {
    verifier: Box<dyn BranchVerifier>,
    executor: Box<dyn SyncExecutor>,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl SyncOrchestrator {
    pub fn new(verifier: Box<dyn BranchVerifier>, executor: Box<dyn SyncExecutor>) -> Self {
        SyncOrchestrator {
            verifier,
            executor,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, location: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(location.to_path_buf()).or_default().clone()
    }

    /// Sync the repository: check that it is on the expected branch and pull.
    pub fn sync(&self, entry: &RepositoryEntry) -> SyncOutcome {
        let lock = self.lock_for(&entry.location);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = self.sync_inner(entry);
        match &outcome {
            SyncOutcome::Success => info!("Pulled {} on branch {}.", entry.slug, entry.expected_branch),
            SyncOutcome::Failure { reason, detail } => {
                error!("Failed to sync {} ({reason:?}): {detail}.", entry.slug)
            }
        }

        outcome
    }

    fn sync_inner(&self, entry: &RepositoryEntry) -> SyncOutcome {
        let RepositoryEntry {
            location,
            expected_branch,
            ..
        } = entry;

        debug!(
            "Checking that {} is on branch {expected_branch}.",
            location.display()
        );
        match self.verifier.currently_on(location, expected_branch) {
            Ok(true) => {}
            Ok(false) => {
                return SyncOutcome::failure(
                    FailureKind::BranchMismatch,
                    format!(
                        "repository {} is not on branch {expected_branch}",
                        location.display()
                    ),
                )
            }
            Err(err) if err.is_timeout() => {
                return SyncOutcome::failure(FailureKind::TimedOut, err)
            }
            Err(err) => return SyncOutcome::failure(FailureKind::VerifyFailed, err),
        }

        debug!("Pulling {} from origin {expected_branch}.", location.display());
        match self.executor.pull(location, expected_branch) {
            Ok(()) => SyncOutcome::Success,
            Err(err) if err.is_timeout() => SyncOutcome::failure(FailureKind::TimedOut, err),
            Err(err) => SyncOutcome::failure(FailureKind::SyncFailed, err),
        }
    }
}
