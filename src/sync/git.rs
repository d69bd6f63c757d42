use super::{BranchVerifier, SyncError, SyncExecutor, VerifyError};
use log::debug;
use std::{path::Path, time::Duration};

mod branch;
pub mod command;

use branch::is_active_branch;
use command::{git, run};

/// Checks the current branch by parsing the output of `git branch`.
pub struct GitBranchVerifier {
    timeout: Duration,
}

impl GitBranchVerifier {
    pub fn new(timeout: Duration) -> Self {
        GitBranchVerifier { timeout }
    }
}

impl BranchVerifier for GitBranchVerifier {
    fn currently_on(&self, location: &Path, branch: &str) -> Result<bool, VerifyError> {
        let output = run(git(location, &["branch", "--no-color"]), self.timeout)
            .map_err(|err| VerifyError::ListFailed(location.display().to_string(), err))?;
        debug!("Branches in {}:\n{output}", location.display());

        Ok(is_active_branch(&output, branch))
    }
}

/// Pulls the branch from origin with `git pull`.
///
/// Fetching and merging is left entirely to git, so a pull that cannot be
/// fast-forwarded is merged (or fails) the same way as on the command line.
pub struct GitPullExecutor {
    timeout: Duration,
}

impl GitPullExecutor {
    pub fn new(timeout: Duration) -> Self {
        GitPullExecutor { timeout }
    }
}

impl SyncExecutor for GitPullExecutor {
    fn pull(&self, location: &Path, branch: &str) -> Result<(), SyncError> {
        let output = run(git(location, &["pull", "origin", branch]), self.timeout)
            .map_err(|err| SyncError::PullFailed(location.display().to_string(), err))?;

        debug!("Pull in {} succeeded, output:", location.display());
        output.lines().for_each(|line| {
            debug!("{line}");
        });

        Ok(())
    }
}
