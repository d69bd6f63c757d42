use duct::{cmd, Expression, Handle};
use duration_string::DurationString;
use log::{debug, trace};
use std::{
    path::Path,
    thread::sleep,
    time::{Duration, Instant},
};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Custom error describing the error cases of running a git subprocess.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The underlying process creation failed (e.g. git is not installed).
    #[error("git cannot run: {0}")]
    ProcessFailure(#[from] std::io::Error),
    /// The command returned a non-zero exit code. The parameters are the exit code and the output.
    #[error("git returned non-zero exit code {0} with message: {1}")]
    NonZeroExitcode(i32, String),
    /// The command output contains non-UTF8 characters.
    #[error("git returned invalid characters")]
    NonUtf8Return,
    /// The command didn't finish in the given time and it was killed.
    #[error("git did not finish in {0}")]
    TimedOut(DurationString),
}

impl CommandError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::TimedOut(_))
    }
}

/// Build a git command running in the given directory, that never waits for user input.
pub fn git(directory: &Path, args: &[&str]) -> Expression {
    cmd("git", args)
        .dir(directory)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
}

/// Run the command and return its combined stdout and stderr.
///
/// The process is killed if it doesn't exit until the timeout.
pub fn run(expression: Expression, timeout: Duration) -> Result<String, CommandError> {
    trace!("Starting {expression:?} with timeout {timeout:?}.");

    let handle = in_own_process_group(expression)
        .stderr_to_stdout()
        .stdout_capture()
        .unchecked()
        .start()?;

    let deadline = Instant::now() + timeout;
    let output = loop {
        if let Some(output) = handle.try_wait()? {
            break output;
        }
        if Instant::now() >= deadline {
            debug!("Command is running longer than {timeout:?}, killing it.");
            kill(&handle)?;
            return Err(CommandError::TimedOut(DurationString::new(timeout)));
        }
        sleep(POLL_INTERVAL);
    };

    let output_str =
        std::str::from_utf8(&output.stdout).map_err(|_| CommandError::NonUtf8Return)?;
    let output_str = output_str.trim_end().to_string();

    if output.status.success() {
        Ok(output_str)
    } else {
        Err(CommandError::NonZeroExitcode(
            output.status.code().unwrap_or(-1),
            output_str,
        ))
    }
}

// Git starts helpers (ssh, remote-https), they have to be killed with it.
#[cfg(unix)]
fn in_own_process_group(expression: Expression) -> Expression {
    use std::os::unix::process::CommandExt;

    expression.before_spawn(|command| {
        command.process_group(0);
        Ok(())
    })
}

#[cfg(not(unix))]
fn in_own_process_group(expression: Expression) -> Expression {
    expression
}

fn kill(handle: &Handle) -> Result<(), CommandError> {
    #[cfg(unix)]
    for pid in handle.pids() {
        use nix::{
            sys::signal::{killpg, Signal},
            unistd::Pid,
        };

        if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!("Cannot kill process group {pid}: {err}.");
        }
    }
    handle.kill()?;

    Ok(())
}
