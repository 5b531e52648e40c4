//! Errors raised by the git subprocess facade.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// `git` could not be spawned at all.
    #[error("git is not installed or not in PATH: {0}")]
    NotInstalled(#[source] std::io::Error),

    #[error("git version must be >= 2.25, found {major}.{minor}")]
    TooOld { major: u32, minor: u32 },

    #[error("could not parse git version from: {0}")]
    UnparseableVersion(String),

    /// A git command exited unsuccessfully. `stderr` is the trimmed output.
    #[error("{action} failed: {stderr}")]
    CommandFailed { action: String, stderr: String },

    #[error("could not parse {what} from git output")]
    UnexpectedOutput { what: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Minimum git version with cone-mode sparse-checkout.
pub const MIN_GIT_VERSION: (u32, u32) = (2, 25);

impl GitError {
    pub fn command_failed(action: impl Into<String>, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr).trim().to_string();
        Self::CommandFailed {
            action: action.into(),
            stderr: if stderr.is_empty() {
                "no output from git".to_string()
            } else {
                stderr
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_keeps_stderr() {
        let err = GitError::command_failed("git clone", b"fatal: repository not found\n");
        assert_eq!(err.to_string(), "git clone failed: fatal: repository not found");
    }

    #[test]
    fn test_too_old_message() {
        let err = GitError::TooOld { major: 2, minor: 17 };
        assert_eq!(err.to_string(), "git version must be >= 2.25, found 2.17");
    }
}
