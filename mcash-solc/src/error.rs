use semver::Version;
use std::{io, path::PathBuf, time::Duration};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolcError>;

/// Various error types
#[derive(Debug, Error)]
pub enum SolcError {
    /// Internal solc error, the process failed or produced garbage
    #[error("Solc Error: {0}")]
    SolcError(String),
    /// The compiler could not be resolved or loaded, or the settings are unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The requested compiler version is not one this crate can drive.
    ///
    /// No artifact can ever be produced with this configuration, callers should abort the run.
    #[error("unsupported solc version `{version}`, supported versions are: {}", .supported.join(", "))]
    UnsupportedVersion { version: String, supported: Vec<String> },
    /// The compiler reported at least one fatal diagnostic
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Fetching a missing compiler failed
    #[error(transparent)]
    Download(#[from] DownloadError),
    /// A link reference points outside of the bytecode it belongs to
    #[error("link reference `{library}` at byte offset {start} does not fit into bytecode of {len} characters")]
    LinkReference { library: String, start: usize, len: usize },
    #[error(transparent)]
    SemverError(#[from] semver::Error),
    /// Deserialization error
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Filesystem IO error
    #[error(transparent)]
    Io(#[from] SolcIoError),
    #[error(transparent)]
    Remapping(#[from] crate::remappings::RemappingError),
    /// General purpose message
    #[error("{0}")]
    Message(String),
}

impl SolcError {
    pub(crate) fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        SolcIoError::new(err, path).into()
    }
    pub(crate) fn solc(msg: impl Into<String>) -> Self {
        SolcError::SolcError(msg.into())
    }
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SolcError::Configuration(msg.into())
    }
    pub(crate) fn msg(msg: impl Into<String>) -> Self {
        SolcError::Message(msg.into())
    }

    /// Whether this error is scoped to the whole run rather than a single compilation.
    ///
    /// A driver receiving a fatal error must not retry or continue with other batches.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SolcError::Configuration(_) | SolcError::UnsupportedVersion { .. } | SolcError::Download(_)
        )
    }
}

/// The compiler rejected the sources.
///
/// Carries the formatted messages of every diagnostic that caused the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Errors raised while waiting for a compiler to be fetched into the local cache
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("failed to download solc {version}: {reason}")]
    Failed { version: Version, reason: String },
    #[error("timed out after {timeout:?} waiting for solc {version} to be downloaded")]
    Timeout { version: Version, timeout: Duration },
    #[error("download of solc {version} completed but \"{}\" does not exist", .path.display())]
    Missing { version: Version, path: PathBuf },
}

#[derive(Debug, Error)]
#[error("\"{}\": {io}", self.path.display())]
pub struct SolcIoError {
    io: io::Error,
    path: PathBuf,
}

impl SolcIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }

    /// The path that caused the error
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// The underlying IO error
    pub fn io_error(&self) -> &io::Error {
        &self.io
    }
}

impl From<SolcIoError> for io::Error {
    fn from(err: SolcIoError) -> Self {
        err.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_scoped_errors_are_fatal() {
        let unsupported = SolcError::UnsupportedVersion {
            version: "0.8.0".to_string(),
            supported: vec!["0.4.25".to_string(), "0.5.4".to_string()],
        };
        assert!(unsupported.is_fatal());
        assert_eq!(
            unsupported.to_string(),
            "unsupported solc version `0.8.0`, supported versions are: 0.4.25, 0.5.4"
        );
        assert!(SolcError::config("missing").is_fatal());
        assert!(!SolcError::from(CompileError::new("ParserError")).is_fatal());
    }
}
