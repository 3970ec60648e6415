//! Compiler pipeline events and diagnostics output
//!
//! A process wide [`Reporter`] passively observes compiler spawns and installations. The
//! diagnostics of a single compile call go to the [`Logger`] of its options instead.

use crate::{CompilerInput, CompilerOutput};
use once_cell::sync::OnceCell;
use semver::Version;
use std::{error::Error, fmt};

static REPORTER: OnceCell<Box<dyn Reporter + Send + Sync>> = OnceCell::new();

/// Makes `reporter` the process wide reporter.
///
/// # Errors
///
/// Fails if a reporter was installed before. The first one stays in place.
pub fn try_init<R>(reporter: R) -> Result<(), ReporterAlreadySet>
where
    R: Reporter + Send + Sync,
{
    REPORTER.set(Box::new(reporter)).map_err(|_| ReporterAlreadySet(()))
}

/// Like [`try_init`], for binaries that install their reporter exactly once at startup.
///
/// # Panics
///
/// If a reporter is already installed.
///
/// ```rust
/// mcash_solc::report::init(mcash_solc::report::BasicStdoutReporter::default());
/// ```
pub fn init<R>(reporter: R)
where
    R: Reporter + Send + Sync,
{
    if let Err(err) = try_init(reporter) {
        panic!("{err}")
    }
}

/// Observer of the compiler pipeline. Every callback defaults to doing nothing.
pub trait Reporter: 'static {
    /// A standard JSON request is about to be sent
    fn on_solc_spawn(&self, _version: &Version, _input: &CompilerInput) {}

    /// The compiler answered with a response that deserialized
    fn on_solc_success(&self, _version: &Version, _output: &CompilerOutput) {}

    /// A compiler release is missing from the cache and is being fetched
    fn on_solc_installation_start(&self, _version: &Version) {}

    /// The release was fetched and loaded
    fn on_solc_installation_success(&self, _version: &Version) {}

    fn on_solc_installation_error(&self, _version: &Version, _error: &str) {}

    /// Imports found by a single file import extraction
    fn on_unresolved_imports(&self, _imports: &[String]) {}
}

fn emit(event: impl FnOnce(&dyn Reporter)) {
    if let Some(reporter) = REPORTER.get() {
        event(reporter.as_ref())
    }
}

pub(crate) fn solc_spawn(version: &Version, input: &CompilerInput) {
    emit(|r| r.on_solc_spawn(version, input))
}

pub(crate) fn solc_success(version: &Version, output: &CompilerOutput) {
    emit(|r| r.on_solc_success(version, output))
}

pub(crate) fn solc_installation_start(version: &Version) {
    emit(|r| r.on_solc_installation_start(version))
}

pub(crate) fn solc_installation_success(version: &Version) {
    emit(|r| r.on_solc_installation_success(version))
}

pub(crate) fn solc_installation_error(version: &Version, error: &str) {
    emit(|r| r.on_solc_installation_error(version, error))
}

pub(crate) fn unresolved_imports(imports: &[String]) {
    emit(|r| r.on_unresolved_imports(imports))
}

/// Whether a reporter has been installed
pub fn is_installed() -> bool {
    REPORTER.get().is_some()
}

#[derive(Copy, Clone, Debug, Default)]
pub struct NoReporter(());

impl Reporter for NoReporter {}

/// Prints a line per event, errors to `stderr`
#[derive(Copy, Clone, Debug, Default)]
pub struct BasicStdoutReporter(());

impl Reporter for BasicStdoutReporter {
    fn on_solc_spawn(&self, version: &Version, input: &CompilerInput) {
        let count = input.sources.len();
        println!("Compiling {count} source file(s) with solc {version}");
    }

    fn on_solc_success(&self, version: &Version, _: &CompilerOutput) {
        println!("solc {version} finished");
    }

    fn on_solc_installation_start(&self, version: &Version) {
        println!("Fetching solc {version}...");
    }

    fn on_solc_installation_success(&self, version: &Version) {
        println!("Installed solc {version}");
    }

    fn on_solc_installation_error(&self, version: &Version, error: &str) {
        eprintln!("Could not install solc {version}: {error}");
    }
}

/// A second reporter was installed
#[derive(Debug)]
pub struct ReporterAlreadySet(());

impl fmt::Display for ReporterAlreadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a reporter is already installed for this process")
    }
}

impl Error for ReporterAlreadySet {}

/// Sink for the human readable diagnostics of a compile call
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Forwards every message as a `tracing` event
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingLogger(());

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!(target: "solc", "{}", message);
    }
}

/// Prints every message to `stdout`
#[derive(Copy, Clone, Debug, Default)]
pub struct StdoutLogger(());

impl Logger for StdoutLogger {
    fn log(&self, message: &str) {
        println!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_are_loggers() {
        let lines = Mutex::new(Vec::new());
        let logger = |msg: &str| lines.lock().unwrap().push(msg.to_string());
        logger.log("Compilation warnings encountered:");
        Logger::log(&logger, "second");
        assert_eq!(lines.into_inner().unwrap(), vec!["Compilation warnings encountered:", "second"]);
    }

    #[test]
    fn reporter_is_set_once() {
        // tests share the process, another test may have installed one already
        let _ = try_init(NoReporter::default());
        assert!(try_init(BasicStdoutReporter::default()).is_err());
        assert!(is_installed());
    }
}
