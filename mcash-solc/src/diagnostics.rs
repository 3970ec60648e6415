//! Sorting compiler diagnostics into the ones that fail a compile and the ones that are only
//! worth logging

use crate::{
    artifacts::{Error, Severity},
    error::CompileError,
    report::Logger,
};

/// The advisory every nightly or otherwise unreleased solc build attaches to its output
pub const PRE_RELEASE_WARNING: &str =
    "This is a pre-release compiler version, please do not use it in production.";

/// Header logged in front of non fatal warnings
pub const WARNINGS_HEADER: &str = "\nCompilation warnings encountered:\n";

/// Whether the diagnostic is the pre-release advisory, which is never reported
pub fn is_pre_release_advisory(error: &Error) -> bool {
    error.message.contains(PRE_RELEASE_WARNING) ||
        error.formatted_message.as_deref().map_or(false, |msg| msg.contains(PRE_RELEASE_WARNING))
}

/// Drops the pre-release advisory from the diagnostics
pub fn strip_pre_release(errors: Vec<Error>) -> Vec<Error> {
    errors.into_iter().filter(|err| !is_pre_release_advisory(err)).collect()
}

/// The diagnostics of a single compiler run, split by how they affect the result
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Triage {
    /// Diagnostics that fail the compile
    pub fatal: Vec<Error>,
    /// Warnings that are only logged
    pub warnings: Vec<Error>,
}

impl Triage {
    /// Splits the diagnostics.
    ///
    /// Errors are always fatal, warnings only in strict mode. Info messages and the pre-release
    /// advisory are neither.
    pub fn new(errors: &[Error], strict: bool) -> Self {
        let mut triage = Triage::default();
        for err in errors.iter().filter(|err| !is_pre_release_advisory(err)) {
            match err.severity {
                Severity::Error => triage.fatal.push(err.clone()),
                Severity::Warning if strict => triage.fatal.push(err.clone()),
                Severity::Warning => triage.warnings.push(err.clone()),
                Severity::Info => {}
            }
        }
        triage
    }

    /// Logs the non fatal warnings with the header, unless `quiet`
    pub fn log_warnings(&self, logger: &dyn Logger, quiet: bool) {
        if quiet || self.warnings.is_empty() {
            return
        }
        logger.log(WARNINGS_HEADER);
        logger.log(&join_formatted(&self.warnings));
    }

    /// The compile error carrying every fatal diagnostic, if there is one
    pub fn into_result(self) -> Result<(), CompileError> {
        if self.fatal.is_empty() {
            Ok(())
        } else {
            Err(CompileError::new(join_formatted(&self.fatal)))
        }
    }
}

/// The formatted messages of the diagnostics, comma separated
pub fn join_formatted(errors: &[Error]) -> String {
    errors.iter().map(Error::formatted).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn diagnostic(severity: Severity, message: &str) -> Error {
        Error {
            source_location: None,
            r#type: String::new(),
            component: "general".to_string(),
            severity,
            error_code: None,
            message: message.to_string(),
            formatted_message: Some(format!("MetaCoin.sol:1:1: {message}\n")),
        }
    }

    #[test]
    fn pre_release_advisory_is_dropped() {
        let errors = vec![diagnostic(Severity::Warning, PRE_RELEASE_WARNING)];
        assert!(strip_pre_release(errors.clone()).is_empty());

        let strict = Triage::new(&errors, true);
        assert_eq!(strict, Triage::default());
        assert!(strict.into_result().is_ok());
    }

    #[test]
    fn warnings_are_logged_unless_strict() {
        let errors = vec![
            diagnostic(Severity::Warning, "Unused local variable."),
            diagnostic(Severity::Info, "Some info."),
            diagnostic(Severity::Warning, "Function state mutability can be restricted to pure"),
        ];
        let triage = Triage::new(&errors, false);
        assert!(triage.fatal.is_empty());
        assert_eq!(triage.warnings.len(), 2);

        let lines = Mutex::new(Vec::new());
        triage.log_warnings(&|msg: &str| lines.lock().unwrap().push(msg.to_string()), false);
        assert_eq!(
            lines.into_inner().unwrap(),
            vec![
                WARNINGS_HEADER.to_string(),
                "MetaCoin.sol:1:1: Unused local variable.\n,MetaCoin.sol:1:1: Function state mutability can be restricted to pure\n".to_string(),
            ]
        );
    }

    #[test]
    fn quiet_suppresses_warnings() {
        let triage = Triage::new(&[diagnostic(Severity::Warning, "Unused local variable.")], false);
        let lines = Mutex::new(Vec::<String>::new());
        triage.log_warnings(&|msg: &str| lines.lock().unwrap().push(msg.to_string()), true);
        assert!(lines.into_inner().unwrap().is_empty());
    }

    #[test]
    fn strict_mode_fails_on_warnings() {
        let errors = vec![
            diagnostic(Severity::Warning, "Unused local variable."),
            diagnostic(Severity::Error, "DeclarationError: Undeclared identifier."),
        ];
        let err = Triage::new(&errors, true).into_result().unwrap_err();
        assert_eq!(
            err.message,
            "MetaCoin.sol:1:1: Unused local variable.\n,MetaCoin.sol:1:1: DeclarationError: Undeclared identifier.\n"
        );

        let err = Triage::new(&errors, false).into_result().unwrap_err();
        assert_eq!(err.message, "MetaCoin.sol:1:1: DeclarationError: Undeclared identifier.\n");
    }
}
