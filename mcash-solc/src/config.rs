use crate::{
    artifacts::{serde_helpers, EvmVersion, Optimizer},
    error::{Result, SolcError},
    report::{Logger, TracingLogger},
};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, sync::Arc};

/// The compiler version used when none is configured
pub const DEFAULT_SOLC_VERSION: &str = "0.5.4";

/// All compiler versions this crate knows how to drive
pub const SUPPORTED_SOLC_VERSIONS: [&str; 2] = ["0.4.25", "0.5.4"];

/// How solc should be selected and configured
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolcConfig {
    /// The exact compiler version, [`DEFAULT_SOLC_VERSION`] if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, with = "serde_helpers::display_from_str")]
    pub evm_version: EvmVersion,
    #[serde(default)]
    pub optimizer: Optimizer,
}

impl Default for SolcConfig {
    fn default() -> Self {
        Self { version: None, evm_version: EvmVersion::default(), optimizer: Optimizer::default() }
    }
}

impl SolcConfig {
    /// Reads the config from a json file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| SolcError::io(err, path))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Pins the compiler version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_evm_version(mut self, evm_version: EvmVersion) -> Self {
        self.evm_version = evm_version;
        self
    }

    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Returns the compiler version to use.
    ///
    /// Fails with [`SolcError::UnsupportedVersion`] if the configured version is not one of
    /// [`SUPPORTED_SOLC_VERSIONS`], this error is fatal for the whole run.
    pub fn compiler_version(&self) -> Result<Version> {
        let version = self.version.as_deref().unwrap_or(DEFAULT_SOLC_VERSION).trim();
        if !SUPPORTED_SOLC_VERSIONS.contains(&version) {
            return Err(SolcError::UnsupportedVersion {
                version: version.to_string(),
                supported: SUPPORTED_SOLC_VERSIONS.iter().map(|v| v.to_string()).collect(),
            })
        }
        Ok(Version::parse(version)?)
    }
}

/// Per call options of a batch compile
#[derive(Clone)]
pub struct CompileOptions {
    /// Treat warnings like errors
    pub strict: bool,
    /// Don't log warnings
    pub quiet: bool,
    /// Where warnings are written to
    pub logger: Arc<dyn Logger>,
}

impl CompileOptions {
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { strict: false, quiet: false, logger: Arc::new(TracingLogger::default()) }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("strict", &self.strict)
            .field("quiet", &self.quiet)
            .finish_non_exhaustive()
    }
}
