//! The batch compile pipeline: sources in, artifacts out

use crate::{
    artifact_output::{self, CompiledContracts, CompilerInfo},
    compile::{self, registry::SolcRegistry, CompilerModule},
    config::{CompileOptions, SolcConfig},
    diagnostics::Triage,
    error::Result,
    parse::{self, ParsedSource},
    paths::{CanonicalSources, SourceSet},
    report, CompilerInput,
};
use semver::Version;
use std::{path::Path, sync::Arc};

/// Compiles sets of sources with one configured compiler.
///
/// The compiler module is resolved lazily per call, either from an explicitly set module, a
/// registry, or the process wide [`SolcRegistry::global`].
///
/// ```no_run
/// use mcash_solc::{Compiler, SolcConfig, SourceSet};
/// # fn demo() -> mcash_solc::error::Result<()> {
/// let sources: SourceSet =
///     [("contracts/Owned.sol".to_string(), "contract Owned {}".to_string())].into();
/// let compiled = Compiler::new(SolcConfig::default()).compile(&sources)?;
/// assert!(compiled.get("Owned").is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Compiler {
    config: SolcConfig,
    options: CompileOptions,
    registry: Option<Arc<SolcRegistry>>,
    module: Option<Arc<dyn CompilerModule>>,
}

impl Compiler {
    pub fn new(config: SolcConfig) -> Self {
        Self { config, ..Default::default() }
    }

    #[must_use]
    pub fn options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolves compilers from the given registry instead of the global one
    #[must_use]
    pub fn registry(mut self, registry: Arc<SolcRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Always uses the given module, the configured version still has to be supported
    #[must_use]
    pub fn module(mut self, module: Arc<dyn CompilerModule>) -> Self {
        self.module = Some(module);
        self
    }

    pub fn config(&self) -> &SolcConfig {
        &self.config
    }

    /// Resolves the compiler module for the configured version
    pub fn resolve(&self) -> Result<(Version, Arc<dyn CompilerModule>)> {
        let version = self.config.compiler_version()?;
        if let Some(module) = &self.module {
            return Ok((version, Arc::clone(module)))
        }
        let module = match &self.registry {
            Some(registry) => registry.get(&version)?,
            None => SolcRegistry::global()?.get(&version)?,
        };
        Ok((version, module))
    }

    /// Compiles all sources in a single compiler run.
    ///
    /// Fails with the fatal diagnostics if the compiler rejected any source, no artifacts are
    /// returned in that case. An empty source set never touches a compiler.
    pub fn compile(&self, sources: &SourceSet) -> Result<CompiledContracts> {
        let sources = CanonicalSources::new(sources);
        if sources.is_empty() {
            tracing::trace!(target: "solc", "no sources to compile");
            return Ok(CompiledContracts::default())
        }

        let (version, module) = self.resolve()?;
        let input = CompilerInput::new(&sources, &self.config);

        tracing::debug!(target: "solc", %version, sources = sources.len(), "compiling");
        report::solc_spawn(&version, &input);
        let output = compile::invoke(module.as_ref(), &input, None)?;

        let triage = Triage::new(&output.errors, self.options.strict);
        triage.log_warnings(self.options.logger.as_ref(), self.options.quiet);
        triage.into_result()?;
        report::solc_success(&version, &output);

        let compiler = CompilerInfo::solc(module.version()?);
        artifact_output::assemble(&output, &sources, &compiler)
    }

    /// Returns the unresolved imports of a single source file, see [`parse::parse_imports`]
    pub fn parse_imports(&self, body: &str) -> Result<Vec<String>> {
        let (_, module) = self.resolve()?;
        parse::parse_imports(module.as_ref(), body)
    }

    /// Parses a single source file, see [`parse::parse`]
    pub fn parse(
        &self,
        body: &str,
        file_name: Option<&str>,
        root: Option<&Path>,
    ) -> Result<ParsedSource> {
        let (_, module) = self.resolve()?;
        parse::parse(module.as_ref(), body, file_name, root)
    }
}

/// Compiles the sources with the process wide registry
pub fn compile(
    sources: &SourceSet,
    config: &SolcConfig,
    options: &CompileOptions,
) -> Result<CompiledContracts> {
    Compiler::new(config.clone()).options(options.clone()).compile(sources)
}
