use crate::{
    artifacts::CompilerInput,
    error::{Result, SolcError},
    utils::{self, RE_MISSING_SOURCE},
    CompilerOutput,
};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use std::{
    collections::BTreeMap,
    fmt,
    io::{BufRead, Write},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};

pub mod project;
pub mod registry;

/// The name of the `solc` binary on the system
pub const SOLC: &str = "solc";

/// The calling conventions a compiler module may expose.
///
/// Older releases only know the legacy `compile` entry point, newer ones `compileStandard`.
/// Both take a standard json request and an optional import callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    CompileStandard,
    Compile,
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::CompileStandard => f.write_str("compileStandard"),
            EntryPoint::Compile => f.write_str("compile"),
        }
    }
}

/// Answer to the compiler asking for a file it could not find
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportResponse {
    /// The content of the requested file
    Contents(String),
    /// The file can't be provided, the string ends up in the compiler's diagnostic
    Error(String),
}

/// Callback the compiler consults for every import it cannot find itself
pub type ImportCallback<'a> = dyn FnMut(&str) -> ImportResponse + 'a;

/// A compiler loaded for one specific version.
///
/// Implementations are shared process wide through the [`registry::SolcRegistry`].
pub trait CompilerModule: fmt::Debug + Send + Sync {
    /// The full version string, like `0.5.4+commit.9549d8ff.Linux.g++`
    fn version(&self) -> Result<String>;

    /// Whether the module can be called through the given entry point
    fn exposes(&self, entry: EntryPoint) -> bool;

    /// Runs the compiler once with the serialized standard json request and returns the
    /// serialized response.
    fn call(
        &self,
        entry: EntryPoint,
        input: &str,
        imports: Option<&mut ImportCallback<'_>>,
    ) -> Result<String>;

    /// Removes process wide handlers the module installed while being loaded.
    ///
    /// Called exactly once per registry, for the first module loaded.
    fn uninstall_global_handlers(&self) {}
}

/// Picks the entry point to call the module with, `compileStandard` if available
pub fn entry_point(module: &dyn CompilerModule) -> Result<EntryPoint> {
    [EntryPoint::CompileStandard, EntryPoint::Compile]
        .into_iter()
        .find(|entry| module.exposes(*entry))
        .ok_or_else(|| SolcError::config(format!("{module:?} exposes no compile entry point")))
}

/// Serializes the input, calls the module once and parses its response
pub fn invoke(
    module: &dyn CompilerModule,
    input: &CompilerInput,
    imports: Option<&mut ImportCallback<'_>>,
) -> Result<CompilerOutput> {
    let entry = entry_point(module)?;
    let input = serde_json::to_string(input)?;
    tracing::trace!(target: "solc", %entry, "invoking compiler");
    let output = module.call(entry, &input, imports)?;
    tracing::trace!(target: "solc", len = output.len(), "compiler finished");
    Ok(serde_json::from_str(&output)?)
}

/// Abstraction over the native `solc` command line utility, driven through `--standard-json`
#[derive(Debug)]
pub struct Solc {
    /// Path to the `solc` executable
    pub solc: PathBuf,
    /// Additional arguments passed to the `solc` executable
    pub args: Vec<String>,
    version: OnceCell<String>,
}

impl Default for Solc {
    fn default() -> Self {
        if let Ok(solc) = std::env::var("SOLC_PATH") {
            return Solc::new(solc)
        }
        Solc::new(SOLC)
    }
}

impl fmt::Display for Solc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.solc.display())?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args.join(" "))?;
        }
        Ok(())
    }
}

impl Solc {
    /// A new instance which points to `solc`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Solc { solc: path.into(), args: Vec::new(), version: OnceCell::new() }
    }

    /// Adds an argument to pass to the `solc` command.
    #[must_use]
    pub fn arg<T: Into<String>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Runs `solc --standard-json` once with the given request
    pub fn compile_output(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.solc)
            .args(&self.args)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| SolcError::io(err, &self.solc))?;
        {
            let mut stdin =
                child.stdin.take().ok_or_else(|| SolcError::solc("solc stdin is not piped"))?;
            stdin.write_all(input).map_err(|err| SolcError::io(err, &self.solc))?;
        }
        compile_output(child.wait_with_output().map_err(|err| SolcError::io(err, &self.solc))?)
    }

    /// Runs the compiler, asking `imports` for every source it reports as missing.
    ///
    /// Contents handed back are added to the request and the compiler is run again; error keys
    /// replace the compiler's reason in the final diagnostics.
    fn compile_with_imports(&self, input: &str, imports: &mut ImportCallback<'_>) -> Result<String> {
        let mut input: Value = serde_json::from_str(input)?;
        let mut answered = BTreeMap::<String, ImportResponse>::new();
        loop {
            let raw = self.compile_output(&serde_json::to_vec(&input)?)?;
            let mut output: Value = serde_json::from_slice(&raw)?;

            let mut supplied = false;
            for path in missing_sources(&output) {
                if answered.contains_key(&path) {
                    continue
                }
                let response = imports(path.as_str());
                if let ImportResponse::Contents(content) = &response {
                    let sources = input
                        .get_mut("sources")
                        .and_then(Value::as_object_mut)
                        .ok_or_else(|| SolcError::msg("compiler input has no sources"))?;
                    sources.insert(path.clone(), json!({ "content": content }));
                    supplied = true;
                }
                answered.insert(path, response);
            }

            if !supplied {
                rewrite_import_errors(&mut output, &answered);
                return Ok(serde_json::to_string(&output)?)
            }
            tracing::trace!(target: "solc", "recompiling with imported sources");
        }
    }

    /// Returns the full version string of the configured `solc`
    pub fn long_version(&self) -> Result<String> {
        self.version
            .get_or_try_init(|| {
                version_from_output(
                    Command::new(&self.solc)
                        .args(&self.args)
                        .arg("--version")
                        .stdin(Stdio::piped())
                        .stderr(Stdio::piped())
                        .stdout(Stdio::piped())
                        .output()
                        .map_err(|err| SolcError::io(err, &self.solc))?,
                )
            })
            .cloned()
    }
}

impl CompilerModule for Solc {
    fn version(&self) -> Result<String> {
        self.long_version()
    }

    fn exposes(&self, entry: EntryPoint) -> bool {
        entry == EntryPoint::CompileStandard
    }

    fn call(
        &self,
        entry: EntryPoint,
        input: &str,
        imports: Option<&mut ImportCallback<'_>>,
    ) -> Result<String> {
        if !self.exposes(entry) {
            return Err(SolcError::config(format!("`{self}` does not expose `{entry}`")))
        }
        match imports {
            Some(imports) => self.compile_with_imports(input, imports),
            None => {
                let output = self.compile_output(input.as_bytes())?;
                String::from_utf8(output).map_err(|err| SolcError::solc(err.to_string()))
            }
        }
    }
}

impl AsRef<Path> for Solc {
    fn as_ref(&self) -> &Path {
        &self.solc
    }
}

fn compile_output(output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(SolcError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

fn version_from_output(output: Output) -> Result<String> {
    if output.status.success() {
        let version = output
            .stdout
            .lines()
            .map_while(std::result::Result::ok)
            .filter(|l| !l.trim().is_empty())
            .last()
            .ok_or_else(|| SolcError::solc("version not found in solc output"))?;
        Ok(version.trim().trim_start_matches("Version: ").to_string())
    } else {
        Err(SolcError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

/// All source names solc reported as not found, in order of appearance
fn missing_sources(output: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    for error in output.get("errors").and_then(Value::as_array).into_iter().flatten() {
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            for path in utils::find_missing_sources(message) {
                if !paths.iter().any(|known| known == path) {
                    paths.push(path.to_string());
                }
            }
        }
    }
    paths
}

/// Replaces the compiler's reason in `Source "..." not found` diagnostics with the error the
/// import callback answered for that path
fn rewrite_import_errors(output: &mut Value, answered: &BTreeMap<String, ImportResponse>) {
    let errors = match output.get_mut("errors").and_then(Value::as_array_mut) {
        Some(errors) => errors,
        None => return,
    };
    for error in errors {
        for field in ["message", "formattedMessage"] {
            let text = match error.get_mut(field) {
                Some(Value::String(text)) => text,
                _ => continue,
            };
            let rewritten = RE_MISSING_SOURCE.replace_all(text, |cap: &regex::Captures<'_>| {
                match answered.get(&cap["path"]) {
                    Some(ImportResponse::Error(reason)) => {
                        format!("Source \"{}\" not found: {reason}", &cap["path"])
                    }
                    _ => cap[0].to_string(),
                }
            });
            *text = rewritten.into_owned();
        }
    }
}
