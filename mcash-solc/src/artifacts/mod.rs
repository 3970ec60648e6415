//! Solc artifact types
use crate::{config::SolcConfig, paths::CanonicalSources, remappings::Remapping};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fmt, str::FromStr};
use yansi::Paint;

pub mod contract;
pub mod output_selection;
pub mod serde_helpers;

pub use contract::*;
use output_selection::OutputSelection;

/// Compiled contracts keyed by canonical source name, then by contract name. One file may
/// define several contracts.
pub type Contracts = BTreeMap<String, BTreeMap<String, Contract>>;

/// An ordered list of canonical source names and their content
pub type Sources = BTreeMap<String, Source>;

const SOLIDITY: &str = "Solidity";

/// A standard JSON request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInput {
    pub language: String,
    pub sources: Sources,
    pub settings: Settings,
}

impl CompilerInput {
    /// The request of a batch compile: every canonical source, the configured evm version and
    /// optimizer, and all outputs needed to assemble artifacts.
    pub fn new(sources: &CanonicalSources, config: &SolcConfig) -> Self {
        let sources = sources
            .sources()
            .iter()
            .map(|(name, content)| (name.clone(), Source::new(content.clone())))
            .collect();
        let settings = Settings {
            evm_version: Some(config.evm_version),
            optimizer: Some(config.optimizer.clone()),
            ..Settings::new(OutputSelection::artifacts())
        };
        tracing::trace!(target: "solc", ?settings, "built compiler input");
        Self { language: SOLIDITY.to_string(), sources, settings }
    }

    /// A request for a single source buffer with the given settings
    pub fn single(file: impl Into<String>, content: impl Into<String>, settings: Settings) -> Self {
        Self {
            language: SOLIDITY.to_string(),
            sources: BTreeMap::from([(file.into(), Source::new(content))]),
            settings,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(
        with = "serde_helpers::display_from_str_opt",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub evm_version: Option<EvmVersion>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub optimizer: Option<Optimizer>,
    /// Which outputs solc produces per file and contract. Only diagnostics come back when it
    /// selects nothing.
    #[serde(default)]
    pub output_selection: OutputSelection,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub remappings: Vec<Remapping>,
}

impl Settings {
    /// Default settings that request `selection`
    pub fn new(selection: impl Into<OutputSelection>) -> Self {
        Self { output_selection: selection.into(), ..Self::default() }
    }

    /// Sets the import remappings
    #[must_use]
    pub fn with_remappings(self, remappings: Vec<Remapping>) -> Self {
        Self { remappings, ..self }
    }
}

/// Optimizer settings, off with 200 runs unless configured.
///
/// Keys other than `enabled` and `runs` (`details`, ...) are sent to solc as configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Optimizer {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub runs: Option<usize>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self { enabled: Some(false), runs: Some(200), extra: BTreeMap::new() }
    }
}

/// The EVM hard forks solc 0.4/0.5 can target
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvmVersion {
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
}

impl Default for EvmVersion {
    fn default() -> Self {
        Self::Byzantium
    }
}

impl EvmVersion {
    const ALL: [EvmVersion; 6] = [
        Self::Homestead,
        Self::TangerineWhistle,
        Self::SpuriousDragon,
        Self::Byzantium,
        Self::Constantinople,
        Self::Petersburg,
    ];

    /// The name solc uses for this fork
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Homestead => "homestead",
            Self::TangerineWhistle => "tangerineWhistle",
            Self::SpuriousDragon => "spuriousDragon",
            Self::Byzantium => "byzantium",
            Self::Constantinople => "constantinople",
            Self::Petersburg => "petersburg",
        }
    }
}

impl fmt::Display for EvmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvmVersion {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|version| version.as_str() == name)
            .ok_or_else(|| format!("Unknown evm version: {name}"))
    }
}

/// The `content` of one entry in the request's `sources`
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Source {
    pub content: String,
}

impl Source {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

impl AsRef<str> for Source {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

/// A standard JSON response
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct CompilerOutput {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Error>,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceFile>,
    #[serde(default)]
    pub contracts: Contracts,
}

impl CompilerOutput {
    /// Whether any diagnostic has the given severity
    pub fn has(&self, severity: Severity) -> bool {
        self.errors.iter().any(|diagnostic| diagnostic.severity == severity)
    }

    /// Returns the contract with the given name in the given file
    pub fn get(&self, path: &str, contract: &str) -> Option<&Contract> {
        self.contracts.get(path).and_then(|contracts| contracts.get(contract))
    }
}

/// A diagnostic reported by solc
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_location: Option<SourceLocation>,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub component: String,
    pub severity: Severity,
    #[serde(with = "serde_helpers::display_from_str_opt", default)]
    pub error_code: Option<u64>,
    pub message: String,
    #[serde(default)]
    pub formatted_message: Option<String>,
}

impl Error {
    /// The formatted message, falling back to the raw message
    pub fn formatted(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.formatted_message, self.severity) {
            (Some(formatted), Severity::Error) => write!(f, "{}", Paint::red(formatted)),
            (Some(formatted), _) => write!(f, "{}", Paint::yellow(formatted)),
            (None, severity) => writeln!(f, "{severity}: {}", self.message),
        }
    }
}

/// How bad a diagnostic is. Serialized lowercase, as solc writes it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    pub fn is_warning(self) -> bool {
        self == Severity::Warning
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "{}", Paint::red("Error")),
            Severity::Warning => write!(f, "{}", Paint::yellow("Warning")),
            Severity::Info => f.write_str("Info"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub start: i32,
    pub end: i32,
}

/// Per file output: the numeric source id and the requested ASTs
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SourceFile {
    pub id: u32,
    /// Copied into artifacts as emitted, `{}` included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast: Option<Value>,
    #[serde(default, rename = "legacyAST", skip_serializing_if = "Option::is_none")]
    pub legacy_ast: Option<Value>,
}

impl SourceFile {
    /// Names of all contracts, libraries and interfaces defined at the source unit level of the
    /// compact AST
    pub fn contract_names(&self) -> Vec<String> {
        self.ast
            .as_ref()
            .and_then(|ast| ast.get("nodes"))
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|node| node["nodeType"] == "ContractDefinition")
                    .filter_map(|node| node["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::SourceSet;

    #[test]
    fn can_parse_declaration_error() {
        let s = r#"{
  "errors": [
    {
      "component": "general",
      "formattedMessage": "contracts/MetaCoin.sol:12:3: DeclarationError: Undeclared identifier. Did you mean \"revert\"?\n\t\trefert();\n\t\t^----^\n",
      "message": "Undeclared identifier. Did you mean \"revert\"?",
      "severity": "error",
      "sourceLocation": {
        "end": 310,
        "file": "contracts/MetaCoin.sol",
        "start": 304
      },
      "type": "DeclarationError"
    }
  ],
  "sources": { }
}"#;

        let out: CompilerOutput = serde_json::from_str(s).unwrap();
        assert_eq!(out.errors.len(), 1);
        assert!(out.has(Severity::Error));
        assert!(!out.has(Severity::Warning));
        assert_eq!(out.errors[0].r#type, "DeclarationError");
    }

    #[test]
    fn can_parse_minimal_diagnostic() {
        let s = r#"{"severity": "warning", "message": "This is a pre-release compiler version, please do not use it in production."}"#;
        let err: Error = serde_json::from_str(s).unwrap();
        assert!(err.severity.is_warning());
        assert_eq!(err.formatted(), err.message);
    }

    #[test]
    fn evm_versions_use_solc_names() {
        assert_eq!("tangerineWhistle".parse::<EvmVersion>().unwrap(), EvmVersion::TangerineWhistle);
        assert_eq!(EvmVersion::Petersburg.to_string(), "petersburg");
        assert!("london".parse::<EvmVersion>().is_err());
    }

    #[test]
    fn can_build_batch_input() {
        let sources: SourceSet = [
            (r"C:\proj\contracts\MetaCoin.sol".to_string(), "contract MetaCoin {}".to_string()),
            ("contracts/ConvertLib.sol".to_string(), "library ConvertLib {}".to_string()),
        ]
        .into();
        let canonical = CanonicalSources::new(&sources);
        let input = CompilerInput::new(&canonical, &SolcConfig::default());

        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["language"], "Solidity");
        assert_eq!(json["sources"]["/C/proj/contracts/MetaCoin.sol"]["content"], "contract MetaCoin {}");
        assert_eq!(json["sources"]["contracts/ConvertLib.sol"]["content"], "library ConvertLib {}");
        assert_eq!(json["settings"]["evmVersion"], "byzantium");
        assert_eq!(json["settings"]["optimizer"], serde_json::json!({"enabled": false, "runs": 200}));
        assert_eq!(json["settings"]["outputSelection"]["*"][""], serde_json::json!(["legacyAST", "ast"]));
        assert!(json["settings"].get("remappings").is_none());
    }

    #[test]
    fn empty_ast_objects_are_kept() {
        let file: SourceFile =
            serde_json::from_str(r#"{"id": 3, "ast": {}, "legacyAST": {"name": "SourceUnit"}}"#)
                .unwrap();
        assert_eq!(file.id, 3);
        assert_eq!(file.ast, Some(serde_json::json!({})));
        assert!(file.legacy_ast.is_some());
        assert!(file.contract_names().is_empty());
    }

    #[test]
    fn can_find_contract_names_in_ast() {
        let file: SourceFile = serde_json::from_value(serde_json::json!({
            "id": 0,
            "ast": {
                "nodeType": "SourceUnit",
                "nodes": [
                    {"nodeType": "PragmaDirective", "literals": ["solidity", "^", "0.5", ".0"]},
                    {"nodeType": "ContractDefinition", "name": "Owned", "nodes": []},
                    {"nodeType": "ImportDirective", "file": "./Lib.sol"},
                    {"nodeType": "ContractDefinition", "name": "Token", "nodes": []}
                ]
            }
        }))
        .unwrap();
        assert_eq!(file.contract_names(), vec!["Owned".to_string(), "Token".to_string()]);
    }
}
