//! bindings for standard json output selection

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Wildcard key matching every file or every contract
pub const WILDCARD: &str = "*";

/// file -> (contract -> outputs), where the empty contract name selects file level outputs
pub type FileOutputSelection = BTreeMap<String, Vec<OutputKind>>;

/// Represents the selected output of files and contracts
///
/// The first level key is the file name and the second level key is the contract name. An empty
/// contract name is used for outputs that are not tied to a contract but to the whole source
/// file like the AST. A star as contract name refers to all contracts in the file.
#[derive(Debug, Clone, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSelection(pub BTreeMap<String, FileOutputSelection>);

impl OutputSelection {
    /// Everything a batch compile needs to assemble artifacts:
    ///
    /// ```json
    /// {
    ///   "*": {
    ///     "": ["legacyAST", "ast"],
    ///     "*": [
    ///       "abi",
    ///       "evm.bytecode.object",
    ///       "evm.bytecode.sourceMap",
    ///       "evm.deployedBytecode.object",
    ///       "evm.deployedBytecode.sourceMap"
    ///     ]
    ///   }
    /// }
    /// ```
    pub fn artifacts() -> Self {
        let file = BTreeMap::from([
            (String::new(), vec![OutputKind::LegacyAst, OutputKind::Ast]),
            (
                WILDCARD.to_string(),
                vec![
                    OutputKind::Abi,
                    OutputKind::BytecodeObject,
                    OutputKind::BytecodeSourceMap,
                    OutputKind::DeployedBytecodeObject,
                    OutputKind::DeployedBytecodeSourceMap,
                ],
            ),
        ]);
        Self(BTreeMap::from([(WILDCARD.to_string(), file)]))
    }

    /// Only the file level AST of every source
    pub fn ast_only() -> Self {
        let file = BTreeMap::from([(String::new(), vec![OutputKind::Ast])]);
        Self(BTreeMap::from([(WILDCARD.to_string(), file)]))
    }

    /// Requests nothing for the given file, solc stops after parsing and import resolution
    pub fn empty_for(file: impl Into<String>) -> Self {
        let selection = BTreeMap::from([(WILDCARD.to_string(), Vec::new())]);
        Self(BTreeMap::from([(file.into(), selection)]))
    }

    /// Whether no output is requested at all
    pub fn is_empty(&self) -> bool {
        self.0.values().flat_map(|file| file.values()).all(Vec::is_empty)
    }
}

/// A single output field solc can emit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputKind {
    Ast,
    LegacyAst,
    Abi,
    BytecodeObject,
    BytecodeSourceMap,
    DeployedBytecodeObject,
    DeployedBytecodeSourceMap,
}

impl Serialize for OutputKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OutputKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Ast => f.write_str("ast"),
            OutputKind::LegacyAst => f.write_str("legacyAST"),
            OutputKind::Abi => f.write_str("abi"),
            OutputKind::BytecodeObject => f.write_str("evm.bytecode.object"),
            OutputKind::BytecodeSourceMap => f.write_str("evm.bytecode.sourceMap"),
            OutputKind::DeployedBytecodeObject => f.write_str("evm.deployedBytecode.object"),
            OutputKind::DeployedBytecodeSourceMap => f.write_str("evm.deployedBytecode.sourceMap"),
        }
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ast" => Ok(OutputKind::Ast),
            "legacyAST" => Ok(OutputKind::LegacyAst),
            "abi" => Ok(OutputKind::Abi),
            "evm.bytecode.object" => Ok(OutputKind::BytecodeObject),
            "evm.bytecode.sourceMap" => Ok(OutputKind::BytecodeSourceMap),
            "evm.deployedBytecode.object" => Ok(OutputKind::DeployedBytecodeObject),
            "evm.deployedBytecode.sourceMap" => Ok(OutputKind::DeployedBytecodeSourceMap),
            s => Err(format!("Invalid output selection: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_selection_serializes_like_standard_json() {
        let json = serde_json::to_value(OutputSelection::artifacts()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "*": {
                    "": ["legacyAST", "ast"],
                    "*": [
                        "abi",
                        "evm.bytecode.object",
                        "evm.bytecode.sourceMap",
                        "evm.deployedBytecode.object",
                        "evm.deployedBytecode.sourceMap"
                    ]
                }
            })
        );
    }

    #[test]
    fn empty_selection_requests_nothing() {
        let selection = OutputSelection::empty_for("ParsedContract.sol");
        assert!(selection.is_empty());
        assert_eq!(
            serde_json::to_string(&selection).unwrap(),
            r#"{"ParsedContract.sol":{"*":[]}}"#
        );
        assert!(!OutputSelection::ast_only().is_empty());
    }

    #[test]
    fn can_parse_output_kinds() {
        let kinds: Vec<OutputKind> =
            serde_json::from_str(r#"["ast", "legacyAST", "evm.deployedBytecode.sourceMap"]"#)
                .unwrap();
        assert_eq!(
            kinds,
            vec![OutputKind::Ast, OutputKind::LegacyAst, OutputKind::DeployedBytecodeSourceMap]
        );
        assert!("evm.gasEstimates".parse::<OutputKind>().is_err());
    }
}
