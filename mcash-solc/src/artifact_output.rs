//! Turning the raw compiler output into the per contract artifacts consumers persist

use crate::{
    abi,
    artifacts::{Bytecode, CompilerOutput, Contract, SourceFile},
    error::Result,
    link,
    paths::CanonicalSources,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Name of the compiler recorded in every artifact
pub const COMPILER_NAME: &str = "solc";

/// Which compiler produced an artifact
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    pub name: String,
    pub version: String,
}

impl CompilerInfo {
    /// `solc` with the given long version
    pub fn solc(version: impl Into<String>) -> Self {
        Self { name: COMPILER_NAME.to_string(), version: version.into() }
    }
}

/// Everything known about one compiled contract
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub contract_name: String,
    /// The path the caller handed in, not the one solc saw
    #[serde(rename = "sourcePath")]
    pub source_path: String,
    pub source: String,
    #[serde(rename = "sourceMap")]
    pub source_map: Option<String>,
    #[serde(rename = "deployedSourceMap")]
    pub deployed_source_map: Option<String>,
    #[serde(rename = "legacyAST")]
    pub legacy_ast: Option<Value>,
    pub ast: Option<Value>,
    /// The ABI with functions in declaration order
    pub abi: Vec<Value>,
    /// `0x` prefixed creation bytecode with normalized library placeholders
    pub bytecode: String,
    /// `0x` prefixed runtime bytecode with normalized library placeholders
    #[serde(rename = "deployedBytecode")]
    pub deployed_bytecode: String,
    /// Same as `bytecode`, still read by older tooling
    pub unlinked_binary: String,
    pub compiler: CompilerInfo,
}

/// The result of a batch compile
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledContracts {
    /// contract name -> artifact
    pub contracts: BTreeMap<String, ContractArtifact>,
    /// solc source id -> original source path
    pub files: BTreeMap<u32, String>,
}

impl CompiledContracts {
    pub fn get(&self, contract: &str) -> Option<&ContractArtifact> {
        self.contracts.get(contract)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContractArtifact)> {
        self.contracts.iter()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Builds an artifact for every contract of the output.
///
/// Paths are mapped back to the ones in `sources`. Contracts are keyed by name only, if two
/// files declare the same name the one of the later path wins.
pub fn assemble(
    output: &CompilerOutput,
    sources: &CanonicalSources,
    compiler: &CompilerInfo,
) -> Result<CompiledContracts> {
    let original = |path: &str| sources.paths().original(path).unwrap_or(path).to_string();

    let mut compiled = CompiledContracts::default();
    for (path, contracts) in &output.contracts {
        let file = output.sources.get(path);
        for (name, contract) in contracts {
            if compiled.contracts.contains_key(name) {
                tracing::debug!(target: "solc", %name, %path, "contract name declared twice, replacing");
            }
            let artifact = ContractArtifact::new(
                name,
                original(path),
                sources.content(path).unwrap_or_default(),
                contract,
                file,
                compiler,
            )?;
            compiled.contracts.insert(name.clone(), artifact);
        }
    }
    compiled.files =
        output.sources.iter().map(|(path, file)| (file.id, original(path))).collect();
    tracing::trace!(target: "solc", contracts = compiled.len(), "assembled artifacts");
    Ok(compiled)
}

impl ContractArtifact {
    fn new(
        name: &str,
        source_path: String,
        source: &str,
        contract: &Contract,
        file: Option<&SourceFile>,
        compiler: &CompilerInfo,
    ) -> Result<Self> {
        let legacy_ast = file.and_then(|file| file.legacy_ast.clone());
        let ast = file.and_then(|file| file.ast.clone());
        let abi = abi::order_abi(contract.abi.clone(), name, legacy_ast.as_ref(), ast.as_ref());

        let bytecode = prefixed_and_linked(contract.bytecode())?;
        let deployed_bytecode = prefixed_and_linked(contract.deployed_bytecode())?;

        Ok(Self {
            contract_name: name.to_string(),
            source_path,
            source: source.to_string(),
            source_map: contract.bytecode().and_then(|code| code.source_map.clone()),
            deployed_source_map: contract
                .deployed_bytecode()
                .and_then(|code| code.source_map.clone()),
            legacy_ast,
            ast,
            abi,
            unlinked_binary: bytecode.clone(),
            bytecode,
            deployed_bytecode,
            compiler: compiler.clone(),
        })
    }
}

fn prefixed_and_linked(bytecode: Option<&Bytecode>) -> Result<String> {
    match bytecode {
        Some(code) => link::link_placeholders(&format!("0x{}", code.object), &code.link_references),
        None => Ok("0x".to_string()),
    }
}
