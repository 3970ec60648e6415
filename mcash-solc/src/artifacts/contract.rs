//! Contract related types

use crate::artifacts::serde_helpers;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// file -> (library name -> placeholder locations)
pub type LinkReferences = BTreeMap<String, BTreeMap<String, Vec<Offsets>>>;

/// Represents a compiled solidity contract
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// The ABI exactly as solc emitted it, entries keep all their fields
    #[serde(default, deserialize_with = "serde_helpers::default_for_null")]
    pub abi: Vec<Value>,
    /// EVM-related outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm: Option<Evm>,
}

impl Contract {
    /// The creation bytecode, if it was requested
    pub fn bytecode(&self) -> Option<&Bytecode> {
        self.evm.as_ref()?.bytecode.as_ref()
    }

    /// The runtime bytecode, if it was requested
    pub fn deployed_bytecode(&self) -> Option<&Bytecode> {
        self.evm.as_ref()?.deployed_bytecode.as_ref()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytecode: Option<Bytecode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_bytecode: Option<Bytecode>,
}

/// The unprefixed hex object of a bytecode section, placeholders for unlinked libraries included
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bytecode {
    #[serde(default)]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<String>,
    /// If given, this is an unlinked object.
    #[serde(default, deserialize_with = "serde_helpers::default_for_null")]
    pub link_references: LinkReferences,
}

impl Bytecode {
    /// Whether the compiler left any library placeholder in this object
    pub fn is_unlinked(&self) -> bool {
        self.link_references.values().flat_map(|libs| libs.values()).any(|refs| !refs.is_empty())
    }
}

/// Byte offsets into the bytecode.
/// Linking replaces the 20 bytes located there.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Offsets {
    pub start: u32,
    pub length: u32,
}
