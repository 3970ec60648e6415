#![doc = include_str!("../README.md")]

pub mod artifacts;
pub use artifacts::{CompilerInput, CompilerOutput, EvmVersion, Optimizer};

pub mod abi;

pub mod artifact_output;
pub use artifact_output::{CompiledContracts, CompilerInfo, ContractArtifact};

pub mod compile;
pub use compile::{
    project::{compile, Compiler},
    registry::{Downloader, SolcRegistry},
    CompilerModule, EntryPoint, ImportResponse, Solc,
};

mod config;
pub use config::{CompileOptions, SolcConfig, DEFAULT_SOLC_VERSION, SUPPORTED_SOLC_VERSIONS};

pub mod diagnostics;
pub mod error;
pub mod link;
pub mod parse;
pub use parse::ParsedSource;

pub mod paths;
pub use paths::{CanonicalSources, SourceSet};

pub mod remappings;
pub mod report;
pub mod utils;
