//! Quick single file compiler runs used while resolving the dependency graph of a project

use crate::{
    artifacts::{output_selection::OutputSelection, CompilerInput, Settings},
    compile::{self, CompilerModule, ImportResponse},
    diagnostics::strip_pre_release,
    error::{CompileError, Result},
    remappings::Remapping,
    report, utils,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};

/// File name a parsed buffer is compiled under unless the caller names it
pub const PARSED_FILE: &str = "ParsedContract.sol";

/// Import appended to a buffer so every parse reports at least one unresolved import
pub const SENTINEL_FILE: &str = "__McashBox__NotFound.sol";

/// Error key the import callback answers every lookup with
pub const IMPORT_ERROR_KEY: &str = "MCASHBOX_IMPORT";

/// Source handed to the compiler for imports that can't be found
pub const STUB_SOURCE: &str = "pragma solidity >=0.4.0;";

/// The contracts declared in a single file and its AST
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSource {
    pub contract_names: Vec<String>,
    pub ast: Option<Value>,
}

/// Returns the imports of `body` in the order they appear.
///
/// The compiler only parses the file, every import it looks up is answered with
/// [`IMPORT_ERROR_KEY`] so all of them show up as diagnostics, which are then read back. Any
/// other diagnostic is a syntax error and fails the call.
///
/// ```no_run
/// # fn demo(module: &dyn mcash_solc::compile::CompilerModule) -> mcash_solc::error::Result<()> {
/// let imports = mcash_solc::parse::parse_imports(module, "import 'A.sol'; import 'B.sol';")?;
/// assert_eq!(imports, vec!["A.sol".to_string(), "B.sol".to_string()]);
/// # Ok(())
/// # }
/// ```
pub fn parse_imports(module: &dyn CompilerModule, body: &str) -> Result<Vec<String>> {
    let content = format!("{body}\n\nimport '{SENTINEL_FILE}';\n");
    let input = CompilerInput::single(
        PARSED_FILE,
        content,
        Settings::new(OutputSelection::empty_for(PARSED_FILE)),
    );

    let mut not_found = |_: &str| ImportResponse::Error(IMPORT_ERROR_KEY.to_string());
    let output = compile::invoke(module, &input, Some(&mut not_found))?;
    let errors = strip_pre_release(output.errors);

    if let Some(err) = errors.iter().find(|err| !err.formatted().contains(IMPORT_ERROR_KEY)) {
        return Err(CompileError::new(err.formatted()).into())
    }

    let imports: Vec<String> = errors
        .iter()
        .filter_map(|err| utils::find_quoted_import(err.formatted()))
        .filter(|path| *path != SENTINEL_FILE)
        .map(str::to_string)
        .collect();
    tracing::trace!(target: "solc", ?imports, "parsed imports");
    report::unresolved_imports(&imports);
    Ok(imports)
}

/// Parses a single buffer and returns its contracts and AST.
///
/// Imports are resolved relative to `root`, packages listed in its `ethpm.json` are remapped to
/// their install location. Anything that still can't be found is replaced by an empty stub, so
/// only diagnostics of the buffer itself fail the call. Any of them fails it unless it is a
/// warning.
pub fn parse(
    module: &dyn CompilerModule,
    body: &str,
    file_name: Option<&str>,
    root: Option<&Path>,
) -> Result<ParsedSource> {
    let file = file_name.unwrap_or(PARSED_FILE);
    let remappings = match root {
        Some(root) => Remapping::from_manifest(root)?,
        None => Vec::new(),
    };
    let input = CompilerInput::single(
        file,
        body,
        Settings::new(OutputSelection::ast_only()).with_remappings(remappings),
    );

    let mut read_or_stub = |path: &str| {
        let content = root
            .map(|root| root.join(path))
            .filter(|path| path.is_file())
            .and_then(|path| fs::read_to_string(path).ok());
        ImportResponse::Contents(content.unwrap_or_else(|| STUB_SOURCE.to_string()))
    };
    let output = compile::invoke(module, &input, Some(&mut read_or_stub))?;

    // warnings are the only diagnostics a parse tolerates
    if let Some(err) =
        strip_pre_release(output.errors.clone()).iter().find(|err| !err.severity.is_warning())
    {
        return Err(CompileError::new(err.formatted()).into())
    }

    let source = output.sources.get(file);
    let contract_names = match output.contracts.get(file) {
        Some(contracts) if !contracts.is_empty() => contracts.keys().cloned().collect(),
        _ => source.map(|source| source.contract_names()).unwrap_or_default(),
    };
    let ast = source.and_then(|source| {
        utils::non_empty_object(source.ast.as_ref())
            .or_else(|| utils::non_empty_object(source.legacy_ast.as_ref()))
            .cloned()
    });
    Ok(ParsedSource { contract_names, ast })
}
