//! Utility functions

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::PathBuf;

/// Matches the import statement solc quotes in the formatted message of an unresolved import,
/// the path is the second capture group:
/// `import './Lib.sol';` or `import {A} from "./Lib.sol";`
pub static RE_QUOTED_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"import[^'"]+("|')([^'"]+)("|');"#).unwrap());

/// Matches the diagnostic solc emits for an import it could not read, with the named groups
/// "path" and "reason":
/// `Source "Lib.sol" not found: File not found.`
pub static RE_MISSING_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Source "(?P<path>[^"]+)" not found: (?P<reason>[^\n]*)"#).unwrap());

/// Returns the import path a solc diagnostic is about.
///
/// The path named in `Source "..." not found` wins. The snippet solc appends quotes the whole
/// source line, which can hold several imports, so its first import statement is only used if
/// the message names no path.
pub fn find_quoted_import(message: &str) -> Option<&str> {
    RE_MISSING_SOURCE
        .captures(message)
        .and_then(|cap| cap.name("path"))
        .or_else(|| RE_QUOTED_IMPORT.captures(message).and_then(|cap| cap.get(2)))
        .map(|m| m.as_str())
}

/// Returns all source names named in `Source "..." not found` diagnostics of the message
pub fn find_missing_sources(message: &str) -> Vec<&str> {
    RE_MISSING_SOURCE
        .captures_iter(message)
        .filter_map(|cap| cap.name("path"))
        .map(|m| m.as_str())
        .collect()
}

/// Drops `{}`, which older compilers emit for an AST they did not produce
pub fn non_empty_object(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !matches!(value, Value::Object(map) if map.is_empty()))
}

/// Returns the home directory of the current user
pub fn home_dir() -> Option<PathBuf> {
    home::home_dir()
}
