//! Operating system independent source names
//!
//! solc treats source names as opaque strings, so the same file must always be handed over under
//! the same name regardless of the platform the caller runs on. Windows paths like
//! `C:\project\contracts\Token.sol` become `/C/project/contracts/Token.sol`.

use std::collections::BTreeMap;

/// Caller supplied sources: logical path -> source text
pub type SourceSet = BTreeMap<String, String>;

/// Sources keyed by their canonical name, together with the way back to the caller's paths.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanonicalSources {
    sources: BTreeMap<String, String>,
    paths: PathMap,
}

impl CanonicalSources {
    /// Canonicalizes every key of the given source set.
    ///
    /// If two original paths collapse onto the same canonical name the later one wins.
    pub fn new(sources: &SourceSet) -> Self {
        let mut canonical = Self::default();
        for (original, content) in sources {
            let name = canonicalize(original);
            canonical.paths.0.insert(name.clone(), original.clone());
            canonical.sources.insert(name, content.clone());
        }
        canonical
    }

    /// canonical name -> source text
    pub fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }

    pub fn paths(&self) -> &PathMap {
        &self.paths
    }

    /// Returns the source text stored under the canonical name
    pub fn content(&self, canonical: &str) -> Option<&str> {
        self.sources.get(canonical).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// canonical name -> original caller supplied path
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathMap(BTreeMap<String, String>);

impl PathMap {
    /// Returns the caller's path for the canonical name
    pub fn original(&self, canonical: &str) -> Option<&str> {
        self.0.get(canonical).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Turns a caller supplied path into the name solc sees.
///
/// All backslashes become forward slashes, a leading drive letter `X:/` becomes `/X/`.
///
/// ```
/// use mcash_solc::paths::canonicalize;
/// assert_eq!(canonicalize(r"C:\contracts\Token.sol"), "/C/contracts/Token.sol");
/// assert_eq!(canonicalize("contracts/Token.sol"), "contracts/Token.sol");
/// ```
pub fn canonicalize(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    if replaced.chars().nth(1) == Some(':') {
        format!("/{}", replaced.replacen(':', "", 1))
    } else {
        replaced
    }
}
