use crate::error::{Result, SolcError};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::{fmt, fs, path::Path, str::FromStr};

/// Name of the optional dependency manifest in a project root
pub const ETHPM_MANIFEST: &str = "ethpm.json";

/// Directory that packages listed in the manifest are installed into
pub const INSTALLED_CONTRACTS_DIR: &str = "installed_contracts";

/// An import prefix rewrite handed to solc.
///
/// Packages installed from a package registry live under
/// `installed_contracts/<package>/contracts/`, while sources import them as
/// `<package>/<file>.sol`. A remapping tells solc how to translate one into the other:
///
/// ```text
/// my_pkg/=installed_contracts/my_pkg/contracts/
/// ```
///
/// A `context` limits the scope of the remapping to imports located in a specific file or
/// directory, the format then is `context:prefix=target`.
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct Remapping {
    pub context: Option<String>,
    pub name: String,
    pub path: String,
}

impl Remapping {
    /// A global remapping of `name` to `path`
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self { context: None, name: name.into(), path: path.into() }
    }

    /// The remapping for a package installed under `installed_contracts`
    pub fn installed_package(package: &str) -> Self {
        Self::new(
            format!("{package}/"),
            format!("{INSTALLED_CONTRACTS_DIR}/{package}/contracts/"),
        )
    }

    /// Reads the remappings for all dependencies listed in the `ethpm.json` manifest located in
    /// `root`.
    ///
    /// A missing manifest is not an error and yields no remappings.
    pub fn from_manifest(root: impl AsRef<Path>) -> Result<Vec<Remapping>> {
        let manifest = root.as_ref().join(ETHPM_MANIFEST);
        if !manifest.is_file() {
            return Ok(Vec::new())
        }
        let content = fs::read_to_string(&manifest).map_err(|err| SolcError::io(err, &manifest))?;
        let manifest: Value = serde_json::from_str(&content)?;
        let remappings = match manifest.get("dependencies") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(deps)) => {
                deps.keys().map(|package| Remapping::installed_package(package)).collect()
            }
            Some(other) => {
                return Err(SolcError::config(format!(
                    "`dependencies` of {ETHPM_MANIFEST} must be an object, found `{other}`"
                )))
            }
        };
        tracing::trace!(target: "solc", count = remappings.len(), "loaded manifest remappings");
        Ok(remappings)
    }
}

/// A remapping string that is not `[context:]prefix=target`
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RemappingError {
    #[error("`{0}` is not a remapping, expected `[context:]prefix=target`")]
    MissingSeparator(String),
    #[error("`{0}` remaps an empty prefix")]
    EmptyPrefix(String),
    #[error("`{0}` remaps to an empty target")]
    EmptyTarget(String),
}

impl FromStr for Remapping {
    type Err = RemappingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lhs, path) =
            s.split_once('=').ok_or_else(|| RemappingError::MissingSeparator(s.to_string()))?;
        let (context, name) = match lhs.split_once(':') {
            // `:prefix=target` is global
            Some((context, name)) if !context.trim().is_empty() => (Some(context.to_string()), name),
            Some((_, name)) => (None, name),
            None => (None, lhs),
        };
        if name.trim().is_empty() {
            Err(RemappingError::EmptyPrefix(s.to_string()))
        } else if path.trim().is_empty() {
            Err(RemappingError::EmptyTarget(s.to_string()))
        } else {
            Ok(Remapping { context, name: name.to_string(), path: path.to_string() })
        }
    }
}

impl Serialize for Remapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Remapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?.parse().map_err(de::Error::custom)
    }
}

impl fmt::Display for Remapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{context}:{}={}", self.name, self.path),
            None => write!(f, "{}={}", self.name, self.path),
        }
    }
}
