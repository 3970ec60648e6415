//! Replaces the link references of unlinked bytecode with readable placeholders.
//!
//! solc marks every library address it could not fill in with a 40 character placeholder whose
//! format changed between releases. The placeholders are normalized to `__<Library>` padded with
//! `_`, the format deployment tooling searches for.

use crate::{
    artifacts::LinkReferences,
    error::{Result, SolcError},
};

/// Length of an address placeholder in hex characters
pub const PLACEHOLDER_LEN: usize = 40;

/// The placeholder for `library`: `__<library>` right padded with `_` to 40 characters.
///
/// Names longer than 38 characters are kept whole, the placeholder is then longer than 40.
///
/// ```
/// use mcash_solc::link::placeholder;
/// assert_eq!(placeholder("Lib"), format!("__Lib{}", "_".repeat(35)));
/// ```
pub fn placeholder(library: &str) -> String {
    format!("{:_<width$}", format!("__{library}"), width = PLACEHOLDER_LEN)
}

/// Writes the placeholder of every referenced library into the `0x` prefixed `bytecode`.
///
/// The byte offset `start` of a reference translates to the character `2 + start * 2`, from
/// which exactly 40 characters are replaced.
pub fn link_placeholders(bytecode: &str, references: &LinkReferences) -> Result<String> {
    let mut linked = bytecode.to_string();
    for libraries in references.values() {
        for (library, offsets) in libraries {
            let placeholder = placeholder(library);
            for offset in offsets {
                let start = 2 + offset.start as usize * 2;
                let end = start + PLACEHOLDER_LEN;
                if end > linked.len() ||
                    !linked.is_char_boundary(start) ||
                    !linked.is_char_boundary(end)
                {
                    return Err(SolcError::LinkReference {
                        library: library.clone(),
                        start: offset.start as usize,
                        len: linked.len(),
                    })
                }
                tracing::trace!(target: "solc", %library, start, "patching link reference");
                linked.replace_range(start..end, &placeholder);
            }
        }
    }
    Ok(linked)
}
