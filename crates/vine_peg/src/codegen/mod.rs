//! Code-emission backends.
//!
//! One backend exists per target language; all of them consume the same
//! grammar IR and share the [`builder::Builder`] statement-builder core.
//! [`RustBackend`] is the backend implemented in this crate.

pub mod builder;
pub mod rust;

pub use rust::RustBackend;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::grammar::Grammar;

/// A code-emission backend for one target language.
pub trait Backend {
    /// Canonical source-file extension of the target language.
    fn extension(&self) -> &'static str;

    /// Emit the complete parser source for `grammar` as one text blob.
    fn emit(&self, grammar: &Grammar) -> Result<String>;

    /// Derive the generated file's name from the grammar source's path
    /// by replacing its extension with the target's canonical one.
    fn output_pathname(&self, grammar_path: &Path) -> PathBuf {
        grammar_path.with_extension(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_output_pathname_replaces_extension() {
        let backend = RustBackend::new();
        assert_eq!(
            backend.output_pathname(Path::new("grammars/calc.peg")),
            Path::new("grammars/calc.rs")
        );
    }
}
