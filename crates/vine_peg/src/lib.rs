//! vine_peg: the output stage of the Vine PEG compiler.
//!
//! Given a grammar's compiled intermediate representation — a tree of
//! rules and parsing expressions — this crate emits the source of a
//! memoized (packrat) recursive-descent parser equivalent to the grammar.
//! Grammar text parsing, dependency analysis and the driver that writes
//! files live upstream; this crate owns the emission contract:
//!
//! - the statement-builder core with its indentation and lexical-scope
//!   discipline ([`codegen::builder`]),
//! - the Rust backend and the runtime behavior it encodes into generated
//!   code — packrat caching, rightmost-failure diagnostics, syntax-node
//!   construction, string escaping ([`codegen::rust`]).
//!
//! # Example
//!
//! ```
//! use vine_peg::{Backend, CharClass, ClassPart, Expr, Grammar, Rule, RustBackend};
//!
//! let grammar = Grammar {
//!     name: "digits".to_string(),
//!     rules: vec![Rule {
//!         name: "digit".to_string(),
//!         expr: Expr::CharClass(CharClass {
//!             text: "[0-9]".to_string(),
//!             negated: false,
//!             parts: vec![ClassPart::Range('0', '9')],
//!         }),
//!     }],
//! };
//!
//! let code = RustBackend::new().emit(&grammar)?;
//! assert!(code.contains("fn read_digit"));
//! # Ok::<(), vine_peg::Error>(())
//! ```

pub mod codegen;
pub mod error;
pub mod grammar;

pub use codegen::{Backend, RustBackend};
pub use error::{Error, Result};
pub use grammar::{CharClass, ClassPart, Expr, Grammar, Rule};

/// Generate Rust parser source for `grammar` with the default backend.
pub fn generate(grammar: &Grammar) -> Result<String> {
    RustBackend::new().emit(grammar)
}
