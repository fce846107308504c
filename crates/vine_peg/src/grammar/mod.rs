//! Grammar intermediate representation consumed by the code generators.

pub mod ir;

pub use ir::{CharClass, ClassPart, Expr, Grammar, Rule};
