//! Grammar Intermediate Representation
//!
//! This module defines the IR types handed to the backends by an upstream
//! grammar compiler. The IR is a tree of rules and parsing expressions:
//!
//! - Rules are ordered; the first rule is the grammar's root.
//! - Expressions cover the PEG operators: sequence, ordered choice,
//!   repetition (`*`, `+`, `?`), lookahead (`&`, `!`), literals, character
//!   classes, rule references, labelled captures, and node-type tags.
//! - Traversal order of the rule list and of every expression tree is the
//!   definition order, so generation is deterministic and repeatable.
//!
//! Frontends may hand the IR over as Rust values or as JSON
//! ([`Grammar::from_json`]).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// A complete grammar: ordered rule definitions plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    /// Grammar name, used in the generated file header.
    pub name: String,
    /// Rule definitions in declaration order. The first rule is the root.
    pub rules: Vec<Rule>,
}

/// A single named rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub expr: Expr,
}

/// A parsing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal string match: `"fn"`. Case-insensitive literals compare
    /// ASCII-case-insensitively but still consume exactly `text.len()`
    /// bytes of input.
    Literal {
        text: String,
        case_insensitive: bool,
    },

    /// Character class: `[0-9a-f]`, `[^"\\]`.
    CharClass(CharClass),

    /// Any single character: `.`
    AnyChar,

    /// Reference to another rule by name.
    RuleRef(String),

    /// Sequence of expressions: `e1 e2 e3`.
    Sequence(Vec<Expr>),

    /// Ordered choice: `e1 / e2 / e3`.
    Choice(Vec<Expr>),

    /// Zero or more repetitions: `e*`. Always succeeds.
    ZeroOrMore(Box<Expr>),

    /// One or more repetitions: `e+`.
    OneOrMore(Box<Expr>),

    /// Optional match: `e?`. Always succeeds, possibly zero-width.
    Optional(Box<Expr>),

    /// Positive lookahead: `&e`. Matches without consuming input.
    PositiveLookahead(Box<Expr>),

    /// Negative lookahead: `!e`. Succeeds when `e` does not match.
    NegativeLookahead(Box<Expr>),

    /// Labelled capture: `name:e`. The label addresses the matched
    /// element on the enclosing sequence's node.
    Label { name: String, expr: Box<Expr> },

    /// Node-type tag: `e <TypeName>`. The constructed node carries the
    /// named kind instead of the generic one.
    NodeType { tag: String, expr: Box<Expr> },
}

/// A character class with its structured members and the source form the
/// diagnostics show (`[0-9]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharClass {
    /// Source text of the class, used as the expectation label.
    pub text: String,
    /// `[^...]` classes match any character outside the parts.
    pub negated: bool,
    pub parts: Vec<ClassPart>,
}

/// One member of a character class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ClassPart {
    Single(char),
    Range(char, char),
}

impl Grammar {
    /// Deserialize a grammar from the JSON form produced by frontends.
    pub fn from_json(json: &str) -> Result<Grammar> {
        Ok(serde_json::from_str(json)?)
    }

    /// Root rule of the grammar: the first rule in declaration order.
    pub fn root(&self) -> Option<&Rule> {
        self.rules.first()
    }

    /// Look up a rule by name.
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Check the IR contract before emission: at least one rule, unique
    /// rule names, every rule reference resolvable, and no degenerate
    /// expression nodes. Violations abort the generation pass.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::EmptyGrammar);
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(Error::DuplicateRule(rule.name.clone()));
            }
        }
        for rule in &self.rules {
            Self::validate_expr(&rule.expr, &rule.name, &seen)?;
        }
        Ok(())
    }

    fn validate_expr(expr: &Expr, rule: &str, names: &HashSet<&str>) -> Result<()> {
        match expr {
            Expr::RuleRef(name) => {
                if !names.contains(name.as_str()) {
                    return Err(Error::UnknownRule {
                        name: name.clone(),
                        referenced_in: rule.to_string(),
                    });
                }
            }
            Expr::Literal { text, .. } => {
                if text.is_empty() {
                    return Err(Error::InvalidIr(format!("empty literal in rule {rule}")));
                }
            }
            Expr::CharClass(class) => {
                if class.parts.is_empty() {
                    return Err(Error::InvalidIr(format!(
                        "empty character class in rule {rule}"
                    )));
                }
            }
            Expr::Sequence(items) | Expr::Choice(items) => {
                if items.len() < 2 {
                    return Err(Error::InvalidIr(format!(
                        "sequence/choice with fewer than two members in rule {rule}"
                    )));
                }
                for item in items {
                    Self::validate_expr(item, rule, names)?;
                }
            }
            Expr::ZeroOrMore(inner)
            | Expr::OneOrMore(inner)
            | Expr::Optional(inner)
            | Expr::PositiveLookahead(inner)
            | Expr::NegativeLookahead(inner) => Self::validate_expr(inner, rule, names)?,
            Expr::Label { name, expr } => {
                if name.is_empty() {
                    return Err(Error::InvalidIr(format!("empty label in rule {rule}")));
                }
                Self::validate_expr(expr, rule, names)?;
            }
            Expr::NodeType { tag, expr } => {
                if tag.is_empty() {
                    return Err(Error::InvalidIr(format!("empty type tag in rule {rule}")));
                }
                Self::validate_expr(expr, rule, names)?;
            }
            Expr::AnyChar => {}
        }
        Ok(())
    }

    /// All node-type tags declared anywhere in the grammar, in order of
    /// first appearance. Drives the generated kind enum.
    pub fn node_types(&self) -> Vec<&str> {
        let mut tags = Vec::new();
        for rule in &self.rules {
            Self::collect_tags(&rule.expr, &mut tags);
        }
        tags
    }

    fn collect_tags<'a>(expr: &'a Expr, tags: &mut Vec<&'a str>) {
        match expr {
            Expr::NodeType { tag, expr } => {
                if !tags.contains(&tag.as_str()) {
                    tags.push(tag);
                }
                Self::collect_tags(expr, tags);
            }
            Expr::Sequence(items) | Expr::Choice(items) => {
                for item in items {
                    Self::collect_tags(item, tags);
                }
            }
            Expr::ZeroOrMore(inner)
            | Expr::OneOrMore(inner)
            | Expr::Optional(inner)
            | Expr::PositiveLookahead(inner)
            | Expr::NegativeLookahead(inner)
            | Expr::Label { expr: inner, .. } => Self::collect_tags(inner, tags),
            _ => {}
        }
    }
}

impl Expr {
    /// Whether this expression can succeed without consuming input.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Expr::Optional(_)
                | Expr::ZeroOrMore(_)
                | Expr::PositiveLookahead(_)
                | Expr::NegativeLookahead(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit_class() -> Expr {
        Expr::CharClass(CharClass {
            text: "[0-9]".to_string(),
            negated: false,
            parts: vec![ClassPart::Range('0', '9')],
        })
    }

    #[test]
    fn test_validate_accepts_simple_grammar() {
        let grammar = Grammar {
            name: "digits".to_string(),
            rules: vec![Rule {
                name: "digit".to_string(),
                expr: digit_class(),
            }],
        };
        assert!(grammar.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_reference() {
        let grammar = Grammar {
            name: "bad".to_string(),
            rules: vec![Rule {
                name: "root".to_string(),
                expr: Expr::RuleRef("missing".to_string()),
            }],
        };
        let err = grammar.validate().unwrap_err();
        assert!(matches!(err, Error::UnknownRule { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_rules() {
        let grammar = Grammar {
            name: "dup".to_string(),
            rules: vec![
                Rule {
                    name: "digit".to_string(),
                    expr: digit_class(),
                },
                Rule {
                    name: "digit".to_string(),
                    expr: digit_class(),
                },
            ],
        };
        assert!(matches!(
            grammar.validate().unwrap_err(),
            Error::DuplicateRule(_)
        ));
    }

    #[test]
    fn test_node_types_first_appearance_order() {
        let grammar = Grammar {
            name: "tags".to_string(),
            rules: vec![
                Rule {
                    name: "a".to_string(),
                    expr: Expr::NodeType {
                        tag: "First".to_string(),
                        expr: Box::new(digit_class()),
                    },
                },
                Rule {
                    name: "b".to_string(),
                    expr: Expr::NodeType {
                        tag: "Second".to_string(),
                        expr: Box::new(Expr::NodeType {
                            tag: "First".to_string(),
                            expr: Box::new(digit_class()),
                        }),
                    },
                },
            ],
        };
        assert_eq!(grammar.node_types(), vec!["First", "Second"]);
    }

    #[test]
    fn test_json_round_trip() {
        let grammar = Grammar {
            name: "calc".to_string(),
            rules: vec![Rule {
                name: "number".to_string(),
                expr: Expr::OneOrMore(Box::new(digit_class())),
            }],
        };
        let json = serde_json::to_string(&grammar).unwrap();
        let back = Grammar::from_json(&json).unwrap();
        assert_eq!(back, grammar);
    }
}
