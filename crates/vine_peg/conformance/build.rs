//! Generates the conformance parsers at build time, so the artifacts
//! under test are always the backend's own output.

use std::env;
use std::fs;
use std::path::Path;

use vine_peg::{Backend, CharClass, ClassPart, Expr, Grammar, Rule, RustBackend};

fn lit(text: &str) -> Expr {
    Expr::Literal {
        text: text.to_string(),
        case_insensitive: false,
    }
}

fn class(text: &str, negated: bool, parts: Vec<ClassPart>) -> Expr {
    Expr::CharClass(CharClass {
        text: text.to_string(),
        negated,
        parts,
    })
}

fn digits() -> Expr {
    class("[0-9]", false, vec![ClassPart::Range('0', '9')])
}

fn letters() -> Expr {
    class("[a-z]", false, vec![ClassPart::Range('a', 'z')])
}

/// `digit <- [0-9]`
fn digit_grammar() -> Grammar {
    Grammar {
        name: "digit".to_string(),
        rules: vec![Rule {
            name: "digit".to_string(),
            expr: digits(),
        }],
    }
}

/// `root <- "ab"` — matches a strict prefix of longer inputs.
fn prefix_grammar() -> Grammar {
    Grammar {
        name: "prefix".to_string(),
        rules: vec![Rule {
            name: "root".to_string(),
            expr: lit("ab"),
        }],
    }
}

/// A bracketed list with labels, node types, choice and repetition:
///
/// ```text
/// list    <- "[" elems:items? "]" <ListNode>
/// items   <- value ("," value)*
/// value   <- number / word
/// number  <- [0-9]+ <Number>
/// word    <- letters <Word>
/// letters <- [a-z]+
/// ```
fn list_grammar() -> Grammar {
    Grammar {
        name: "list".to_string(),
        rules: vec![
            Rule {
                name: "list".to_string(),
                expr: Expr::NodeType {
                    tag: "ListNode".to_string(),
                    expr: Box::new(Expr::Sequence(vec![
                        lit("["),
                        Expr::Label {
                            name: "elems".to_string(),
                            expr: Box::new(Expr::Optional(Box::new(Expr::RuleRef(
                                "items".to_string(),
                            )))),
                        },
                        lit("]"),
                    ])),
                },
            },
            Rule {
                name: "items".to_string(),
                expr: Expr::Sequence(vec![
                    Expr::RuleRef("value".to_string()),
                    Expr::ZeroOrMore(Box::new(Expr::Sequence(vec![
                        lit(","),
                        Expr::RuleRef("value".to_string()),
                    ]))),
                ]),
            },
            Rule {
                name: "value".to_string(),
                expr: Expr::Choice(vec![
                    Expr::RuleRef("number".to_string()),
                    Expr::RuleRef("word".to_string()),
                ]),
            },
            Rule {
                name: "number".to_string(),
                expr: Expr::NodeType {
                    tag: "Number".to_string(),
                    expr: Box::new(Expr::OneOrMore(Box::new(digits()))),
                },
            },
            Rule {
                name: "word".to_string(),
                expr: Expr::NodeType {
                    tag: "Word".to_string(),
                    expr: Box::new(Expr::RuleRef("letters".to_string())),
                },
            },
            Rule {
                name: "letters".to_string(),
                expr: Expr::OneOrMore(Box::new(letters())),
            },
        ],
    }
}

/// Backtracking arithmetic: the second alternative re-reads `term` at
/// offset 0 and must hit the packrat cache.
///
/// ```text
/// expr <- term "+" term / term "-" term
/// term <- [0-9]+
/// ```
fn expr_grammar() -> Grammar {
    Grammar {
        name: "expr".to_string(),
        rules: vec![
            Rule {
                name: "expr".to_string(),
                expr: Expr::Choice(vec![
                    Expr::Sequence(vec![
                        Expr::RuleRef("term".to_string()),
                        lit("+"),
                        Expr::RuleRef("term".to_string()),
                    ]),
                    Expr::Sequence(vec![
                        Expr::RuleRef("term".to_string()),
                        lit("-"),
                        Expr::RuleRef("term".to_string()),
                    ]),
                ]),
            },
            Rule {
                name: "term".to_string(),
                expr: Expr::OneOrMore(Box::new(digits())),
            },
        ],
    }
}

/// `root <- &[a-z] !"end" [a-z]+`
fn lookahead_grammar() -> Grammar {
    Grammar {
        name: "lookahead".to_string(),
        rules: vec![Rule {
            name: "root".to_string(),
            expr: Expr::Sequence(vec![
                Expr::PositiveLookahead(Box::new(letters())),
                Expr::NegativeLookahead(Box::new(lit("end"))),
                Expr::OneOrMore(Box::new(letters())),
            ]),
        }],
    }
}

/// Case-insensitive keyword, optional separator, negated class, any-char:
/// `root <- `select` " "? rest:[^ ]+ .?`
fn misc_grammar() -> Grammar {
    Grammar {
        name: "misc".to_string(),
        rules: vec![Rule {
            name: "root".to_string(),
            expr: Expr::Sequence(vec![
                Expr::Literal {
                    text: "select".to_string(),
                    case_insensitive: true,
                },
                Expr::Optional(Box::new(lit(" "))),
                Expr::Label {
                    name: "rest".to_string(),
                    expr: Box::new(Expr::OneOrMore(Box::new(class(
                        "[^ ]",
                        true,
                        vec![ClassPart::Single(' ')],
                    )))),
                },
                Expr::Optional(Box::new(Expr::AnyChar)),
            ]),
        }],
    }
}

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let backend = RustBackend::new();

    let grammars = [
        digit_grammar(),
        prefix_grammar(),
        list_grammar(),
        expr_grammar(),
        lookahead_grammar(),
        misc_grammar(),
    ];

    for grammar in &grammars {
        let code = backend
            .emit(grammar)
            .unwrap_or_else(|e| panic!("generation failed for {}: {e}", grammar.name));
        let path = Path::new(&out_dir).join(format!("{}.rs", grammar.name));
        fs::write(&path, code)
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
    }

    println!("cargo:rerun-if-changed=build.rs");
}
