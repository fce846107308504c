//! Rust backend: emits a self-contained, memoized recursive-descent
//! parser for a grammar IR.
//!
//! The generated file depends only on `std` and exposes:
//!
//! ```rust,ignore
//! pub enum RuleId { ... }                 // cache key tags, one per rule
//! pub enum NodeKind { Generic, ... }      // grammar-declared node types
//! pub struct SyntaxNode { ... }           // text slice + offset + children
//! pub struct SyntaxError { ... }          // formatted line/column message
//! pub struct Parser<'a> { ... }           // per-instance parser state
//! pub fn parse(input: &str) -> Result<Rc<SyntaxNode>, SyntaxError>;
//! ```
//!
//! Every rule becomes a `read_<rule>` method wrapped in a packrat cache:
//! the match logic for a (rule, offset) pair runs at most once per parser
//! instance, and a cache hit re-advances the offset by the cached node's
//! text length. Failures feed the rightmost-failure diagnostic state: a
//! failure past the recorded offset resets the expectation set, a failure
//! at the recorded offset appends to it.

use crate::codegen::builder::Builder;
use crate::codegen::Backend;
use crate::error::{Error, Result};
use crate::grammar::{CharClass, ClassPart, Expr, Grammar, Rule};

/// The Rust code-emission backend.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> RustBackend {
        RustBackend
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for RustBackend {
    fn extension(&self) -> &'static str {
        "rs"
    }

    fn emit(&self, grammar: &Grammar) -> Result<String> {
        let emitter = Emitter::new(grammar)?;
        Ok(emitter.emit())
    }
}

/// Escape `text` as a Rust string literal, including the quotes.
///
/// Backslash, the quote character and the recognized control characters
/// are escaped; Rust has no `\a`/`\v`/`\f`/`\e` escapes, so those emit as
/// `\u{..}`. Rust string literals carry no interpolation syntax, so no
/// further sequence needs protection.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        push_escaped(&mut out, c, '"');
    }
    out.push('"');
    out
}

/// Escape `c` as a Rust character literal, including the quotes.
pub fn char_literal(c: char) -> String {
    let mut out = String::from("'");
    push_escaped(&mut out, c, '\'');
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, c: char, quote_char: char) {
    match c {
        '\\' => out.push_str("\\\\"),
        c if c == quote_char => {
            out.push('\\');
            out.push(c);
        }
        '\u{07}' => out.push_str("\\u{7}"),
        '\u{08}' => out.push_str("\\u{8}"),
        '\t' => out.push_str("\\t"),
        '\n' => out.push_str("\\n"),
        '\u{0b}' => out.push_str("\\u{b}"),
        '\u{0c}' => out.push_str("\\u{c}"),
        '\r' => out.push_str("\\r"),
        '\u{1b}' => out.push_str("\\u{1b}"),
        c => out.push(c),
    }
}

/// Rule-name-derived variant for the generated `RuleId` enum.
fn pascal_case(name: &str) -> String {
    let mut out = String::new();
    let mut upper_next = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if upper_next {
                out.extend(c.to_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        } else {
            upper_next = true;
        }
    }
    out
}

/// Rule-name-derived method name. The `read_` prefix keeps the result
/// clear of Rust keywords; remaining punctuation becomes underscores.
fn method_name(rule: &str) -> String {
    let safe: String = rule
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("read_{safe}")
}

/// Emission state for one generation pass over a validated grammar.
struct Emitter<'g> {
    grammar: &'g Grammar,
    /// (rule name, RuleId variant), in declaration order.
    rules: Vec<(&'g str, String)>,
    /// (type tag, NodeKind variant), in first-appearance order.
    kinds: Vec<(&'g str, String)>,
    has_labels: bool,
    needs_typed: bool,
    needs_retag: bool,
}

impl<'g> Emitter<'g> {
    fn new(grammar: &'g Grammar) -> Result<Emitter<'g>> {
        grammar.validate()?;

        let mut rules = Vec::with_capacity(grammar.rules.len());
        for rule in &grammar.rules {
            let variant = pascal_case(&rule.name);
            if rules.iter().any(|(_, v)| *v == variant) {
                return Err(Error::InvalidIr(format!(
                    "rule names {variant:?} collide after case conversion"
                )));
            }
            rules.push((rule.name.as_str(), variant));
        }

        let kinds: Vec<(&str, String)> = grammar
            .node_types()
            .into_iter()
            .map(|tag| (tag, pascal_case(tag)))
            .collect();

        let mut has_labels = false;
        let mut needs_typed = false;
        let mut needs_retag = false;
        for rule in &grammar.rules {
            scan_features(
                &rule.expr,
                &mut has_labels,
                &mut needs_typed,
                &mut needs_retag,
            );
        }

        Ok(Emitter {
            grammar,
            rules,
            kinds,
            has_labels,
            needs_typed,
            needs_retag,
        })
    }

    fn rule_variant(&self, name: &str) -> &str {
        self.rules
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("rule {name} missing from rule table"))
    }

    fn kind_variant(&self, tag: &str) -> &str {
        self.kinds
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, v)| v.as_str())
            .unwrap_or_else(|| panic!("node type {tag} missing from kind table"))
    }

    fn emit(&self) -> String {
        log::debug!(
            "[Codegen] generating parser for grammar {} ({} rules)",
            self.grammar.name,
            self.grammar.rules.len()
        );
        let mut b = Builder::new();
        self.emit_header(&mut b);
        self.emit_rule_ids(&mut b);
        self.emit_node_kinds(&mut b);
        self.emit_syntax_node(&mut b);
        self.emit_syntax_error(&mut b);
        self.emit_format_error(&mut b);
        self.emit_parser_struct(&mut b);
        self.emit_parser_impl(&mut b);
        self.emit_exports(&mut b);
        b.serialize()
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    /// A top-level or member item: blank-line separation, doc lines,
    /// attributes, then the braced body in a child scope.
    fn item_block(
        &self,
        b: &mut Builder,
        docs: &[&str],
        attrs: &[&str],
        header: &str,
        body: impl FnOnce(&mut Builder),
    ) {
        b.separate_member();
        for doc in docs {
            b.line(doc);
        }
        for attr in attrs {
            b.line(attr);
        }
        b.scoped_block(&format!("{header} {{"), "}", body);
    }

    /// A module/namespace block.
    #[allow(dead_code)]
    fn module_block(&self, b: &mut Builder, name: &str, body: impl FnOnce(&mut Builder)) {
        self.item_block(b, &[], &[], &format!("pub mod {name}"), body);
    }

    /// A method: separation, docs, `fn` header with the ordered parameter
    /// list, body in a fresh child scope.
    fn method(
        &self,
        b: &mut Builder,
        docs: &[&str],
        vis: &str,
        name: &str,
        params: &[&str],
        ret: Option<&str>,
        body: impl FnOnce(&mut Builder),
    ) {
        b.separate_member();
        for doc in docs {
            b.line(doc);
        }
        let params = params.join(", ");
        let header = match ret {
            Some(ret) => format!("{vis}fn {name}({params}) -> {ret} {{"),
            None => format!("{vis}fn {name}({params}) {{"),
        };
        b.scoped_block(&header, "}", body);
    }

    /// A constructor following the base-initializer convention: build the
    /// value through the base constructor first, then run the extra
    /// statements, then return it.
    fn constructor(
        &self,
        b: &mut Builder,
        name: &str,
        params: &[&str],
        ret: &str,
        base_init: &str,
        body: impl FnOnce(&mut Builder),
    ) {
        self.method(b, &[], "", name, params, Some(ret), |mb| {
            mb.line(&format!("let mut node = {base_init};"));
            body(mb);
            mb.line("node");
        });
    }

    /// A field declaration inside a struct body.
    fn field(&self, b: &mut Builder, name: &str, ty: &str) {
        b.line(&format!("{name}: {ty},"));
    }

    fn if_block(&self, b: &mut Builder, condition: &str, then_body: impl FnOnce(&mut Builder)) {
        b.stmt_block(&format!("if {condition} {{"), "}", then_body);
    }

    fn if_else(
        &self,
        b: &mut Builder,
        condition: &str,
        then_body: impl FnOnce(&mut Builder),
        else_body: impl FnOnce(&mut Builder),
    ) {
        b.line(&format!("if {condition} {{"));
        b.indent(then_body);
        b.line("} else {");
        b.indent(else_body);
        b.line("}");
    }

    // ------------------------------------------------------------------
    // Prelude of the generated file
    // ------------------------------------------------------------------

    fn emit_header(&self, b: &mut Builder) {
        b.line(&format!(
            "// Parser for the {} grammar, generated by vine_peg {}.",
            self.grammar.name,
            env!("CARGO_PKG_VERSION")
        ));
        b.line("// Edit the grammar, not this file.");
        b.newline();
        b.line("use std::collections::HashMap;");
        b.line("use std::fmt;");
        b.line("use std::rc::Rc;");
        // Arm the member separator so the first item gets its blank line.
        b.separate_member();
    }

    fn emit_rule_ids(&self, b: &mut Builder) {
        let variants: Vec<&str> = self.rules.iter().map(|(_, v)| v.as_str()).collect();
        self.item_block(
            b,
            &[
                "/// One tag per grammar rule; forms the packrat cache key together",
                "/// with the rule's entry offset.",
            ],
            &["#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]"],
            "pub enum RuleId",
            |body| {
                for v in variants {
                    body.line(&format!("{v},"));
                }
            },
        );
    }

    fn emit_node_kinds(&self, b: &mut Builder) {
        let variants: Vec<&str> = self.kinds.iter().map(|(_, v)| v.as_str()).collect();
        self.item_block(
            b,
            &[
                "/// Grammar-declared node types, resolved at node construction.",
                "/// Nodes built without a type tag carry `Generic`.",
            ],
            &["#[derive(Debug, Clone, Copy, PartialEq, Eq)]"],
            "pub enum NodeKind",
            |body| {
                body.line("Generic,");
                for v in variants {
                    body.line(&format!("{v},"));
                }
            },
        );
    }

    fn emit_syntax_node(&self, b: &mut Builder) {
        self.item_block(
            b,
            &[
                "/// One matched span of input: the exact text slice, its start",
                "/// offset, and the ordered child elements.",
            ],
            &["#[derive(Debug, PartialEq)]"],
            "pub struct SyntaxNode",
            |body| {
                self.field(body, "pub kind", "NodeKind");
                self.field(body, "pub text", "String");
                self.field(body, "pub offset", "usize");
                self.field(body, "pub elements", "Vec<Rc<SyntaxNode>>");
                if self.has_labels {
                    self.field(body, "labels", "Vec<(&'static str, usize)>");
                }
            },
        );

        self.item_block(b, &[], &[], "impl SyntaxNode", |body| {
            self.method(
                body,
                &[],
                "",
                "new",
                &[
                    "text: String",
                    "offset: usize",
                    "elements: Vec<Rc<SyntaxNode>>",
                ],
                Some("SyntaxNode"),
                |mb| {
                    let has_labels = self.has_labels;
                    mb.stmt_block("SyntaxNode {", "}", move |mb| {
                        mb.line("kind: NodeKind::Generic,");
                        mb.line("text,");
                        mb.line("offset,");
                        mb.line("elements,");
                        if has_labels {
                            mb.line("labels: Vec::new(),");
                        }
                    });
                },
            );

            if self.needs_typed {
                self.constructor(
                    body,
                    "typed",
                    &[
                        "kind: NodeKind",
                        "text: String",
                        "offset: usize",
                        "elements: Vec<Rc<SyntaxNode>>",
                    ],
                    "SyntaxNode",
                    "SyntaxNode::new(text, offset, elements)",
                    |mb| {
                        mb.line("node.kind = kind;");
                    },
                );
            }

            if self.needs_retag {
                self.method(
                    body,
                    &[],
                    "",
                    "retag",
                    &["node: &Rc<SyntaxNode>", "kind: NodeKind"],
                    Some("Rc<SyntaxNode>"),
                    |mb| {
                        let has_labels = self.has_labels;
                        mb.stmt_block("Rc::new(SyntaxNode {", "})", move |mb| {
                            mb.line("kind,");
                            mb.line("text: node.text.clone(),");
                            mb.line("offset: node.offset,");
                            mb.line("elements: node.elements.clone(),");
                            if has_labels {
                                mb.line("labels: node.labels.clone(),");
                            }
                        });
                    },
                );
            }

            if self.has_labels {
                self.method(
                    body,
                    &[],
                    "",
                    "with_labels",
                    &["mut self", "labels: &[(&'static str, usize)]"],
                    Some("SyntaxNode"),
                    |mb| {
                        mb.line("self.labels.extend_from_slice(labels);");
                        mb.line("self");
                    },
                );

                self.method(
                    body,
                    &["/// Look up a labelled child element."],
                    "pub ",
                    "get",
                    &["&self", "label: &str"],
                    Some("Option<&Rc<SyntaxNode>>"),
                    |mb| {
                        mb.line("self.labels");
                        mb.indent(|mb| {
                            mb.line(".iter()");
                            mb.line(".find(|(name, _)| *name == label)");
                            mb.line(".and_then(|(_, index)| self.elements.get(*index))");
                        });
                    },
                );
            }
        });
    }

    fn emit_syntax_error(&self, b: &mut Builder) {
        self.item_block(
            b,
            &[
                "/// The single user-facing error of the generated parser: the root",
                "/// rule failed to match, or matched short of the full input.",
            ],
            &["#[derive(Debug, Clone, PartialEq, Eq)]"],
            "pub struct SyntaxError",
            |body| {
                self.field(body, "pub offset", "usize");
                self.field(body, "message", "String");
            },
        );

        self.item_block(b, &[], &[], "impl fmt::Display for SyntaxError", |body| {
            self.method(
                body,
                &[],
                "",
                "fmt",
                &["&self", "f: &mut fmt::Formatter<'_>"],
                Some("fmt::Result"),
                |mb| {
                    mb.line("f.write_str(&self.message)");
                },
            );
        });

        b.separate_member();
        b.line("impl std::error::Error for SyntaxError {}");
    }

    fn emit_format_error(&self, b: &mut Builder) {
        self.method(
            b,
            &[],
            "",
            "format_error",
            &["input: &str", "offset: usize", "expected: &[&'static str]"],
            Some("String"),
            |mb| {
                mb.line("let lines: Vec<&str> = input.split('\\n').collect();");
                mb.line("let mut line_no = 0;");
                mb.line("let mut position = 0;");
                mb.stmt_block("while position <= offset {", "}", |mb| {
                    mb.line("position += lines[line_no].len() + 1;");
                    mb.line("line_no += 1;");
                });
                mb.line("let line = lines[line_no - 1];");
                mb.line(
                    "let mut message = format!(\"Line {}: expected {}\\n\", line_no, expected.join(\", \"));",
                );
                mb.line("message.push_str(line);");
                mb.line("message.push('\\n');");
                mb.line("position -= line.len() + 1;");
                mb.line("message.push_str(&\" \".repeat(offset - position));");
                mb.line("message.push('^');");
                mb.line("message");
            },
        );
    }

    fn emit_parser_struct(&self, b: &mut Builder) {
        self.item_block(
            b,
            &[
                "/// Memoizing recursive-descent parser. All mutable state is per",
                "/// instance; a fresh parser starts with an empty cache.",
            ],
            &[],
            "pub struct Parser<'a>",
            |body| {
                self.field(body, "input", "&'a str");
                self.field(body, "offset", "usize");
                self.field(
                    body,
                    "cache",
                    "HashMap<(RuleId, usize), Option<Rc<SyntaxNode>>>",
                );
                self.field(body, "failure", "usize");
                self.field(body, "expected", "Vec<&'static str>");
            },
        );
    }

    fn emit_parser_impl(&self, b: &mut Builder) {
        self.item_block(b, &[], &[], "impl<'a> Parser<'a>", |body| {
            self.method(
                body,
                &[],
                "pub ",
                "new",
                &["input: &'a str"],
                Some("Parser<'a>"),
                |mb| {
                    mb.stmt_block("Parser {", "}", |mb| {
                        mb.line("input,");
                        mb.line("offset: 0,");
                        mb.line("cache: HashMap::new(),");
                        mb.line("failure: 0,");
                        mb.line("expected: Vec::new(),");
                    });
                },
            );

            self.emit_parse_method(body);

            for rule in &self.grammar.rules {
                self.emit_rule_method(body, rule);
            }
        });
    }

    fn emit_parse_method(&self, b: &mut Builder) {
        let root = method_name(&self.grammar.rules[0].name);
        self.method(
            b,
            &[
                "/// Match the root rule against the whole input. Succeeds only",
                "/// when the match consumes every byte.",
            ],
            "pub ",
            "parse",
            &["&mut self"],
            Some("Result<Rc<SyntaxNode>, SyntaxError>"),
            |mb| {
                mb.line(&format!("let tree = self.{root}();"));
                self.if_block(mb, "let Some(tree) = tree", |mb| {
                    self.if_block(mb, "self.offset == self.input.len()", |mb| {
                        mb.line("return Ok(tree);");
                    });
                });
                self.if_block(mb, "self.expected.is_empty()", |mb| {
                    mb.line("self.failure = self.offset;");
                    mb.line("self.expected.push(\"<EOF>\");");
                });
                mb.stmt_block("Err(SyntaxError {", "})", |mb| {
                    mb.line("offset: self.failure,");
                    mb.line("message: format_error(self.input, self.failure, &self.expected),");
                });
            },
        );
    }

    fn emit_exports(&self, b: &mut Builder) {
        self.method(
            b,
            &[
                "/// Parse `input` with the grammar's root rule, returning the",
                "/// syntax tree or a formatted syntax error.",
            ],
            "pub ",
            "parse",
            &["input: &str"],
            Some("Result<Rc<SyntaxNode>, SyntaxError>"),
            |mb| {
                mb.line("let mut parser = Parser::new(input);");
                mb.line("parser.parse()");
            },
        );
        b.newline();
    }

    // ------------------------------------------------------------------
    // Rule emission
    // ------------------------------------------------------------------

    fn emit_rule_method(&self, b: &mut Builder, rule: &Rule) {
        log::debug!("[Codegen] emitting rule {}", rule.name);
        self.method(
            b,
            &[],
            "",
            &method_name(&rule.name),
            &["&mut self"],
            Some("Option<Rc<SyntaxNode>>"),
            |mb| {
                self.cached_rule(mb, rule);
            },
        );
    }

    /// Wrap a rule's match logic in the packrat cache: snapshot the entry
    /// offset, probe the cache (a hit re-advances the offset by the
    /// cached node's text length and skips the match logic entirely),
    /// otherwise run the match logic and store its result under the
    /// entry offset.
    fn cached_rule(&self, b: &mut Builder, rule: &Rule) {
        let variant = self.rule_variant(&rule.name);
        let index = b.next_name("index");
        b.line(&format!("let {index} = self.offset;"));
        b.stmt_block(
            &format!(
                "if let Some(cached) = self.cache.get(&(RuleId::{variant}, {index})).cloned() {{"
            ),
            "}",
            |mb| {
                self.if_block(mb, "let Some(node) = &cached", |mb| {
                    mb.line("self.offset += node.text.len();");
                });
                mb.line("return cached;");
            },
        );
        let address = self.alloc_result(b);
        self.compile_expr(b, &rule.expr, &address, None);
        b.line(&format!(
            "self.cache.insert((RuleId::{variant}, {index}), {address}.clone());"
        ));
        b.line(&address);
    }

    /// Allocate and declare a match-result slot. `None` is the failure
    /// marker throughout the generated code.
    fn alloc_result(&self, b: &mut Builder) -> String {
        let name = b.next_name("address");
        b.line(&format!("let mut {name}: Option<Rc<SyntaxNode>> = None;"));
        name
    }

    /// Record a primitive failure with its expectation label: a failure
    /// past the rightmost one resets the expectation set; a failure at
    /// the rightmost offset appends to it.
    fn emit_failure(&self, b: &mut Builder, label: &str) {
        self.if_block(b, "self.offset > self.failure", |mb| {
            mb.line("self.failure = self.offset;");
            mb.line("self.expected.clear();");
        });
        self.if_block(b, "self.offset == self.failure", |mb| {
            mb.line(&format!("self.expected.push({});", quote(label)));
        });
    }

    /// The node-construction expression: `Some(Rc::new(SyntaxNode::...))`
    /// with the kind resolved at construction and the label table, when
    /// present, attached in the same statement.
    fn node_ctor(
        &self,
        kind: Option<&str>,
        labels: &[(String, usize)],
        text: &str,
        offset: &str,
        elements: &str,
    ) -> String {
        let base = match kind {
            Some(kind) => {
                format!("SyntaxNode::typed(NodeKind::{kind}, {text}, {offset}, {elements})")
            }
            None => format!("SyntaxNode::new({text}, {offset}, {elements})"),
        };
        if labels.is_empty() {
            format!("Some(Rc::new({base}))")
        } else {
            let pairs: Vec<String> = labels
                .iter()
                .map(|(name, index)| format!("({}, {index})", quote(name)))
                .collect();
            format!("Some(Rc::new({base}.with_labels(&[{}])))", pairs.join(", "))
        }
    }

    // ------------------------------------------------------------------
    // Expression emission
    // ------------------------------------------------------------------

    /// Emit the match logic for `expr`, writing its result into the
    /// pre-declared `address` slot. `kind` is threaded into node
    /// construction for directly-constructing expressions; type tags over
    /// other shapes re-wrap the result instead (see `Expr::NodeType`).
    fn compile_expr(&self, b: &mut Builder, expr: &Expr, address: &str, kind: Option<&str>) {
        match expr {
            Expr::Literal {
                text,
                case_insensitive,
            } => self.compile_literal(b, text, *case_insensitive, address, kind),
            Expr::CharClass(class) => self.compile_char_class(b, class, address, kind),
            Expr::AnyChar => self.compile_any_char(b, address, kind),
            Expr::RuleRef(name) => {
                b.line(&format!("{address} = self.{}();", method_name(name)));
            }
            Expr::Sequence(items) => self.compile_sequence(b, items, address, kind),
            Expr::Choice(alts) => self.compile_choice(b, alts, address),
            Expr::ZeroOrMore(inner) => self.compile_repeat(b, inner, 0, address, kind),
            Expr::OneOrMore(inner) => self.compile_repeat(b, inner, 1, address, kind),
            Expr::Optional(inner) => self.compile_optional(b, inner, address),
            Expr::PositiveLookahead(inner) => self.compile_lookahead(b, inner, true, address),
            Expr::NegativeLookahead(inner) => self.compile_lookahead(b, inner, false, address),
            Expr::Label { expr, .. } => {
                // Labels address sequence elements; the binding itself is
                // recorded by the enclosing sequence's construction.
                self.compile_expr(b, expr, address, kind);
            }
            Expr::NodeType { tag, expr } => {
                let variant = self.kind_variant(tag).to_string();
                if constructs_node(expr) {
                    self.compile_expr(b, expr, address, Some(variant.as_str()));
                } else {
                    self.compile_expr(b, expr, address, None);
                    b.line(&format!(
                        "{address} = {address}.map(|node| SyntaxNode::retag(&node, NodeKind::{variant}));"
                    ));
                }
            }
        }
    }

    fn compile_literal(
        &self,
        b: &mut Builder,
        text: &str,
        case_insensitive: bool,
        address: &str,
        kind: Option<&str>,
    ) {
        let index = b.next_name("index");
        b.line(&format!("let {index} = self.offset + {};", text.len()));
        let condition = if case_insensitive {
            let chunk = b.next_name("chunk");
            format!(
                "self.input.get(self.offset..{index}).map_or(false, |{chunk}| {chunk}.eq_ignore_ascii_case({}))",
                quote(text)
            )
        } else {
            format!("self.input.get(self.offset..{index}) == Some({})", quote(text))
        };
        let label = format!("{text:?}");
        self.if_else(
            b,
            &condition,
            |mb| {
                let ctor = self.node_ctor(
                    kind,
                    &[],
                    &format!("self.input[self.offset..{index}].to_string()"),
                    "self.offset",
                    "Vec::new()",
                );
                mb.line(&format!("{address} = {ctor};"));
                mb.line(&format!("self.offset = {index};"));
            },
            |mb| {
                self.emit_failure(mb, &label);
            },
        );
    }

    fn compile_char_class(
        &self,
        b: &mut Builder,
        class: &CharClass,
        address: &str,
        kind: Option<&str>,
    ) {
        let chunk = b.next_name("chunk");
        let condition = class_condition(class, &chunk);
        b.stmt_block("match self.input[self.offset..].chars().next() {", "}", |mb| {
            mb.stmt_block(&format!("Some({chunk}) if {condition} => {{"), "}", |mb| {
                let index = mb.next_name("index");
                mb.line(&format!("let {index} = self.offset + {chunk}.len_utf8();"));
                let ctor = self.node_ctor(
                    kind,
                    &[],
                    &format!("self.input[self.offset..{index}].to_string()"),
                    "self.offset",
                    "Vec::new()",
                );
                mb.line(&format!("{address} = {ctor};"));
                mb.line(&format!("self.offset = {index};"));
            });
            mb.stmt_block("_ => {", "}", |mb| {
                self.emit_failure(mb, &class.text);
            });
        });
    }

    fn compile_any_char(&self, b: &mut Builder, address: &str, kind: Option<&str>) {
        let chunk = b.next_name("chunk");
        b.stmt_block("match self.input[self.offset..].chars().next() {", "}", |mb| {
            mb.stmt_block(&format!("Some({chunk}) => {{"), "}", |mb| {
                let index = mb.next_name("index");
                mb.line(&format!("let {index} = self.offset + {chunk}.len_utf8();"));
                let ctor = self.node_ctor(
                    kind,
                    &[],
                    &format!("self.input[self.offset..{index}].to_string()"),
                    "self.offset",
                    "Vec::new()",
                );
                mb.line(&format!("{address} = {ctor};"));
                mb.line(&format!("self.offset = {index};"));
            });
            mb.stmt_block("None => {", "}", |mb| {
                self.emit_failure(mb, "<any char>");
            });
        });
    }

    /// Sequence: nested try-then-check statements. Each element must
    /// match for the next to be attempted; any failure voids the element
    /// list and rewinds to the sequence start.
    fn compile_sequence(&self, b: &mut Builder, items: &[Expr], address: &str, kind: Option<&str>) {
        let index = b.next_name("index");
        b.line(&format!("let {index} = self.offset;"));
        let elements = b.next_name("elements");
        b.line(&format!(
            "let mut {elements}: Option<Vec<Rc<SyntaxNode>>> = Some(Vec::with_capacity({}));",
            items.len()
        ));

        let labels: Vec<(String, usize)> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Expr::Label { name, .. } => Some((name.clone(), i)),
                _ => None,
            })
            .collect();

        self.compile_sequence_items(b, items, 0, &elements);

        b.stmt_block(&format!("match {elements} {{"), "}", |mb| {
            mb.stmt_block("Some(elements) => {", "}", |mb| {
                let ctor = self.node_ctor(
                    kind,
                    &labels,
                    &format!("self.input[{index}..self.offset].to_string()"),
                    &index,
                    "elements",
                );
                mb.line(&format!("{address} = {ctor};"));
            });
            mb.stmt_block("None => {", "}", |mb| {
                mb.line(&format!("self.offset = {index};"));
            });
        });
    }

    fn compile_sequence_items(&self, b: &mut Builder, items: &[Expr], i: usize, elements: &str) {
        if i == items.len() {
            return;
        }
        let address = self.alloc_result(b);
        self.compile_expr(b, &items[i], &address, None);
        self.if_else(
            b,
            &format!("let Some(node) = {address}"),
            |mb| {
                self.if_block(mb, &format!("let Some(elements) = {elements}.as_mut()"), |mb| {
                    mb.line("elements.push(node);");
                });
                self.compile_sequence_items(mb, items, i + 1, elements);
            },
            |mb| {
                mb.line(&format!("{elements} = None;"));
            },
        );
    }

    /// Ordered choice: try each alternative from the saved offset; the
    /// first success wins, and a fully failed choice rewinds.
    fn compile_choice(&self, b: &mut Builder, alts: &[Expr], address: &str) {
        let index = b.next_name("index");
        b.line(&format!("let {index} = self.offset;"));
        self.compile_choice_alts(b, alts, 0, address, &index);
    }

    fn compile_choice_alts(
        &self,
        b: &mut Builder,
        alts: &[Expr],
        i: usize,
        address: &str,
        index: &str,
    ) {
        self.compile_expr(b, &alts[i], address, None);
        self.if_block(b, &format!("{address}.is_none()"), |mb| {
            mb.line(&format!("self.offset = {index};"));
            if i + 1 < alts.len() {
                self.compile_choice_alts(mb, alts, i + 1, address, index);
            }
        });
    }

    /// Repetition: loop until the inner expression fails, then require
    /// the minimum count. A failed attempt has already restored its own
    /// offset, so the loop exit position is the end of the last success.
    fn compile_repeat(
        &self,
        b: &mut Builder,
        inner: &Expr,
        min: usize,
        address: &str,
        kind: Option<&str>,
    ) {
        let remaining = b.next_name("remaining");
        let index = b.next_name("index");
        let elements = b.next_name("elements");
        b.line(&format!("let mut {remaining} = {min};"));
        b.line(&format!("let {index} = self.offset;"));
        b.line(&format!("let mut {elements}: Vec<Rc<SyntaxNode>> = Vec::new();"));
        b.stmt_block("loop {", "}", |mb| {
            let item = self.alloc_result(mb);
            self.compile_expr(mb, inner, &item, None);
            mb.stmt_block(&format!("match {item} {{"), "}", |mb| {
                mb.stmt_block("Some(node) => {", "}", |mb| {
                    mb.line(&format!("{elements}.push(node);"));
                    mb.line(&format!("{remaining} -= 1;"));
                });
                mb.line("None => break,");
            });
        });
        self.if_block(b, &format!("{remaining} <= 0"), |mb| {
            let ctor = self.node_ctor(
                kind,
                &[],
                &format!("self.input[{index}..self.offset].to_string()"),
                &index,
                &elements,
            );
            mb.line(&format!("{address} = {ctor};"));
        });
    }

    /// Optional match: a failed inner match becomes a zero-width success
    /// at the current offset.
    fn compile_optional(&self, b: &mut Builder, inner: &Expr, address: &str) {
        self.compile_expr(b, inner, address, None);
        self.if_block(b, &format!("{address}.is_none()"), |mb| {
            mb.line(&format!(
                "{address} = Some(Rc::new(SyntaxNode::new(String::new(), self.offset, Vec::new())));"
            ));
        });
    }

    /// Lookahead: run the inner match, rewind unconditionally, and turn
    /// the outcome into a zero-width success or a silent failure.
    fn compile_lookahead(&self, b: &mut Builder, inner: &Expr, positive: bool, address: &str) {
        let index = b.next_name("index");
        b.line(&format!("let {index} = self.offset;"));
        let probe = self.alloc_result(b);
        self.compile_expr(b, inner, &probe, None);
        b.line(&format!("self.offset = {index};"));
        let condition = if positive {
            format!("{probe}.is_some()")
        } else {
            format!("{probe}.is_none()")
        };
        self.if_block(b, &condition, |mb| {
            mb.line(&format!(
                "{address} = Some(Rc::new(SyntaxNode::new(String::new(), self.offset, Vec::new())));"
            ));
        });
    }
}

/// Whether an expression constructs its own node (so a type tag resolves
/// at that construction) rather than passing another node through.
fn constructs_node(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal { .. }
            | Expr::CharClass(_)
            | Expr::AnyChar
            | Expr::Sequence(_)
            | Expr::ZeroOrMore(_)
            | Expr::OneOrMore(_)
    )
}

fn scan_features(expr: &Expr, has_labels: &mut bool, needs_typed: &mut bool, needs_retag: &mut bool) {
    match expr {
        Expr::Label { expr, .. } => {
            *has_labels = true;
            scan_features(expr, has_labels, needs_typed, needs_retag);
        }
        Expr::NodeType { expr, .. } => {
            if constructs_node(expr) {
                *needs_typed = true;
            } else {
                *needs_retag = true;
            }
            scan_features(expr, has_labels, needs_typed, needs_retag);
        }
        Expr::Sequence(items) | Expr::Choice(items) => {
            for item in items {
                scan_features(item, has_labels, needs_typed, needs_retag);
            }
        }
        Expr::ZeroOrMore(inner)
        | Expr::OneOrMore(inner)
        | Expr::Optional(inner)
        | Expr::PositiveLookahead(inner)
        | Expr::NegativeLookahead(inner) => {
            scan_features(inner, has_labels, needs_typed, needs_retag)
        }
        _ => {}
    }
}

fn class_condition(class: &CharClass, var: &str) -> String {
    let parts: Vec<String> = class
        .parts
        .iter()
        .map(|part| match part {
            ClassPart::Single(c) => format!("{var} == {}", char_literal(*c)),
            ClassPart::Range(lo, hi) => format!(
                "({}..={}).contains(&{var})",
                char_literal(*lo),
                char_literal(*hi)
            ),
        })
        .collect();
    let joined = parts.join(" || ");
    if class.negated {
        format!("!({joined})")
    } else {
        joined
    }
}
