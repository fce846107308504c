//! Statement-builder core shared by the backends.
//!
//! A [`Builder`] is one node in a scope tree that mirrors the block
//! nesting of the generated source. All scopes write through one shared
//! output buffer owned by the root; each scope carries its own
//! indentation depth (a snapshot taken at creation) and its own variable
//! allocator, so sibling scopes number their locals independently.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Fixed-width indentation unit of the generated source.
const INDENT_UNIT: &str = "    ";

/// A lexical scope of the output under construction.
pub struct Builder {
    out: Rc<RefCell<String>>,
    depth: usize,
    member_separator: bool,
    vars: HashMap<String, usize>,
}

impl Builder {
    /// Create the root scope with an empty output buffer.
    pub fn new() -> Builder {
        Builder {
            out: Rc::new(RefCell::new(String::new())),
            depth: 0,
            member_separator: false,
            vars: HashMap::new(),
        }
    }

    /// Create a child scope: same buffer, current depth as a snapshot,
    /// fresh variable allocator.
    pub fn child(&self) -> Builder {
        Builder {
            out: Rc::clone(&self.out),
            depth: self.depth,
            member_separator: false,
            vars: HashMap::new(),
        }
    }

    /// The accumulated output. The buffer is shared, so any scope
    /// serializes the whole generation pass.
    pub fn serialize(&self) -> String {
        self.out.borrow().clone()
    }

    /// Current indentation depth of this scope.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Append raw text to the buffer.
    pub fn write(&mut self, text: &str) {
        self.out.borrow_mut().push_str(text);
    }

    /// Append a bare newline.
    pub fn newline(&mut self) {
        self.write("\n");
    }

    /// Write one indented line. An empty string produces a blank line
    /// with no trailing indentation.
    pub fn line(&mut self, text: &str) {
        if text.is_empty() {
            self.newline();
            return;
        }
        for _ in 0..self.depth {
            self.write(INDENT_UNIT);
        }
        self.write(text);
        self.newline();
    }

    /// Run `body` one level deeper. The increment and decrement are
    /// strictly paired; generation has no recovery path, so an abort
    /// inside `body` aborts the whole pass (there is nothing to restore
    /// for).
    pub fn indent(&mut self, body: impl FnOnce(&mut Builder)) {
        self.depth += 1;
        body(self);
        self.depth -= 1;
    }

    /// Write `header`, run `body` one level deeper in a fresh child
    /// scope, then write `footer` back at this scope's depth. For
    /// declarations that open their own lexical block (methods, type
    /// bodies): locals allocated inside do not collide with siblings.
    pub fn scoped_block(&mut self, header: &str, footer: &str, body: impl FnOnce(&mut Builder)) {
        self.line(header);
        let mut scope = self.child();
        scope.indent(body);
        self.line(footer);
    }

    /// Write `header`, run `body` one level deeper in *this* scope, then
    /// write `footer`. For statement blocks (`if`, `loop`, `match` arms)
    /// inside one method: locals keep numbering from the method's
    /// allocator, so names never collide within the construct.
    pub fn stmt_block(&mut self, header: &str, footer: &str, body: impl FnOnce(&mut Builder)) {
        self.line(header);
        self.indent(body);
        self.line(footer);
    }

    /// Blank-line separation between sibling method-like members: nothing
    /// before the first member, exactly one blank line before each later
    /// one.
    pub fn separate_member(&mut self) {
        if self.member_separator {
            self.newline();
        } else {
            self.member_separator = true;
        }
    }

    /// Allocate the next numbered name for `base` in this scope:
    /// `address0`, `address1`, ... Numbering is per scope; unrelated
    /// scopes both start at 0.
    pub fn next_name(&mut self, base: &str) -> String {
        let counter = self.vars.entry(base.to_string()).or_insert(0);
        let name = format!("{base}{counter}");
        *counter += 1;
        name
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_applies_depth() {
        let mut b = Builder::new();
        b.line("a");
        b.indent(|b| {
            b.line("b");
            b.indent(|b| b.line("c"));
            b.line("d");
        });
        b.line("e");
        assert_eq!(b.serialize(), "a\n    b\n        c\n    d\ne\n");
    }

    #[test]
    fn test_indent_restores_depth() {
        let mut b = Builder::new();
        b.indent(|b| {
            b.indent(|_| {});
            assert_eq!(b.depth(), 1);
        });
        assert_eq!(b.depth(), 0);
    }

    #[test]
    fn test_scoped_block_writes_header_body_footer() {
        let mut b = Builder::new();
        b.scoped_block("start {", "}", |b| b.line("body"));
        assert_eq!(b.serialize(), "start {\n    body\n}\n");
    }

    #[test]
    fn test_stmt_block_shares_allocator() {
        let mut b = Builder::new();
        assert_eq!(b.next_name("address"), "address0");
        b.stmt_block("if x {", "}", |b| {
            assert_eq!(b.next_name("address"), "address1");
        });
        assert_eq!(b.next_name("address"), "address2");
    }

    #[test]
    fn test_child_scope_snapshots_depth() {
        let mut b = Builder::new();
        b.indent(|b| {
            let mut scope = b.child();
            assert_eq!(scope.depth(), 1);
            scope.line("inner");
        });
        assert_eq!(b.serialize(), "    inner\n");
    }

    #[test]
    fn test_next_name_increments_per_base() {
        let mut b = Builder::new();
        assert_eq!(b.next_name("address"), "address0");
        assert_eq!(b.next_name("address"), "address1");
        assert_eq!(b.next_name("index"), "index0");
        assert_eq!(b.next_name("address"), "address2");
    }

    #[test]
    fn test_sibling_scopes_do_not_share_allocators() {
        let b = Builder::new();
        let mut first = b.child();
        let mut second = b.child();
        assert_eq!(first.next_name("address"), "address0");
        assert_eq!(second.next_name("address"), "address0");
    }

    #[test]
    fn test_member_separator_skips_first() {
        let mut b = Builder::new();
        b.separate_member();
        b.line("fn one() {}");
        b.separate_member();
        b.line("fn two() {}");
        assert_eq!(b.serialize(), "fn one() {}\n\nfn two() {}\n");
    }
}
