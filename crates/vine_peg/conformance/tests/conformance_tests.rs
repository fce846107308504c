//! End-to-end conformance tests against parsers the backend generated
//! during this build (see `build.rs`).

use vine_peg_conformance::{digit, expr, list, lookahead, misc, prefix};

// ---------------------------------------------------------------------
// digit <- [0-9]
// ---------------------------------------------------------------------

#[test]
fn test_digit_matches_single_digit() {
    let tree = digit::parse("5").unwrap();
    assert_eq!(tree.text, "5");
    assert_eq!(tree.offset, 0);
    assert!(tree.elements.is_empty());
    assert_eq!(tree.kind, digit::NodeKind::Generic);
}

#[test]
fn test_digit_failure_reports_class_expectation() {
    let err = digit::parse("a").unwrap_err();
    assert_eq!(err.offset, 0);
    assert_eq!(err.to_string(), "Line 1: expected [0-9]\na\n^");
}

#[test]
fn test_digit_rejects_empty_input() {
    let err = digit::parse("").unwrap_err();
    assert_eq!(err.offset, 0);
    assert_eq!(err.to_string(), "Line 1: expected [0-9]\n\n^");
}

#[test]
fn test_digit_rejects_trailing_input() {
    let err = digit::parse("55").unwrap_err();
    assert_eq!(err.offset, 1);
    assert_eq!(err.to_string(), "Line 1: expected <EOF>\n55\n ^");
}

// ---------------------------------------------------------------------
// root <- "ab"  (whole-input-consumption requirement)
// ---------------------------------------------------------------------

#[test]
fn test_prefix_match_must_consume_whole_input() {
    let tree = prefix::parse("ab").unwrap();
    assert_eq!(tree.text, "ab");

    let err = prefix::parse("abc").unwrap_err();
    assert_eq!(err.offset, 2);
    assert_eq!(err.to_string(), "Line 1: expected <EOF>\nabc\n  ^");
}

#[test]
fn test_prefix_failure_label_quotes_the_literal() {
    let err = prefix::parse("").unwrap_err();
    assert_eq!(err.to_string(), "Line 1: expected \"ab\"\n\n^");
}

// ---------------------------------------------------------------------
// Bracketed list: labels, node kinds, choice, repetition
// ---------------------------------------------------------------------

#[test]
fn test_list_builds_labelled_typed_tree() {
    let tree = list::parse("[1,a,22]").unwrap();
    assert_eq!(tree.kind, list::NodeKind::ListNode);
    assert_eq!(tree.text, "[1,a,22]");

    let elems = tree.get("elems").unwrap();
    assert_eq!(elems.text, "1,a,22");

    let first = &elems.elements[0];
    assert_eq!(first.kind, list::NodeKind::Number);
    assert_eq!(first.text, "1");

    let tail = &elems.elements[1];
    assert_eq!(tail.text, ",a,22");
    let word = &tail.elements[0].elements[1];
    assert_eq!(word.kind, list::NodeKind::Word);
    assert_eq!(word.text, "a");
    assert_eq!(word.offset, 3);
}

#[test]
fn test_list_node_text_is_the_exact_slice() {
    // The node's text spans the brackets even though no child covers them.
    let tree = list::parse("[22]").unwrap();
    assert_eq!(tree.text, "[22]");
    let number = &tree.get("elems").unwrap().elements[0];
    assert_eq!(number.text, "22");
    assert_eq!(number.elements.len(), 2);
}

#[test]
fn test_empty_list_gets_zero_width_optional() {
    let tree = list::parse("[]").unwrap();
    let elems = tree.get("elems").unwrap();
    assert_eq!(elems.text, "");
    assert_eq!(elems.kind, list::NodeKind::Generic);
}

#[test]
fn test_list_failure_unions_expectations_at_rightmost_offset() {
    // number and word both fail at offset 3; the earlier failure at
    // offset 2 is discarded, the tie at 3 accumulates both labels.
    let err = list::parse("[1,!]").unwrap_err();
    assert_eq!(err.offset, 3);
    assert_eq!(err.to_string(), "Line 1: expected [0-9], [a-z]\n[1,!]\n   ^");
}

// ---------------------------------------------------------------------
// Backtracking arithmetic: packrat cache behavior
// ---------------------------------------------------------------------

#[test]
fn test_expr_backtracks_through_cached_rule() {
    // The failed "+" alternative leaves term cached at offset 0; the
    // "-" alternative must get the cached node back with the offset
    // advanced exactly as the original computation advanced it.
    let tree = expr::parse("12-34").unwrap();
    assert_eq!(tree.text, "12-34");
    assert_eq!(tree.elements[0].text, "12");
    assert_eq!(tree.elements[1].text, "-");
    assert_eq!(tree.elements[2].text, "34");
}

#[test]
fn test_expr_first_alternative_still_wins() {
    let tree = expr::parse("12+34").unwrap();
    assert_eq!(tree.elements[1].text, "+");
}

#[test]
fn test_expr_failure_collects_every_expectation_at_the_tie() {
    // The term repetition, then both operators, fail at offset 2; all
    // three labels survive, in the order they were recorded.
    let err = expr::parse("12*34").unwrap_err();
    assert_eq!(err.offset, 2);
    assert_eq!(
        err.to_string(),
        "Line 1: expected [0-9], \"+\", \"-\"\n12*34\n  ^"
    );
}

#[test]
fn test_fresh_parser_instances_are_independent() {
    // Fresh instance => empty cache: a second parser over the same input
    // recomputes everything and lands on an identical tree.
    let mut first = expr::Parser::new("12-34");
    let one = first.parse().unwrap();
    let mut second = expr::Parser::new("12-34");
    let two = second.parse().unwrap();
    assert_eq!(one, two);
}

// ---------------------------------------------------------------------
// Lookahead
// ---------------------------------------------------------------------

#[test]
fn test_lookaheads_are_zero_width() {
    let tree = lookahead::parse("abc").unwrap();
    assert_eq!(tree.text, "abc");
    assert_eq!(tree.elements.len(), 3);
    assert_eq!(tree.elements[0].text, "");
    assert_eq!(tree.elements[1].text, "");
}

#[test]
fn test_negative_lookahead_rejects_guarded_word() {
    let err = lookahead::parse("end").unwrap_err();
    assert_eq!(err.to_string(), "Line 1: expected <EOF>\nend\n^");
}

#[test]
fn test_positive_lookahead_failure_is_reported() {
    let err = lookahead::parse("1ab").unwrap_err();
    assert_eq!(err.offset, 0);
    assert_eq!(err.to_string(), "Line 1: expected [a-z]\n1ab\n^");
}

// ---------------------------------------------------------------------
// Case-insensitive literal, optional, negated class, any-char
// ---------------------------------------------------------------------

#[test]
fn test_case_insensitive_literal_keeps_exact_text() {
    let tree = misc::parse("SELECT x").unwrap();
    assert_eq!(tree.text, "SELECT x");
    assert_eq!(tree.elements[0].text, "SELECT");
    assert_eq!(tree.get("rest").unwrap().text, "x");
}

#[test]
fn test_missing_rest_reports_both_expectations() {
    let err = misc::parse("select").unwrap_err();
    assert_eq!(err.offset, 6);
    assert_eq!(err.to_string(), "Line 1: expected \" \", [^ ]\nselect\n      ^");
}

#[test]
fn test_failure_on_second_line_points_at_column() {
    // The negated class eats the newline, so the rightmost failure sits
    // on line two.
    let err = misc::parse("SELECT \nx y").unwrap_err();
    assert_eq!(err.offset, 9);
    assert_eq!(err.to_string(), "Line 2: expected [^ ]\nx y\n ^");
}
