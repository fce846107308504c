//! Conformance surface for the generated parsers.
//!
//! `build.rs` runs the Rust backend over a set of small grammars and
//! writes the emitted parsers into `OUT_DIR`; each module below mounts
//! one of them. The tests in `tests/` drive these parsers end to end,
//! so every conformance run exercises code the backend emitted during
//! this very build.

/// `digit <- [0-9]`
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod digit {
    include!(concat!(env!("OUT_DIR"), "/digit.rs"));
}

/// `root <- "ab"`
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod prefix {
    include!(concat!(env!("OUT_DIR"), "/prefix.rs"));
}

/// Bracketed list with labels, node types, choice and repetition.
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod list {
    include!(concat!(env!("OUT_DIR"), "/list.rs"));
}

/// Backtracking arithmetic exercising the packrat cache.
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod expr {
    include!(concat!(env!("OUT_DIR"), "/expr.rs"));
}

/// Positive and negative lookahead.
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod lookahead {
    include!(concat!(env!("OUT_DIR"), "/lookahead.rs"));
}

/// Case-insensitive literal, optional, negated class, any-char.
#[allow(dead_code, unused_assignments, unused_mut, unused_variables)]
pub mod misc {
    include!(concat!(env!("OUT_DIR"), "/misc.rs"));
}
