//! The consumed/remaining split of the request path.
//!
//! The full path is never modified; the cursor only moves an offset forward
//! and appends captures. That makes a snapshot two integers and a rollback a
//! truncate.

use crate::capture::Capture;
use crate::matcher::{Convert, Pattern};

/// Maximum number of digits the integer matcher accepts.
pub const MAX_INTEGER_DIGITS: usize = 100;

/// Saved cursor state, see [`PathCursor::restore`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Snapshot {
    offset: usize,
    captures: usize,
}

/// Remaining path plus the captures accumulated by the current match chain.
///
/// The remaining path always starts with `/` or is empty.
#[derive(Debug)]
pub struct PathCursor {
    path: String,
    offset: usize,
    captures: Vec<Capture>,
}

impl PathCursor {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), offset: 0, captures: Vec::new() }
    }

    /// The full path the request started with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn remaining(&self) -> &str {
        &self.path[self.offset..]
    }

    /// The consumed prefix; the default namespace for the hash tables.
    pub fn matched(&self) -> &str {
        &self.path[..self.offset]
    }

    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot { offset: self.offset, captures: self.captures.len() }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.offset = snapshot.offset;
        self.captures.truncate(snapshot.captures);
    }

    pub fn push(&mut self, capture: Capture) {
        self.captures.push(capture);
    }

    /// Removes and returns every capture pushed since `snapshot`.
    pub fn take_since(&mut self, snapshot: Snapshot) -> Vec<Capture> {
        self.captures.split_off(snapshot.captures.min(self.captures.len()))
    }

    /// Exact segment match without a regex: `/` + `literal`, then `/` or end.
    pub fn consume_literal(&mut self, literal: &str) -> bool {
        let rest = self.remaining();
        let Some(after) = rest.strip_prefix('/').and_then(|r| r.strip_prefix(literal)) else {
            return false;
        };
        if !(after.is_empty() || after.starts_with('/')) {
            return false;
        }
        self.offset += 1 + literal.len();
        true
    }

    /// One non-empty segment, captured as a string.
    pub fn consume_segment(&mut self) -> bool {
        let Some(rest) = self.remaining().strip_prefix('/') else {
            return false;
        };
        let len = rest.find('/').unwrap_or(rest.len());
        if len == 0 {
            return false;
        }
        let segment = rest[..len].to_owned();
        self.offset += 1 + len;
        self.captures.push(Capture::Str(segment));
        true
    }

    /// `/` followed by 1 to 100 digits up to a boundary, captured as `i64`.
    /// Values that overflow `i64` are rejected like a non-match.
    pub fn consume_integer(&mut self) -> bool {
        let Some(rest) = self.remaining().strip_prefix('/') else {
            return false;
        };
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        if len == 0 || len > MAX_INTEGER_DIGITS {
            return false;
        }
        if !(rest.len() == len || rest.as_bytes()[len] == b'/') {
            return false;
        }
        let Ok(value) = rest[..len].parse::<i64>() else {
            return false;
        };
        self.offset += 1 + len;
        self.captures.push(Capture::Int(value));
        true
    }

    /// Anchored regex consume. A converter returning `None` counts as a
    /// non-match: nothing is consumed and nothing is captured.
    pub fn try_consume_segment(&mut self, pattern: &Pattern, convert: Option<&Convert>) -> bool {
        let Some((len, raw)) = pattern.find(self.remaining()) else {
            return false;
        };
        let values = match convert {
            Some(convert) => match convert(raw) {
                Some(values) => values,
                None => return false,
            },
            None => raw,
        };
        self.offset += len;
        self.captures.extend(values);
        true
    }

    /// Like [`try_consume_segment`](Self::try_consume_segment) but the match
    /// must use up the whole remaining path.
    pub fn try_consume_whole(&mut self, pattern: &Pattern, convert: Option<&Convert>) -> bool {
        let snapshot = self.snapshot();
        if self.try_consume_segment(pattern, convert) && self.remaining().is_empty() {
            return true;
        }
        self.restore(snapshot);
        false
    }

    /// Consumes `len` bytes. Callers guarantee the new position is a segment
    /// boundary.
    pub(crate) fn advance(&mut self, len: usize) {
        self.offset = (self.offset + len).min(self.path.len());
    }

    pub(crate) fn consume_rest(&mut self) {
        self.offset = self.path.len();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn literal_respects_boundaries() {
        let mut c = PathCursor::new("/users/42");
        assert!(!c.consume_literal("use"));
        assert!(c.consume_literal("users"));
        assert_eq!(c.remaining(), "/42");
        assert_eq!(c.matched(), "/users");
        assert!(!c.consume_literal("4"));
    }

    #[test]
    fn literal_may_span_segments() {
        let mut c = PathCursor::new("/a/b/c");
        assert!(c.consume_literal("a/b"));
        assert_eq!(c.remaining(), "/c");
    }

    #[test]
    fn integer_rejects_non_digits_and_overflow() {
        let mut c = PathCursor::new("/abc");
        assert!(!c.consume_integer());

        let mut c = PathCursor::new("/12x");
        assert!(!c.consume_integer());
        assert_eq!(c.remaining(), "/12x");

        let mut c = PathCursor::new("/99999999999999999999");
        assert!(!c.consume_integer());
        assert!(c.captures().is_empty());

        let long = format!("/{}", "1".repeat(101));
        assert!(!PathCursor::new(long).consume_integer());

        let mut c = PathCursor::new("/42/x");
        assert!(c.consume_integer());
        assert_eq!(c.captures(), &[Capture::Int(42)]);
        assert_eq!(c.remaining(), "/x");
    }

    #[test]
    fn segment_must_be_non_empty() {
        assert!(!PathCursor::new("//x").consume_segment());
        assert!(!PathCursor::new("").consume_segment());
        let mut c = PathCursor::new("/x/y");
        assert!(c.consume_segment());
        assert_eq!(c.captures(), &[Capture::from("x")]);
    }

    #[test]
    fn rejecting_converter_rolls_back() {
        let p = Pattern::segment(r"(\d+)").unwrap();
        let reject: Convert = Arc::new(|_: Vec<Capture>| -> Option<Vec<Capture>> { None });
        let mut c = PathCursor::new("/7/more");
        assert!(!c.try_consume_segment(&p, Some(&reject)));
        assert_eq!(c.remaining(), "/7/more");
        assert!(c.captures().is_empty());
    }

    #[test]
    fn whole_requires_empty_remainder() {
        let p = Pattern::segment(r"(\d+)").unwrap();
        let mut c = PathCursor::new("/7/more");
        assert!(!c.try_consume_whole(&p, None));
        assert_eq!(c.remaining(), "/7/more");
        assert!(c.captures().is_empty());

        let mut c = PathCursor::new("/7");
        assert!(c.try_consume_whole(&p, None));
        assert_eq!(c.remaining(), "");
    }

    #[test]
    fn restore_truncates_captures() {
        let mut c = PathCursor::new("/a/b");
        let snap = c.snapshot();
        assert!(c.consume_segment());
        assert!(c.consume_segment());
        c.restore(snap);
        assert_eq!(c.remaining(), "/a/b");
        assert!(c.captures().is_empty());
    }
}
