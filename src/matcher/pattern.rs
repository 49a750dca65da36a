//! Anchored segment patterns and the per-application compilation cache.
//!
//! A user pattern `P` is compiled to `\A/(?:P)(/|\z)`. The `regex` crate has
//! no lookahead, so the trailing boundary group is matched for real and the
//! consumed length is taken from where that group *starts*: a path is only
//! ever consumed up to (not including) the next `/`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;

use crate::capture::Capture;
use crate::error::Error;

/// A compiled, path-anchored matcher pattern.
#[derive(Debug)]
pub struct Pattern {
    source: String,
    regex: Regex,
    groups: usize,
}

impl Pattern {
    /// Compiles `source` so that it must match right after a leading `/` and
    /// end at a segment boundary.
    pub fn segment(source: &str) -> Result<Self, Error> {
        Self::compile(source, format!(r"\A/(?:{source})(/|\z)"))
    }

    /// Like [`segment`](Self::segment) without the leading `/`: the pattern
    /// itself decides whether a slash is consumed, so it may match nothing.
    pub fn raw(source: &str) -> Result<Self, Error> {
        Self::compile(source, format!(r"\A(?:{source})(/|\z)"))
    }

    fn compile(source: &str, anchored: String) -> Result<Self, Error> {
        let regex = Regex::new(&anchored).map_err(|e| Error::InvalidPattern {
            pattern: source.to_owned(),
            source: e,
        })?;
        // group 0 and the boundary group are ours
        let groups = regex.captures_len() - 2;
        Ok(Self { source: source.to_owned(), regex, groups })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of capture groups in the user's pattern.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Matches against the remaining path, returning the consumed length and
    /// the raw group captures.
    pub(crate) fn find(&self, remaining: &str) -> Option<(usize, Vec<Capture>)> {
        let caps = self.regex.captures(remaining)?;
        let end = caps.get(self.groups + 1)?.start();
        let values = (1..=self.groups)
            .map(|i| caps.get(i).map_or(Capture::None, |m| Capture::Str(m.as_str().to_owned())))
            .collect();
        Some((end, values))
    }
}

/// Memoizes regex compilation for the lifetime of an application.
///
/// Route blocks run once per request, so a `Matcher::regex("...")` written
/// inline would otherwise be compiled on every hit.
#[derive(Debug, Default)]
pub(crate) struct PatternCache {
    segments: RwLock<HashMap<String, Arc<Pattern>>>,
    plain: RwLock<HashMap<String, Arc<Regex>>>,
}

impl PatternCache {
    pub(crate) fn segment(&self, source: &str) -> Result<Arc<Pattern>, Error> {
        if let Some(p) = self.segments.read().get(source) {
            return Ok(Arc::clone(p));
        }
        let pattern = Arc::new(Pattern::segment(source)?);
        self.segments
            .write()
            .entry(source.to_owned())
            .or_insert_with(|| Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Unanchored regexes used against header values.
    pub(crate) fn plain(&self, source: &str) -> Result<Arc<Regex>, Error> {
        if let Some(r) = self.plain.read().get(source) {
            return Ok(Arc::clone(r));
        }
        let regex = Regex::new(source).map_err(|e| Error::InvalidPattern {
            pattern: source.to_owned(),
            source: e,
        })?;
        let regex = Arc::new(regex);
        self.plain
            .write()
            .entry(source.to_owned())
            .or_insert_with(|| Arc::clone(&regex));
        Ok(regex)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.segments.read().len() + self.plain.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_before_the_next_slash() {
        let p = Pattern::segment(r"(\d+)").unwrap();
        assert_eq!(p.groups(), 1);
        let (len, caps) = p.find("/12/rest").unwrap();
        assert_eq!(len, 3);
        assert_eq!(caps, vec![Capture::from("12")]);
    }

    #[test]
    fn requires_a_boundary() {
        let p = Pattern::segment(r"(\d+)").unwrap();
        assert!(p.find("/12a").is_none());
        assert!(p.find("12").is_none());
        assert_eq!(p.find("/12").unwrap().0, 3);
    }

    #[test]
    fn lazy_patterns_extend_to_the_boundary() {
        let p = Pattern::segment(r"(.*?)").unwrap();
        let (len, caps) = p.find("/abc/def").unwrap();
        assert_eq!(len, 4);
        assert_eq!(caps, vec![Capture::from("abc")]);
    }

    #[test]
    fn optional_groups_capture_none() {
        let p = Pattern::segment(r"foo(?:\.(\w+))?").unwrap();
        assert_eq!(p.find("/foo").unwrap().1, vec![Capture::None]);
        assert_eq!(p.find("/foo.json").unwrap().1, vec![Capture::from("json")]);
    }

    #[test]
    fn raw_patterns_may_match_empty() {
        let p = Pattern::raw(r"(?:/([^/]+))?").unwrap();
        assert_eq!(p.find("").unwrap(), (0, vec![Capture::None]));
        assert_eq!(p.find("/x/y").unwrap(), (2, vec![Capture::from("x")]));
    }

    #[test]
    fn cache_compiles_once() {
        let cache = PatternCache::default();
        let a = cache.segment("(a)").unwrap();
        let b = cache.segment("(a)").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.segment("("), Err(Error::InvalidPattern { .. })));
    }
}
