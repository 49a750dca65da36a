//! Class, symbol and hash-key matcher tables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::capture::Capture;
use crate::cursor::MAX_INTEGER_DIGITS;
use crate::error::Error;
use crate::request::Request;

use super::{ClassKey, Matcher, Pattern};

/// Turns raw regex captures into typed values. `None` rejects the match.
pub type Convert = Arc<dyn Fn(Vec<Capture>) -> Option<Vec<Capture>> + Send + Sync>;

/// Implements one key of a [`Matcher::Hash`], e.g. `host` or `method`.
pub type HashMatcherFn = Arc<dyn Fn(&mut Request, &Matcher) -> Result<bool, Error> + Send + Sync>;

/// What a new class or symbol matcher is defined in terms of.
#[derive(Clone, Debug)]
pub enum MatcherSource {
    /// A regex, anchored like [`Matcher::regex`].
    Pattern(String),
    /// A regex anchored without the leading `/`, see [`Pattern::raw`].
    Raw(String),
    /// A previously registered class matcher.
    Class(ClassKey),
    /// A previously registered symbol matcher.
    Symbol(String),
}

impl From<&str> for MatcherSource {
    fn from(s: &str) -> Self {
        Self::Pattern(s.to_owned())
    }
}

impl From<String> for MatcherSource {
    fn from(s: String) -> Self {
        Self::Pattern(s)
    }
}

/// Hand-rolled consume used instead of the regex when nothing was layered
/// on top of a built-in class.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FastPath {
    Integer,
    Segment,
}

#[derive(Clone)]
pub(crate) struct MatcherEntry {
    pub(crate) pattern: Arc<Pattern>,
    pub(crate) convert: Option<Convert>,
    pub(crate) fast: Option<FastPath>,
}

impl fmt::Debug for MatcherEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatcherEntry")
            .field("pattern", &self.pattern.source())
            .field("convert", &self.convert.is_some())
            .field("fast", &self.fast)
            .finish()
    }
}

/// Per-application matcher tables.
///
/// A child application's registry overlays its parent's: lookups fall back to
/// the parent, registrations only ever touch the child.
#[derive(Clone, Default)]
pub(crate) struct MatcherRegistry {
    classes: HashMap<ClassKey, MatcherEntry>,
    symbols: HashMap<String, MatcherEntry>,
    hash: HashMap<String, HashMatcherFn>,
    parent: Option<Arc<MatcherRegistry>>,
}

impl MatcherRegistry {
    /// A registry with the `String` and `i64` classes and the core hash keys.
    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.classes.insert(ClassKey::of::<i64>(), integer_entry());
        registry.classes.insert(ClassKey::of::<String>(), segment_entry());
        crate::dispatch::register_core_hash_matchers(&mut registry);
        registry
    }

    pub(crate) fn inherit(parent: Arc<MatcherRegistry>) -> Self {
        Self { parent: Some(parent), ..Self::default() }
    }

    pub(crate) fn class(&self, key: &ClassKey) -> Option<&MatcherEntry> {
        self.classes
            .get(key)
            .or_else(|| self.parent.as_deref().and_then(|p| p.class(key)))
    }

    pub(crate) fn symbol(&self, name: &str) -> Option<&MatcherEntry> {
        self.symbols
            .get(name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.symbol(name)))
    }

    pub(crate) fn hash_matcher(&self, key: &str) -> Option<&HashMatcherFn> {
        self.hash
            .get(key)
            .or_else(|| self.parent.as_deref().and_then(|p| p.hash_matcher(key)))
    }

    pub(crate) fn add_class(
        &mut self,
        key: ClassKey,
        source: MatcherSource,
        convert: Option<Convert>,
    ) -> Result<(), Error> {
        let entry = self.resolve(source, convert)?;
        self.classes.insert(key, entry);
        Ok(())
    }

    pub(crate) fn add_symbol(
        &mut self,
        name: String,
        source: MatcherSource,
        convert: Option<Convert>,
    ) -> Result<(), Error> {
        let entry = self.resolve(source, convert)?;
        self.symbols.insert(name, entry);
        Ok(())
    }

    pub(crate) fn add_hash_matcher(&mut self, key: String, f: HashMatcherFn) {
        self.hash.insert(key, f);
    }

    /// References are resolved now, so the definitions form a DAG: nothing
    /// can point at a matcher that does not exist yet.
    fn resolve(&self, source: MatcherSource, convert: Option<Convert>) -> Result<MatcherEntry, Error> {
        let base = match source {
            MatcherSource::Pattern(src) => MatcherEntry {
                pattern: Arc::new(Pattern::segment(&src)?),
                convert: None,
                fast: None,
            },
            MatcherSource::Raw(src) => MatcherEntry {
                pattern: Arc::new(Pattern::raw(&src)?),
                convert: None,
                fast: None,
            },
            MatcherSource::Class(key) => {
                self.class(&key).cloned().ok_or(Error::UnknownClass(key.name()))?
            }
            MatcherSource::Symbol(name) => match self.symbol(&name) {
                Some(entry) => entry.clone(),
                None => return Err(Error::UnknownSymbol(name)),
            },
        };
        Ok(match convert {
            None => base,
            Some(outer) => MatcherEntry {
                pattern: base.pattern,
                convert: Some(chain(base.convert, outer)),
                fast: None,
            },
        })
    }
}

fn chain(inner: Option<Convert>, outer: Convert) -> Convert {
    match inner {
        None => outer,
        Some(inner) => Arc::new(move |caps: Vec<Capture>| inner(caps).and_then(|caps| outer(caps))),
    }
}

fn integer_entry() -> MatcherEntry {
    let pattern = Pattern::segment(&format!(r"(\d{{1,{MAX_INTEGER_DIGITS}}})"))
        .map(Arc::new)
        .unwrap_or_else(|e| unreachable!("builtin integer pattern: {e}"));
    let convert: Convert = Arc::new(|caps: Vec<Capture>| match caps.first() {
        Some(Capture::Str(s)) => s.parse::<i64>().ok().map(|n| vec![Capture::Int(n)]),
        _ => None,
    });
    MatcherEntry { pattern, convert: Some(convert), fast: Some(FastPath::Integer) }
}

fn segment_entry() -> MatcherEntry {
    let pattern = Pattern::segment("([^/]+)")
        .map(Arc::new)
        .unwrap_or_else(|e| unreachable!("builtin segment pattern: {e}"));
    MatcherEntry { pattern, convert: None, fast: Some(FastPath::Segment) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double() -> Convert {
        Arc::new(|caps: Vec<Capture>| match caps.first() {
            Some(Capture::Int(n)) => n.checked_mul(2).map(|n| vec![Capture::Int(n)]),
            _ => None,
        })
    }

    #[test]
    fn builtins_are_present() {
        let r = MatcherRegistry::with_builtins();
        assert_eq!(r.class(&ClassKey::of::<i64>()).unwrap().fast, Some(FastPath::Integer));
        assert_eq!(r.class(&ClassKey::of::<String>()).unwrap().fast, Some(FastPath::Segment));
        assert!(r.hash_matcher("method").is_some());
        assert!(r.hash_matcher("nope").is_none());
    }

    #[test]
    fn symbol_from_class_keeps_fast_path_without_converter() {
        let mut r = MatcherRegistry::with_builtins();
        r.add_symbol("id".into(), MatcherSource::Class(ClassKey::of::<i64>()), None).unwrap();
        assert_eq!(r.symbol("id").unwrap().fast, Some(FastPath::Integer));
    }

    #[test]
    fn composed_converters_short_circuit() {
        let mut r = MatcherRegistry::with_builtins();
        r.add_symbol("twice".into(), MatcherSource::Class(ClassKey::of::<i64>()), Some(double()))
            .unwrap();
        let entry = r.symbol("twice").unwrap();
        assert_eq!(entry.fast, None);
        let convert = entry.convert.clone().unwrap();
        assert_eq!(convert(vec![Capture::from("21")]), Some(vec![Capture::Int(42)]));
        assert_eq!(convert(vec![Capture::from("x")]), None);
    }

    #[test]
    fn unknown_references_are_config_errors() {
        let mut r = MatcherRegistry::with_builtins();
        let err = r.add_symbol("x".into(), MatcherSource::Symbol("missing".into()), None);
        assert!(matches!(err, Err(Error::UnknownSymbol(ref s)) if s == "missing"));
        let err = r.add_class(ClassKey::of::<u8>(), MatcherSource::Class(ClassKey::of::<u16>()), None);
        assert!(matches!(err, Err(Error::UnknownClass("u16"))));
    }

    #[test]
    fn child_overlays_parent() {
        let mut parent = MatcherRegistry::with_builtins();
        parent.add_symbol("w".into(), r"(\w+)".into(), None).unwrap();
        let parent = Arc::new(parent);

        let mut child = MatcherRegistry::inherit(Arc::clone(&parent));
        assert!(child.symbol("w").is_some());
        child.add_symbol("w".into(), r"([a-z]+)".into(), None).unwrap();
        assert_eq!(child.symbol("w").unwrap().pattern.source(), "([a-z]+)");
        assert_eq!(parent.symbol("w").unwrap().pattern.source(), r"(\w+)");
    }
}
