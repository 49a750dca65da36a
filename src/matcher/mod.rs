//! Matcher values and the registry that gives them meaning.
//!
//! Every argument to `on`/`is`/`get`/... is a [`Matcher`]. Most of them are
//! written with plain Rust values:
//!
//! | value | matches |
//! |---|---|
//! | `"users"` | the literal segment `/users` |
//! | [`Matcher::integer()`] | one all-digit segment, captured as `i64` |
//! | [`Matcher::segment()`] | any one segment, captured as a string |
//! | [`Matcher::regex`] | an anchored regex; its groups are captured |
//! | `true` / `false` | always / never, consuming nothing |
//! | [`Matcher::any`] | the first element that matches |
//! | [`Matcher::hash`] | every named condition (`host`, `method`, ...) |
//! | [`Matcher::predicate`] | a closure over the request |

mod pattern;
mod registry;

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::Error;
use crate::request::Request;

pub use pattern::Pattern;
pub(crate) use pattern::PatternCache;
pub use registry::{Convert, HashMatcherFn, MatcherSource};
pub(crate) use registry::{FastPath, MatcherEntry, MatcherRegistry};

/// Identifies a class matcher by Rust type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ClassKey {
    id: TypeId,
    name: &'static str,
}

impl ClassKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: type_name::<T>() }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A request predicate used as a matcher.
pub type Predicate = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// One matcher argument.
#[derive(Clone)]
pub enum Matcher {
    Str(Cow<'static, str>),
    Class(ClassKey),
    Symbol(Cow<'static, str>),
    Regex(Cow<'static, str>),
    /// A pattern compiled ahead of time; skips the per-application cache.
    Compiled(Arc<Pattern>),
    Bool(bool),
    Any(Vec<Matcher>),
    Hash(Vec<(Cow<'static, str>, Matcher)>),
    Predicate(Predicate),
}

impl Matcher {
    /// The built-in integer class matcher.
    pub fn integer() -> Self {
        Self::Class(ClassKey::of::<i64>())
    }

    /// The built-in string class matcher: any one non-empty segment.
    pub fn segment() -> Self {
        Self::Class(ClassKey::of::<String>())
    }

    pub fn class<T: ?Sized + 'static>() -> Self {
        Self::Class(ClassKey::of::<T>())
    }

    pub fn symbol(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Symbol(name.into())
    }

    /// A segment regex compiled on first use and memoized per application.
    ///
    /// The memo sits behind a lock shared by every request. Hot routes can
    /// build the matcher once with [`compiled`](Self::compiled) and clone it
    /// into the block, which never touches the lock.
    pub fn regex(source: impl Into<Cow<'static, str>>) -> Self {
        Self::Regex(source.into())
    }

    /// Compiles `source` now instead of on first use. Matching a compiled
    /// pattern takes no lock.
    pub fn compiled(source: &str) -> Result<Self, Error> {
        Ok(Self::Compiled(Arc::new(Pattern::segment(source)?)))
    }

    pub fn any<I, M>(matchers: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Matcher>,
    {
        Self::Any(matchers.into_iter().map(Into::into).collect())
    }

    pub fn hash<I, K, M>(conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<Cow<'static, str>>,
        M: Into<Matcher>,
    {
        Self::Hash(conditions.into_iter().map(|(k, m)| (k.into(), m.into())).collect())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Class(_) => "class",
            Self::Symbol(_) => "symbol",
            Self::Regex(_) | Self::Compiled(_) => "regexp",
            Self::Bool(_) => "boolean",
            Self::Any(_) => "array",
            Self::Hash(_) => "hash",
            Self::Predicate(_) => "predicate",
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Class(k) => write!(f, "class({})", k.name),
            Self::Symbol(s) => write!(f, ":{s}"),
            Self::Regex(s) => write!(f, "/{s}/"),
            Self::Compiled(p) => write!(f, "/{}/", p.source()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Any(list) => f.debug_list().entries(list).finish(),
            Self::Hash(pairs) => f.debug_map().entries(pairs.iter().map(|(k, v)| (k, v))).finish(),
            Self::Predicate(_) => f.write_str("predicate"),
        }
    }
}

impl From<&'static str> for Matcher {
    fn from(s: &'static str) -> Self {
        Self::Str(Cow::Borrowed(s))
    }
}

impl From<String> for Matcher {
    fn from(s: String) -> Self {
        Self::Str(Cow::Owned(s))
    }
}

impl From<bool> for Matcher {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Regex> for Matcher {
    fn from(re: Regex) -> Self {
        Self::Regex(Cow::Owned(re.as_str().to_owned()))
    }
}

impl From<Pattern> for Matcher {
    fn from(p: Pattern) -> Self {
        Self::Compiled(Arc::new(p))
    }
}

/// An ordered argument list for `on`/`is`/verb calls.
///
/// Implemented for single matcher values, tuples of them, arrays and `()`.
pub trait Matchers {
    fn into_matchers(self) -> Vec<Matcher>;
}

impl Matchers for () {
    fn into_matchers(self) -> Vec<Matcher> {
        Vec::new()
    }
}

impl Matchers for Vec<Matcher> {
    fn into_matchers(self) -> Vec<Matcher> {
        self
    }
}

impl<const N: usize> Matchers for [Matcher; N] {
    fn into_matchers(self) -> Vec<Matcher> {
        self.into()
    }
}

macro_rules! single_matchers {
    ($($ty:ty),*) => {
        $(
            impl Matchers for $ty {
                fn into_matchers(self) -> Vec<Matcher> {
                    vec![self.into()]
                }
            }
        )*
    };
}

single_matchers!(Matcher, &'static str, String, bool, Regex, Pattern);

macro_rules! tuple_matchers {
    ($($name:ident),+) => {
        impl<$($name: Into<Matcher>),+> Matchers for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_matchers(self) -> Vec<Matcher> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_matchers!(A);
tuple_matchers!(A, B);
tuple_matchers!(A, B, C);
tuple_matchers!(A, B, C, D);
tuple_matchers!(A, B, C, D, E);
tuple_matchers!(A, B, C, D, E, F);
