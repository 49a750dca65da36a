//! Values produced by matchers and handed to route blocks.

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::Error;

/// A single captured value.
#[derive(Clone)]
pub enum Capture {
    /// A raw path segment or regex group.
    Str(String),
    /// Output of the built-in integer matcher.
    Int(i64),
    /// An optional regex group that did not participate in the match.
    None,
    /// Several values grouped by a converter.
    List(Vec<Capture>),
    /// Anything a custom converter produced.
    Value(Arc<dyn Any + Send + Sync>),
}

impl Capture {
    /// Wraps an arbitrary value produced by a custom converter.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Value(v) => v.downcast_ref(),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::None => f.write_str("None"),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl PartialEq for Capture {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::None, Self::None) => true,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Value(a), Self::Value(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for Capture {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Capture {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Capture {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Option<String>> for Capture {
    fn from(s: Option<String>) -> Self {
        s.map_or(Self::None, Self::Str)
    }
}

/// The captures of one successful `on`/`is` call, in matcher order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Captures(Vec<Capture>);

impl Captures {
    pub(crate) fn new(values: Vec<Capture>) -> Self {
        Self(values)
    }

    /// String capture at `index`.
    pub fn str(&self, index: usize) -> Result<&str, Error> {
        self.0
            .get(index)
            .and_then(Capture::as_str)
            .ok_or(Error::Capture { index, expected: "string" })
    }

    /// Integer capture at `index`.
    pub fn int(&self, index: usize) -> Result<i64, Error> {
        self.0
            .get(index)
            .and_then(Capture::as_int)
            .ok_or(Error::Capture { index, expected: "integer" })
    }

    /// Custom converter output at `index`.
    pub fn value<T: Any>(&self, index: usize) -> Result<&T, Error> {
        self.0
            .get(index)
            .and_then(Capture::downcast_ref::<T>)
            .ok_or(Error::Capture { index, expected: std::any::type_name::<T>() })
    }
}

impl Deref for Captures {
    type Target = [Capture];

    fn deref(&self) -> &[Capture] {
        &self.0
    }
}

impl IntoIterator for Captures {
    type Item = Capture;
    type IntoIter = std::vec::IntoIter<Capture>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
