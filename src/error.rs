//! Unified error type.
//!
//! A non-matching route is not an error: it is an ordinary `false` inside the
//! matcher and the request falls through to the next sibling. This type covers
//! the three things that *are* failures:
//!
//! - configuration errors (a bad route declaration, surfaced at `freeze` or on
//!   first use),
//! - application errors raised from inside a route block,
//! - infrastructure failures in the bundled server.

use thiserror::Error;

/// A boxed error from application code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by arbor's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A matcher value the engine does not know how to apply.
    #[error("unsupported matcher: {0}")]
    UnsupportedMatcher(String),

    /// A class matcher was used (or referenced) before being registered.
    #[error("no class matcher registered for `{0}`")]
    UnknownClass(&'static str),

    /// A symbol matcher was used (or referenced) before being registered.
    #[error("no symbol matcher registered for `{0}`")]
    UnknownSymbol(String),

    /// `r.route(name)` for a name nothing was registered under.
    #[error("no named route `{name}` in namespace `{namespace}`")]
    UnknownRoute { name: String, namespace: String },

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Two registrations that cannot both hold.
    #[error("conflicting configuration: {0}")]
    Conflict(String),

    /// A block asked for a capture that is missing or of another type.
    #[error("capture {index}: expected {expected}")]
    Capture { index: usize, expected: &'static str },

    /// An error raised by application code inside a route block or hook.
    #[error(transparent)]
    Application(BoxError),

    #[error("invalid socket address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wraps an arbitrary error, unwrapping it again if it already is an
    /// [`Error`] so configuration errors keep their variant.
    pub fn application<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let boxed: BoxError = Box::new(err);
        match boxed.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Self::Application(other),
        }
    }

    /// Returns `true` for errors caused by route declarations rather than by
    /// a particular request.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMatcher(_)
                | Self::UnknownClass(_)
                | Self::UnknownSymbol(_)
                | Self::UnknownRoute { .. }
                | Self::InvalidPattern { .. }
                | Self::Conflict(_)
        )
    }
}

impl From<BoxError> for Error {
    fn from(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(other) => Self::Application(other),
        }
    }
}
