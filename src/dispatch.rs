//! The routing tree: `on`, `is`, the verb methods and the matching engine
//! behind them.
//!
//! A route block receives the [`Request`] and returns a [`RouteResult`]:
//!
//! - `Ok(())` from a matcher call means "did not match, try the next
//!   sibling";
//! - `Err(Halt::Respond(..))` means a branch matched and produced the final
//!   response. `?` carries it straight up to [`App::call`](crate::App::call),
//!   skipping every remaining sibling and enclosing frame;
//! - `Err(Halt::Fail(..))` is an error, raised with `?` from anything that
//!   implements [`std::error::Error`].
//!
//! ```rust
//! use arbor::{App, Matcher, RequestHead};
//!
//! let app = App::builder()
//!     .route(|r| {
//!         r.on("users", |r, _| {
//!             r.is(Matcher::integer(), |_, caps| Ok(format!("user {}", caps.int(0)?)))?;
//!             r.is((), |_, _| Ok("all users"))
//!         })
//!     })
//!     .freeze()
//!     .unwrap();
//!
//! let res = app.call(RequestHead::get("/users/42")).unwrap();
//! assert_eq!(res.body_string(), "user 42");
//! ```

use std::sync::Arc;

use http::header::LOCATION;
use http::{Method, StatusCode};
use tracing::debug;

use crate::app::AppShared;
use crate::capture::{Capture, Captures};
use crate::error::Error;
use crate::matcher::{FastPath, HashMatcherFn, Matcher, MatcherEntry, MatcherRegistry, Matchers};
use crate::request::Request;
use crate::response::{IntoReply, Reply, Response};

// ── Halt ──────────────────────────────────────────────────────────────────────

/// Why routing stopped early.
#[derive(Debug)]
pub enum Halt {
    /// A branch committed; this is the finished response.
    Respond(Response),
    /// Routing failed with an error.
    Fail(Error),
}

/// What route blocks, matcher calls and hooks return.
pub type RouteResult<T = ()> = Result<T, Halt>;

impl<E> From<E> for Halt
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::Fail(Error::application(err))
    }
}

/// A stored route block.
pub type RouteFn = Arc<dyn Fn(&mut Request) -> RouteResult<Reply> + Send + Sync>;

pub(crate) fn route_fn<F, R>(f: F) -> RouteFn
where
    F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
    R: IntoReply + 'static,
{
    Arc::new(move |r: &mut Request| -> RouteResult<Reply> { f(r).map(IntoReply::into_reply) })
}

// ── Routing methods ───────────────────────────────────────────────────────────

impl Request {
    /// Branch: if every matcher matches, `block` runs with their captures and
    /// routing is committed, whatever the block returns.
    ///
    /// With no matchers (`()`), always matches.
    pub fn on<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.if_match(matchers.into_matchers(), false, block)
    }

    /// Terminal branch: like [`on`](Self::on), but the matchers must also
    /// consume the whole remaining path.
    ///
    /// With no matchers, matches only when nothing remains.
    pub fn is<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.if_match(matchers.into_matchers(), true, block)
    }

    /// Method-restricted match. Without matchers it behaves like `on` once
    /// the method matches; with matchers it is terminal like `is`.
    pub fn verb<M, F, R>(&mut self, method: Method, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        let accepted = if method == Method::GET { self.is_get() } else { *self.method() == method };
        if !accepted {
            return Ok(());
        }
        let matchers = matchers.into_matchers();
        if matchers.is_empty() {
            return self.always(|r| block(r, Captures::new(Vec::new())));
        }
        self.if_match(matchers, true, block)
    }

    pub fn get<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::GET, matchers, block)
    }

    pub fn post<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::POST, matchers, block)
    }

    pub fn put<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::PUT, matchers, block)
    }

    pub fn patch<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::PATCH, matchers, block)
    }

    pub fn delete<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::DELETE, matchers, block)
    }

    pub fn head<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::HEAD, matchers, block)
    }

    pub fn options<M, F, R>(&mut self, matchers: M, block: F) -> RouteResult
    where
        M: Matchers,
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        self.verb(Method::OPTIONS, matchers, block)
    }

    /// `GET /` relative to the current branch.
    pub fn root<F, R>(&mut self, block: F) -> RouteResult
    where
        F: FnOnce(&mut Request) -> RouteResult<R>,
        R: IntoReply,
    {
        if self.is_get() && self.cursor.remaining() == "/" {
            return self.always(block);
        }
        Ok(())
    }

    /// Stops routing now with the current response plus `reply`.
    ///
    /// ```rust,ignore
    /// if r.header("authorization").is_none() {
    ///     return r.halt(StatusCode::UNAUTHORIZED);
    /// }
    /// ```
    pub fn halt<R: IntoReply, T>(&mut self, reply: R) -> RouteResult<T> {
        self.block_result(reply.into_reply());
        Err(Halt::Respond(self.finish_response()))
    }

    /// Halts with a `302 Found` redirect.
    pub fn redirect<T>(&mut self, location: &str) -> RouteResult<T> {
        self.redirect_with(location, StatusCode::FOUND)
    }

    pub fn redirect_with<T>(&mut self, location: &str, status: StatusCode) -> RouteResult<T> {
        self.response.set_header(LOCATION, location);
        self.response.set_status(status);
        self.halt(())
    }

    // ── Commit ────────────────────────────────────────────────────────────────

    /// Runs `block` and halts with the response, committing the branch.
    pub(crate) fn always<F, R>(&mut self, block: F) -> RouteResult
    where
        F: FnOnce(&mut Request) -> RouteResult<R>,
        R: IntoReply,
    {
        let reply = block(self)?.into_reply();
        self.halt(reply)
    }

    /// Applies a block's reply: a body is written only into an empty
    /// response, a full response replaces the current one.
    pub(crate) fn block_result(&mut self, reply: Reply) {
        match reply {
            Reply::Empty => {}
            Reply::Body(body) => {
                if self.response.is_empty() {
                    self.response.write(body);
                }
            }
            Reply::Full(response) => self.response = response,
        }
    }

    pub(crate) fn finish_response(&mut self) -> Response {
        let mut response = self.reset_response();
        response.finish();
        response
    }

    // ── Matching ──────────────────────────────────────────────────────────────

    fn if_match<F, R>(&mut self, matchers: Vec<Matcher>, terminal: bool, block: F) -> RouteResult
    where
        F: FnOnce(&mut Request, Captures) -> RouteResult<R>,
        R: IntoReply,
    {
        let app = Arc::clone(&self.app);
        let snapshot = self.cursor.snapshot();
        let base = self.cursor.captures().len();
        let marks = self.symbol_marks.len();

        let matched = self.match_all(&app, &matchers, terminal);
        if !matches!(matched, Ok(true)) {
            self.cursor.restore(snapshot);
            self.symbol_marks.truncate(marks);
            matched?;
            return Ok(());
        }

        let captures = self.cursor.take_since(snapshot);
        let marks = self.symbol_marks.split_off(marks);
        if app.options.params_capturing {
            let named = marks
                .into_iter()
                .filter_map(|(name, start, end)| {
                    let values = captures.get(start - base..end - base)?;
                    match values {
                        [] => None,
                        [one] => Some((name, one.clone())),
                        many => Some((name, Capture::List(many.to_vec()))),
                    }
                })
                .collect();
            self.record_params(named, &captures);
        }
        debug!(matched = self.cursor.matched(), captures = captures.len(), "branch committed");
        self.always(move |r| block(r, Captures::new(captures)))
    }

    fn match_all(&mut self, app: &AppShared, matchers: &[Matcher], terminal: bool) -> Result<bool, Error> {
        for m in matchers {
            if !self.match_one(app, m)? {
                return Ok(false);
            }
        }
        Ok(!terminal || self.cursor.remaining().is_empty())
    }

    /// Applies one matcher. On `false` the caller rolls back; partial
    /// progress is never observed.
    pub(crate) fn match_one(&mut self, app: &AppShared, m: &Matcher) -> Result<bool, Error> {
        match m {
            Matcher::Str(s) => Ok(self.cursor.consume_literal(s)),
            Matcher::Class(key) => {
                let entry = app.matchers.class(key).ok_or(Error::UnknownClass(key.name()))?;
                Ok(self.consume_entry(entry))
            }
            Matcher::Symbol(name) => {
                let entry = app
                    .matchers
                    .symbol(name)
                    .ok_or_else(|| Error::UnknownSymbol(name.to_string()))?;
                let start = self.cursor.captures().len();
                if !self.consume_entry(entry) {
                    return Ok(false);
                }
                let end = self.cursor.captures().len();
                self.symbol_marks.push((name.to_string(), start, end));
                Ok(true)
            }
            Matcher::Regex(src) => {
                let pattern = app.patterns.segment(src)?;
                Ok(self.cursor.try_consume_segment(&pattern, None))
            }
            Matcher::Compiled(pattern) => Ok(self.cursor.try_consume_segment(pattern, None)),
            Matcher::Bool(b) => Ok(*b),
            Matcher::Any(list) => {
                for element in list {
                    let snapshot = self.cursor.snapshot();
                    let marks = self.symbol_marks.len();
                    if self.match_one(app, element)? {
                        if let Matcher::Str(s) = element {
                            self.cursor.push(Capture::Str(s.to_string()));
                        }
                        return Ok(true);
                    }
                    self.cursor.restore(snapshot);
                    self.symbol_marks.truncate(marks);
                }
                Ok(false)
            }
            Matcher::Hash(pairs) => {
                for (key, value) in pairs {
                    let f: HashMatcherFn = app
                        .matchers
                        .hash_matcher(key)
                        .cloned()
                        .ok_or_else(|| Error::UnsupportedMatcher(format!("hash key `{key}`")))?;
                    if !f(self, value)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Matcher::Predicate(p) => Ok(p(self)),
        }
    }

    fn consume_entry(&mut self, entry: &MatcherEntry) -> bool {
        match entry.fast {
            Some(FastPath::Integer) => self.cursor.consume_integer(),
            Some(FastPath::Segment) => self.cursor.consume_segment(),
            None => self.cursor.try_consume_segment(&entry.pattern, entry.convert.as_ref()),
        }
    }
}

// ── Core hash matchers ────────────────────────────────────────────────────────

/// String values of a hash matcher argument: one string or a list of them.
pub(crate) fn string_values<'m>(key: &str, m: &'m Matcher) -> Result<Vec<&'m str>, Error> {
    match m {
        Matcher::Str(s) => Ok(vec![s.as_ref()]),
        Matcher::Any(list) => {
            let mut values = Vec::with_capacity(list.len());
            for m in list {
                values.extend(string_values(key, m)?);
            }
            Ok(values)
        }
        other => Err(Error::UnsupportedMatcher(format!("`{key}` expects strings, got {}", other.kind()))),
    }
}

pub(crate) fn register_core_hash_matchers(registry: &mut MatcherRegistry) {
    registry.add_hash_matcher(
        "all".into(),
        Arc::new(|r: &mut Request, m: &Matcher| -> Result<bool, Error> {
            let app = Arc::clone(&r.app);
            match m {
                Matcher::Any(list) => r.match_all(&app, list, false),
                single => r.match_one(&app, single),
            }
        }),
    );
    registry.add_hash_matcher(
        "method".into(),
        Arc::new(|r: &mut Request, m: &Matcher| -> Result<bool, Error> {
            let method = r.method().as_str();
            Ok(string_values("method", m)?.iter().any(|v| v.eq_ignore_ascii_case(method)))
        }),
    );
    registry.add_hash_matcher("param".into(), param_matcher("param", false));
    registry.add_hash_matcher("param!".into(), param_matcher("param!", true));
    registry.add_hash_matcher(
        "extension".into(),
        Arc::new(|r: &mut Request, m: &Matcher| -> Result<bool, Error> {
            let values = string_values("extension", m)?;
            let [ext] = values.as_slice() else {
                return Err(Error::UnsupportedMatcher("`extension` expects one string".into()));
            };
            let pattern = r.app.patterns.segment(&format!(r"([^/]+?)\.{}\z", regex::escape(ext)))?;
            Ok(r.cursor.try_consume_segment(&pattern, None))
        }),
    );
}

/// Matches when the query or form parameter is present, capturing its value.
fn param_matcher(key: &'static str, non_empty: bool) -> HashMatcherFn {
    Arc::new(move |r: &mut Request, m: &Matcher| -> Result<bool, Error> {
        let values = string_values(key, m)?;
        let [name] = values.as_slice() else {
            return Err(Error::UnsupportedMatcher(format!("`{key}` expects one string")));
        };
        let value = r
            .query()
            .iter()
            .chain(r.form())
            .find(|(k, _)| k.as_str() == *name)
            .map(|(_, v)| v.clone());
        match value {
            Some(v) if !(non_empty && v.is_empty()) => {
                r.cursor.push(Capture::Str(v));
                Ok(true)
            }
            _ => Ok(false),
        }
    })
}
