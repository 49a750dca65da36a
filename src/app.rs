//! Application definition and the frozen snapshot requests run against.
//!
//! All registration happens on an [`AppBuilder`]. [`AppBuilder::freeze`]
//! turns it into an [`App`]: an immutable snapshot behind an `Arc`, cheap to
//! clone into every connection task. Nothing in the request path takes a
//! lock, except the memoized regex cache for inline `Matcher::regex` values;
//! `Matcher::compiled` avoids it.
//!
//! ```rust
//! use arbor::{App, Matcher, RequestHead};
//!
//! let app = App::builder()
//!     .route(|r| {
//!         r.on(("users", Matcher::integer()), |_, caps| Ok(format!("user {}", caps.int(0)?)))
//!     })
//!     .freeze()
//!     .unwrap();
//!
//! let res = app.call(RequestHead::get("/users/42")).unwrap();
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.body_string(), "user 42");
//! ```

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use tracing::debug;

use crate::capture::Capture;
use crate::dispatch::{Halt, RouteFn, RouteResult, route_fn};
use crate::error::Error;
use crate::hash_routes::{HashRouteBuilder, HashRouteTable, HashRoutes};
use crate::hooks::{AfterHook, BeforeHook, HookChain, HookChainBuilder};
use crate::matcher::{ClassKey, Convert, Matcher, MatcherRegistry, MatcherSource, Pattern, PatternCache};
use crate::named_routes::{NamedRouteBuilder, NamedRouteTable};
use crate::plugin::Plugin;
use crate::request::{Request, RequestHead};
use crate::response::{IntoReply, Reply, Response};

/// Switches plugins flip on the application.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Options {
    /// `is_get` and the `get` verb also accept `HEAD`.
    pub head_as_get: bool,
    /// Symbol captures are recorded as named params.
    pub params_capturing: bool,
}

/// Renders a response for an error raised while routing.
pub type ErrorHandlerFn = Arc<dyn Fn(&mut Request, &Error) -> RouteResult<Reply> + Send + Sync>;

// ── AppBuilder ────────────────────────────────────────────────────────────────

/// Collects routes, matchers, hooks and plugins.
///
/// Registration methods chain. A registration that fails (a bad regex, a
/// reference to an unknown matcher) is recorded and reported by
/// [`freeze`](Self::freeze).
pub struct AppBuilder {
    options: Options,
    matchers: MatcherRegistry,
    hash_routes: HashRouteBuilder,
    named_routes: NamedRouteBuilder,
    hooks: HookChainBuilder,
    route: Option<RouteFn>,
    error_handler: Option<ErrorHandlerFn>,
    plugins: Vec<&'static str>,
    parent: Option<Arc<AppShared>>,
    errors: Vec<Error>,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            matchers: MatcherRegistry::with_builtins(),
            hash_routes: HashRouteBuilder::default(),
            named_routes: NamedRouteBuilder::default(),
            hooks: HookChainBuilder::default(),
            route: None,
            error_handler: None,
            plugins: Vec::new(),
            parent: None,
            errors: Vec::new(),
        }
    }

    /// A child application. Everything `parent` registered stays visible;
    /// registrations on the child overlay it without touching the parent.
    pub fn inherit(parent: &App) -> Self {
        let shared = &parent.shared;
        Self {
            options: shared.options,
            matchers: MatcherRegistry::inherit(Arc::clone(&shared.matchers)),
            hash_routes: HashRouteBuilder::default(),
            named_routes: NamedRouteBuilder::default(),
            hooks: HookChainBuilder::inherit(&shared.hooks),
            route: Some(Arc::clone(&shared.route)),
            error_handler: shared.error_handler.clone(),
            plugins: shared.plugins.clone(),
            parent: Some(Arc::clone(shared)),
            errors: Vec::new(),
        }
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Loads a plugin. Loading the same plugin again runs its setup again;
    /// hooks it registers by name replace the earlier ones.
    pub fn plugin<P: Plugin>(self, plugin: P) -> Self {
        let name = plugin.name();
        debug!(plugin = name, "loading plugin");
        let mut app = plugin.setup(self);
        if !app.plugins.contains(&name) {
            app.plugins.push(name);
        }
        app
    }

    /// The routing tree, run once per request.
    pub fn route<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.route = Some(route_fn(f));
        self
    }

    // ── Matchers ──────────────────────────────────────────────────────────────

    /// Registers a class matcher for `T`, used with [`Matcher::class`].
    pub fn class_matcher<T: ?Sized + 'static>(self, source: impl Into<MatcherSource>) -> Self {
        self.add_class(ClassKey::of::<T>(), source.into(), None)
    }

    /// Like [`class_matcher`](Self::class_matcher) with a converter over the
    /// raw captures. Returning `None` rejects the match.
    pub fn class_matcher_with<T, F>(self, source: impl Into<MatcherSource>, convert: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn(Vec<Capture>) -> Option<Vec<Capture>> + Send + Sync + 'static,
    {
        self.add_class(ClassKey::of::<T>(), source.into(), Some(Arc::new(convert)))
    }

    /// Registers a symbol matcher, used with [`Matcher::symbol`].
    pub fn symbol_matcher(self, name: &str, source: impl Into<MatcherSource>) -> Self {
        self.add_symbol(name, source.into(), None)
    }

    pub fn symbol_matcher_with<F>(self, name: &str, source: impl Into<MatcherSource>, convert: F) -> Self
    where
        F: Fn(Vec<Capture>) -> Option<Vec<Capture>> + Send + Sync + 'static,
    {
        self.add_symbol(name, source.into(), Some(Arc::new(convert)))
    }

    /// Registers a key for [`Matcher::hash`].
    pub fn hash_matcher<F>(mut self, key: &str, f: F) -> Self
    where
        F: Fn(&mut Request, &Matcher) -> Result<bool, Error> + Send + Sync + 'static,
    {
        self.matchers.add_hash_matcher(key.to_owned(), Arc::new(f));
        self
    }

    fn add_class(mut self, key: ClassKey, source: MatcherSource, convert: Option<Convert>) -> Self {
        if let Err(err) = self.matchers.add_class(key, source, convert) {
            self.errors.push(err);
        }
        self
    }

    fn add_symbol(mut self, name: &str, source: MatcherSource, convert: Option<Convert>) -> Self {
        if let Err(err) = self.matchers.add_symbol(name.to_owned(), source, convert) {
            self.errors.push(err);
        }
        self
    }

    // ── Hash routes ───────────────────────────────────────────────────────────

    pub fn hash_branch<F, R>(mut self, namespace: &str, segment: &str, f: F) -> Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.hash_routes.branch(namespace, segment, route_fn(f));
        self
    }

    pub fn hash_path<F, R>(mut self, namespace: &str, path: &str, f: F) -> Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.hash_routes.path(namespace, path, route_fn(f));
        self
    }

    pub fn remove_hash_branch(mut self, namespace: &str, segment: &str) -> Self {
        self.hash_routes.remove_branch(namespace, segment);
        self
    }

    pub fn remove_hash_path(mut self, namespace: &str, path: &str) -> Self {
        self.hash_routes.remove_path(namespace, path);
        self
    }

    /// Declares several hash routes of one namespace at once.
    ///
    /// ```rust
    /// use arbor::App;
    ///
    /// let app = App::builder()
    ///     .hash_routes("/api", |h| {
    ///         h.get("status", |_| Ok("ok"));
    ///         h.on("users", |r| { r.hash_routes(Some("/api/users"))?; Ok(()) });
    ///     })
    ///     .route(|r| r.on("api", |r, _| r.hash_routes(Some("/api"))))
    ///     .freeze()
    ///     .unwrap();
    /// # let _ = app;
    /// ```
    pub fn hash_routes<F>(mut self, namespace: &str, f: F) -> Self
    where
        F: FnOnce(&mut HashRoutes<'_>),
    {
        let mut dsl = HashRoutes::new(&mut self.hash_routes, namespace);
        f(&mut dsl);
        self
    }

    /// A hash branch whose handler is built by `loader` when the application
    /// is frozen.
    pub fn autoload_hash_branch<L, F, R>(mut self, namespace: &str, segment: &str, loader: L) -> Self
    where
        L: FnOnce() -> F + Send + 'static,
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.hash_routes
            .autoload(namespace, segment, Box::new(move || route_fn(loader())));
        self
    }

    // ── Named routes ──────────────────────────────────────────────────────────

    /// Registers (or replaces) the named route `name` in `namespace`.
    pub fn named_route<F, R>(mut self, name: &str, namespace: &str, f: F) -> Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.named_routes.insert(namespace, name, route_fn(f));
        self
    }

    pub fn remove_named_route(mut self, name: &str, namespace: &str) -> Self {
        self.named_routes.remove(namespace, name);
        self
    }

    /// The pattern `multi_route` would use for `namespace` right now.
    pub fn named_route_pattern(&mut self, namespace: &str) -> Result<Option<Arc<Pattern>>, Error> {
        let parent = self.parent.as_deref().map(|p| &*p.named_routes);
        self.named_routes.regexp(namespace, parent)
    }

    // ── Hooks ─────────────────────────────────────────────────────────────────

    /// Runs `hook` before routing, in slot `priority`. A hook may halt.
    pub fn before<F>(mut self, priority: u8, name: &'static str, hook: F) -> Self
    where
        F: Fn(&mut Request) -> RouteResult + Send + Sync + 'static,
    {
        let hook: BeforeHook = Arc::new(hook);
        self.hooks.before(priority, name, hook);
        self
    }

    /// Runs `hook` on the finished response, in slot `priority`.
    pub fn after<F>(mut self, priority: u8, name: &'static str, hook: F) -> Self
    where
        F: Fn(&Request, &mut Response) -> Result<(), Error> + Send + Sync + 'static,
    {
        let hook: AfterHook = Arc::new(hook);
        self.hooks.after(priority, name, hook);
        self
    }

    pub(crate) fn set_error_handler(&mut self, handler: ErrorHandlerFn) {
        self.error_handler = Some(handler);
    }

    // ── Freeze ────────────────────────────────────────────────────────────────

    /// Locks every table and composes the hook chain.
    ///
    /// Returns the first registration error, if any was recorded.
    pub fn freeze(self) -> Result<App, Error> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }
        let parent = self.parent;
        let hash_routes = self
            .hash_routes
            .freeze(parent.as_ref().map(|p| Arc::clone(&p.hash_routes)))?;
        let named_routes = self
            .named_routes
            .freeze(parent.as_ref().map(|p| Arc::clone(&p.named_routes)))?;
        let route = self
            .route
            .unwrap_or_else(|| route_fn(|_: &mut Request| -> RouteResult { Ok(()) }));

        let shared = AppShared {
            options: self.options,
            matchers: Arc::new(self.matchers),
            patterns: PatternCache::default(),
            hash_routes: Arc::new(hash_routes),
            named_routes: Arc::new(named_routes),
            hooks: self.hooks.compose(),
            route,
            error_handler: self.error_handler,
            plugins: self.plugins,
        };
        debug!(plugins = ?shared.plugins, hooks = ?shared.hooks, "application frozen");
        Ok(App { shared: Arc::new(shared) })
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Everything a request needs, read-only.
pub(crate) struct AppShared {
    pub(crate) options: Options,
    pub(crate) matchers: Arc<MatcherRegistry>,
    pub(crate) patterns: PatternCache,
    pub(crate) hash_routes: Arc<HashRouteTable>,
    pub(crate) named_routes: Arc<NamedRouteTable>,
    pub(crate) hooks: HookChain,
    route: RouteFn,
    error_handler: Option<ErrorHandlerFn>,
    plugins: Vec<&'static str>,
}

/// A frozen application.
#[derive(Clone)]
pub struct App {
    shared: Arc<AppShared>,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    pub fn options(&self) -> Options {
        self.shared.options
    }

    /// Names of the loaded plugins, in load order.
    pub fn plugins(&self) -> &[&'static str] {
        &self.shared.plugins
    }

    /// Routes one request.
    ///
    /// `Err` means an error escaped routing and no error handler turned it
    /// into a response.
    pub fn call(&self, head: RequestHead) -> Result<Response, Error> {
        let mut req = Request::new(Arc::clone(&self.shared), head);
        let mut res = match self.dispatch(&mut req) {
            Ok(res) => res,
            Err(err) => return self.handle_error(&mut req, err),
        };
        if let Err(err) = self.shared.hooks.run_after(&req, &mut res) {
            return self.handle_error(&mut req, err);
        }
        Ok(res)
    }

    fn dispatch(&self, req: &mut Request) -> Result<Response, Error> {
        let routed = self
            .shared
            .hooks
            .run_before(req)
            .and_then(|()| (self.shared.route)(req));
        match routed {
            Ok(reply) => {
                req.block_result(reply);
                Ok(req.finish_response())
            }
            Err(Halt::Respond(res)) => Ok(res),
            Err(Halt::Fail(err)) => Err(err),
        }
    }

    fn handle_error(&self, req: &mut Request, err: Error) -> Result<Response, Error> {
        let Some(handler) = &self.shared.error_handler else {
            return Err(err);
        };
        debug!(error = %err, "running error handler");
        req.reset_response();
        req.response_mut().set_status(StatusCode::INTERNAL_SERVER_ERROR);
        let mut res = match handler(req, &err) {
            Ok(reply) => {
                req.block_result(reply);
                req.finish_response()
            }
            Err(Halt::Respond(res)) => res,
            Err(Halt::Fail(err)) => return Err(err),
        };
        self.shared.hooks.run_after_lenient(req, &mut res);
        Ok(res)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("options", &self.shared.options)
            .field("plugins", &self.shared.plugins)
            .field("hooks", &self.shared.hooks)
            .finish()
    }
}
