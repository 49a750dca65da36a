//! O(1) dispatch tables: hash branches and hash paths.
//!
//! Instead of a long chain of sibling `on` calls, routes are stored in two
//! maps per namespace:
//!
//! - **branches**: keyed by the next segment (`"/users"`), consuming it and
//!   committing like `on`;
//! - **paths**: keyed by the whole remaining path, consuming all of it and
//!   committing like `is`.
//!
//! A namespace is usually the path matched so far, so nested tables line up
//! with the URL:
//!
//! ```rust
//! use arbor::App;
//!
//! let app = App::builder()
//!     .route(|r| { r.hash_branches(None)?; Ok(()) })
//!     .hash_branch("", "a", |r| { r.hash_branches(Some("/a"))?; Ok("a") })
//!     .hash_branch("/a", "b", |_| Ok("a/b"))
//!     .freeze()
//!     .unwrap();
//! # let _ = app;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use tracing::debug;

use crate::dispatch::{RouteFn, RouteResult, route_fn};
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoReply, Reply};

type Table = HashMap<String, HashMap<String, RouteFn>>;
type VerbTable = Vec<(Method, RouteFn)>;
type Verbs = HashMap<String, HashMap<String, VerbTable>>;
type Loader = Box<dyn FnOnce() -> RouteFn + Send>;

fn branch_key(segment: &str) -> String {
    if segment.starts_with('/') { segment.to_owned() } else { format!("/{segment}") }
}

fn path_key(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') { path.to_owned() } else { format!("/{path}") }
}

// ── Registration ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct HashRouteBuilder {
    branches: Table,
    paths: Table,
    verbs: Verbs,
    autoload: Vec<(String, String, Loader)>,
}

impl HashRouteBuilder {
    pub(crate) fn branch(&mut self, namespace: &str, segment: &str, handler: RouteFn) {
        self.branches
            .entry(namespace.to_owned())
            .or_default()
            .insert(branch_key(segment), handler);
    }

    pub(crate) fn path(&mut self, namespace: &str, path: &str, handler: RouteFn) {
        self.paths
            .entry(namespace.to_owned())
            .or_default()
            .insert(path_key(path), handler);
    }

    pub(crate) fn remove_branch(&mut self, namespace: &str, segment: &str) -> bool {
        self.branches
            .get_mut(namespace)
            .is_some_and(|t| t.remove(&branch_key(segment)).is_some())
    }

    pub(crate) fn remove_path(&mut self, namespace: &str, path: &str) -> bool {
        self.paths
            .get_mut(namespace)
            .is_some_and(|t| t.remove(&path_key(path)).is_some())
    }

    pub(crate) fn autoload(&mut self, namespace: &str, segment: &str, loader: Loader) {
        self.autoload.push((namespace.to_owned(), branch_key(segment), loader));
    }

    fn verb(&mut self, namespace: &str, path: &str, method: Method, handler: RouteFn) {
        let table = self
            .verbs
            .entry(namespace.to_owned())
            .or_default()
            .entry(path_key(path))
            .or_default();
        upsert_verb(table, method, handler);
    }

    /// Resolves autoloaded branches, turns verb tables into path handlers and
    /// locks everything.
    pub(crate) fn freeze(mut self, parent: Option<Arc<HashRouteTable>>) -> Result<HashRouteTable, Error> {
        for (namespace, key, loader) in std::mem::take(&mut self.autoload) {
            let table = self.branches.entry(namespace.clone()).or_default();
            if table.contains_key(&key) {
                return Err(Error::Conflict(format!(
                    "autoloaded hash branch `{key}` in namespace `{namespace}` is already defined"
                )));
            }
            debug!(namespace = %namespace, segment = %key, "loading autoloaded hash branch");
            table.insert(key, loader());
        }

        // a child's verbs extend the parent's methods on the same path
        let mut verbs = Verbs::new();
        for (namespace, paths) in std::mem::take(&mut self.verbs) {
            for (path, own) in paths {
                let existing = self.paths.entry(namespace.clone()).or_default();
                if existing.contains_key(&path) {
                    return Err(Error::Conflict(format!(
                        "hash path `{path}` in namespace `{namespace}` has both a plain and a verb handler"
                    )));
                }
                let mut table = parent
                    .as_deref()
                    .and_then(|p| p.verbs(&namespace, &path))
                    .cloned()
                    .unwrap_or_default();
                for (method, handler) in own {
                    upsert_verb(&mut table, method, handler);
                }
                existing.insert(path.clone(), verb_dispatcher(table.clone()));
                verbs.entry(namespace.clone()).or_default().insert(path, table);
            }
        }

        Ok(HashRouteTable { branches: self.branches, paths: self.paths, verbs, parent })
    }
}

fn upsert_verb(table: &mut VerbTable, method: Method, handler: RouteFn) {
    match table.iter_mut().find(|(m, _)| *m == method) {
        Some(slot) => slot.1 = handler,
        None => table.push((method, handler)),
    }
}

fn verb_dispatcher(table: VerbTable) -> RouteFn {
    Arc::new(move |r: &mut Request| -> RouteResult<Reply> {
        let method = r.method().clone();
        let handler = table
            .iter()
            .find(|(m, _)| *m == method)
            .or_else(|| {
                if method == Method::HEAD && r.is_get() {
                    table.iter().find(|(m, _)| *m == Method::GET)
                } else {
                    None
                }
            });
        match handler {
            Some((_, handler)) => handler(r),
            None => Ok(Reply::Empty),
        }
    })
}

/// Frozen tables. Lookups consult the parent application's tables when the
/// key is not overridden locally.
pub(crate) struct HashRouteTable {
    branches: Table,
    paths: Table,
    verbs: Verbs,
    parent: Option<Arc<HashRouteTable>>,
}

impl HashRouteTable {
    pub(crate) fn branch(&self, namespace: &str, key: &str) -> Option<&RouteFn> {
        self.branches
            .get(namespace)
            .and_then(|t| t.get(key))
            .or_else(|| self.parent.as_deref().and_then(|p| p.branch(namespace, key)))
    }

    pub(crate) fn path(&self, namespace: &str, key: &str) -> Option<&RouteFn> {
        self.paths
            .get(namespace)
            .and_then(|t| t.get(key))
            .or_else(|| self.parent.as_deref().and_then(|p| p.path(namespace, key)))
    }

    /// The methods registered on a verb path, this application's or the
    /// nearest ancestor's.
    fn verbs(&self, namespace: &str, path: &str) -> Option<&VerbTable> {
        self.verbs
            .get(namespace)
            .and_then(|t| t.get(path))
            .or_else(|| self.parent.as_deref().and_then(|p| p.verbs(namespace, path)))
    }
}

// ── DSL ───────────────────────────────────────────────────────────────────────

/// Declares the hash routes of one namespace; see
/// [`AppBuilder::hash_routes`](crate::AppBuilder::hash_routes).
///
/// `""` as a segment or path stands for the namespace root itself.
pub struct HashRoutes<'a> {
    table: &'a mut HashRouteBuilder,
    namespace: String,
}

impl<'a> HashRoutes<'a> {
    pub(crate) fn new(table: &'a mut HashRouteBuilder, namespace: &str) -> Self {
        Self { table, namespace: namespace.to_owned() }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// A branch: `segment` is consumed and `f` runs with commit semantics.
    pub fn on<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.table.branch(&self.namespace, segment, route_fn(f));
        self
    }

    /// A terminal path: `f` runs only if `segment` is all that remains.
    pub fn is<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.table.path(&self.namespace, segment, route_fn(f));
        self
    }

    /// The namespace root with a trailing slash: remaining path `/`.
    pub fn is_root<F, R>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.table.path(&self.namespace, "/", route_fn(f));
        self
    }

    /// A terminal path restricted to one method. Several methods may share
    /// a path; any other method gets an empty 404.
    pub fn verb<F, R>(&mut self, method: Method, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.table.verb(&self.namespace, segment, method, route_fn(f));
        self
    }

    pub fn get<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.verb(Method::GET, segment, f)
    }

    pub fn post<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.verb(Method::POST, segment, f)
    }

    pub fn put<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.verb(Method::PUT, segment, f)
    }

    pub fn patch<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.verb(Method::PATCH, segment, f)
    }

    pub fn delete<F, R>(&mut self, segment: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        self.verb(Method::DELETE, segment, f)
    }

    /// Wires branch `branch` of namespace `from` straight into this
    /// namespace's tables.
    pub fn dispatch_from(&mut self, from: &str, branch: &str) -> &mut Self {
        let target = self.namespace.clone();
        self.table.branch(from, branch, route_fn(move |r: &mut Request| -> RouteResult {
            r.hash_routes(Some(&target))
        }));
        self
    }

    /// Like [`dispatch_from`](Self::dispatch_from), running `guard` first.
    /// The guard may halt (for example with a 401) before this namespace is
    /// consulted.
    pub fn dispatch_from_with<G>(&mut self, from: &str, branch: &str, guard: G) -> &mut Self
    where
        G: Fn(&mut Request) -> RouteResult + Send + Sync + 'static,
    {
        let target = self.namespace.clone();
        self.table.branch(from, branch, route_fn(move |r: &mut Request| -> RouteResult {
            guard(r)?;
            r.hash_routes(Some(&target))
        }));
        self
    }
}

// ── Request side ──────────────────────────────────────────────────────────────

impl Request {
    /// Dispatches on the next segment through the branch table of
    /// `namespace` (the matched path when `None`).
    ///
    /// A hit consumes the segment and commits; a miss changes nothing.
    pub fn hash_branches(&mut self, namespace: Option<&str>) -> RouteResult {
        let app = Arc::clone(&self.app);
        let rest = self.cursor.remaining();
        if !rest.starts_with('/') {
            return Ok(());
        }
        let len = rest[1..].find('/').map_or(rest.len(), |i| i + 1);
        let namespace = namespace.unwrap_or_else(|| self.cursor.matched());
        let Some(handler) = app.hash_routes.branch(namespace, &rest[..len]) else {
            return Ok(());
        };
        debug!(namespace, segment = &rest[..len], "hash branch");
        self.cursor.advance(len);
        self.always(|r| handler(r))
    }

    /// Dispatches on the whole remaining path through the path table of
    /// `namespace` (the matched path when `None`).
    pub fn hash_paths(&mut self, namespace: Option<&str>) -> RouteResult {
        let app = Arc::clone(&self.app);
        let namespace = namespace.unwrap_or_else(|| self.cursor.matched());
        let Some(handler) = app.hash_routes.path(namespace, self.cursor.remaining()) else {
            return Ok(());
        };
        debug!(namespace, path = self.cursor.remaining(), "hash path");
        self.cursor.consume_rest();
        self.always(|r| handler(r))
    }

    /// [`hash_paths`](Self::hash_paths), then
    /// [`hash_branches`](Self::hash_branches).
    pub fn hash_routes(&mut self, namespace: Option<&str>) -> RouteResult {
        self.hash_paths(namespace)?;
        self.hash_branches(namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> RouteFn {
        route_fn(|_: &mut Request| -> RouteResult<&'static str> { Ok("x") })
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(branch_key("a"), "/a");
        assert_eq!(branch_key("/a"), "/a");
        assert_eq!(path_key(""), "");
        assert_eq!(path_key("a/b"), "/a/b");
    }

    #[test]
    fn parent_tables_are_consulted() {
        let mut parent = HashRouteBuilder::default();
        parent.branch("", "a", noop());
        let parent = Arc::new(parent.freeze(None).unwrap());

        let mut child = HashRouteBuilder::default();
        child.branch("", "b", noop());
        let child = child.freeze(Some(parent)).unwrap();
        assert!(child.branch("", "/a").is_some());
        assert!(child.branch("", "/b").is_some());
        assert!(child.branch("/x", "/a").is_none());
    }

    #[test]
    fn verb_and_plain_path_conflict() {
        let mut b = HashRouteBuilder::default();
        b.path("", "a", noop());
        b.verb("", "a", Method::GET, noop());
        assert!(matches!(b.freeze(None), Err(Error::Conflict(_))));
    }

    #[test]
    fn child_verbs_extend_parent_methods() {
        let mut parent = HashRouteBuilder::default();
        parent.verb("", "stats", Method::GET, noop());
        parent.verb("", "stats", Method::DELETE, noop());
        let parent = Arc::new(parent.freeze(None).unwrap());

        let mut child = HashRouteBuilder::default();
        child.verb("", "stats", Method::POST, noop());
        child.verb("", "stats", Method::DELETE, noop());
        let child = child.freeze(Some(Arc::clone(&parent))).unwrap();

        let methods: Vec<Method> = child.verbs("", "/stats").unwrap().iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(methods, vec![Method::GET, Method::DELETE, Method::POST]);
        assert_eq!(parent.verbs("", "/stats").unwrap().len(), 2);
    }

    #[test]
    fn autoload_runs_at_freeze() {
        let mut b = HashRouteBuilder::default();
        b.autoload("", "lazy", Box::new(noop));
        let table = b.freeze(None).unwrap();
        assert!(table.branch("", "/lazy").is_some());
    }

    #[test]
    fn removal() {
        let mut b = HashRouteBuilder::default();
        b.branch("", "a", noop());
        assert!(b.remove_branch("", "a"));
        assert!(!b.remove_branch("", "a"));
        assert!(!b.remove_path("", "a"));
    }
}
