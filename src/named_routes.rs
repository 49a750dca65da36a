//! Named sub-trees and first-segment dispatch across them.
//!
//! A large routing tree can be split into named blocks registered with
//! [`AppBuilder::named_route`](crate::AppBuilder::named_route). A block runs
//! when the tree calls [`Request::route`], or when
//! [`Request::multi_route`] matches its name as the next segment.
//!
//! `multi_route` matches through one alternation regex per namespace, longest
//! name first, so `"users"` is tried before `"user"`. Every other route
//! lookup is a hash map access.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::capture::Capture;
use crate::dispatch::{RouteFn, RouteResult};
use crate::error::Error;
use crate::matcher::Pattern;
use crate::request::Request;
use crate::response::{IntoReply, Reply};

type Routes = HashMap<String, HashMap<String, RouteFn>>;

fn union_source(names: &BTreeSet<String>) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut names: Vec<&String> = names.iter().collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternation = names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
    Some(format!("({alternation})"))
}

// ── Registration ──────────────────────────────────────────────────────────────

/// Registration side, with a per-namespace regex cache that is dropped
/// whenever the namespace changes.
#[derive(Default)]
pub(crate) struct NamedRouteBuilder {
    routes: Routes,
    regex_cache: HashMap<String, Arc<Pattern>>,
}

impl NamedRouteBuilder {
    pub(crate) fn insert(&mut self, namespace: &str, name: &str, handler: RouteFn) {
        self.routes
            .entry(namespace.to_owned())
            .or_default()
            .insert(name.to_owned(), handler);
        self.regex_cache.remove(namespace);
    }

    pub(crate) fn remove(&mut self, namespace: &str, name: &str) -> bool {
        let removed = self
            .routes
            .get_mut(namespace)
            .is_some_and(|t| t.remove(name).is_some());
        if removed {
            self.regex_cache.remove(namespace);
        }
        removed
    }

    fn names(&self, namespace: &str, parent: Option<&NamedRouteTable>) -> BTreeSet<String> {
        let mut names = parent.map(|p| p.names(namespace)).unwrap_or_default();
        if let Some(table) = self.routes.get(namespace) {
            names.extend(table.keys().cloned());
        }
        names
    }

    /// The dispatch regex for `namespace`, computed on first use after a
    /// change.
    pub(crate) fn regexp(
        &mut self,
        namespace: &str,
        parent: Option<&NamedRouteTable>,
    ) -> Result<Option<Arc<Pattern>>, Error> {
        if let Some(p) = self.regex_cache.get(namespace) {
            return Ok(Some(Arc::clone(p)));
        }
        let Some(source) = union_source(&self.names(namespace, parent)) else {
            return Ok(None);
        };
        let pattern = Arc::new(Pattern::segment(&source)?);
        self.regex_cache.insert(namespace.to_owned(), Arc::clone(&pattern));
        Ok(Some(pattern))
    }

    pub(crate) fn freeze(mut self, parent: Option<Arc<NamedRouteTable>>) -> Result<NamedRouteTable, Error> {
        let mut namespaces: BTreeSet<String> = self.routes.keys().cloned().collect();
        if let Some(parent) = &parent {
            namespaces.extend(parent.namespaces());
        }
        let mut regexes = HashMap::new();
        for namespace in namespaces {
            if let Some(pattern) = self.regexp(&namespace, parent.as_deref())? {
                regexes.insert(namespace, pattern);
            }
        }
        Ok(NamedRouteTable { routes: self.routes, regexes, parent })
    }
}

/// Frozen named routes with their fixed dispatch regexes.
pub(crate) struct NamedRouteTable {
    routes: Routes,
    regexes: HashMap<String, Arc<Pattern>>,
    parent: Option<Arc<NamedRouteTable>>,
}

impl NamedRouteTable {
    pub(crate) fn route(&self, namespace: &str, name: &str) -> Option<&RouteFn> {
        self.routes
            .get(namespace)
            .and_then(|t| t.get(name))
            .or_else(|| self.parent.as_deref().and_then(|p| p.route(namespace, name)))
    }

    pub(crate) fn regexp(&self, namespace: &str) -> Option<&Arc<Pattern>> {
        self.regexes.get(namespace)
    }

    fn names(&self, namespace: &str) -> BTreeSet<String> {
        let mut names = self.parent.as_deref().map(|p| p.names(namespace)).unwrap_or_default();
        if let Some(table) = self.routes.get(namespace) {
            names.extend(table.keys().cloned());
        }
        names
    }

    fn namespaces(&self) -> BTreeSet<String> {
        let mut all = self.parent.as_deref().map(Self::namespaces).unwrap_or_default();
        all.extend(self.routes.keys().cloned());
        all
    }
}

// ── Request side ──────────────────────────────────────────────────────────────

impl Request {
    /// Runs the named route `name` of `namespace` and returns its reply.
    ///
    /// Does not commit by itself: if the named block returns instead of
    /// halting, the caller decides what happens next.
    pub fn route(&mut self, name: &str, namespace: &str) -> RouteResult<Reply> {
        let app = Arc::clone(&self.app);
        let Some(handler) = app.named_routes.route(namespace, name) else {
            return Err(Error::UnknownRoute { name: name.to_owned(), namespace: namespace.to_owned() }.into());
        };
        debug!(name, namespace, "named route");
        handler(self)
    }

    /// Dispatches the next segment to the named route of the same name.
    pub fn multi_route(&mut self, namespace: &str) -> RouteResult {
        self.multi_route_or(namespace, |_, _| -> RouteResult<Reply> { Ok(Reply::Empty) })
    }

    /// Like [`multi_route`](Self::multi_route); if the named block returns
    /// without halting, `fallback` runs with the section name and its reply is
    /// used instead.
    pub fn multi_route_or<F, R>(&mut self, namespace: &str, fallback: F) -> RouteResult
    where
        F: FnOnce(&mut Request, &str) -> RouteResult<R>,
        R: IntoReply,
    {
        let Some(pattern) = self.app.named_routes.regexp(namespace).cloned() else {
            return Ok(());
        };
        let snapshot = self.cursor.snapshot();
        if !self.cursor.try_consume_segment(&pattern, None) {
            return Ok(());
        }
        let section = match self.cursor.take_since(snapshot).pop() {
            Some(Capture::Str(s)) => s,
            _ => {
                self.cursor.restore(snapshot);
                return Ok(());
            }
        };
        self.always(move |r| {
            let reply = r.route(&section, namespace)?;
            match reply {
                Reply::Empty => fallback(r, &section).map(IntoReply::into_reply),
                reply => Ok(reply),
            }
        })
    }
}
