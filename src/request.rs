//! Incoming request data and the per-request routing state.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method};

use crate::app::AppShared;
use crate::capture::Capture;
use crate::cursor::PathCursor;
use crate::response::Response;

// ── RequestHead ───────────────────────────────────────────────────────────────

/// What the host server hands to [`App::call`](crate::App::call).
#[derive(Clone, Debug)]
pub struct RequestHead {
    method: Method,
    path: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    form: Vec<(String, String)>,
    body: Bytes,
}

impl RequestHead {
    /// `target` is the request target: a path with an optional `?query`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_urlencoded(query.as_bytes())),
            None => (target, Vec::new()),
        };
        Self {
            method,
            path: path.to_owned(),
            headers: HeaderMap::new(),
            query,
            form: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::POST, target)
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the body; an urlencoded form body is also parsed into params.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        let is_form = self
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            self.form = parse_urlencoded(&self.body);
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input).into_owned().collect()
}

// ── Request ───────────────────────────────────────────────────────────────────

/// The object route blocks receive: request data, the path cursor and the
/// response being built.
///
/// Routing methods (`on`, `is`, `get`, `hash_routes`, ...) are documented in
/// [`dispatch`](crate::dispatch).
pub struct Request {
    pub(crate) app: Arc<AppShared>,
    head: RequestHead,
    pub(crate) cursor: PathCursor,
    pub(crate) response: Response,
    pub(crate) symbol_marks: Vec<(String, usize, usize)>,
    captured_params: Vec<(String, Capture)>,
    captured_all: Vec<Capture>,
    extensions: Extensions,
}

impl Request {
    pub(crate) fn new(app: Arc<AppShared>, head: RequestHead) -> Self {
        let cursor = PathCursor::new(head.path.clone());
        Self {
            app,
            head,
            cursor,
            response: Response::new(),
            symbol_marks: Vec::new(),
            captured_params: Vec::new(),
            captured_all: Vec::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// The full request path.
    pub fn path(&self) -> &str {
        self.cursor.path()
    }

    /// The part of the path not yet consumed by a matcher.
    pub fn remaining_path(&self) -> &str {
        self.cursor.remaining()
    }

    /// The part of the path consumed so far.
    pub fn matched_path(&self) -> &str {
        self.cursor.matched()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Host` header without a port.
    pub fn host(&self) -> Option<&str> {
        let host = self.head.headers.get(HOST)?.to_str().ok()?;
        match host.rsplit_once(':') {
            Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                Some(name)
            }
            _ => Some(host),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.head.body
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.head.query
    }

    pub fn form(&self) -> &[(String, String)] {
        &self.head.form
    }

    /// Looks a parameter up in captured route params, then the query string,
    /// then the form body.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.captured_params
            .iter()
            .rev()
            .find_map(|(k, v)| (k == name).then(|| v.as_str()).flatten())
            .or_else(|| find_pair(&self.head.query, name))
            .or_else(|| find_pair(&self.head.form, name))
    }

    /// Named captures recorded by the params-capturing plugin.
    pub fn captured_params(&self) -> &[(String, Capture)] {
        &self.captured_params
    }

    /// Every capture of every matched level, outermost first, when params
    /// capturing is enabled.
    pub fn captures_param(&self) -> &[Capture] {
        &self.captured_all
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Per-request storage shared by hooks and blocks.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// `true` for GET, and for HEAD when HEAD is treated as GET.
    pub fn is_get(&self) -> bool {
        self.head.method == Method::GET
            || (self.head.method == Method::HEAD && self.app.options.head_as_get)
    }

    pub(crate) fn record_params(&mut self, named: Vec<(String, Capture)>, all: &[Capture]) {
        self.captured_params.extend(named);
        self.captured_all.extend_from_slice(all);
    }

    /// Replaces the in-progress response with a fresh one.
    pub(crate) fn reset_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }
}

fn find_pair<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_splits_query() {
        let head = RequestHead::get("/search?q=rust+web&page=2");
        assert_eq!(head.path(), "/search");
        assert_eq!(head.query, vec![
            ("q".to_owned(), "rust web".to_owned()),
            ("page".to_owned(), "2".to_owned()),
        ]);
    }

    #[test]
    fn form_body_is_parsed_only_with_form_content_type() {
        let head = RequestHead::post("/")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("a=1&b=two");
        assert_eq!(head.form.len(), 2);

        let head = RequestHead::post("/").header("content-type", "text/plain").body("a=1");
        assert!(head.form.is_empty());
    }
}
