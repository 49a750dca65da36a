//! Outgoing HTTP response type and the [`IntoReply`] conversion trait.
//!
//! A route block does not have to build a [`Response`]: whatever it returns is
//! turned into a [`Reply`], and a body reply is written into the response the
//! request is already carrying. Headers and status set earlier in the tree
//! survive.

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderName, HeaderValue, LOCATION};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// The response a request builds up while it is routed.
///
/// Status stays unset until [`finish`](Response::finish): an untouched
/// response with an empty body becomes `404`, one with a body becomes `200`.
#[derive(Clone, Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<Bytes>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// `200 OK` with `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// `200 OK` with `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// Response with no body.
    pub fn with_status(code: StatusCode) -> Self {
        Self { status: Some(code), ..Self::default() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    /// A redirect to `location`.
    pub fn redirect(location: &str, status: StatusCode) -> Self {
        let mut res = Self::with_status(status);
        res.set_header(LOCATION, location);
        res
    }

    /// The status as it will be sent.
    pub fn status(&self) -> StatusCode {
        match self.status {
            Some(status) => status,
            None if self.body.is_empty() => StatusCode::NOT_FOUND,
            None => StatusCode::OK,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Sets a header. Values that are not valid header text are dropped.
    pub fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "dropping invalid header value"),
        }
    }

    /// Appends a chunk to the body.
    pub fn write(&mut self, chunk: impl Into<Bytes>) {
        self.body.push(chunk.into());
    }

    /// True while nothing has been written, not even an empty chunk.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.body
    }

    pub fn clear_body(&mut self) {
        self.body.clear();
    }

    /// The body as one buffer.
    pub fn body(&self) -> Bytes {
        match self.body.as_slice() {
            [] => Bytes::new(),
            [one] => one.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(many.iter().map(Bytes::len).sum());
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }

    /// The body decoded as UTF-8, lossily.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    /// Pins the status and fills in the default headers.
    pub fn finish(&mut self) {
        let status = self.status();
        self.status = Some(status);
        if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            self.body.clear();
            self.headers.remove(CONTENT_TYPE);
            self.headers.remove(CONTENT_LENGTH);
            return;
        }
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(ContentType::Html.as_str()));
        }
        if !self.headers.contains_key(CONTENT_LENGTH) {
            let len: usize = self.body.iter().map(Bytes::len).sum();
            self.headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
        }
    }

    /// Converts into the `http` type hyper sends.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = self.status();
        let body = self.body();
        let mut res = http::Response::new(Full::new(body));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Bytes::from(body.into()))
    }

    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    pub fn no_body(self) -> Response {
        Response { status: Some(self.status), headers: self.headers, body: Vec::new() }
    }

    fn finish(self, content_type: ContentType, body: Bytes) -> Response {
        let mut headers = self.headers;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        Response { status: Some(self.status), headers, body: vec![body] }
    }
}

// ── Reply / IntoReply ─────────────────────────────────────────────────────────

/// What a route block produced.
#[derive(Debug)]
pub enum Reply {
    /// Nothing: the response is left as is.
    Empty,
    /// Body text, written only if the response body is still empty.
    Body(Bytes),
    /// A complete response replacing the current one.
    Full(Response),
}

/// Conversion of a route block's return value into a [`Reply`].
///
/// ```rust
/// use arbor::{IntoReply, Reply};
///
/// assert!(matches!("hi".into_reply(), Reply::Body(_)));
/// assert!(matches!(().into_reply(), Reply::Empty));
/// assert!(matches!(None::<String>.into_reply(), Reply::Empty));
/// ```
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply { self }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply { Reply::Empty }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Reply { Reply::Body(Bytes::from_static(self.as_bytes())) }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply { Reply::Body(Bytes::from(self)) }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Reply { Reply::Body(self) }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Reply { Reply::Body(Bytes::from(self)) }
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply { Reply::Full(self) }
}

/// Return a status directly from a block: `Ok(StatusCode::NO_CONTENT)`.
impl IntoReply for StatusCode {
    fn into_reply(self) -> Reply { Reply::Full(Response::with_status(self)) }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Reply {
        self.map_or(Reply::Empty, IntoReply::into_reply)
    }
}
