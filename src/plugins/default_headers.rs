use http::{HeaderName, HeaderValue};
use tracing::warn;

use crate::app::AppBuilder;
use crate::hooks::priority;
use crate::plugin::Plugin;

/// Adds headers to every response that does not already set them.
///
/// ```rust
/// use arbor::App;
/// use arbor::plugins::DefaultHeaders;
///
/// let app = App::builder()
///     .plugin(DefaultHeaders::new().header("x-frame-options", "DENY"))
///     .freeze()
///     .unwrap();
/// # let _ = app;
/// ```
#[derive(Clone, Debug, Default)]
pub struct DefaultHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl DefaultHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalid names or values are logged and skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => self.headers.push((name, value)),
            _ => warn!(header = name, "skipping invalid default header"),
        }
        self
    }
}

impl Plugin for DefaultHeaders {
    fn name(&self) -> &'static str {
        "default_headers"
    }

    fn setup(&self, app: AppBuilder) -> AppBuilder {
        let defaults = self.headers.clone();
        app.after(priority::DEFAULT, "default_headers", move |_, res| {
            for (name, value) in &defaults {
                if !res.headers().contains_key(name) {
                    res.headers_mut().insert(name.clone(), value.clone());
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, RequestHead};

    #[test]
    fn route_headers_win() {
        let app = App::builder()
            .plugin(DefaultHeaders::new().header("x-a", "default").header("x-b", "default"))
            .route(|r| {
                r.response_mut().set_header(HeaderName::from_static("x-b"), "route");
                Ok("ok")
            })
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::get("/")).unwrap();
        assert_eq!(res.header("x-a"), Some("default"));
        assert_eq!(res.header("x-b"), Some("route"));
    }

    #[test]
    fn invalid_headers_are_skipped() {
        assert!(DefaultHeaders::new().header("bad header", "x").headers.is_empty());
    }
}
