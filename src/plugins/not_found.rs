use std::sync::Arc;

use http::StatusCode;
use http::header::CONTENT_LENGTH;

use crate::app::AppBuilder;
use crate::hooks::priority;
use crate::plugin::Plugin;
use crate::request::Request;
use crate::response::{IntoReply, Reply};

type Render = Arc<dyn Fn(&Request) -> Reply + Send + Sync>;

/// Fills in empty 404 responses.
///
/// Runs only when routing produced a 404 with no body, so a route that sets
/// 404 itself and writes a body keeps its own.
///
/// ```rust
/// use arbor::{App, RequestHead};
/// use arbor::plugins::NotFound;
///
/// let app = App::builder()
///     .plugin(NotFound::new(|r| format!("no page at {}", r.path())))
///     .freeze()
///     .unwrap();
///
/// let res = app.call(RequestHead::get("/missing")).unwrap();
/// assert_eq!(res.status(), 404);
/// assert_eq!(res.body_string(), "no page at /missing");
/// ```
pub struct NotFound {
    render: Render,
}

impl NotFound {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&Request) -> R + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let render: Render = Arc::new(move |r: &Request| -> Reply { f(r).into_reply() });
        Self { render }
    }
}

impl Plugin for NotFound {
    fn name(&self) -> &'static str {
        "not_found"
    }

    fn setup(&self, app: AppBuilder) -> AppBuilder {
        let render = Arc::clone(&self.render);
        app.after(priority::EARLY, "not_found", move |req, res| {
            if res.status() != StatusCode::NOT_FOUND || !res.is_empty() {
                return Ok(());
            }
            match render(req) {
                Reply::Empty => return Ok(()),
                Reply::Body(body) => res.write(body),
                Reply::Full(page) => {
                    for (name, value) in page.headers() {
                        res.headers_mut().insert(name.clone(), value.clone());
                    }
                    for chunk in page.chunks() {
                        res.write(chunk.clone());
                    }
                }
            }
            res.headers_mut().remove(CONTENT_LENGTH);
            res.finish();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, RequestHead, Response};

    #[test]
    fn explicit_404_with_body_is_kept() {
        let app = App::builder()
            .plugin(NotFound::new(|_| "generic"))
            .route(|r| {
                r.response_mut().set_status(StatusCode::NOT_FOUND);
                Ok("specific")
            })
            .freeze()
            .unwrap();
        assert_eq!(app.call(RequestHead::get("/")).unwrap().body_string(), "specific");
    }

    #[test]
    fn full_page_headers_are_merged() {
        let app = App::builder()
            .plugin(NotFound::new(|_| Response::json("{}")))
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::get("/")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("content-length"), Some("2"));
    }
}
