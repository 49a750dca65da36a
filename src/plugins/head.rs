use http::Method;

use crate::app::AppBuilder;
use crate::hooks::priority;
use crate::plugin::Plugin;

/// Routes `HEAD` like `GET` and drops the body before it is sent.
///
/// `Content-Length` keeps the value the `GET` body would have had.
pub struct Head;

impl Plugin for Head {
    fn name(&self) -> &'static str {
        "head"
    }

    fn setup(&self, mut app: AppBuilder) -> AppBuilder {
        app.options_mut().head_as_get = true;
        app.after(priority::LAST, "head", |req, res| {
            if *req.method() == Method::HEAD {
                res.clear_body();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::{App, RequestHead};

    #[test]
    fn head_runs_get_routes_without_a_body() {
        let app = App::builder()
            .plugin(Head)
            .route(|r| r.get("page", |_, _| Ok("hello")))
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::new(Method::HEAD, "/page")).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.is_empty());
        assert_eq!(res.header("content-length"), Some("5"));
    }

    #[test]
    fn without_the_plugin_head_is_not_get() {
        let app = App::builder()
            .route(|r| r.get("page", |_, _| Ok("hello")))
            .freeze()
            .unwrap();
        let res = app.call(RequestHead::new(Method::HEAD, "/page")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
