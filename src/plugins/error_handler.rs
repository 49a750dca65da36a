use std::sync::Arc;

use crate::app::{AppBuilder, ErrorHandlerFn};
use crate::dispatch::RouteResult;
use crate::error::Error;
use crate::plugin::Plugin;
use crate::request::Request;
use crate::response::{IntoReply, Reply};

/// Renders a response for any error that escapes routing or the after hooks.
///
/// The handler starts from a fresh response with status 500. After hooks
/// still run on its result, but a failure in one of them is only logged. If
/// the handler itself fails, that error is returned from
/// [`App::call`](crate::App::call).
///
/// ```rust
/// use arbor::{App, RequestHead, RouteResult};
/// use arbor::plugins::ErrorHandler;
///
/// let app = App::builder()
///     .plugin(ErrorHandler::new(|_, err| Ok(format!("oops: {err}"))))
///     .route(|_| -> RouteResult { Err(std::fmt::Error.into()) })
///     .freeze()
///     .unwrap();
///
/// let res = app.call(RequestHead::get("/")).unwrap();
/// assert_eq!(res.status(), 500);
/// assert!(res.body_string().starts_with("oops"));
/// ```
pub struct ErrorHandler {
    handler: ErrorHandlerFn,
}

impl ErrorHandler {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&mut Request, &Error) -> RouteResult<R> + Send + Sync + 'static,
        R: IntoReply + 'static,
    {
        let handler: ErrorHandlerFn = Arc::new(move |r: &mut Request, err: &Error| -> RouteResult<Reply> {
            f(r, err).map(IntoReply::into_reply)
        });
        Self { handler }
    }
}

impl Plugin for ErrorHandler {
    fn name(&self) -> &'static str {
        "error_handler"
    }

    fn setup(&self, mut app: AppBuilder) -> AppBuilder {
        app.set_error_handler(Arc::clone(&self.handler));
        app
    }
}
