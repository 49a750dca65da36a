//! HTTP host for an [`App`] and graceful shutdown.
//!
//! The routing engine itself is synchronous and knows nothing about sockets.
//! This module is the thin layer around it: hyper parses HTTP, [`handle`]
//! collects the body, builds a [`RequestHead`] and calls [`App::call`].
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. stops accepting connections,
//! 2. lets every in-flight connection task run to completion,
//! 3. returns from [`Server::serve`].

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::app::App;
use crate::error::Error;
use crate::request::RequestHead;
use crate::response::Response;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// ```rust
    /// use arbor::Server;
    ///
    /// let server = Server::bind("0.0.0.0:3000").unwrap();
    /// assert_eq!(server.addr().port(), 3000);
    /// assert!(Server::bind("not an address").is_err());
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        Ok(Self { addr: addr.parse()? })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections and routes every request through `app`.
    ///
    /// Returns only after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, plugins = ?app.plugins(), "arbor listening");

        let mut tasks = tokio::task::JoinSet::new();
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // shutdown first, so a signal stops accepting even under load
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = app.clone();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req: http::Request<Incoming>| {
                            let app = app.clone();
                            async move { Ok::<_, Infallible>(handle(&app, req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("arbor stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one `http` request through `app`.
///
/// Never fails: an unreadable body becomes `400`, an error no error handler
/// dealt with is logged and becomes an empty `500`.
pub async fn handle<B>(app: &App, req: http::Request<B>) -> http::Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return empty(StatusCode::BAD_REQUEST);
        }
    };

    let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let head = RequestHead::new(parts.method, target)
        .headers(parts.headers)
        .body(body);

    match app.call(head) {
        Ok(res) => res.into_http(),
        Err(err) => {
            error!(error = %err, config = err.is_config(), "unhandled error while routing");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn empty(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut res = Response::with_status(status);
    res.finish();
    res.into_http()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. A signal that cannot be
/// installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Matcher;

    fn app() -> App {
        App::builder()
            .route(|r| {
                r.post("echo", |r, _| Ok(format!("{}:{}", r.param("a").unwrap_or("-"), r.param("q").unwrap_or("-"))))?;
                r.is(("boom", Matcher::symbol("missing")), |_, _| Ok("never"))
            })
            .freeze()
            .unwrap()
    }

    #[test]
    fn bind_parses_the_address() {
        let server = Server::bind("127.0.0.1:8080").unwrap();
        assert_eq!(server.addr(), SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert!(matches!(Server::bind("localhost"), Err(Error::Address(_))));
    }

    #[tokio::test]
    async fn form_and_query_reach_the_request() {
        let req = http::Request::post("/echo?q=1")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Full::new(Bytes::from_static(b"a=2")))
            .unwrap();
        let res = handle(&app(), req).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"2:1");
    }

    #[tokio::test]
    async fn routing_errors_become_500() {
        let req = http::Request::get("/boom/x").body(Full::new(Bytes::new())).unwrap();
        let res = handle(&app(), req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
