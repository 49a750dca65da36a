//! Minimal arbor example: a routing tree, hash-dispatched API tables, named
//! sub-trees and a few plugins.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d 'name=alice'
//!   curl http://localhost:3000/api/v1/status
//!   curl http://localhost:3000/admin/stats
//!   curl -H 'host: eu.example.com' http://localhost:3000/region

use arbor::hooks::priority;
use arbor::plugins::{CommonLogger, DefaultHeaders, ErrorHandler, Head, HeaderMatchers, NotFound};
use arbor::{App, Matcher, Response, Server};
use http::StatusCode;

#[tokio::main]
async fn main() -> Result<(), arbor::Error> {
    tracing_subscriber::fmt::init();

    let app = App::builder()
        .plugin(CommonLogger)
        .plugin(Head)
        .plugin(HeaderMatchers)
        .plugin(DefaultHeaders::new().header("x-content-type-options", "nosniff"))
        .plugin(NotFound::new(|r| format!("nothing at {}\n", r.path())))
        .plugin(ErrorHandler::new(|_, err| Ok(format!("internal error: {err}\n"))))
        .before(priority::DEFAULT, "maintenance", |r| {
            if r.header("x-maintenance").is_some() {
                return r.halt(StatusCode::SERVICE_UNAVAILABLE);
            }
            Ok(())
        })
        // O(1) tables for the versioned API
        .hash_routes("/api/v1", |h| {
            h.get("status", |_| Ok(Response::json(r#"{"status":"ok"}"#)));
            h.get("version", |_| Ok(env!("CARGO_PKG_VERSION")));
        })
        .named_route("admin", "", |r| {
            r.is("stats", |_, _| Ok("requests: plenty\n"))
        })
        .route(|r| {
            r.root(|_| Ok("welcome to arbor\n"))?;

            r.on("users", |r, _| {
                r.get(Matcher::integer(), |_, caps| Ok(format!("user #{}\n", caps.int(0)?)))?;
                r.post((), |r, _| {
                    r.response_mut().set_status(StatusCode::CREATED);
                    Ok(format!("created {}\n", r.param("name").unwrap_or("anonymous")))
                })
            })?;

            r.on("api", |r, _| r.on("v1", |r, _| r.hash_routes(Some("/api/v1"))))?;

            r.is(("region", Matcher::hash([("host", Matcher::regex(r"\A(\w+)\.example\.com\z"))])), |_, caps| {
                Ok(format!("region {}\n", caps.str(0)?))
            })?;

            r.multi_route("")
        })
        .freeze()?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}
