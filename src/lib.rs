//! # arbor
//!
//! A routing-tree HTTP framework. Routes are not a table of patterns: they
//! are a tree of blocks, and the request path is consumed segment by segment
//! as it walks down.
//!
//! ## The contract
//!
//! - A branch whose matchers all match is **committed**. Its block runs, and
//!   whatever it produces is the response. Siblings are never tried, even if
//!   the block produced nothing (that is a 404).
//! - A branch that does not match leaves no trace: the remaining path and the
//!   captures are exactly as before.
//! - Captures reach the block in matcher order.
//! - Everything registered on an [`AppBuilder`] is frozen into an immutable
//!   [`App`] before the first request. Nothing in the request path locks.
//!
//! Large sibling sets can skip the linear walk entirely through hash tables
//! ([`Request::hash_branches`], [`Request::hash_paths`]) or named sub-trees
//! ([`Request::multi_route`]). Plugins hook in before and after routing at
//! numbered priorities ([`hooks::priority`]).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use arbor::{App, Matcher, Server};
//! use arbor::plugins::{CommonLogger, Head};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), arbor::Error> {
//!     let app = App::builder()
//!         .plugin(CommonLogger)
//!         .plugin(Head)
//!         .route(|r| {
//!             r.root(|_| Ok("home"))?;
//!             r.on("users", |r, _| {
//!                 r.get(Matcher::integer(), |_, caps| Ok(format!("user {}", caps.int(0)?)))?;
//!                 r.post((), |r, _| Ok(format!("created {}", r.param("name").unwrap_or("?"))))
//!             })
//!         })
//!         .freeze()?;
//!
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//! ```

mod app;
mod capture;
mod error;
mod hash_routes;
mod matcher;
mod named_routes;
mod plugin;
mod request;
mod response;
mod server;

pub mod cursor;
pub mod dispatch;
pub mod hooks;
pub mod plugins;

pub use app::{App, AppBuilder, ErrorHandlerFn, Options};
pub use capture::{Capture, Captures};
pub use dispatch::{Halt, RouteFn, RouteResult};
pub use error::{BoxError, Error};
pub use hash_routes::HashRoutes;
pub use matcher::{ClassKey, Convert, HashMatcherFn, Matcher, MatcherSource, Matchers, Pattern, Predicate};
pub use plugin::Plugin;
pub use request::{Request, RequestHead};
pub use response::{ContentType, IntoReply, Reply, Response, ResponseBuilder};
pub use server::{Server, handle};
