//! The plugin seam.
//!
//! A plugin is a value that configures an [`AppBuilder`]: it may register
//! matchers, hooks, routes, an error handler or flip [`Options`](crate::Options).
//! Plugins never see each other; ordering between them is expressed only
//! through hook priorities.
//!
//! ```rust
//! use arbor::{App, AppBuilder, Plugin};
//! use arbor::hooks::priority;
//!
//! struct PoweredBy;
//!
//! impl Plugin for PoweredBy {
//!     fn name(&self) -> &'static str {
//!         "powered_by"
//!     }
//!
//!     fn setup(&self, app: AppBuilder) -> AppBuilder {
//!         app.after(priority::DEFAULT, "powered_by", |_, res| {
//!             res.set_header(http::HeaderName::from_static("x-powered-by"), "arbor");
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let app = App::builder().plugin(PoweredBy).freeze().unwrap();
//! assert_eq!(app.plugins(), &["powered_by"]);
//! ```

use crate::app::AppBuilder;

pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn setup(&self, app: AppBuilder) -> AppBuilder;
}
