//! Plugins shipped with arbor.
//!
//! | plugin | does |
//! |---|---|
//! | [`ErrorHandler`] | turns routing errors into a response |
//! | [`Head`] | answers `HEAD` with the `GET` route, minus the body |
//! | [`HeaderMatchers`] | `header`, `host`, `user_agent` and `accept` hash matchers |
//! | [`SymbolMatchers`] | `d`, `w`, `rest`, `opt` and `optd` symbol matchers |
//! | [`ParamsCapturing`] | symbol captures become named params |
//! | [`DefaultHeaders`] | headers added to every response that lacks them |
//! | [`CommonLogger`] | one access-log event per request |
//! | [`NotFound`] | a body for empty 404 responses |

mod common_logger;
mod default_headers;
mod error_handler;
mod head;
mod header_matchers;
mod not_found;
mod params_capturing;
mod symbol_matchers;

pub use common_logger::CommonLogger;
pub use default_headers::DefaultHeaders;
pub use error_handler::ErrorHandler;
pub use head::Head;
pub use header_matchers::HeaderMatchers;
pub use not_found::NotFound;
pub use params_capturing::ParamsCapturing;
pub use symbol_matchers::SymbolMatchers;
