use std::time::{Duration, Instant};

use tracing::info;

use crate::app::AppBuilder;
use crate::hooks::priority;
use crate::plugin::Plugin;

#[derive(Clone, Copy)]
struct Started(Instant);

/// Emits one `info` event per request on the `arbor::access` target, with
/// method, path, status, body size and elapsed time.
pub struct CommonLogger;

impl Plugin for CommonLogger {
    fn name(&self) -> &'static str {
        "common_logger"
    }

    fn setup(&self, app: AppBuilder) -> AppBuilder {
        app.before(priority::FIRST, "common_logger", |r| {
            r.extensions_mut().insert(Started(Instant::now()));
            Ok(())
        })
        .after(priority::LATE, "common_logger", |req, res| {
            let elapsed = req.extensions().get::<Started>().map(|s| s.0.elapsed());
            info!(
                target: "arbor::access",
                method = %req.method(),
                path = req.path(),
                status = res.status().as_u16(),
                bytes = res.chunks().iter().map(|c| c.len()).sum::<usize>(),
                elapsed_us = elapsed.map_or(0, micros),
                "request"
            );
            Ok(())
        })
    }
}

/// Whole microseconds, saturating at `u64::MAX`.
fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}
