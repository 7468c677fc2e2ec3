//! Built-in middleware.
//!
//! Middleware is the right place for cross-cutting concerns: structured
//! tracing, request-id injection, authentication-header inspection. A
//! middleware is just a [`Handler`] that decides whether to call
//! [`Context::next`] — there is nothing special to implement.
//!
//! Only [`Trace`] ships built in. CORS, auth, and the like belong to the
//! application (or the proxy in front of it), not the dispatch core.

use std::time::Instant;

use async_trait::async_trait;
use tracing::info;

use crate::context::Context;
use crate::error::Error;
use crate::handler::Handler;

/// Per-request span: method, path, status, latency.
///
/// ```rust
/// use pilum::{Router, middleware::Trace};
///
/// let app = Router::new();
/// app.use_middleware(Trace);
/// ```
pub struct Trace;

#[async_trait]
impl Handler for Trace {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        let start = Instant::now();
        let method = ctx.method();
        let path = ctx.path().to_owned();

        let result = ctx.next().await;

        // On failure the exception handler owns the final status and logging.
        if result.is_ok() {
            info!(
                %method,
                path = %path,
                status = ctx.response_status(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "request"
            );
        }
        result
    }
}
