//! Turning uncaught failures into terminal responses.
//!
//! Whatever a middleware or handler raises ends up here, exactly once — the
//! chain never swallows a failure silently. The handler is the single point
//! of truth for the failure→response mapping and must itself never fail;
//! dispatch additionally backstops it with a bare 500 if it somehow leaves
//! the context unresponded.

use tracing::error;

use crate::context::Context;
use crate::error::Error;

/// Maps an uncaught failure during chain execution to a terminal response.
///
/// Implementations must not raise and must leave `ctx` responded. Install a
/// custom one with
/// [`Router::set_exception_handler`](crate::Router::set_exception_handler).
pub trait ExceptionHandler: Send + Sync + 'static {
    fn handle(&self, err: &Error, ctx: &mut Context);
}

/// The default policy.
///
/// Client-input failures map to 400, permission failures to 403, everything
/// else to 500. On 500 the failure is logged and the client gets a generic
/// body — internals are never leaked. The body is a small JSON object,
/// hand-formatted so the core carries no serializer.
pub struct DefaultExceptionHandler;

impl ExceptionHandler for DefaultExceptionHandler {
    fn handle(&self, err: &Error, ctx: &mut Context) {
        let status = err.status();
        let message = match err {
            Error::InvalidRequest(m) | Error::BadRequest(m) => format!("Bad Request: {m}"),
            Error::Forbidden(m) => format!("Forbidden: {m}"),
            _ => {
                error!(error = %err, path = %ctx.path(), "unhandled failure during dispatch");
                "Internal Server Error".to_owned()
            }
        };

        ctx.status(status);
        ctx.json(
            format!(r#"{{"status":{status},"error":"{}"}}"#, escape(&message)).into_bytes(),
        );
    }
}

/// Minimal JSON string escaping for the error body.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
