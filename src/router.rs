//! Route table, registration surface, and the dispatch entry point.
//!
//! Lookup is a linear scan over the routes in registration order —
//! **first match wins**, not most-specific-match. This is a deliberate
//! choice favoring simplicity: when patterns overlap (`/users/me` vs.
//! `/users/{id}`), register the more specific one first. Registration is
//! expected at startup but is safe while serving: the table sits behind a
//! read-write lock and the middleware chain is swapped as a copy-on-write
//! snapshot, so in-flight dispatches never observe a half-built chain.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::context::Context;
use crate::error::Error;
use crate::exception::{DefaultExceptionHandler, ExceptionHandler};
use crate::handler::{Handler, SharedHandler};
use crate::method::Method;
use crate::pattern::Pattern;

struct Route {
    method: Method,
    pattern: Pattern,
    handler: SharedHandler,
}

/// The application router: route table, shared middleware chain, and
/// exception handler.
///
/// Build one, register routes and middleware, hand it to
/// [`Server::serve`](crate::Server::serve) — or embed it and call
/// [`dispatch`](Router::dispatch) yourself, once per request.
pub struct Router {
    routes: RwLock<Vec<Route>>,
    chain: RwLock<Arc<Vec<SharedHandler>>>,
    exception: RwLock<Arc<dyn ExceptionHandler>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            chain: RwLock::new(Arc::new(Vec::new())),
            exception: RwLock::new(Arc::new(DefaultExceptionHandler)),
        }
    }

    // ── Registration ──────────────────────────────────────────────────────

    /// Registers a handler for a method + pattern pair.
    ///
    /// Pattern syntax: literal segments, `{name}` single-segment captures,
    /// and a trailing `*` full-remainder capture. Fails with
    /// [`Error::InvalidPattern`] on a malformed pattern. Registering the
    /// same (method, pattern) again replaces the prior handler in place.
    pub fn register(
        &self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<(), Error> {
        let pattern = Pattern::parse(pattern)?;
        let handler: SharedHandler = Arc::new(handler);
        let mut routes = self.routes.write().expect("route table lock poisoned");
        if let Some(existing) = routes
            .iter_mut()
            .find(|r| r.method == method && r.pattern == pattern)
        {
            existing.handler = handler;
        } else {
            routes.push(Route { method, pattern, handler });
        }
        Ok(())
    }

    pub fn get(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Get, pattern, handler)
    }

    pub fn post(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Post, pattern, handler)
    }

    pub fn put(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Put, pattern, handler)
    }

    pub fn delete(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Delete, pattern, handler)
    }

    pub fn patch(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Patch, pattern, handler)
    }

    pub fn head(&self, pattern: &str, handler: impl Handler) -> Result<(), Error> {
        self.register(Method::Head, pattern, handler)
    }

    /// Appends a middleware to the shared chain. Middleware run in
    /// registration order, before the terminal route handler.
    pub fn use_middleware(&self, middleware: impl Handler) {
        let mut chain = self.chain.write().expect("middleware chain lock poisoned");
        let mut next: Vec<SharedHandler> = chain.as_ref().clone();
        next.push(Arc::new(middleware));
        *chain = Arc::new(next);
    }

    /// Replaces the default exception handler.
    pub fn set_exception_handler(&self, handler: impl ExceptionHandler) {
        *self.exception.write().expect("exception handler lock poisoned") = Arc::new(handler);
    }

    // ── Dispatch ──────────────────────────────────────────────────────────

    /// The core entry point: the listener calls this exactly once per
    /// accepted request and writes the returned context to the transport.
    ///
    /// Applies `X-HTTP-Method-Override` for routing (the context keeps the
    /// wire method, so HEAD body suppression still works), seeds path
    /// variables, installs the chain, and drives it. Any failure the chain
    /// raises is delivered to the exception handler; the returned context is
    /// guaranteed to be responded — a routing miss becomes `404 Not Found`,
    /// and a misbehaving custom exception handler is backstopped with a
    /// bare 500.
    pub async fn dispatch(&self, mut ctx: Context) -> Context {
        let effective = effective_method(&ctx);

        if let Some((handler, vars)) = effective.and_then(|m| self.lookup(m, ctx.path())) {
            ctx.set_path_vars(vars);
            ctx.set_terminal(Some(handler));
        }
        ctx.set_chain(Arc::clone(&self.chain.read().expect("middleware chain lock poisoned")));

        if let Err(err) = ctx.next().await {
            let exception =
                Arc::clone(&self.exception.read().expect("exception handler lock poisoned"));
            exception.handle(&err, &mut ctx);
            if !ctx.responded() {
                ctx.status(500);
                ctx.send("Internal Server Error");
            }
        }
        ctx
    }

    /// First structural match in registration order.
    fn lookup(&self, method: Method, path: &str) -> Option<(SharedHandler, HashMap<String, String>)> {
        let routes = self.routes.read().expect("route table lock poisoned");
        for route in routes.iter() {
            if route.method != method {
                continue;
            }
            if let Some(vars) = route.pattern.matches(path) {
                return Some((Arc::clone(&route.handler), vars));
            }
        }
        None
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// The method used for routing: `X-HTTP-Method-Override` when present and
/// non-blank, otherwise the wire method. An override naming no known method
/// routes nowhere, which surfaces as a 404.
fn effective_method(ctx: &Context) -> Option<Method> {
    match ctx.header("x-http-method-override") {
        Some(o) if !o.trim().is_empty() => o.trim().parse().ok(),
        _ => Some(ctx.method()),
    }
}
