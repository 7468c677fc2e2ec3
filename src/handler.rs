//! Handler trait and type erasure.
//!
//! # One capability, two roles
//!
//! Middleware and terminal route handlers share a single shape: an async
//! operation over a mutable [`Context`] that may fail. There is no separate
//! interceptor hierarchy — a middleware is just a handler that chooses
//! whether to call [`Context::next`].
//!
//! # How handlers are stored
//!
//! The route table holds handlers of *different* concrete types in one
//! collection, so they are erased behind `Arc<dyn Handler>`. The `Arc`
//! gives cheap thread-safe sharing across concurrent dispatches (one atomic
//! increment per request); the trait object costs one virtual call —
//! negligible next to network I/O.
//!
//! # Writing handlers
//!
//! Stateful handlers implement the trait directly:
//!
//! ```rust
//! use async_trait::async_trait;
//! use pilum::{Context, Error, Handler};
//!
//! struct RequireToken { token: String }
//!
//! #[async_trait]
//! impl Handler for RequireToken {
//!     async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
//!         match ctx.header("authorization") {
//!             Some(t) if t == self.token => ctx.next().await,
//!             _ => Err(Error::Forbidden("missing or bad token".into())),
//!         }
//!     }
//! }
//! ```
//!
//! Stateless ones are plain functions returning a boxed future — the
//! blanket impl below picks them up:
//!
//! ```rust
//! use pilum::{BoxFuture, Context, Error};
//!
//! fn hello(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
//!     Box::pin(async move {
//!         ctx.send("hello");
//!         Ok(())
//!     })
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::Error;

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send` so
/// tokio may move it across worker threads between polls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A middleware or terminal route handler.
///
/// Invoked with exclusive access to the request's [`Context`]. A middleware
/// proceeds by calling [`Context::next`]; *not* calling it short-circuits
/// the rest of the chain, which is the intended way to reject a request
/// early. Genuine failures are returned as [`Error`] and delivered to the
/// router's exception handler — never used for control flow.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error>;
}

/// A shared, type-erased handler.
pub type SharedHandler = Arc<dyn Handler>;

/// Any `fn(&mut Context) -> BoxFuture<'_, Result<(), Error>>` is a handler.
#[async_trait]
impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<(), Error>> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        (self)(ctx).await
    }
}
