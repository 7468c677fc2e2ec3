//! # pilum
//!
//! An embeddable HTTP request-dispatch core. Given a request, pick a
//! handler, thread it through an ordered middleware chain, produce exactly
//! one response. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! The pieces with real algorithmic content live here:
//!
//! - **Pattern routing** — literal segments, `{name}` captures, trailing `*`
//!   wildcard; first-registered pattern wins on overlap
//! - **Middleware chain** — ordered interceptors with an explicit
//!   [`Context::next`] continuation; not calling it short-circuits the chain
//! - **Lazy body views** — query string, `x-www-form-urlencoded` form, and
//!   `multipart/form-data` parsed at most once per request, on first access
//! - **Per-request isolation** — one [`Context`] per request, exclusively
//!   owned by its task; shared state (routes, chain) is read-mostly and
//!   lock-guarded
//!
//! Everything pilum skips — TLS, rate limiting, body-size limits, static
//! files, JSON codecs — is either your reverse proxy's job or your
//! application's. The core sends bytes; it does not care how you build them.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pilum::{BoxFuture, Context, Error, Router, Server, middleware::Trace};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let app = Router::new();
//!     app.use_middleware(Trace);
//!     app.get("/users/{id}", get_user)?;
//!     app.get("/files/*", get_file)?;
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! fn get_user(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
//!     Box::pin(async move {
//!         let id = ctx.path_var("id").unwrap_or("unknown").to_owned();
//!         ctx.json(format!(r#"{{"id":"{id}"}}"#).into_bytes());
//!         Ok(())
//!     })
//! }
//!
//! fn get_file(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
//!     Box::pin(async move {
//!         let rest = ctx.path_var(pilum::pattern::WILDCARD).unwrap_or("").to_owned();
//!         ctx.send(format!("you asked for {rest}"));
//!         Ok(())
//!     })
//! }
//! ```

mod context;
mod error;
mod exception;
mod handler;
mod method;
mod multipart;
mod router;
mod server;

pub mod middleware;
pub mod pattern;

pub use context::Context;
pub use error::Error;
pub use exception::{DefaultExceptionHandler, ExceptionHandler};
pub use handler::{BoxFuture, Handler, SharedHandler};
pub use method::Method;
pub use multipart::{MultipartForm, UploadedFile};
pub use pattern::Pattern;
pub use router::Router;
pub use server::Server;
