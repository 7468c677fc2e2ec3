//! HTTP listener and graceful shutdown.
//!
//! The listener is an external collaborator to the dispatch core: for every
//! accepted request it builds one [`Context`], calls
//! [`Router::dispatch`] exactly once, and writes the returned context to the
//! transport. Nothing else.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting new connections
//! immediately — no new dispatch begins — and drains every in-flight
//! connection task before returning. When Kubernetes terminates a pod it
//! sends SIGTERM and waits `terminationGracePeriodSeconds` before SIGKILL;
//! set that longer than your slowest request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::error::Error;
use crate::method::Method;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Accepts connections and dispatches every request through `router`.
    ///
    /// Returns only after a full graceful shutdown: a signal, followed by
    /// all in-flight requests completing.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);

        info!(addr = %self.addr, "pilum listening");

        // Every connection task is tracked so shutdown can drain them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // `biased` checks arms top-to-bottom: a shutdown signal wins
                // over queued connections, so no new dispatch begins.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // The service closure runs once per request on the
                        // connection, not once per connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { handle(router, req, remote_addr).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the JoinSet stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("pilum stopped");
        Ok(())
    }
}

// ── Per-request plumbing ──────────────────────────────────────────────────────

/// Builds a [`Context`] from one hyper request, runs it through the core,
/// and converts the result back.
///
/// The error type is [`Infallible`]: every failure is turned into a response
/// here (405, 400, or whatever the exception handler decided), so hyper
/// never sees one and the client never sees a hung connection.
async fn handle(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let Ok(method) = req.method().as_str().parse::<Method>() else {
        warn!(method = %req.method(), "unroutable method");
        return Ok(plain(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed"));
    };

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| {
            (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned())
        })
        .collect();

    // Body reads may wait on the peer; they never block other requests.
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes().to_vec(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(plain(StatusCode::BAD_REQUEST, "400 Bad Request"));
        }
    };

    let ctx = Context::new(method, target, headers, body).with_peer_addr(remote_addr);
    let ctx = router.dispatch(ctx).await;
    Ok(into_http(ctx))
}

/// Converts a finished context into a hyper response.
fn into_http(ctx: Context) -> http::Response<Full<Bytes>> {
    let (status, headers, body) = ctx.into_parts();

    let mut builder = http::Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Full::new(Bytes::from(body))) {
        Ok(response) => response,
        Err(e) => {
            // A handler set a header hyper refuses (bad name or value).
            error!("failed to assemble response: {e}");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
        }
    }
}

fn plain(status: StatusCode, body: &'static str) -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal: SIGTERM or SIGINT on Unix, Ctrl-C
/// elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
