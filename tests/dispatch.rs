//! End-to-end dispatch tests: chain ordering, short-circuit, failure
//! delivery, and per-request isolation under concurrency.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pilum::{Context, Error, ExceptionHandler, Handler, Method, Router};

fn ctx(method: Method, target: &str) -> Context {
    Context::new(method, target, Vec::new(), Vec::new())
}

/// Records a label into a shared trace, then continues the chain.
struct Step {
    label: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Handler for Step {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        self.trace.lock().unwrap().push(self.label);
        ctx.next().await
    }
}

/// Terminal handler that records a label and responds.
struct Terminal {
    label: &'static str,
    trace: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Handler for Terminal {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        self.trace.lock().unwrap().push(self.label);
        ctx.send("done");
        Ok(())
    }
}

/// Responds without calling the continuation.
struct RejectAll;

#[async_trait]
impl Handler for RejectAll {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        ctx.status(401);
        ctx.send("unauthorized");
        Ok(())
    }
}

#[tokio::test]
async fn middleware_runs_in_registration_order_then_terminal() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new();
    router.use_middleware(Step { label: "first", trace: Arc::clone(&trace) });
    router.use_middleware(Step { label: "second", trace: Arc::clone(&trace) });
    router
        .get("/x", Terminal { label: "terminal", trace: Arc::clone(&trace) })
        .unwrap();

    let done = router.dispatch(ctx(Method::Get, "/x")).await;
    assert_eq!(done.response_body(), b"done");
    assert_eq!(*trace.lock().unwrap(), vec!["first", "second", "terminal"]);
}

#[tokio::test]
async fn short_circuit_prevents_terminal_from_running() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new();
    router.use_middleware(RejectAll);
    router
        .get("/x", Terminal { label: "terminal", trace: Arc::clone(&trace) })
        .unwrap();

    let done = router.dispatch(ctx(Method::Get, "/x")).await;
    assert_eq!(done.response_status(), 401);
    assert_eq!(done.response_body(), b"unauthorized");
    assert!(trace.lock().unwrap().is_empty(), "terminal must never run");
}

#[tokio::test]
async fn middleware_runs_even_on_routing_miss() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new();
    router.use_middleware(Step { label: "mw", trace: Arc::clone(&trace) });

    let done = router.dispatch(ctx(Method::Get, "/nowhere")).await;
    assert_eq!(done.response_status(), 404);
    assert_eq!(*trace.lock().unwrap(), vec!["mw"]);
}

/// Middleware failure is delivered to the exception handler; the terminal
/// handler never runs.
struct FailWith(&'static str);

#[async_trait]
impl Handler for FailWith {
    async fn handle(&self, _ctx: &mut Context) -> Result<(), Error> {
        Err(Error::BadRequest(self.0.into()))
    }
}

#[tokio::test]
async fn middleware_failure_reaches_exception_handler() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new();
    router.use_middleware(FailWith("bad input"));
    router
        .get("/x", Terminal { label: "terminal", trace: Arc::clone(&trace) })
        .unwrap();

    let done = router.dispatch(ctx(Method::Get, "/x")).await;
    assert_eq!(done.response_status(), 400);
    assert!(done.responded());
    assert!(trace.lock().unwrap().is_empty());
}

struct CountingExceptionHandler(Arc<AtomicUsize>);

impl ExceptionHandler for CountingExceptionHandler {
    fn handle(&self, _err: &Error, ctx: &mut Context) {
        self.0.fetch_add(1, Ordering::SeqCst);
        ctx.status(503);
        ctx.send("custom");
    }
}

#[tokio::test]
async fn custom_exception_handler_is_the_single_delivery_point() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    router.set_exception_handler(CountingExceptionHandler(Arc::clone(&hits)));
    router.get("/boom", FailWith("x")).unwrap();

    let done = router.dispatch(ctx(Method::Get, "/boom")).await;
    assert_eq!(done.response_status(), 503);
    assert_eq!(done.response_body(), b"custom");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// An exception handler that violates its contract by never responding.
struct Negligent;

impl ExceptionHandler for Negligent {
    fn handle(&self, _err: &Error, _ctx: &mut Context) {}
}

#[tokio::test]
async fn negligent_exception_handler_is_backstopped() {
    let router = Router::new();
    router.set_exception_handler(Negligent);
    router.get("/boom", FailWith("x")).unwrap();

    let done = router.dispatch(ctx(Method::Get, "/boom")).await;
    assert!(done.responded());
    assert_eq!(done.response_status(), 500);
}

/// Echoes its path variable and request body, so cross-request
/// contamination is detectable.
struct Echo(&'static str);

#[async_trait]
impl Handler for Echo {
    async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
        let id = ctx.path_var("id").unwrap_or("?").to_owned();
        let body = String::from_utf8_lossy(ctx.body()).into_owned();
        ctx.send(format!("{}:{}:{}", self.0, id, body));
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_stay_isolated() {
    let router = Arc::new(Router::new());
    router.get("/a/{id}", Echo("a")).unwrap();
    router.get("/b/{id}", Echo("b")).unwrap();

    let mut joins = Vec::new();
    for i in 0..64 {
        let router = Arc::clone(&router);
        joins.push(tokio::spawn(async move {
            let lane = if i % 2 == 0 { "a" } else { "b" };
            let c = Context::new(
                Method::Get,
                format!("/{lane}/{i}"),
                Vec::new(),
                format!("payload-{i}").into_bytes(),
            );
            let done = router.dispatch(c).await;
            let expected = format!("{lane}:{i}:payload-{i}");
            assert_eq!(done.response_body(), expected.as_bytes());
            assert_eq!(done.path_var("id"), Some(format!("{i}").as_str()));
        }));
    }
    for join in joins {
        join.await.unwrap();
    }
}

#[tokio::test]
async fn multipart_round_trip_through_dispatch() {
    struct ReadForm;

    #[async_trait]
    impl Handler for ReadForm {
        async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
            let summary = {
                let form = ctx.multipart()?;
                format!(
                    "{}/{}/{}",
                    form.field("name").unwrap_or("?"),
                    form.file("file").map(|f| f.filename.as_str()).unwrap_or("?"),
                    form.file("file")
                        .map(|f| String::from_utf8_lossy(&f.data).into_owned())
                        .unwrap_or_default(),
                )
            };
            ctx.send(summary);
            Ok(())
        }
    }

    let body = b"--B\r\n\
        Content-Disposition: form-data; name=\"name\"\r\n\r\n\
        foo\r\n\
        --B\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"bar.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hi\r\n\
        --B--\r\n"
        .to_vec();

    let router = Router::new();
    router.post("/upload", ReadForm).unwrap();

    let c = Context::new(
        Method::Post,
        "/upload",
        vec![(
            "Content-Type".to_owned(),
            "multipart/form-data; boundary=B".to_owned(),
        )],
        body,
    );
    let done = router.dispatch(c).await;
    assert_eq!(done.response_body(), b"foo/bar.txt/hi");
}

#[tokio::test]
async fn head_through_dispatch_reports_status_without_body() {
    struct Hello;

    #[async_trait]
    impl Handler for Hello {
        async fn handle(&self, ctx: &mut Context) -> Result<(), Error> {
            ctx.send("hello world");
            Ok(())
        }
    }

    let router = Router::new();
    router.head("/greeting", Hello).unwrap();

    let done = router.dispatch(ctx(Method::Head, "/greeting")).await;
    assert_eq!(done.response_status(), 200);
    assert!(done.response_body().is_empty());
    let len = done
        .response_headers()
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.as_str());
    assert_eq!(len, Some("0"));
}
