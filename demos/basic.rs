//! Minimal pilum example — routed JSON endpoints, middleware, form handling.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl 'http://localhost:3000/search?q=hello+world'
//!   curl -X POST http://localhost:3000/login -d 'user=alice&pass=secret' \
//!        -H 'content-type: application/x-www-form-urlencoded'
//!   curl -X POST http://localhost:3000/upload -F file=@README.md
//!   curl http://localhost:3000/files/a/b.png

use pilum::{BoxFuture, Context, Error, Router, Server, middleware::Trace};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new();
    app.use_middleware(Trace);

    app.get("/users/{id}", get_user)?;
    app.get("/search", search)?;
    app.post("/login", login)?;
    app.post("/upload", upload)?;
    app.get("/files/*", get_file)?;

    Server::bind("0.0.0.0:3000").serve(app).await
}

// GET /users/{id}
//
// ctx.json takes Vec<u8> — pass bytes from your serialiser:
//   serde_json:  ctx.json(serde_json::to_vec(&user).unwrap())
//   hand-built:  ctx.json(format!(...).into_bytes())
fn get_user(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let id = ctx.path_var("id").unwrap_or("unknown").to_owned();
        ctx.json(format!(r#"{{"id":"{id}","name":"alice"}}"#).into_bytes());
        Ok(())
    })
}

// GET /search?q=...
fn search(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let q = ctx.query_param("q").unwrap_or("").to_owned();
        ctx.send(format!("searching for: {q}"));
        Ok(())
    })
}

// POST /login — x-www-form-urlencoded body
fn login(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let user = ctx
            .form_param("user")
            .map(str::to_owned)
            .ok_or_else(|| Error::BadRequest("missing `user` field".into()))?;
        ctx.set_cookie("session", &user, 3600);
        ctx.send(format!("welcome, {user}"));
        Ok(())
    })
}

// POST /upload — multipart/form-data body
fn upload(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let (filename, size) = {
            let form = ctx.multipart()?;
            let file = form
                .file("file")
                .ok_or_else(|| Error::BadRequest("missing `file` part".into()))?;
            (file.filename.clone(), file.data.len())
        };
        ctx.status(201);
        ctx.send(format!("stored {filename} ({size} bytes)"));
        Ok(())
    })
}

// GET /files/* — trailing wildcard captures the whole remainder
fn get_file(ctx: &mut Context) -> BoxFuture<'_, Result<(), Error>> {
    Box::pin(async move {
        let rest = ctx.path_var(pilum::pattern::WILDCARD).unwrap_or("").to_owned();
        ctx.send(format!("you asked for {rest}"));
        Ok(())
    })
}
