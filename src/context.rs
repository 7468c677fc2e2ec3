//! Per-request context: request facts, lazy parsed views, response state,
//! and the middleware cursor.
//!
//! One `Context` exists per accepted request and is exclusively owned by the
//! task dispatching that request — never shared, never reused. That single
//! ownership is why the lazy caches below need no synchronization: the
//! accessors take `&mut self` and memoize on first use.
//!
//! Response state is write-once. The first `send` / `send_bytes` / `json`
//! call wins; later calls are no-ops that emit a `tracing` debug event.
//! Nothing here writes to the transport — the listener converts the finished
//! context into a wire response exactly once, so a double send can never
//! produce two status lines.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;
use crate::handler::SharedHandler;
use crate::method::Method;
use crate::multipart::{self, MultipartForm};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// The request/response context handed to every middleware and handler.
pub struct Context {
    // Request facts, immutable after construction.
    method: Method,
    path: String,
    raw_query: Option<String>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    peer_addr: Option<SocketAddr>,

    // Derived state, computed once and cached.
    query_params: Option<HashMap<String, String>>,
    form_params: Option<HashMap<String, String>>,
    multipart: Option<MultipartForm>,
    path_vars: HashMap<String, String>,

    // Middleware chain. The chain itself is shared across requests; the
    // cursor is this request's alone.
    chain: Arc<Vec<SharedHandler>>,
    terminal: Option<SharedHandler>,
    cursor: isize,

    // Response state.
    status: u16,
    response_headers: Vec<(String, String)>,
    response_body: Vec<u8>,
    responded: bool,
}

impl Context {
    /// Builds a context from the request facts the lower HTTP layer exposes.
    ///
    /// `target` is the request target: a path with an optional `?query`
    /// suffix, e.g. `/search?q=hello`.
    pub fn new(
        method: Method,
        target: impl Into<String>,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        let target = target.into();
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target, None),
        };
        Self {
            method,
            path,
            raw_query,
            headers,
            body,
            peer_addr: None,
            query_params: None,
            form_params: None,
            multipart: None,
            path_vars: HashMap::new(),
            chain: Arc::new(Vec::new()),
            terminal: None,
            cursor: -1,
            status: 200,
            response_headers: Vec::new(),
            response_body: Vec::new(),
            responded: false,
        }
    }

    /// Records the peer address, used as the [`remote_ip`](Self::remote_ip)
    /// fallback when no `X-Forwarded-For` header is present.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    // ── Request facts ─────────────────────────────────────────────────────

    /// The effective HTTP method of this request.
    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path, query string excluded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Case-insensitive request header lookup, first value wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The value of the named cookie from the `Cookie` header, if any.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let header = self.header("cookie")?;
        for item in header.split(';') {
            if let Some((k, v)) = item.trim().split_once('=') {
                if k.trim() == name {
                    return Some(v.trim());
                }
            }
        }
        None
    }

    /// The client IP: the first `X-Forwarded-For` entry when the header is
    /// present and non-blank, otherwise the peer address.
    pub fn remote_ip(&self) -> Option<String> {
        if let Some(xff) = self.header("x-forwarded-for") {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_owned());
                }
            }
        }
        self.peer_addr.map(|addr| addr.ip().to_string())
    }

    // ── Lazy parsed views ─────────────────────────────────────────────────

    /// A query parameter, parsed from the URL's query string on first access.
    ///
    /// `"a=1&b=2"` yields `a → "1"`, `b → "2"`; a pair with no `=` yields an
    /// empty-string value. Keys and values are percent-decoded (`+` means
    /// space); text that fails to decode is kept raw rather than failing the
    /// request.
    pub fn query_param(&mut self, key: &str) -> Option<&str> {
        if self.query_params.is_none() {
            let parsed = parse_pairs(self.raw_query.as_deref().unwrap_or(""));
            self.query_params = Some(parsed);
        }
        self.query_params.as_ref()?.get(key).map(String::as_str)
    }

    /// A form parameter, parsed from the body on first access.
    ///
    /// Applies only when the declared content type is exactly
    /// `application/x-www-form-urlencoded` (compared case-insensitively);
    /// any other content type yields an empty view, not an error.
    pub fn form_param(&mut self, key: &str) -> Option<&str> {
        if self.form_params.is_none() {
            let is_form = self
                .header("content-type")
                .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(FORM_URLENCODED));
            let parsed = if is_form {
                parse_pairs(&String::from_utf8_lossy(&self.body))
            } else {
                HashMap::new()
            };
            self.form_params = Some(parsed);
        }
        self.form_params.as_ref()?.get(key).map(String::as_str)
    }

    /// The path variable captured by routing under `name`.
    ///
    /// For route `/users/{id}` and path `/users/42`, `path_var("id")` is
    /// `Some("42")`. A trailing `*` capture lives under
    /// [`pattern::WILDCARD`](crate::pattern::WILDCARD).
    pub fn path_var(&self, name: &str) -> Option<&str> {
        self.path_vars.get(name).map(String::as_str)
    }

    pub(crate) fn set_path_vars(&mut self, vars: HashMap<String, String>) {
        self.path_vars = vars;
    }

    /// The request body parsed as `multipart/form-data`, cached on first call.
    ///
    /// Unlike the query/form views this is a hard failure when the request
    /// is not multipart or declares no boundary — the caller explicitly
    /// opted into multipart handling, so a soft empty result would hide a
    /// framing bug.
    pub fn multipart(&mut self) -> Result<&MultipartForm, Error> {
        if self.multipart.is_none() {
            let boundary = self.multipart_boundary()?;
            let form = multipart::parse(&self.body, &boundary)?;
            self.multipart = Some(form);
        }
        Ok(self.multipart.as_ref().expect("multipart cache populated above"))
    }

    fn multipart_boundary(&self) -> Result<String, Error> {
        let content_type = self
            .header("content-type")
            .ok_or_else(|| Error::InvalidRequest("request is not multipart/form-data".into()))?;
        if !content_type
            .get(.."multipart/form-data".len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("multipart/form-data"))
        {
            return Err(Error::InvalidRequest("request is not multipart/form-data".into()));
        }
        for item in content_type.split(';') {
            if let Some(boundary) = item.trim().strip_prefix("boundary=") {
                let boundary = boundary
                    .strip_prefix('"')
                    .and_then(|b| b.strip_suffix('"'))
                    .unwrap_or(boundary);
                if !boundary.is_empty() {
                    return Ok(boundary.to_owned());
                }
            }
        }
        Err(Error::InvalidRequest("no boundary in multipart content type".into()))
    }

    // ── Response state ────────────────────────────────────────────────────

    /// Sets the response status. Any integer goes; once a send has recorded
    /// the response this is a no-op, so a late status change cannot relabel
    /// an already-recorded body.
    pub fn status(&mut self, code: u16) {
        if self.responded {
            return;
        }
        self.status = code;
    }

    /// Sets a response header, replacing an existing header of the same
    /// name (compared case-insensitively).
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(entry) = self
            .response_headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            entry.1 = value.to_owned();
        } else {
            self.response_headers.push((name.to_owned(), value.to_owned()));
        }
    }

    /// Adds a `Set-Cookie` response header:
    /// `name=value; Path=/; Max-Age=<seconds>`.
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age_seconds: u64) {
        self.set_header(
            "set-cookie",
            &format!("{name}={value}; Path=/; Max-Age={max_age_seconds}"),
        );
    }

    /// Records a plain-text response body.
    pub fn send(&mut self, body: impl Into<String>) {
        self.write(body.into().into_bytes());
    }

    /// Records a binary response body.
    pub fn send_bytes(&mut self, data: Vec<u8>) {
        self.write(data);
    }

    /// Records a JSON response body and sets `Content-Type:
    /// application/json`.
    ///
    /// Takes pre-serialized bytes — pilum sends bytes, it does not care how
    /// you build them: `serde_json::to_vec(&value)`, a `format!` literal,
    /// whatever your codec produces.
    pub fn json(&mut self, body: Vec<u8>) {
        if !self.responded {
            self.set_header("content-type", "application/json");
        }
        self.write(body);
    }

    /// Write-once core shared by the send variants.
    ///
    /// HEAD requests record the real status and `Content-Length: 0` with
    /// zero body bytes. A second write is a no-op.
    fn write(&mut self, body: Vec<u8>) {
        if self.responded {
            debug!(path = %self.path, "response already recorded; ignoring second send");
            return;
        }
        self.responded = true;
        if self.method == Method::Head {
            self.set_header("content-length", "0");
        } else {
            self.set_header("content-length", &body.len().to_string());
            self.response_body = body;
        }
    }

    /// Whether a send variant has recorded a response.
    pub fn responded(&self) -> bool {
        self.responded
    }

    /// The recorded response status.
    pub fn response_status(&self) -> u16 {
        self.status
    }

    /// The recorded response headers.
    pub fn response_headers(&self) -> &[(String, String)] {
        &self.response_headers
    }

    /// The recorded response body bytes.
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    /// Consumes the context, yielding `(status, headers, body)` for the
    /// listener to write to the transport.
    pub fn into_parts(self) -> (u16, Vec<(String, String)>, Vec<u8>) {
        (self.status, self.response_headers, self.response_body)
    }

    // ── Middleware chain ──────────────────────────────────────────────────

    pub(crate) fn set_chain(&mut self, chain: Arc<Vec<SharedHandler>>) {
        self.chain = chain;
    }

    pub(crate) fn set_terminal(&mut self, terminal: Option<SharedHandler>) {
        self.terminal = terminal;
    }

    /// Advances to the next middleware in the chain, or to the terminal
    /// route handler once the chain is exhausted.
    ///
    /// A middleware that never calls this short-circuits the rest of the
    /// chain — that is the intended early-rejection mechanism, not an error.
    /// On a routing miss the chain still runs; reaching the end with no
    /// terminal handler records a `404 Not Found`.
    pub async fn next(&mut self) -> Result<(), Error> {
        self.cursor += 1;
        let index = self.cursor as usize;
        if index < self.chain.len() {
            let mw = Arc::clone(&self.chain[index]);
            mw.handle(self).await
        } else if let Some(terminal) = self.terminal.clone() {
            terminal.handle(self).await
        } else {
            if !self.responded {
                self.status(404);
                self.send("404 Not Found");
            }
            Ok(())
        }
    }
}

/// Parses `k=v&k2=v2` pairs, percent-decoding keys and values.
///
/// Shared by the query view and the form view — the two formats are
/// byte-identical. A pair with no `=` yields an empty value; duplicate keys:
/// last write wins.
fn parse_pairs(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        out.insert(decode_component(key), decode_component(value));
    }
    out
}

/// Percent-decodes one query component, treating `+` as space. Decode
/// failure falls back to the raw text — one malformed parameter should not
/// abort an otherwise valid request.
fn decode_component(text: &str) -> String {
    let plus_decoded = text.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text.to_owned(),
    }
}
