//! Request object (§3) and request reader (C6): the buffered, line-oriented
//! parser that turns wire bytes into a [`Request`] plus a routing outcome,
//! with the exact size bounds and error taxonomy of §4.6.

use crate::errors::HttpError;
use crate::handler::Handler;
use crate::header::HeaderMap;
use crate::limits::ReqLimits;
use crate::router::Router;
use crate::status::Method;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Request object (§3).
///
/// The reader (rfile) and writer (wfile) the source attaches to this object
/// live on the connection driver instead, since Rust's ownership model
/// makes a self-referential `request.response`/`request.rfile` awkward;
/// everything the handler-facing surface (§6) actually reads or sets is a
/// plain field here.
pub struct Request {
    pub client_address: SocketAddr,
    pub keepalive: bool,
    pub method: Method,
    /// Raw request-URI (path + query), unparsed. This exact string is what
    /// the resource gate (C4) and the router (C8) key on.
    pub resource: String,
    /// The request line, CRLF stripped.
    pub request_line: String,
    pub headers: HeaderMap,
    /// Populated only when the matched handler's `get_body()` returned true
    /// for this method (§4.5 step 3).
    pub body: Option<Vec<u8>>,
    /// Capture groups from the route regex that matched `resource` (§4.8).
    pub captures: Vec<String>,
}

impl Request {
    fn placeholder(client_address: SocketAddr, keepalive_default: bool) -> Self {
        Self {
            client_address,
            keepalive: keepalive_default,
            method: Method::Get,
            resource: String::new(),
            request_line: String::new(),
            headers: HeaderMap::new(),
            body: None,
            captures: Vec::new(),
        }
    }
}

/// What the reader produced for one iteration of the connection loop.
pub enum ReadOutcome {
    /// A route matched; `handler` is bound and ready to be invoked with
    /// `captures`.
    Matched { request: Request, handler: Arc<dyn Handler>, captures: Vec<String> },
    /// Parsing or routing failed in steps 5-11 of §4.6. The error is
    /// carried alongside a best-effort `request` (populated with whatever
    /// fields were parsed before the failure) rather than reified as a
    /// literal dummy-handler object: matching on this variant is the single
    /// call site that may write a response, which preserves the source's
    /// "exactly one writer to the socket" invariant without needing a stub
    /// trait object to get there.
    Failed { request: Request, error: HttpError },
}

/// Reads one line bounded to `max_len + 1` bytes. Returns an empty `Vec` on
/// immediate EOF. Never reads past `max_len + 1` bytes, so the caller can
/// detect "exceeded the cap" by checking `line.len() == max_len + 1`.
async fn read_bounded_line<R>(reader: &mut R, max_len: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        if line.len() > max_len {
            break;
        }
        let mut byte = [0u8; 1];
        let n = reader.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        line.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(line)
}

/// Reads and routes one request per §4.6. `initial_timeout` is the
/// (typically shorter) keep-alive wait applied only to the first byte of
/// the request line; `normal_timeout` governs every subsequent read.
///
/// Returns `None` on silent abort (steps 2-3: any low-level read failure,
/// including a timeout, or an empty read) — the connection is to be closed
/// without a response attempt. A read failure while reading header lines is
/// treated the same way: the original's per-line reads share the same
/// socket-timeout machinery as the request line with no distinct handling
/// called out in §4.6, so this generalizes "any low-level read failure
/// aborts silently" across the header loop too (see DESIGN.md).
pub async fn read_request<R>(
    reader: &mut R,
    client_address: SocketAddr,
    initial_timeout: Option<Duration>,
    normal_timeout: Duration,
    keepalive_default: bool,
    req_limits: &ReqLimits,
    router: &Router,
) -> Option<ReadOutcome>
where
    R: AsyncRead + Unpin,
{
    let first_wait = initial_timeout.unwrap_or(normal_timeout);
    let line = match timeout(first_wait, read_bounded_line(reader, req_limits.max_line_size)).await {
        Ok(Ok(line)) => line,
        _ => return None,
    };
    if line.is_empty() {
        return None;
    }

    let mut request = Request::placeholder(client_address, keepalive_default);

    if line.len() == req_limits.max_line_size + 1 {
        request.request_line = lossy_trim(&line);
        return Some(ReadOutcome::Failed { request, error: HttpError::uri_too_long() });
    }
    if !line.ends_with(b"\r\n") {
        request.request_line = lossy_trim(&line);
        return Some(ReadOutcome::Failed { request, error: HttpError::bad_request() });
    }

    let line_str = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
    request.request_line = line_str.clone();

    let tokens: Vec<&str> = line_str.split_whitespace().collect();
    if tokens.len() != 3 {
        return Some(ReadOutcome::Failed { request, error: HttpError::bad_request() });
    }
    let (method_str, resource, version_str) = (tokens[0], tokens[1], tokens[2]);

    if version_str != "HTTP/1.1" {
        return Some(ReadOutcome::Failed { request, error: HttpError::unsupported_version() });
    }

    // An unrecognized method token is not a parse failure (§4.6 has no slot
    // for it): it becomes `Method::Other` and reaches routing, where it can
    // only ever fail as a 404 (no route) or 405 (route matched, method not
    // in `methods()`), same as the original's `hasattr` miss at dispatch time.
    request.method = method_str.parse::<Method>().expect("Method::from_str never fails");
    request.resource = resource.to_string();

    loop {
        let hline = match timeout(normal_timeout, read_bounded_line(reader, req_limits.max_line_size)).await {
            Ok(Ok(line)) => line,
            _ => return None,
        };
        if hline.is_empty() {
            return None;
        }
        if hline == b"\r\n" {
            break;
        }

        if hline.len() > req_limits.max_line_size {
            let field = field_name(&hline);
            return Some(ReadOutcome::Failed {
                request,
                error: HttpError::header_fields_too_large(&field),
            });
        }
        if request.headers.len() >= req_limits.max_headers {
            return Some(ReadOutcome::Failed { request, error: HttpError::new(431) });
        }
        if !hline.ends_with(b"\r\n") || !hline.contains(&b':') {
            return Some(ReadOutcome::Failed { request, error: HttpError::bad_request() });
        }

        request.headers.add(&lossy_trim(&hline));
    }

    if request.headers.get("connection").is_some_and(|v| v.eq_ignore_ascii_case("close")) {
        request.keepalive = false;
    }

    match router.match_request(&request.resource) {
        Some((handler, captures)) => Some(ReadOutcome::Matched { request, handler, captures }),
        None => Some(ReadOutcome::Failed { request, error: HttpError::not_found() }),
    }
}

fn lossy_trim(line: &[u8]) -> String {
    String::from_utf8_lossy(line).trim_end_matches(['\r', '\n']).to_string()
}

fn field_name(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.split(':').next().unwrap_or("").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Body, Nonatomic, Outcome};
    use crate::response::Response;
    use async_trait::async_trait;
    use std::io::Cursor;

    struct RootHandler;

    #[async_trait]
    impl Handler for RootHandler {
        fn methods(&self) -> &'static [Method] {
            &[Method::Get]
        }

        fn nonatomic(&self) -> Nonatomic {
            Nonatomic::All
        }

        async fn call(&self, _method: Method, _req: &mut Request, _resp: &mut Response) -> Result<Outcome, HttpError> {
            Ok(Outcome::new(204, Vec::new()))
        }
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.add_route("^/$", Arc::new(RootHandler)).unwrap();
        router
    }

    async fn read(input: &str) -> ReadOutcome {
        let mut cursor = Cursor::new(input.as_bytes().to_vec());
        read_request(
            &mut cursor,
            "127.0.0.1:1337".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .expect("should not silently abort")
    }

    #[tokio::test]
    async fn scenario_1_root_get_matches() {
        match read("GET / HTTP/1.1\r\n\r\n").await {
            ReadOutcome::Matched { request, .. } => {
                assert_eq!(request.resource, "/");
                assert!(request.keepalive);
            }
            ReadOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn scenario_2_connection_close_disables_keepalive() {
        match read("GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await {
            ReadOutcome::Matched { request, .. } => assert!(!request.keepalive),
            ReadOutcome::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn scenario_3_two_token_request_line_is_bad_request() {
        match read("GET /\r\n\r\n").await {
            ReadOutcome::Failed { error, .. } => assert_eq!(error.code(), 400),
            ReadOutcome::Matched { .. } => panic!("expected 400"),
        }
    }

    #[tokio::test]
    async fn scenario_4_unsupported_version_is_505() {
        match read("GET / HTTP/9000\r\n\r\n").await {
            ReadOutcome::Failed { error, .. } => assert_eq!(error.code(), 505),
            ReadOutcome::Matched { .. } => panic!("expected 505"),
        }
    }

    #[tokio::test]
    async fn scenario_5_oversized_header_is_431_with_field_name() {
        let mut limits = ReqLimits::default();
        limits.max_line_size = 16;
        let body = format!("GET / HTTP/1.1\r\nTooLong: {}\r\n\r\n", "x".repeat(40));
        let mut cursor = Cursor::new(body.into_bytes());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1337".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &limits,
            &router(),
        )
        .await
        .unwrap();
        match outcome {
            ReadOutcome::Failed { error, .. } => {
                assert_eq!(error.code(), 431);
                assert_eq!(error.status_message(), Some("TooLong Header Too Large"));
            }
            ReadOutcome::Matched { .. } => panic!("expected 431"),
        }
    }

    #[tokio::test]
    async fn scenario_404_does_not_disable_keepalive() {
        match read("GET /nonexistent HTTP/1.1\r\n\r\n").await {
            ReadOutcome::Failed { request, error } => {
                assert_eq!(error.code(), 404);
                assert!(request.keepalive, "404 must not disable keep-alive");
            }
            ReadOutcome::Matched { .. } => panic!("expected 404"),
        }
    }

    #[tokio::test]
    async fn empty_read_silently_aborts() {
        let mut cursor = Cursor::new(Vec::new());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1337".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn scenario_6_pipelined_requests_leave_exact_leftover_bytes() {
        let mut cursor = Cursor::new(b"GET / HTTP/1.1\r\n\r\nGET /nonexistent HTTP/1.1\r\n\r\n".to_vec());
        let first = read_request(
            &mut cursor,
            "127.0.0.1:1337".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();
        assert!(matches!(first, ReadOutcome::Matched { .. }));

        let mut leftover = Vec::new();
        cursor.read_to_end(&mut leftover).await.unwrap();
        assert_eq!(leftover, b"GET /nonexistent HTTP/1.1\r\n\r\n");
    }
}
