//! Dispatch orchestration: the single place `respond()`'s steps from §4.5
//! and `handle()`'s steps from §4.7 are implemented, instead of per
//! handler — consulting [`Handler::methods`] in place of `hasattr` and
//! [`Handler::call`] in place of `getattr(...)()`.

use crate::errors::HttpError;
use crate::gate::ResourceGate;
use crate::handler::{Body, Handler, Outcome};
use crate::header::HeaderMap;
use crate::limits::ReqLimits;
use crate::logsink::LogSink;
use crate::request::{ReadOutcome, Request};
use crate::response::{catastrophic_fallback, write_response, Response};
use crate::router::Router;
use crate::status::{Method, StatusCode, Version};
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Runs §4.5's method-dispatch rules followed by §4.7's gate/invoke/
/// error-fallback/encode/log pipeline for one request iteration. Returns
/// whether the connection should stay open for another iteration.
pub async fn handle<S>(
    stream: &mut S,
    outcome: ReadOutcome,
    router: &Router,
    gate: &ResourceGate,
    log: &dyn LogSink,
    req_limits: &ReqLimits,
    server_version: &str,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut request, bound) = match outcome {
        ReadOutcome::Matched { request, handler, captures } => (request, Ok((handler, captures))),
        ReadOutcome::Failed { request, error } => (request, Err(error)),
    };

    let keepalive = request.keepalive;
    let request_line = request.request_line.clone();
    let client_address = request.client_address;

    let atomic = match &bound {
        Ok((handler, _)) => !handler.nonatomic().is_nonatomic(request.method.clone()),
        Err(_) => false,
    };
    let permit = gate.acquire(&request.resource, !atomic).await;

    let mut response = Response::new();
    let result = match bound {
        Ok((handler, captures)) => {
            request.captures = captures;
            invoke(&mut *stream, &handler, &mut request, &mut response, req_limits).await
        }
        Err(error) => Err(error),
    };

    let (status, reason, mut headers, body) = match result {
        Ok(outcome) => {
            let (status, reason) = resolve_status(outcome.status, outcome.reason);
            (status, reason, response.headers, outcome.body)
        }
        Err(error) => {
            response.headers = error.headers().clone();
            match render_error(&error, router, &mut request, &mut response, req_limits, stream).await {
                Ok((status, reason, body)) => (status, reason, response.headers, body),
                Err(()) => {
                    let (status, reason, headers, body) = catastrophic_fallback(&response.headers);
                    log.error(&format!("error handler itself failed for {request_line}"));
                    permit.release().await;
                    let written = write_response(stream, Version::Http11, status, reason, headers, Body::Bytes(body), true, req_limits.stream_chunk_size)
                        .await
                        .unwrap_or(0);
                    log.access(client_address, &request_line, status, written, std::time::SystemTime::now());
                    return false;
                }
            }
        }
    };

    permit.release().await;

    if !keepalive {
        headers.set("Connection", "close");
    }
    headers.set("Server", server_version);
    headers.set("Date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string());

    let write_body = response.write_body;
    let written = match write_response(stream, Version::Http11, status, &reason, headers, body, write_body, req_limits.stream_chunk_size).await {
        Ok(n) => n,
        Err(e) => {
            log.warn(&format!("write failed for {request_line}: {e}"));
            0
        }
    };

    log.access(client_address, &request_line, status, written, std::time::SystemTime::now());
    keepalive
}

fn resolve_status(status: u16, reason: Option<String>) -> (u16, String) {
    match reason {
        Some(reason) => (status, reason),
        None => (status, StatusCode::reason_phrase_for(status).to_string()),
    }
}

/// §4.5 steps 1-4, plus `OPTIONS`/`HEAD` synthesis.
async fn invoke<S>(
    stream: &mut S,
    handler: &Arc<dyn Handler>,
    request: &mut Request,
    response: &mut Response,
    req_limits: &ReqLimits,
) -> Result<Outcome, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if request.method == Method::Options {
        let allow = handler
            .methods()
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        response.headers.set("Allow", allow);
        return Ok(Outcome::new(204, Vec::new()));
    }

    if request.method == Method::Head {
        if !handler.methods().contains(&Method::Get) {
            return Err(HttpError::method_not_allowed());
        }
        response.write_body = false;
        return dispatch_method(stream, handler, Method::Get, request, response, req_limits).await;
    }

    if !handler.methods().contains(&request.method) {
        return Err(HttpError::method_not_allowed());
    }
    let method = request.method.clone();
    dispatch_method(stream, handler, method, request, response, req_limits).await
}

async fn dispatch_method<S>(
    stream: &mut S,
    handler: &Arc<dyn Handler>,
    method: Method,
    request: &mut Request,
    response: &mut Response,
    req_limits: &ReqLimits,
) -> Result<Outcome, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if request.headers.get("Expect").is_some_and(|v| v.eq_ignore_ascii_case("100-continue")) {
        handler.check_continue(request).await?;
        let interim = b"HTTP/1.1 100 Continue\r\n\r\n";
        tokio::io::AsyncWriteExt::write_all(stream, interim).await.map_err(HttpError::from)?;
    }

    if handler.get_body(method.clone()) {
        let declared = request
            .headers
            .get("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        if declared > req_limits.max_request_size {
            return Err(HttpError::too_large());
        }
        let mut body = vec![0u8; declared];
        stream.read_exact(&mut body).await.map_err(HttpError::from)?;
        request.body = Some(body);
    }

    handler.call(method, request, response).await
}

/// §4.7 step 4's error path: choose an error handler (a matching error
/// route, or the built-in default) and invoke it. Returns `Err(())` if the
/// chosen error handler itself fails, signalling the catastrophic fallback.
async fn render_error<S>(
    error: &HttpError,
    router: &Router,
    request: &mut Request,
    response: &mut Response,
    req_limits: &ReqLimits,
    stream: &mut S,
) -> Result<(u16, String, Body), ()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match router.match_error(error.code()) {
        Some((handler, captures)) => {
            request.captures = captures;
            let method = request.method.clone();
            match dispatch_method(stream, &handler, method, request, response, req_limits).await {
                Ok(outcome) => {
                    let (status, reason) = resolve_status(outcome.status, outcome.reason);
                    Ok((status, reason, outcome.body))
                }
                Err(_nested) => Err(()),
            }
        }
        None => {
            let reason = error.reason_phrase();
            let message = match error.message() {
                Some(message) => message.to_vec(),
                None => format!("{} - {}\n", error.code(), reason).into_bytes(),
            };
            Ok((error.code(), reason, Body::Bytes(message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Nonatomic;
    use crate::request::read_request;
    use crate::logsink::TracingLogSink;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        fn methods(&self) -> &'static [Method] {
            &[Method::Get, Method::Post]
        }
        fn nonatomic(&self) -> Nonatomic {
            Nonatomic::All
        }
        async fn call(&self, method: Method, req: &mut Request, _resp: &mut Response) -> Result<Outcome, HttpError> {
            match method {
                Method::Get => Ok(Outcome::new(200, "hi")),
                Method::Post => Ok(Outcome::new(201, req.body.clone().unwrap_or_default())),
                _ => unreachable!(),
            }
        }
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.add_route("^/echo$", Arc::new(Echo)).unwrap();
        router
    }

    #[tokio::test]
    async fn get_dispatches_and_writes_response() {
        let mut cursor = Cursor::new(b"GET /echo HTTP/1.1\r\n\r\n".to_vec());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();

        let mut out = Cursor::new(Vec::new());
        let gate = ResourceGate::new();
        let keepalive = handle(&mut out, outcome, &router(), &gate, &TracingLogSink, &ReqLimits::default(), "thornweb/0.1").await;
        assert!(keepalive);
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hi"));
    }

    #[tokio::test]
    async fn options_synthesizes_allow_header() {
        let mut cursor = Cursor::new(b"OPTIONS /echo HTTP/1.1\r\n\r\n".to_vec());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();

        let mut out = Cursor::new(Vec::new());
        let gate = ResourceGate::new();
        handle(&mut out, outcome, &router(), &gate, &TracingLogSink, &ReqLimits::default(), "thornweb/0.1").await;
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("Allow: GET, POST\r\n"));
    }

    #[tokio::test]
    async fn head_suppresses_body_but_keeps_status() {
        let mut cursor = Cursor::new(b"HEAD /echo HTTP/1.1\r\n\r\n".to_vec());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();

        let mut out = Cursor::new(Vec::new());
        let gate = ResourceGate::new();
        handle(&mut out, outcome, &router(), &gate, &TracingLogSink, &ReqLimits::default(), "thornweb/0.1").await;
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn method_not_allowed_is_405() {
        let mut cursor = Cursor::new(b"DELETE /echo HTTP/1.1\r\n\r\n".to_vec());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();

        let mut out = Cursor::new(Vec::new());
        let gate = ResourceGate::new();
        let keepalive = handle(&mut out, outcome, &router(), &gate, &TracingLogSink, &ReqLimits::default(), "thornweb/0.1").await;
        assert!(keepalive, "405 must not disable keep-alive");
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    }

    #[tokio::test]
    async fn not_found_uses_default_error_body() {
        let mut cursor = Cursor::new(b"GET /missing HTTP/1.1\r\n\r\n".to_vec());
        let outcome = read_request(
            &mut cursor,
            "127.0.0.1:1".parse().unwrap(),
            None,
            Duration::from_secs(1),
            true,
            &ReqLimits::default(),
            &router(),
        )
        .await
        .unwrap();

        let mut out = Cursor::new(Vec::new());
        let gate = ResourceGate::new();
        handle(&mut out, outcome, &router(), &gate, &TracingLogSink, &ReqLimits::default(), "thornweb/0.1").await;
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.ends_with("404 - Not Found\n"));
    }
}
