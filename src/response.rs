//! Response writer (C7): the object handlers mutate, and the function that
//! renders a status line, headers, and body onto the wire — choosing fixed
//! `Content-Length` or chunked `Transfer-Encoding` depending on whether the
//! handler already committed to an explicit length.

use crate::handler::Body;
use crate::header::HeaderMap;
use crate::status::Version;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The response-in-progress a handler operation mutates before returning
/// its [`Outcome`](crate::handler::Outcome). Handlers set headers here
/// ahead of time (e.g. an explicit `Content-Length` to force fixed-length
/// framing of a streamed body); the runtime owns status, reason, and body.
pub struct Response {
    pub headers: HeaderMap,
    /// Set to `false` for `HEAD` (§4.5): the body is never written
    /// regardless of which [`Body`] variant the outcome carries.
    pub write_body: bool,
}

impl Response {
    pub fn new() -> Self {
        Self { headers: HeaderMap::new(), write_body: true }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one full response: status line, headers, and (unless suppressed)
/// body, per §4.7 steps 4-8. Returns the number of body bytes written, for
/// the access-log record (§4.7 step 9).
pub async fn write_response<W>(
    writer: &mut W,
    version: Version,
    status: u16,
    reason: &str,
    mut headers: HeaderMap,
    body: Body,
    write_body: bool,
    stream_chunk_size: usize,
) -> std::io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    enum Framed {
        Fixed(Vec<u8>),
        FixedStream(Box<dyn AsyncRead + Send + Unpin>, usize),
        Chunked(Box<dyn AsyncRead + Send + Unpin>),
    }

    let framed = match body {
        Body::Bytes(bytes) => {
            headers.set("Content-Length", bytes.len().to_string());
            Framed::Fixed(bytes)
        }
        Body::Text(text) => {
            let bytes = text.into_bytes();
            headers.set("Content-Length", bytes.len().to_string());
            Framed::Fixed(bytes)
        }
        Body::Stream(stream) => match headers.get("Content-Length").and_then(|v| v.parse::<usize>().ok()) {
            Some(len) => Framed::FixedStream(stream, len),
            None => {
                headers.remove("Content-Length");
                headers.set("Transfer-Encoding", "chunked");
                Framed::Chunked(stream)
            }
        },
    };

    let mut out = Vec::new();
    out.extend_from_slice(format!("{} {} {}\r\n", version.as_str(), status, reason).as_bytes());
    headers.write_wire(&mut out);
    writer.write_all(&out).await?;

    if !write_body {
        writer.flush().await?;
        return Ok(0);
    }

    let mut written = 0usize;
    match framed {
        Framed::Fixed(bytes) => {
            writer.write_all(&bytes).await?;
            written = bytes.len();
        }
        Framed::FixedStream(mut stream, mut remaining) => {
            let mut buf = vec![0u8; stream_chunk_size];
            while remaining > 0 {
                let take = remaining.min(buf.len());
                let n = stream.read(&mut buf[..take]).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buf[..n]).await?;
                remaining -= n;
                written += n;
            }
        }
        Framed::Chunked(mut stream) => {
            let mut buf = vec![0u8; stream_chunk_size];
            loop {
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(format!("{:x}\r\n", n).as_bytes()).await?;
                writer.write_all(&buf[..n]).await?;
                writer.write_all(b"\r\n").await?;
                written += n;
            }
            writer.write_all(b"0\r\n\r\n").await?;
        }
    }

    writer.flush().await?;
    Ok(written)
}

/// Builds the catastrophic fallback response (§4.7 step 9): the response
/// that is sent when rendering the error handler's own output itself fails.
/// Re-sets `Server`/`Date` from `ambient` alongside `Content-Length`, since
/// this path must never be able to fail the same way again.
pub fn catastrophic_fallback(ambient: &HeaderMap) -> (u16, &'static str, HeaderMap, Vec<u8>) {
    let body = b"500 - Internal Server Error\n".to_vec();
    let mut headers = HeaderMap::new();
    if let Some(server) = ambient.get("Server") {
        headers.set("Server", server.to_string());
    }
    if let Some(date) = ambient.get("Date") {
        headers.set("Date", date.to_string());
    }
    headers.set("Content-Length", body.len().to_string());
    headers.set("Connection", "close");
    (500, "Internal Server Error", headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_body_gets_content_length_and_no_chunking() {
        let mut out = Vec::new();
        write_response(
            &mut out,
            Version::Http11,
            200,
            "OK",
            HeaderMap::new(),
            Body::Bytes(b"hi".to_vec()),
            true,
            8192,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\nhi"));
    }

    #[tokio::test]
    async fn head_suppresses_body_but_keeps_content_length() {
        let mut out = Vec::new();
        write_response(
            &mut out,
            Version::Http11,
            200,
            "OK",
            HeaderMap::new(),
            Body::Bytes(b"hi".to_vec()),
            false,
            8192,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn stream_without_content_length_is_chunked() {
        let mut out = Vec::new();
        let stream: Box<dyn AsyncRead + Send + Unpin> = Box::new(std::io::Cursor::new(b"abcdef".to_vec()));
        write_response(
            &mut out,
            Version::Http11,
            200,
            "OK",
            HeaderMap::new(),
            Body::Stream(stream),
            true,
            3,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Transfer-Encoding: chunked\r\n"));
        assert!(text.ends_with("3\r\nabc\r\n3\r\ndef\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn stream_with_preset_content_length_is_fixed() {
        let mut out = Vec::new();
        let mut headers = HeaderMap::new();
        headers.set("Content-Length", "6");
        let stream: Box<dyn AsyncRead + Send + Unpin> = Box::new(std::io::Cursor::new(b"abcdef".to_vec()));
        write_response(&mut out, Version::Http11, 200, "OK", headers, Body::Stream(stream), true, 1024)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Transfer-Encoding"));
        assert!(text.ends_with("abcdef"));
    }

    #[test]
    fn catastrophic_fallback_carries_server_and_date() {
        let mut ambient = HeaderMap::new();
        ambient.set("Server", "thornweb");
        ambient.set("Date", "Thu, 01 Jan 1970 00:00:00 GMT");
        let (status, _, headers, body) = catastrophic_fallback(&ambient);
        assert_eq!(status, 500);
        assert_eq!(headers.get("Server"), Some("thornweb"));
        assert_eq!(headers.get("Date"), Some("Thu, 01 Jan 1970 00:00:00 GMT"));
        assert_eq!(headers.get("Content-Length"), Some(body.len().to_string().as_str()));
        assert_eq!(body, b"500 - Internal Server Error\n".to_vec());
    }
}
