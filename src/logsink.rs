//! Log sink (C2): where diagnostic events and completed-request records go.
//! The default implementation forwards to `tracing` and renders access
//! records in Common Log Format.

use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::time::SystemTime;

/// Destination for server diagnostics and completed-request records.
/// Swappable so an embedder can redirect logging without touching the
/// request/response pipeline.
pub trait LogSink: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// One record per completed request (§4.2), rendered in Common Log
    /// Format by the default sink.
    fn access(&self, client: SocketAddr, request_line: &str, status: u16, response_size: usize, at: SystemTime);
}

/// Default sink: forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn access(&self, client: SocketAddr, request_line: &str, status: u16, response_size: usize, at: SystemTime) {
        tracing::info!("{}", clf_line(client, request_line, status, response_size, at));
    }
}

/// Renders one Common Log Format line. `rfc931`/`authuser` are never known
/// by this server and render as `-`.
pub fn clf_line(client: SocketAddr, request_line: &str, status: u16, response_size: usize, at: SystemTime) -> String {
    format!(
        "{} - - {} \"{}\" {} {}\n",
        client.ip(),
        clf_timestamp(at),
        request_line,
        status,
        response_size,
    )
}

fn clf_timestamp(at: SystemTime) -> String {
    let datetime: DateTime<Utc> = at.into();
    format!("[{} -0000]", datetime.format("%d/%b/%Y:%H:%M:%S"))
}
