//! Server configuration: connection timeouts, request-parsing bounds, and
//! worker-pool tuning constants (§6 "Server configuration").
//!
//! # Example
//! ```no_run
//! use thornweb::limits::{ConnLimits, PoolLimits, ReqLimits};
//! use std::time::Duration;
//!
//! let conn = ConnLimits {
//!     keepalive_timeout: Some(Duration::from_secs(5)),
//!     ..ConnLimits::default()
//! };
//! let pool = PoolLimits {
//!     num_threads: 12,
//!     ..PoolLimits::default()
//! };
//! let req = ReqLimits::default();
//! # let _ = (conn, pool, req);
//! ```

use std::time::Duration;

/// Per-connection timeouts (§6, §4.9).
#[derive(Debug, Clone)]
pub struct ConnLimits {
    /// Idle timeout while waiting for the *next* request on an already-open
    /// keep-alive connection (default: `Some(5s)`, §6). `None` disables
    /// keep-alive server-wide: every connection closes after one request,
    /// mirroring the original's "set `keepalive_timeout` to `None` to
    /// disable" server-level switch (§4.9 step 3).
    pub keepalive_timeout: Option<Duration>,
    /// Socket read timeout for an in-progress request (default: `20s`, §6).
    pub request_timeout: Duration,
    /// Maximum requests served on one connection before it is closed
    /// regardless of `keepalive` (default: `1000`; the distilled spec
    /// leaves this unbounded, but an unbounded per-connection lifetime
    /// conflicts with the ambient worker-pool/gate fairness story, so a
    /// generous cap is carried as a safety net — see DESIGN.md).
    pub max_requests_per_connection: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ConnLimits {
    fn default() -> Self {
        Self {
            keepalive_timeout: Some(Duration::from_secs(5)),
            request_timeout: Duration::from_secs(20),
            max_requests_per_connection: 1000,
            _priv: (),
        }
    }
}

/// Request-parsing size bounds (§4.6).
#[derive(Debug, Clone)]
pub struct ReqLimits {
    /// Maximum bytes for the request line or any single header line
    /// (default: `4096`, §4.6).
    pub max_line_size: usize,
    /// Maximum number of headers per request (default: `64`, §4.6).
    pub max_headers: usize,
    /// Maximum request body size in bytes (default: `1_048_576`, §4.6).
    pub max_request_size: usize,
    /// Chunk size used when copying a stream body with a known
    /// `Content-Length` (default: `8192`, §4.7 step 8).
    pub stream_chunk_size: usize,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        Self {
            max_line_size: 4096,
            max_headers: 64,
            max_request_size: 1_048_576,
            stream_chunk_size: 8192,
            _priv: (),
        }
    }
}

/// Worker-pool tuning constants (§4.10, §6).
#[derive(Debug, Clone)]
pub struct PoolLimits {
    /// Steady-state worker count (default: `6`, §6).
    pub num_threads: usize,
    /// Ceiling the pool may grow to under queue pressure (default: `32`).
    pub max_threads: usize,
    /// Bounded request-queue capacity (default: `256`).
    pub max_queue: usize,
    /// Manager/worker poll interval (default: `500ms`, §6).
    pub poll_interval: Duration,
    /// Fraction of `max_queue` depth above which the manager grows the
    /// pool by one worker per poll (default: `0.75`).
    pub high_water_fraction: f64,

    #[doc(hidden)]
    #[allow(dead_code)]
    pub _priv: (),
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            num_threads: 6,
            max_threads: 32,
            max_queue: 256,
            poll_interval: Duration::from_millis(500),
            high_water_fraction: 0.75,
            _priv: (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let conn = ConnLimits::default();
        assert_eq!(conn.keepalive_timeout, Some(Duration::from_secs(5)));
        assert_eq!(conn.request_timeout, Duration::from_secs(20));

        let req = ReqLimits::default();
        assert_eq!(req.max_line_size, 4096);
        assert_eq!(req.max_headers, 64);
        assert_eq!(req.max_request_size, 1_048_576);

        let pool = PoolLimits::default();
        assert_eq!(pool.num_threads, 6);
        assert_eq!(pool.poll_interval, Duration::from_millis(500));
    }
}
