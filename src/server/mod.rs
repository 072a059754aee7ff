//! Server shell (C11): binds a listener, spawns the worker pool, runs the
//! accept loop, and exposes an idempotent start/stop lifecycle.
//!
//! # Example
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> std::io::Result<()> {
//! use thornweb::Server;
//!
//! let server = Server::builder()
//!     .bind("127.0.0.1:8080")
//!     .await?
//!     .build()
//!     .unwrap();
//! let (_task, handle) = server.start();
//! handle.stop();
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod worker;

use crate::gate::ResourceGate;
use crate::handler::Handler;
use crate::limits::{ConnLimits, PoolLimits, ReqLimits};
use crate::logsink::{LogSink, TracingLogSink};
use crate::router::{BadPattern, Router};
use connection::SharedContext;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use worker::{Job, Pool, QueueFull};

/// A bound, configured server, ready to [`start`](Server::start).
pub struct Server {
    listener: TcpListener,
    pool: Pool,
    ctx: SharedContext,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Runs the accept loop in the current task until stopped via a
    /// [`ServerHandle`], then drains the queue and joins every worker
    /// before returning.
    ///
    /// A pending `accept()` is raced against the shutdown notification
    /// rather than only rechecked between iterations, so `stop()` wakes a
    /// `serve()` blocked on an idle listener instead of waiting for the
    /// next inbound connection that may never come.
    pub async fn serve(self) {
        let addr = self.listener.local_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".to_string());
        self.ctx.log.info(&format!("Serving HTTP on {addr}"));
        self.running.store(true, Ordering::SeqCst);

        loop {
            let notified = self.shutdown.notified();
            tokio::pin!(notified);

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = &mut notified => break,
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, client_address)) => {
                            if let Err(QueueFull(job)) = self.pool.submit(Job { stream, client_address }) {
                                self.ctx.log.warn(&format!("queue full, dropping connection from {}", job.client_address));
                            }
                        }
                        Err(e) => self.ctx.log.warn(&format!("accept failed: {e}")),
                    }
                }
            }
        }

        self.pool.shutdown().await;
    }

    /// Spawns [`Server::serve`] as a background task and returns a join
    /// handle plus a [`ServerHandle`] for stopping it. `start` is
    /// idempotent by construction: `Server` is consumed here, so a given
    /// instance cannot be started twice.
    pub fn start(self) -> (JoinHandle<()>, ServerHandle) {
        let handle = self.handle();
        let task = tokio::spawn(self.serve());
        (task, handle)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle { running: Arc::clone(&self.running), shutdown: Arc::clone(&self.shutdown) }
    }
}

/// A cloneable handle for querying and stopping a [`Server`] from outside
/// the task running its accept loop.
#[derive(Clone)]
pub struct ServerHandle {
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Idempotent: repeated calls after the first are no-ops. Sets the
    /// running flag before notifying so a `serve()` that hasn't started its
    /// next iteration yet sees it without needing the wakeup, and a
    /// `serve()` already parked in `accept()` is woken by it.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// Alias for [`ServerHandle::stop`]. §4.11 names `stop` and `close` as
    /// separate lifecycle operations; there is no additional socket-level
    /// resource here that outlives what dropping `Server` already releases,
    /// so both do the same thing.
    pub fn close(&self) {
        self.stop();
    }
}

/// Builder for a [`Server`] (mirrors the teacher's `Server::builder()`
/// idiom, generalized from a type-parameterized single handler to a
/// route table of many).
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    router: Router,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
    pool_limits: PoolLimits,
    log: Arc<dyn LogSink>,
    server_version: String,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            listener: None,
            router: Router::new(),
            conn_limits: ConnLimits::default(),
            req_limits: ReqLimits::default(),
            pool_limits: PoolLimits::default(),
            log: Arc::new(TracingLogSink),
            server_version: format!("thornweb/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(self.listener(listener))
    }

    pub fn route(mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<Self, BadPattern> {
        self.router.add_route(pattern, handler)?;
        Ok(self)
    }

    pub fn error_route(mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<Self, BadPattern> {
        self.router.add_error_route(pattern, handler)?;
        Ok(self)
    }

    pub fn conn_limits(mut self, limits: ConnLimits) -> Self {
        self.conn_limits = limits;
        self
    }

    pub fn req_limits(mut self, limits: ReqLimits) -> Self {
        self.req_limits = limits;
        self
    }

    pub fn pool_limits(mut self, limits: PoolLimits) -> Self {
        self.pool_limits = limits;
        self
    }

    pub fn log_sink(mut self, log: Arc<dyn LogSink>) -> Self {
        self.log = log;
        self
    }

    pub fn server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    pub fn build(self) -> Result<Server, BuildError> {
        let listener = self.listener.ok_or(BuildError::MissingListener)?;
        let ctx = SharedContext {
            router: Arc::new(self.router),
            gate: ResourceGate::new(),
            log: self.log,
            conn_limits: Arc::new(self.conn_limits),
            req_limits: Arc::new(self.req_limits),
            server_version: Arc::from(self.server_version.as_str()),
        };
        let pool = Pool::spawn(self.pool_limits, ctx.clone());
        Ok(Server { listener, pool, ctx, running: Arc::new(AtomicBool::new(false)), shutdown: Arc::new(Notify::new()) })
    }
}

#[derive(Debug)]
pub enum BuildError {
    MissingListener,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingListener => write!(f, "no listener bound; call `.bind(..)` or `.listener(..)`"),
        }
    }
}

impl std::error::Error for BuildError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::HttpError;
    use crate::handler::{Nonatomic, Outcome};
    use crate::request::Request;
    use crate::response::Response;
    use crate::status::Method;
    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct Hello;

    #[async_trait]
    impl Handler for Hello {
        fn methods(&self) -> &'static [Method] {
            &[Method::Get]
        }
        fn nonatomic(&self) -> Nonatomic {
            Nonatomic::All
        }
        async fn call(&self, _m: Method, _r: &mut Request, _resp: &mut Response) -> Result<Outcome, HttpError> {
            Ok(Outcome::new(200, "hello"))
        }
    }

    #[tokio::test]
    async fn end_to_end_request_round_trip() {
        let server = Server::builder()
            .bind("127.0.0.1:0")
            .await
            .unwrap()
            .route("^/$", Arc::new(Hello))
            .unwrap()
            .build()
            .unwrap();
        let addr = server.listener.local_addr().unwrap();
        let (task, handle) = server.start();

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8(response).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hello"));

        assert!(handle.is_running());
        handle.stop();

        // Proves `stop()` actually unblocks an idle `accept()`: with no
        // further inbound connections, `serve()` only returns if the
        // shutdown notification woke it.
        tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .expect("serve() task did not shut down")
            .unwrap();
    }

    #[tokio::test]
    async fn build_without_listener_fails() {
        let err = Server::builder().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingListener));
    }
}
