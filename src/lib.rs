//! thornweb - an HTTP/1.1 server runtime with an autoscaling worker pool
//! and a per-resource reader/writer concurrency gate.
//!
//! A small, dependency-light request/response core built around `tokio`:
//! a pipelined keep-alive connection driver, an anchored-regex router, and
//! a handler contract that declares its own concurrency semantics instead
//! of leaving every route to fend for itself against shared state.
//!
//! # Quick start
//!
//! ```no_run
//! use async_trait::async_trait;
//! use thornweb::{Handler, HttpError, Method, Nonatomic, Outcome, Request, Response, Server};
//! use std::sync::Arc;
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     fn methods(&self) -> &'static [Method] {
//!         &[Method::Get]
//!     }
//!
//!     fn nonatomic(&self) -> Nonatomic {
//!         Nonatomic::All
//!     }
//!
//!     async fn call(&self, _method: Method, _req: &mut Request, _resp: &mut Response) -> Result<Outcome, HttpError> {
//!         Ok(Outcome::new(200, "Hello, world!"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::builder()
//!         .bind("127.0.0.1:8080")
//!         .await?
//!         .route("^/$", Arc::new(Hello))
//!         .unwrap()
//!         .build()
//!         .unwrap();
//!     server.serve().await;
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency model
//!
//! Every route is keyed by its raw resource string (path plus query) in a
//! [`ResourceGate`](gate::ResourceGate): handlers a route declares
//! [`nonatomic`](Handler::nonatomic) for run concurrently with each other,
//! everything else is mutually exclusive per resource. Requests on one
//! connection are always processed strictly in pipeline order regardless
//! of gate contention — the gate only ever serializes *across*
//! connections contending for the same resource.

pub mod dispatch;
pub mod errors;
pub mod gate;
pub mod handler;
pub mod header;
pub mod limits;
pub mod logsink;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod status;

pub use crate::errors::HttpError;
pub use crate::gate::ResourceGate;
pub use crate::handler::{Body, Handler, Nonatomic, Outcome};
pub use crate::header::HeaderMap;
pub use crate::limits::{ConnLimits, PoolLimits, ReqLimits};
pub use crate::logsink::{LogSink, TracingLogSink};
pub use crate::request::Request;
pub use crate::response::Response;
pub use crate::router::{BadPattern, Router};
pub use crate::server::{Server, ServerBuilder, ServerHandle};
pub use crate::status::{Method, StatusCode, Version};
