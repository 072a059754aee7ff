//! Handler contract (C5): the trait handlers implement, the atomicity
//! declaration they carry, and the heterogeneous body/outcome shape a
//! handler operation returns.

use crate::errors::HttpError;
use crate::request::Request;
use crate::response::Response;
use crate::status::Method;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::io::AsyncRead;

/// A handler's atomicity declaration (§4.5, §9): either every method is
/// nonatomic, none are, or an explicit per-method set is. Modeled as a
/// tagged variant rather than the source's boolean-or-collection so
/// membership testing is uniform regardless of which case a handler chose.
#[derive(Debug, Clone)]
pub enum Nonatomic {
    All,
    None,
    PerMethod(HashSet<Method>),
}

impl Nonatomic {
    pub fn is_nonatomic(&self, method: Method) -> bool {
        match self {
            Nonatomic::All => true,
            Nonatomic::None => false,
            Nonatomic::PerMethod(set) => set.contains(&method),
        }
    }

    /// The source's class-level default (`nonatomic = ['options', 'head',
    /// 'get']`): read-only methods run concurrently with each other,
    /// everything else runs under mutual exclusion.
    pub fn default_reader_methods() -> Self {
        Nonatomic::PerMethod(HashSet::from([Method::Options, Method::Head, Method::Get]))
    }
}

impl Default for Nonatomic {
    fn default() -> Self {
        Self::default_reader_methods()
    }
}

/// A response body as returned from a handler operation: an owned byte
/// blob, UTF-8 text, or a readable stream (rendered as chunked encoding
/// unless the handler has set an explicit `Content-Length`, §4.7 step 6).
pub enum Body {
    Bytes(Vec<u8>),
    Text(String),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(value)
    }
}

impl From<&[u8]> for Body {
    fn from(value: &[u8]) -> Self {
        Body::Bytes(value.to_vec())
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

/// The normalized return shape of `do_<method>` (§4.5): a status code, an
/// optional reason-phrase override, and a body. Two-tuple returns use the
/// status registry's reason phrase; three-tuple returns supply their own.
pub struct Outcome {
    pub status: u16,
    pub reason: Option<String>,
    pub body: Body,
}

impl Outcome {
    pub fn new(status: u16, body: impl Into<Body>) -> Self {
        Self { status, reason: None, body: body.into() }
    }

    pub fn with_reason(status: u16, reason: impl Into<String>, body: impl Into<Body>) -> Self {
        Self { status, reason: Some(reason.into()), body: body.into() }
    }
}

/// A routable handler.
///
/// The source language discovers `do_<method>` operations via attribute
/// reflection (`hasattr`/`getattr`); Rust has no equivalent runtime
/// introspection, so handlers instead declare their supported methods
/// explicitly through [`Handler::methods`] and implement a single dispatch
/// entry point, [`Handler::call`]. The `respond`/`do_options`/`do_head`
/// orchestration described in §4.5 is not reimplemented per handler — it
/// lives once in [`crate::dispatch::handle`], which consults `methods()`
/// in place of `hasattr` and invokes `call()` in place of
/// `getattr(self, "do_" + method)()`.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The set of methods this handler implements `do_<method>` for. Used
    /// both for 405 rejection and to synthesize the `Allow` header for the
    /// runtime's `OPTIONS` handling.
    fn methods(&self) -> &'static [Method];

    /// This handler's atomicity declaration. Defaults to the source's
    /// class-level default: GET/HEAD/OPTIONS nonatomic, everything else
    /// atomic.
    fn nonatomic(&self) -> Nonatomic {
        Nonatomic::default_reader_methods()
    }

    /// Invoked only when the request declares `Expect: 100-continue`.
    /// Default: no-op. May fail with any [`HttpError`] to reject the body
    /// before it is read.
    async fn check_continue(&self, _req: &Request) -> Result<(), HttpError> {
        Ok(())
    }

    /// Whether the runtime should read a request body for `method` before
    /// dispatching. Default: POST/PUT/PATCH only (§4.5).
    fn get_body(&self, method: Method) -> bool {
        method.reads_body_by_default()
    }

    /// Invokes `do_<method>` for the given method. Called only for a
    /// method present in [`Handler::methods`]; `OPTIONS`/`HEAD` synthesis
    /// is handled by the runtime before this is reached for those methods.
    async fn call(&self, method: Method, req: &mut Request, resp: &mut Response) -> Result<Outcome, HttpError>;
}
