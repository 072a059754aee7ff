//! Connection driver (C9): the per-connection keep-alive loop. Reads and
//! dispatches requests off one socket until keep-alive ends, the
//! per-connection request cap is hit, or the peer goes silent.

use crate::dispatch;
use crate::gate::ResourceGate;
use crate::limits::{ConnLimits, ReqLimits};
use crate::logsink::LogSink;
use crate::request::read_request;
use crate::router::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::TcpStream;

/// Everything a connection needs that outlives the connection itself,
/// shared (read-only, or internally synchronised) across every connection
/// the pool hands off to a worker.
#[derive(Clone)]
pub struct SharedContext {
    pub router: Arc<Router>,
    pub gate: ResourceGate,
    pub log: Arc<dyn LogSink>,
    pub conn_limits: Arc<ConnLimits>,
    pub req_limits: Arc<ReqLimits>,
    pub server_version: Arc<str>,
}

/// Runs §4.9's five steps for one accepted connection.
pub async fn run(stream: TcpStream, client_address: SocketAddr, ctx: SharedContext) {
    if let Err(e) = stream.set_nodelay(true) {
        ctx.log.warn(&format!("set_nodelay failed for {client_address}: {e}"));
    }

    let mut stream = BufReader::new(stream);
    let mut initial_timeout = None;
    let mut requests_served = 0usize;

    loop {
        let outcome = match read_request(
            &mut stream,
            client_address,
            initial_timeout,
            ctx.conn_limits.request_timeout,
            ctx.conn_limits.keepalive_timeout.is_some(),
            &ctx.req_limits,
            &ctx.router,
        )
        .await
        {
            Some(outcome) => outcome,
            None => break,
        };

        let keepalive = dispatch::handle(
            &mut stream,
            outcome,
            &ctx.router,
            &ctx.gate,
            ctx.log.as_ref(),
            &ctx.req_limits,
            &ctx.server_version,
        )
        .await;

        requests_served += 1;
        if !keepalive || requests_served >= ctx.conn_limits.max_requests_per_connection {
            break;
        }
        initial_timeout = ctx.conn_limits.keepalive_timeout;
    }
}
