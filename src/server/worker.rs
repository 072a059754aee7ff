//! Autoscaling worker pool / manager (C10): a bounded queue of accepted
//! connections, a fixed-at-creation steady-state worker count that grows
//! under queue pressure and shrinks back once drained, and a manager task
//! that replaces workers that die unexpectedly.

use crate::limits::PoolLimits;
use crate::server::connection::{self, SharedContext};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

pub struct Job {
    pub stream: TcpStream,
    pub client_address: SocketAddr,
}

/// A queued-but-not-yet-accepted job, returned to the caller when the
/// bounded queue is full so the accept loop can decide what to do (§4.11:
/// the accept loop backs off rather than blocking the listener forever).
pub struct QueueFull(pub Job);

struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    task: JoinHandle<()>,
    /// Set when the manager itself requested this worker exit (a shrink),
    /// as opposed to the worker task ending unexpectedly (a crash) — the
    /// two cases get opposite treatment on the next poll: a shrink removes
    /// the slot, a crash replaces it at the same index.
    shutting_down: bool,
}

fn spawn_worker(
    index: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    depth: Arc<AtomicUsize>,
    ctx: Arc<SharedContext>,
    poll_interval: std::time::Duration,
) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let worker_shutdown = Arc::clone(&shutdown);
    let task = tokio::spawn(worker_loop(index, worker_shutdown, receiver, depth, ctx, poll_interval));
    WorkerHandle { shutdown, task, shutting_down: false }
}

async fn worker_loop(
    index: usize,
    shutdown: Arc<AtomicBool>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    depth: Arc<AtomicUsize>,
    ctx: Arc<SharedContext>,
    poll_interval: std::time::Duration,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            shutdown.store(false, Ordering::SeqCst);
            return;
        }

        let job = {
            let mut receiver = receiver.lock().await;
            match timeout(poll_interval, receiver.recv()).await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(_) => continue,
            }
        };
        depth.fetch_sub(1, Ordering::SeqCst);

        // Isolate a connection-handling panic in its own task so it cannot
        // bring this worker down; the manager's dead-worker replacement
        // path exists for the worker task dying, not for a handler panic.
        let handle = tokio::spawn(connection::run(job.stream, job.client_address, (*ctx).clone()));
        if let Err(e) = handle.await {
            ctx.log.error(&format!("worker {index}: connection task panicked: {e}"));
        }
    }
}

fn should_grow(depth: usize, limits: &PoolLimits, current: usize) -> bool {
    let high_water = (limits.max_queue as f64 * limits.high_water_fraction) as usize;
    depth > high_water && current < limits.max_threads
}

fn should_shrink(depth: usize, limits: &PoolLimits, current: usize) -> bool {
    depth == 0 && current > limits.num_threads
}

/// The running pool: a sender half workers dequeue from, plus a handle to
/// stop the manager (and, transitively, every worker) cleanly.
pub struct Pool {
    sender: mpsc::Sender<Job>,
    depth: Arc<AtomicUsize>,
    manager_shutdown: Arc<AtomicBool>,
    manager: JoinHandle<()>,
}

impl Pool {
    pub fn spawn(limits: PoolLimits, ctx: SharedContext) -> Self {
        let (sender, receiver) = mpsc::channel(limits.max_queue);
        let receiver = Arc::new(Mutex::new(receiver));
        let depth = Arc::new(AtomicUsize::new(0));
        let manager_shutdown = Arc::new(AtomicBool::new(false));
        let ctx = Arc::new(ctx);

        let manager = tokio::spawn(manager_loop(
            limits,
            ctx,
            receiver,
            Arc::clone(&depth),
            Arc::clone(&manager_shutdown),
        ));

        Self { sender, depth, manager_shutdown, manager }
    }

    /// Enqueues a job without blocking; returns it back to the caller if the
    /// bounded queue is already full.
    pub fn submit(&self, job: Job) -> Result<(), QueueFull> {
        match self.sender.try_send(job) {
            Ok(()) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(job)) => Err(QueueFull(job)),
            Err(mpsc::error::TrySendError::Closed(job)) => Err(QueueFull(job)),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Signals every worker to exit and waits for the manager to join them.
    pub async fn shutdown(self) {
        self.manager_shutdown.store(true, Ordering::SeqCst);
        let _ = self.manager.await;
    }
}

async fn manager_loop(
    limits: PoolLimits,
    ctx: Arc<SharedContext>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    depth: Arc<AtomicUsize>,
    manager_shutdown: Arc<AtomicBool>,
) {
    let mut workers: Vec<WorkerHandle> = (0..limits.num_threads)
        .map(|i| spawn_worker(i, Arc::clone(&receiver), Arc::clone(&depth), Arc::clone(&ctx), limits.poll_interval))
        .collect();

    loop {
        sleep(limits.poll_interval).await;

        if manager_shutdown.load(Ordering::SeqCst) {
            for worker in &workers {
                worker.shutdown.store(true, Ordering::SeqCst);
            }
            for worker in workers.drain(..) {
                let _ = worker.task.await;
            }
            return;
        }

        let mut i = 0;
        while i < workers.len() {
            if workers[i].task.is_finished() {
                if workers[i].shutting_down {
                    workers.remove(i);
                    continue;
                }
                ctx.log.warn(&format!("worker {i} died, replacing"));
                workers[i] = spawn_worker(i, Arc::clone(&receiver), Arc::clone(&depth), Arc::clone(&ctx), limits.poll_interval);
            }
            i += 1;
        }

        let depth_now = depth.load(Ordering::SeqCst);
        if should_grow(depth_now, &limits, workers.len()) {
            let index = workers.len();
            workers.push(spawn_worker(index, Arc::clone(&receiver), Arc::clone(&depth), Arc::clone(&ctx), limits.poll_interval));
        } else if should_shrink(depth_now, &limits, workers.len()) {
            if let Some(last) = workers.last_mut() {
                last.shutdown.store(true, Ordering::SeqCst);
                last.shutting_down = true;
            }
        }
    }
}
