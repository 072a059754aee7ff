//! Resource gate (C4): per-resource reader/writer coordination keyed by the
//! raw resource string. Nonatomic ("reader") acquisitions may run
//! concurrently with each other; atomic ("writer") acquisitions are
//! mutually exclusive with every other acquisition on the same resource.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

#[derive(Default)]
struct Entry {
    readers: usize,
    writer: bool,
}

/// Shared, cloneable handle to the gate state. Cheap to clone; every clone
/// coordinates over the same resource table.
#[derive(Clone, Default)]
pub struct ResourceGate {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    notify: Arc<Notify>,
}

impl ResourceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the requested access to `resource` can be granted.
    /// `nonatomic = true` requests a reader slot (blocked only by an active
    /// writer); `nonatomic = false` requests a writer slot (blocked by any
    /// reader or writer).
    pub async fn acquire(&self, resource: &str, nonatomic: bool) -> Permit {
        loop {
            {
                let mut entries = self.entries.lock().await;
                let entry = entries.entry(resource.to_string()).or_default();
                if nonatomic {
                    if !entry.writer {
                        entry.readers += 1;
                        return Permit {
                            gate: self.clone(),
                            resource: resource.to_string(),
                            atomic: false,
                            released: false,
                        };
                    }
                } else if !entry.writer && entry.readers == 0 {
                    entry.writer = true;
                    return Permit {
                        gate: self.clone(),
                        resource: resource.to_string(),
                        atomic: true,
                        released: false,
                    };
                }
            }
            self.notify.notified().await;
        }
    }

    async fn release(&self, resource: &str, atomic: bool) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(resource) {
            if atomic {
                entry.writer = false;
            } else {
                entry.readers = entry.readers.saturating_sub(1);
            }
            if entry.readers == 0 && !entry.writer {
                entries.remove(resource);
            }
        }
        drop(entries);
        self.notify.notify_waiters();
    }
}

/// A held gate slot. Release with [`Permit::release`] to wait for the
/// release to land before proceeding (e.g. before replying on the same
/// connection); dropping it without calling that still releases the slot,
/// just on a detached task.
pub struct Permit {
    gate: ResourceGate,
    resource: String,
    atomic: bool,
    released: bool,
}

impl Permit {
    pub async fn release(mut self) {
        self.gate.release(&self.resource, self.atomic).await;
        self.released = true;
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let gate = self.gate.clone();
        let resource = std::mem::take(&mut self.resource);
        let atomic = self.atomic;
        tokio::spawn(async move { gate.release(&resource, atomic).await });
    }
}
