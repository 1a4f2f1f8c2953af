//! Fixed pool of local worker ports.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::RunnerError;

/// A bounded stack of free worker ports.
///
/// The most recently released port is the next one handed out. Capacity is
/// fixed by the seed list; the pool never grows past it and never accepts a
/// port outside it.
pub struct PortPool {
    seeded: HashSet<u16>,
    free: Mutex<Vec<u16>>,
}

impl PortPool {
    /// Create a pool seeded with the given ports.
    ///
    /// Duplicate ports are dropped. The last port in the list is the first
    /// one acquired.
    pub fn new(ports: impl IntoIterator<Item = u16>) -> Self {
        let mut free: Vec<u16> = Vec::new();
        for port in ports {
            if free.contains(&port) {
                warn!(port, "Ignoring duplicate port in pool seed");
                continue;
            }
            free.push(port);
        }

        Self {
            seeded: free.iter().copied().collect(),
            free: Mutex::new(free),
        }
    }

    /// Take the most recently released port.
    pub fn acquire(&self) -> Result<u16, RunnerError> {
        self.lock().pop().ok_or(RunnerError::PortExhausted {
            requested: 1,
            available: 0,
        })
    }

    /// Take `count` ports at once, or none at all.
    ///
    /// Ports come back in the order successive [`acquire`](Self::acquire)
    /// calls would have returned them.
    pub fn acquire_many(&self, count: usize) -> Result<Vec<u16>, RunnerError> {
        let mut free = self.lock();
        if free.len() < count {
            return Err(RunnerError::PortExhausted {
                requested: count,
                available: free.len(),
            });
        }

        let split = free.len() - count;
        let mut taken = free.split_off(split);
        taken.reverse();
        Ok(taken)
    }

    /// Return a port to the pool.
    ///
    /// The pool trusts its callers to release only ports they own. A release
    /// of a port the pool was not seeded with, or of one that is already
    /// free, is logged and dropped. Free ports are therefore always a
    /// distinct subset of the seed and never exceed the capacity.
    pub fn release(&self, port: u16) {
        if !self.seeded.contains(&port) {
            warn!(port, "Ignoring release of a port outside the pool");
            return;
        }
        let mut free = self.lock();
        if free.contains(&port) {
            warn!(port, "Port released while already free");
            return;
        }
        free.push(port);
    }

    /// Return several ports, last one first out.
    pub fn release_all(&self, ports: &[u16]) {
        for port in ports.iter().rev() {
            self.release(*port);
        }
    }

    /// Number of ports currently free
    pub fn available(&self) -> usize {
        self.lock().len()
    }

    /// Number of ports the pool was seeded with
    pub fn capacity(&self) -> usize {
        self.seeded.len()
    }

    /// Whether the port is currently free
    pub fn is_free(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u16>> {
        self.free.lock().unwrap_or_else(|e| e.into_inner())
    }
}
