//! All-or-nothing ownership of a `Start` batch
//!
//! Until the batch is committed, the guard owns every port acquired for it
//! and every session registered from it. Rolling back (or dropping the guard,
//! e.g. when the `Start` future is cancelled) returns all of them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pool::PortPool;
use crate::session::SessionTable;

pub(crate) struct BatchGuard {
    pool: Arc<PortPool>,
    table: Arc<SessionTable>,
    token: CancellationToken,
    ports: Vec<u16>,
    /// Session registered for `ports[i]`, in order
    session_ids: Vec<String>,
    armed: bool,
}

impl BatchGuard {
    pub(crate) fn new(
        pool: Arc<PortPool>,
        table: Arc<SessionTable>,
        token: CancellationToken,
        ports: Vec<u16>,
    ) -> Self {
        Self {
            pool,
            table,
            token,
            ports,
            session_ids: Vec::new(),
            armed: true,
        }
    }

    pub(crate) fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub(crate) fn record(&mut self, session_id: String) {
        self.session_ids.push(session_id);
    }

    pub(crate) fn session_ids(&self) -> &[String] {
        &self.session_ids
    }

    /// Keep the batch; its sessions now own their ports
    pub(crate) fn commit(mut self) {
        self.armed = false;
    }

    /// Cancel the batch and give back everything it holds
    pub(crate) async fn rollback(mut self) {
        self.armed = false;
        self.token.cancel();
        let ports = std::mem::take(&mut self.ports);
        let session_ids = std::mem::take(&mut self.session_ids);
        release_batch(&self.pool, &self.table, ports, session_ids).await;
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        self.token.cancel();
        let pool = Arc::clone(&self.pool);
        let table = Arc::clone(&self.table);
        let ports = std::mem::take(&mut self.ports);
        let session_ids = std::mem::take(&mut self.session_ids);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release_batch(&pool, &table, ports, session_ids).await;
                });
            }
            Err(_) => warn!(ports = ?ports, "Batch dropped outside a runtime; ports not returned"),
        }
    }
}

async fn release_batch(
    pool: &PortPool,
    table: &SessionTable,
    ports: Vec<u16>,
    session_ids: Vec<String>,
) {
    for (idx, port) in ports.into_iter().enumerate() {
        match session_ids.get(idx) {
            Some(id) => {
                // A session already stopped has returned its own port.
                if let Some(session) = table.remove(id).await {
                    pool.release(session.close());
                }
            }
            None => pool.release(port),
        }
    }
    debug!("Batch rolled back");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::Session;

    fn guard(pool: &Arc<PortPool>, table: &Arc<SessionTable>, count: usize) -> BatchGuard {
        let ports = pool.acquire_many(count).unwrap();
        BatchGuard::new(
            Arc::clone(pool),
            Arc::clone(table),
            CancellationToken::new(),
            ports,
        )
    }

    async fn register(guard: &mut BatchGuard, table: &SessionTable, id: &str, idx: usize) {
        let port = guard.ports()[idx];
        table
            .insert(Session::new(id, "b", "w", port, "ws://x/", CancellationToken::new()))
            .await;
        guard.record(id.to_string());
    }

    #[tokio::test]
    async fn rollback_releases_registered_and_unregistered_ports() {
        let pool = Arc::new(PortPool::new([1, 2, 3, 4]));
        let table = Arc::new(SessionTable::new());
        let mut guard = guard(&pool, &table, 4);
        register(&mut guard, &table, "a", 0).await;
        register(&mut guard, &table, "b", 1).await;

        guard.rollback().await;

        assert_eq!(pool.available(), 4);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn rollback_skips_sessions_already_removed() {
        let pool = Arc::new(PortPool::new([1, 2]));
        let table = Arc::new(SessionTable::new());
        let mut guard = guard(&pool, &table, 2);
        register(&mut guard, &table, "a", 0).await;
        register(&mut guard, &table, "b", 1).await;

        let stopped = table.remove("a").await.unwrap();
        pool.release(stopped.close());

        guard.rollback().await;
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn commit_keeps_ports_owned() {
        let pool = Arc::new(PortPool::new([1, 2]));
        let table = Arc::new(SessionTable::new());
        let mut guard = guard(&pool, &table, 2);
        register(&mut guard, &table, "a", 0).await;
        register(&mut guard, &table, "b", 1).await;
        assert_eq!(guard.session_ids().len(), 2);

        guard.commit();
        assert_eq!(pool.available(), 0);
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn dropped_guard_returns_ports() {
        let pool = Arc::new(PortPool::new([1, 2, 3]));
        let table = Arc::new(SessionTable::new());
        let mut guard = guard(&pool, &table, 3);
        register(&mut guard, &table, "a", 0).await;
        drop(guard);

        for _ in 0..50 {
            if pool.available() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(pool.available(), 3);
        assert!(table.is_empty().await);
    }
}
