//! Scoped transaction acquisition over a shared graph store.
//!
//! [`GraphSession`] owns the store and bounds concurrent transactions with a
//! semaphore. Every transaction is handed out as a [`ScopedTransaction`],
//! which is released on every exit path: committed or rolled back
//! explicitly, or rolled back on drop (early return, cancellation, timeout).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::client::GraphError;
use crate::store::{AccessMode, GraphStore, Statement, StatementOutput, StoreTxn};

/// An explicitly owned handle to a graph store's connection pool.
///
/// Clone is cheap; clones share the pool, the concurrency limit, and the
/// closed flag.
#[derive(Clone)]
pub struct GraphSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn GraphStore>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl GraphSession {
    /// Wrap a store, allowing at most `max_connections` open transactions.
    pub fn new(store: impl GraphStore + 'static, max_connections: usize) -> Self {
        Self::from_store(Arc::new(store), max_connections)
    }

    pub fn from_store(store: Arc<dyn GraphStore>, max_connections: usize) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                permits: Arc::new(Semaphore::new(max_connections.max(1))),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Open a scoped transaction. Waits for a free slot when the pool is busy.
    pub async fn acquire(&self, mode: AccessMode) -> Result<ScopedTransaction, GraphError> {
        if self.is_closed() {
            return Err(GraphError::Closed);
        }

        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GraphError::Closed)?;

        let txn = self.inner.store.begin(mode).await?;
        tracing::trace!(?mode, "Transaction opened");

        Ok(ScopedTransaction {
            txn: Some(txn),
            mode,
            permit: Some(permit),
        })
    }

    /// Release the connection pool. Only the first call has any effect.
    pub async fn close(&self) -> Result<(), GraphError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.permits.close();
        self.inner.store.close().await?;
        tracing::info!("Graph session closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

/// A transaction that is always released.
///
/// Not `Clone`; statements take `&mut self`, so a transaction is never
/// shared between concurrent callers.
pub struct ScopedTransaction {
    txn: Option<Box<dyn StoreTxn>>,
    mode: AccessMode,
    permit: Option<OwnedSemaphorePermit>,
}

impl ScopedTransaction {
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    /// Run one statement. Mutating statements are rejected in read mode
    /// before they reach the store.
    pub async fn run(&mut self, statement: &Statement) -> Result<StatementOutput, GraphError> {
        if self.mode == AccessMode::Read && statement.is_write() {
            return Err(GraphError::ReadOnly(format!("{:?}", statement.kind())));
        }
        let txn = self.txn.as_mut().ok_or(GraphError::Closed)?;
        txn.run(statement).await
    }

    pub async fn commit(mut self) -> Result<(), GraphError> {
        match self.txn.take() {
            Some(txn) => txn.commit().await,
            None => Ok(()),
        }
    }

    pub async fn rollback(mut self) -> Result<(), GraphError> {
        match self.txn.take() {
            Some(txn) => txn.rollback().await,
            None => Ok(()),
        }
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        let Some(txn) = self.txn.take() else {
            return;
        };
        let permit = self.permit.take();

        tracing::debug!(mode = ?self.mode, "Transaction dropped unfinished, rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = txn.rollback().await {
                        tracing::warn!(error = %e, "Rollback of abandoned transaction failed");
                    }
                    drop(permit);
                });
            }
            // No runtime left: the store discards the uncommitted work with the connection.
            Err(_) => drop(txn),
        }
    }
}
