//! Fixed-size worker pool draining a bounded operation queue

use super::RemoteInner;
use datavault_core::{Dataset, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queued request with its one-shot completion channel
pub(crate) enum Operation {
    Store {
        id: String,
        dataset: Dataset,
        done: oneshot::Sender<Result<()>>,
    },
    Retrieve {
        id: String,
        done: oneshot::Sender<Result<Dataset>>,
    },
    Delete {
        id: String,
        done: oneshot::Sender<Result<()>>,
    },
}

impl Operation {
    pub(crate) async fn execute(self, inner: &RemoteInner) {
        // The requester may have stopped waiting; the work is still done
        match self {
            Operation::Store { id, dataset, done } => {
                let _ = done.send(inner.store(&id, dataset).await);
            }
            Operation::Retrieve { id, done } => {
                let _ = done.send(inner.retrieve(&id).await);
            }
            Operation::Delete { id, done } => {
                let _ = done.send(inner.delete(&id).await);
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Operation::Store { .. } => "store",
            Operation::Retrieve { .. } => "retrieve",
            Operation::Delete { .. } => "delete",
        }
    }
}

pub(crate) struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Operation>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub(crate) fn start(inner: Arc<RemoteInner>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Operation>(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let handles = (0..workers)
            .map(|worker| {
                let inner = Arc::clone(&inner);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(async move {
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(operation) = next else { break };
                        operation.execute(&inner).await;
                    }
                    tracing::trace!(worker, "Remote storage worker stopped");
                })
            })
            .collect();

        tracing::debug!(workers, capacity, "Started remote storage workers");
        Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
        }
    }

    /// Queue an operation without waiting; hands it back when the queue is
    /// full or the pool has been shut down
    pub(crate) fn try_submit(&self, operation: Operation) -> std::result::Result<(), Operation> {
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return Err(operation);
        };
        match sender.try_send(operation) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(operation)) => {
                tracing::warn!(
                    operation = operation.kind(),
                    "Remote operation queue is full, running directly"
                );
                Err(operation)
            }
            Err(TrySendError::Closed(operation)) => Err(operation),
        }
    }

    /// Stop accepting work, let the workers drain the queue, and wait for them
    pub(crate) async fn shutdown(&self) {
        self.sender.lock().take();
        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Remote storage worker ended abnormally");
            }
        }
    }
}
