//! Mutation lifecycle: status tracking, outcome events and post-success invalidation

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::{
    cache::{RequestCache, Tag},
    error::{ClientError, ClientResult},
};

/// Every write the clients can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateBook,
    UpdateBook,
    DeleteBook,
    CreateBorrow,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateBook => "create-book",
            Operation::UpdateBook => "update-book",
            Operation::DeleteBook => "delete-book",
            Operation::CreateBorrow => "create-borrow",
        }
    }

    /// Tags made stale by a successful run.
    ///
    /// A borrow also invalidates `books`: the service decrements the book's
    /// copies, and the catalog offers no other way to learn about it.
    pub fn invalidates(&self) -> &'static [Tag] {
        match self {
            Operation::CreateBook | Operation::UpdateBook | Operation::DeleteBook => &[Tag::Books],
            Operation::CreateBorrow => &[Tag::Borrows, Tag::Books],
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed(ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ClientError),
}

/// Emitted exactly once per attempt, for notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub operation: Operation,
    pub outcome: Outcome,
}

#[derive(Default)]
struct Tracker {
    pending: usize,
    last: MutationStatus,
}

#[derive(Clone)]
pub struct Mutations {
    cache: RequestCache,
    events: broadcast::Sender<MutationEvent>,
    trackers: Arc<Mutex<HashMap<Operation, Tracker>>>,
}

impl Mutations {
    pub fn new(cache: RequestCache, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            cache,
            events,
            trackers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Receive an event for every mutation attempt from now on
    pub fn events(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// `Pending` while any run of `operation` is in progress, otherwise the
    /// outcome of the last one
    pub fn status(&self, operation: Operation) -> MutationStatus {
        let trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
        match trackers.get(&operation) {
            Some(t) if t.pending > 0 => MutationStatus::Pending,
            Some(t) => t.last.clone(),
            None => MutationStatus::Idle,
        }
    }

    /// Execute a mutation.
    ///
    /// The call runs as its own task, so dropping the returned future does
    /// not cancel it. Invalidation happens only after success is observed.
    /// Concurrent runs of the same operation are allowed.
    pub async fn run<T, Fut>(&self, operation: Operation, fut: Fut) -> ClientResult<T>
    where
        T: Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        self.update(operation, |t| t.pending += 1);
        tracing::info!("Mutation {} started", operation);

        let this = self.clone();
        let task = tokio::spawn(async move {
            let result = this.cache.mutate(fut).await;
            match &result {
                Ok(_) => {
                    this.cache.invalidate(operation.invalidates());
                    tracing::info!("Mutation {} succeeded", operation);
                    this.finish(operation, Outcome::Success);
                }
                Err(e) => {
                    tracing::warn!("Mutation {} failed: {}", operation, e);
                    this.finish(operation, Outcome::Failure(e.clone()));
                }
            }
            result
        });

        task.await
            .unwrap_or_else(|e| Err(ClientError::Transport(format!("Mutation task failed: {}", e))))
    }

    /// Report an attempt rejected before reaching the network
    pub fn reject(&self, operation: Operation, error: ClientError) -> ClientError {
        tracing::debug!("Mutation {} rejected: {}", operation, error);
        self.update(operation, |t| t.last = MutationStatus::Failed(error.clone()));
        self.emit(operation, Outcome::Failure(error.clone()));
        error
    }

    fn finish(&self, operation: Operation, outcome: Outcome) {
        let status = match &outcome {
            Outcome::Success => MutationStatus::Succeeded,
            Outcome::Failure(e) => MutationStatus::Failed(e.clone()),
        };
        self.update(operation, |t| {
            t.pending = t.pending.saturating_sub(1);
            t.last = status;
        });
        self.emit(operation, outcome);
    }

    fn emit(&self, operation: Operation, outcome: Outcome) {
        // No receivers is fine: nobody is showing notifications
        let _ = self.events.send(MutationEvent { operation, outcome });
    }

    fn update(&self, operation: Operation, f: impl FnOnce(&mut Tracker)) {
        let mut trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
        f(trackers.entry(operation).or_default());
    }
}
