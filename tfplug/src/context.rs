//! Context implementation for request-scoped data and cancellation
//!
//! Every RPC handled by the server gets a fresh Context. It carries a log id
//! that correlates all log lines and API calls made while serving that RPC.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::time;

/// Context carries request-scoped values like cancellation signals, timeouts, and metadata
/// Pass this as first parameter to all async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    log_id: String,
    deadline: Option<Instant>,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    /// Creates a context with a new random log id
    pub fn new() -> Self {
        Self::with_log_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_log_id(log_id: impl Into<String>) -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                log_id: log_id.into(),
                deadline: None,
                values: RwLock::new(HashMap::new()),
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Returns a child context that is cancelled once `timeout` elapses.
    /// The log id and stored values carry over.
    pub async fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let (done_tx, done_rx) = watch::channel(false);

        let timer_tx = done_tx.clone();
        let mut parent_done = self.done();
        tokio::spawn(async move {
            // A dropped parent never cancels the child
            let parent_cancelled = async {
                if parent_done.wait_for(|cancelled| *cancelled).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                _ = parent_cancelled => {}
            }
            let _ = timer_tx.send(true);
        });

        let values = self.inner.values.read().await.clone();

        Self {
            inner: Arc::new(ContextInner {
                log_id: self.inner.log_id.clone(),
                deadline: Some(deadline),
                values: RwLock::new(values),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub async fn with_value<T: Send + Sync + 'static>(self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.write().await;
        values.insert(key.to_string(), Arc::new(value));
        drop(values);
        self
    }

    pub async fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        let values = self.inner.values.read().await;
        values.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    /// Correlation id for log lines emitted while serving this request
    pub fn log_id(&self) -> &str {
        &self.inner.log_id
    }

    /// Span tagging everything logged inside a handler with the log id
    pub fn span(&self) -> tracing::Span {
        tracing::debug_span!("request", log_id = %self.inner.log_id)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns a channel that flips to true when work done on behalf of this
    /// context should be cancelled
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log_id", &self.inner.log_id)
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
