//! Background execution tied to client liveness.
//!
//! A long query launched on behalf of an interactive client should not keep
//! running after that client is gone. [`liveness`] hands out a guard the
//! caller holds while interested; [`run_while_alive`] races the query
//! against the guard being dropped and abandons the work when it is.

use std::future::Future;

use tokio::sync::watch;
use tracing::debug;

use crate::error::{GridError, GridResult};

/// Held by the interested client. Dropping it signals abandonment.
pub struct LivenessGuard {
    tx: watch::Sender<bool>,
}

/// Probed by the executing side.
#[derive(Clone)]
pub struct LivenessSignal {
    rx: watch::Receiver<bool>,
}

pub fn liveness() -> (LivenessGuard, LivenessSignal) {
    let (tx, rx) = watch::channel(true);
    (LivenessGuard { tx }, LivenessSignal { rx })
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(false);
    }
}

impl LivenessSignal {
    pub fn is_alive(&self) -> bool {
        *self.rx.borrow()
    }

    async fn gone(mut self) {
        while *self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                break;
            }
        }
    }
}

/// Run `work` on a background task, abandoning it if the client goes away
/// first. Returns `Ok(None)` when abandoned; the task is aborted and its
/// connection released.
pub async fn run_while_alive<T, F>(signal: LivenessSignal, work: F) -> GridResult<Option<T>>
where
    T: Send + 'static,
    F: Future<Output = GridResult<T>> + Send + 'static,
{
    let mut handle = tokio::spawn(work);
    tokio::select! {
        result = &mut handle => match result {
            Ok(outcome) => outcome.map(Some),
            Err(e) if e.is_cancelled() => Ok(None),
            Err(e) => Err(GridError::Config(format!("background query task failed: {e}"))),
        },
        _ = signal.gone() => {
            handle.abort();
            debug!("client gone, abandoning background query");
            Ok(None)
        }
    }
}
