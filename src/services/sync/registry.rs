//! In-flight sync registry
//!
//! Single point of truth for "is a sync running for this URL". Admission is
//! checked and recorded under one lock, so two callers can never both start a
//! run for the same playlist; the loser joins the winner's progress channel.

use async_stream::stream;
use futures::Stream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::Process;

type Runs = Arc<Mutex<HashMap<String, InFlight>>>;

struct InFlight {
    run_id: Uuid,
    progress: watch::Receiver<Process<()>>,
    cancel: CancellationToken,
}

/// Result of asking to start a sync
pub enum Admission {
    /// Caller owns the new run
    Started(SyncTicket),
    /// A run was already in flight; observe it instead
    Joined(watch::Receiver<Process<()>>),
}

#[derive(Clone, Default)]
pub struct SyncRegistry {
    runs: Runs,
}

fn lock(runs: &Runs) -> MutexGuard<'_, HashMap<String, InFlight>> {
    runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, url: &str) -> Admission {
        let mut runs = lock(&self.runs);

        if let Some(existing) = runs.get(url) {
            return Admission::Joined(existing.progress.clone());
        }

        let run_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(Process::loading());
        let cancel = CancellationToken::new();

        runs.insert(
            url.to_string(),
            InFlight {
                run_id,
                progress: rx,
                cancel: cancel.clone(),
            },
        );

        Admission::Started(SyncTicket {
            runs: self.runs.clone(),
            url: url.to_string(),
            run_id,
            progress: tx,
            cancel,
        })
    }

    /// Request cancellation of the run for `url`. Returns its progress channel
    /// so the caller can wait for it to wind down.
    pub fn cancel(&self, url: &str) -> Option<watch::Receiver<Process<()>>> {
        let runs = lock(&self.runs);
        runs.get(url).map(|run| {
            run.cancel.cancel();
            run.progress.clone()
        })
    }

    pub fn is_running(&self, url: &str) -> bool {
        lock(&self.runs).contains_key(url)
    }

    /// URLs with a run in flight
    pub fn running(&self) -> Vec<String> {
        let mut urls: Vec<String> = lock(&self.runs).keys().cloned().collect();
        urls.sort();
        urls
    }
}

/// Ownership of one admitted run. Dropping it releases the URL.
pub struct SyncTicket {
    runs: Runs,
    url: String,
    run_id: Uuid,
    progress: watch::Sender<Process<()>>,
    cancel: CancellationToken,
}

impl SyncTicket {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Process<()>> {
        self.progress.subscribe()
    }

    pub fn report(&self, process: Process<()>) {
        self.progress.send_replace(process);
    }

    /// Release the URL, then publish the terminal state. A request arriving
    /// after this point starts a fresh run rather than joining a finished one.
    pub fn complete(self, terminal: Process<()>) {
        self.release();
        self.progress.send_replace(terminal);
    }

    fn release(&self) {
        let mut runs = lock(&self.runs);
        if runs.get(&self.url).map(|run| run.run_id) == Some(self.run_id) {
            runs.remove(&self.url);
        }
    }
}

impl Drop for SyncTicket {
    fn drop(&mut self) {
        self.release();
    }
}

/// Progress stream over a run's watch channel. Always ends with a terminal
/// item, even if the run's task died without reporting one.
pub fn progress_stream(
    mut rx: watch::Receiver<Process<()>>,
) -> impl Stream<Item = Process<()>> + Send + 'static {
    stream! {
        loop {
            let current = rx.borrow_and_update().clone();
            let terminal = current.is_terminal();
            yield current;

            if terminal {
                break;
            }

            if rx.changed().await.is_err() {
                yield Process::failure("sync task ended without a result");
                break;
            }
        }
    }
}
