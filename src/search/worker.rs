use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::{search_until, summarize, SearchQuery};
use crate::store::Snapshot;

/// Identifies one dispatched search. Later dispatches get larger tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchTicket(u64);

impl SearchTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub ticket: SearchTicket,
    pub query: String,
    pub titles: Vec<String>,
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn summary(&self) -> String {
        summarize(&self.titles)
    }
}

/// Runs searches on background threads, latest request wins.
///
/// Every dispatch supersedes the ones before it: superseded threads stop at
/// the next note boundary, and any result they still deliver is dropped by
/// [`SearchWorker::poll`]. Threads are detached; exiting while one runs
/// simply abandons it.
#[derive(Debug)]
pub struct SearchWorker {
    latest: Arc<AtomicU64>,
    tx: Sender<SearchOutcome>,
    rx: Receiver<SearchOutcome>,
}

impl Default for SearchWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchWorker {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            latest: Arc::new(AtomicU64::new(0)),
            tx,
            rx,
        }
    }

    /// Starts a search over `snapshot`. Empty input is a no-op and returns
    /// `Ok(None)` without superseding anything.
    pub fn dispatch(&self, snapshot: Snapshot, input: &str) -> Result<Option<SearchTicket>> {
        let Some(query) = SearchQuery::parse(input) else {
            return Ok(None);
        };
        let ticket = SearchTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
        let latest = Arc::clone(&self.latest);
        let tx = self.tx.clone();
        let notes = snapshot.len();

        thread::Builder::new()
            .name(format!("search-{}", ticket.0))
            .spawn(move || {
                let started = Instant::now();
                let superseded = || latest.load(Ordering::Acquire) != ticket.0;
                let Some(titles) = search_until(&snapshot, &query, superseded) else {
                    tracing::debug!(ticket = ticket.0, "search superseded, abandoning");
                    return;
                };
                let outcome = SearchOutcome {
                    ticket,
                    query: query.as_str().to_string(),
                    titles,
                    elapsed: started.elapsed(),
                };
                // the receiver only disappears when the worker is dropped
                let _ = tx.send(outcome);
            })
            .context("spawning search thread")?;

        tracing::debug!(ticket = ticket.0, notes, "dispatched search");
        Ok(Some(ticket))
    }

    /// Supersedes every in-flight search without starting a new one.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn latest(&self) -> Option<SearchTicket> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            id => Some(SearchTicket(id)),
        }
    }

    /// Non-blocking. Returns the outcome of the most recent dispatch if it has
    /// arrived; stale outcomes are drained and discarded.
    pub fn poll(&self) -> Option<SearchOutcome> {
        let current = self.latest.load(Ordering::SeqCst);
        let mut fresh = None;
        for outcome in self.rx.try_iter() {
            if outcome.ticket.0 == current {
                fresh = Some(outcome);
            } else {
                tracing::debug!(
                    ticket = outcome.ticket.0,
                    current,
                    "discarding stale search result"
                );
            }
        }
        fresh
    }

    /// Blocks until `ticket` delivers or `timeout` elapses. Outcomes for other
    /// tickets received meanwhile are discarded.
    pub fn wait(&self, ticket: SearchTicket, timeout: Duration) -> Option<SearchOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) if outcome.ticket == ticket => return Some(outcome),
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }
}
