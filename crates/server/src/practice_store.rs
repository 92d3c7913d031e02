//! Per-student cache of "does this student hold an active practice".
//!
//! Each tracked student gets a `watch` channel. The first read fetches once;
//! after that the entry only changes when the change feed reports a
//! `practices` row for that student. Refetches are ordered by a
//! [`RequestSequence`] so a slow, superseded fetch can never overwrite a
//! newer answer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use shared_types::{AppError, PracticeState, RequestSequence, Ticket, PRACTICE_ACTIVE};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::backend::{AccessToken, Backend, Conn, TableQuery};
use crate::realtime::{ChangeEvent, ChangeFeed};

pub const PRACTICES_TABLE: &str = "practices";

/// Past this many tracked students, idle entries are evicted before a new
/// one is added.
const MAX_TRACKED: usize = 4096;

struct Entry {
    tx: watch::Sender<PracticeState>,
    sequence: RequestSequence,
    /// Set until the first fetch lands, and again on every invalidation.
    stale: AtomicBool,
}

impl Entry {
    fn new() -> Self {
        let (tx, _) = watch::channel(PracticeState::loading());
        Self {
            tx,
            sequence: RequestSequence::new(),
            stale: AtomicBool::new(true),
        }
    }
}

struct Inner {
    backend: Arc<dyn Backend>,
    /// Token used to refetch in the background. Without it, an invalidated
    /// entry waits for the student's next read.
    service_token: Option<AccessToken>,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

#[derive(Clone)]
pub struct ActivePracticeStore {
    inner: Arc<Inner>,
}

#[derive(Deserialize)]
struct ActiveRow {
    #[serde(deserialize_with = "shared_types::de_id")]
    vacancy_id: String,
}

impl ActivePracticeStore {
    pub fn new(backend: Arc<dyn Backend>, service_token: Option<AccessToken>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                service_token,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Entry>>> {
        match self.inner.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn entry(&self, student_id: &str) -> Arc<Entry> {
        let mut entries = self.entries();
        if entries.len() >= MAX_TRACKED && !entries.contains_key(student_id) {
            let evicted = Self::evict_idle(&mut entries);
            tracing::debug!(evicted, "Evicted idle practice entries");
        }
        entries
            .entry(student_id.to_string())
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }

    /// Drop entries nobody watches and no fetch holds. Returns how many went.
    pub fn prune(&self) -> usize {
        Self::evict_idle(&mut self.entries())
    }

    fn evict_idle(entries: &mut HashMap<String, Arc<Entry>>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.tx.receiver_count() > 0 || Arc::strong_count(entry) > 1);
        before - entries.len()
    }

    fn tracked(&self, student_id: &str) -> Option<Arc<Entry>> {
        self.entries().get(student_id).cloned()
    }

    pub fn is_tracked(&self, student_id: &str) -> bool {
        self.tracked(student_id).is_some()
    }

    /// Current state, fetching first if the entry is new or invalidated.
    pub async fn current(&self, student_id: &str, token: &AccessToken) -> PracticeState {
        let entry = self.entry(student_id);
        if entry.stale.load(Ordering::SeqCst) {
            self.refresh_entry(student_id, &entry, token).await;
        }
        let state = entry.tx.borrow().clone();
        state
    }

    /// Live view of one student's state. The receiver already holds a
    /// fetched value.
    pub async fn subscribe(
        &self,
        student_id: &str,
        token: &AccessToken,
    ) -> watch::Receiver<PracticeState> {
        self.current(student_id, token).await;
        self.entry(student_id).tx.subscribe()
    }

    /// Fetch and publish, unless a newer fetch started meanwhile.
    pub async fn refresh(&self, student_id: &str, token: &AccessToken) {
        let entry = self.entry(student_id);
        self.refresh_entry(student_id, &entry, token).await;
    }

    async fn refresh_entry(&self, student_id: &str, entry: &Entry, token: &AccessToken) {
        let ticket = entry.sequence.issue();
        entry.stale.store(false, Ordering::SeqCst);
        let result = fetch_active(Conn::new(self.inner.backend.as_ref(), token), student_id).await;
        Self::finish(entry, ticket, result);
    }

    /// Publish a fetch result if `ticket` is still the latest for the entry.
    fn finish(entry: &Entry, ticket: Ticket, result: Result<Option<String>, AppError>) -> bool {
        if !entry.sequence.is_current(ticket) {
            tracing::debug!(ticket = ticket.value(), "Dropping superseded practice fetch");
            return false;
        }
        entry.tx.send_modify(|state| match result {
            Ok(vacancy_id) => {
                *state = PracticeState {
                    has_active_practice: vacancy_id.is_some(),
                    vacancy_id,
                    loading: false,
                    error: None,
                };
            }
            Err(e) => {
                // Keep the last known answer.
                state.loading = false;
                state.error = Some(e.message);
            }
        });
        true
    }

    /// Mark a tracked student stale. Returns false for untracked students.
    pub fn invalidate(&self, student_id: &str) -> bool {
        match self.tracked(student_id) {
            Some(entry) => {
                entry.stale.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Invalidate the students a change event touches. Anything that is not
    /// a `practices` row for a tracked student is ignored.
    pub fn apply_event(&self, event: &ChangeEvent) -> Vec<String> {
        if event.table != PRACTICES_TABLE {
            return Vec::new();
        }
        event
            .student_ids()
            .into_iter()
            .filter(|id| self.invalidate(id))
            .map(str::to_string)
            .collect()
    }

    fn invalidate_all(&self) {
        for entry in self.entries().values() {
            entry.stale.store(true, Ordering::SeqCst);
        }
    }

    /// Consume the change feed until it closes.
    pub fn spawn_listener(&self, feed: &ChangeFeed) -> JoinHandle<()> {
        let store = self.clone();
        let mut rx = feed.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let touched = store.apply_event(&event);
                        if let Some(token) = store.inner.service_token.clone() {
                            for student_id in touched {
                                store.refresh(&student_id, &token).await;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Practice store lagged behind the change feed");
                        store.invalidate_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Vacancy id of the student's active practice, if any.
pub async fn fetch_active(conn: Conn<'_>, student_id: &str) -> Result<Option<String>, AppError> {
    let query = TableQuery::new(PRACTICES_TABLE)
        .select("vacancy_id")
        .eq("student_id", student_id)
        .eq("status", PRACTICE_ACTIVE);
    let row: Option<ActiveRow> = conn.fetch_optional(&query).await?;
    Ok(row.map(|r| r.vacancy_id))
}
