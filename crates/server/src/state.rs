use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use shared_types::{FeatureFlags, RequestSequence, Ticket};

use crate::backend::{AccessToken, Backend};
use crate::config::PortalConfig;
use crate::practice_store::ActivePracticeStore;
use crate::realtime::ChangeFeed;

/// Shared application state passed to Axum handlers via `State`.
/// Derives `FromRef` so handlers can extract single parts directly.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub feed: ChangeFeed,
    pub practices: ActivePracticeStore,
    pub searches: SearchSequences,
    pub config: Arc<PortalConfig>,
    pub flags: FeatureFlags,
}

impl AppState {
    pub fn new(backend: Arc<dyn Backend>, config: PortalConfig, flags: FeatureFlags) -> Self {
        let service_token = config.service_key.clone().map(AccessToken::new);
        Self {
            practices: ActivePracticeStore::new(backend.clone(), service_token),
            backend,
            feed: ChangeFeed::new(),
            searches: SearchSequences::default(),
            config: Arc::new(config),
            flags,
        }
    }
}

/// One [`RequestSequence`] per caller and search kind, so a search that was
/// overtaken by a newer one from the same caller can be flagged stale.
#[derive(Clone, Default)]
pub struct SearchSequences {
    inner: Arc<Mutex<HashMap<String, Arc<RequestSequence>>>>,
}

impl SearchSequences {
    fn sequence(&self, key: &str) -> Arc<RequestSequence> {
        let mut map = match self.inner.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(key.to_string()).or_default().clone()
    }

    /// Start a search for `key` (e.g. `"student:{uid}"`).
    pub fn begin(&self, key: &str) -> SearchTicket {
        let sequence = self.sequence(key);
        let ticket = sequence.issue();
        SearchTicket {
            owner: self.clone(),
            key: key.to_string(),
            sequence,
            ticket,
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget `key` once only the map itself and `sequence` refer to it.
    fn release(&self, key: &str, sequence: &Arc<RequestSequence>) {
        let mut map = match self.inner.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        let idle = map
            .get(key)
            .is_some_and(|s| Arc::ptr_eq(s, sequence) && Arc::strong_count(s) == 2);
        if idle {
            map.remove(key);
        }
    }
}

/// An in-flight search. Dropping the last one for a key frees its sequence.
pub struct SearchTicket {
    owner: SearchSequences,
    key: String,
    sequence: Arc<RequestSequence>,
    ticket: Ticket,
}

impl Drop for SearchTicket {
    fn drop(&mut self) {
        self.owner.release(&self.key, &self.sequence);
    }
}

impl SearchTicket {
    /// False once a newer search with the same key has started.
    pub fn is_current(&self) -> bool {
        self.sequence.is_current(self.ticket)
    }
}
