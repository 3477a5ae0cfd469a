use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default retention for a suppression entry: two hours.
pub const DEFAULT_SUPPRESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// In-process memory of recently created tickets.
///
/// Entries are checked against their insertion time on read; an entry older
/// than the TTL is treated as absent and dropped. Nothing survives a restart.
#[derive(Debug)]
pub struct RecencySuppressor {
    entries: HashMap<String, Instant>,
    ttl: Duration,
}

impl Default for RecencySuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_TTL)
    }
}

impl RecencySuppressor {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn contains(&mut self, key: &str) -> bool {
        self.contains_at(key, Instant::now())
    }

    pub fn contains_at(&mut self, key: &str, now: Instant) -> bool {
        match self.entries.get(key) {
            Some(inserted) if now.saturating_duration_since(*inserted) < self.ttl => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>) {
        self.insert_at(key, Instant::now());
    }

    pub fn insert_at(&mut self, key: impl Into<String>, now: Instant) {
        self.entries.insert(key.into(), now);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, inserted| now.saturating_duration_since(*inserted) < ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, including any not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
