/// In-memory object URLs for exported blobs, with deferred release
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use super::Blob;

/// How long a URL stays valid once its download has been triggered
pub const RELEASE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct Entry {
    blob: Blob,
    created_at: Instant,
    release_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct ObjectUrlStore {
    next_id: u64,
    entries: HashMap<ObjectUrl, Entry>,
}

impl ObjectUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, blob: Blob, now: Instant) -> ObjectUrl {
        self.next_id += 1;
        let url = ObjectUrl(format!("blob:tonictwo/{}", self.next_id));
        self.entries.insert(
            url.clone(),
            Entry {
                blob,
                created_at: now,
                release_at: None,
            },
        );
        url
    }

    pub fn resolve(&self, url: &ObjectUrl) -> Option<&Blob> {
        self.entries.get(url).map(|entry| &entry.blob)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Schedule `url` for release `delay` after `now`, never earlier than
    /// `delay` after its creation.
    pub fn release_after(&mut self, url: &ObjectUrl, now: Instant, delay: Duration) {
        if let Some(entry) = self.entries.get_mut(url) {
            let from = now.max(entry.created_at);
            entry.release_at = Some(from + delay);
        }
    }

    /// Release every URL whose deadline has passed. Returns the released URLs.
    pub fn sweep(&mut self, now: Instant) -> Vec<ObjectUrl> {
        let due: Vec<ObjectUrl> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.release_at.is_some_and(|at| at <= now))
            .map(|(url, _)| url.clone())
            .collect();

        for url in &due {
            self.entries.remove(url);
            tracing::debug!(%url, "object URL released");
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> Blob {
        Blob::new(vec![1, 2, 3], "audio/wav")
    }

    #[test]
    fn test_create_and_resolve() {
        let mut store = ObjectUrlStore::new();
        let now = Instant::now();
        let a = store.create(blob(), now);
        let b = store.create(blob(), now);

        assert_ne!(a, b);
        assert!(a.as_str().starts_with("blob:"));
        assert_eq!(store.resolve(&a).map(|b| b.len()), Some(3));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unscheduled_urls_survive_sweep() {
        let mut store = ObjectUrlStore::new();
        let now = Instant::now();
        let url = store.create(blob(), now);

        assert!(store.sweep(now + Duration::from_secs(3600)).is_empty());
        assert!(store.resolve(&url).is_some());
    }

    #[test]
    fn test_not_released_before_thirty_seconds() {
        let mut store = ObjectUrlStore::new();
        let created = Instant::now();
        let url = store.create(blob(), created);
        store.release_after(&url, created, RELEASE_DELAY);

        assert!(store.sweep(created + Duration::from_secs(29)).is_empty());
        assert!(store.resolve(&url).is_some());

        assert_eq!(store.sweep(created + RELEASE_DELAY), vec![url.clone()]);
        assert!(store.resolve(&url).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_release_never_precedes_creation_window() {
        let mut store = ObjectUrlStore::new();
        let created = Instant::now() + Duration::from_secs(10);
        let url = store.create(blob(), created);
        // Scheduled with a clock reading older than the creation time
        store.release_after(&url, created - Duration::from_secs(10), RELEASE_DELAY);

        assert!(store.sweep(created + Duration::from_secs(25)).is_empty());
        assert_eq!(store.sweep(created + RELEASE_DELAY).len(), 1);
    }
}
