//! Versioned per-kind snapshot of the content lists. The document store is
//! the single source of truth; this cache only short-circuits repeated list
//! queries and carries the version counter the change feed announces.
//! Invariant: every successful mutation invalidates the kind before the
//! change event goes out, and a fill only lands if the kind is still at the
//! version the reader observed before querying, so a client that re-fetches
//! on the event never sees the pre-mutation snapshot.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::content::ContentKind;

#[derive(Debug, Clone)]
struct Snapshot {
    payload: Value,
}

#[derive(Default)]
struct Inner {
    snapshots: HashMap<ContentKind, Snapshot>,
    versions: HashMap<ContentKind, u64>,
}

#[derive(Default)]
pub struct SnapshotCache {
    inner: RwLock<Inner>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, kind: ContentKind) -> Option<T> {
        let inner = self.inner.read().ok()?;
        let snapshot = inner.snapshots.get(&kind)?;
        serde_json::from_value(snapshot.payload.clone()).ok()
    }

    /// Store a list that was loaded while the kind sat at
    /// `observed_version`. No-op when a mutation moved the version in the
    /// meantime: a slow read finishing after an invalidation must not
    /// re-install pre-mutation data under an already-announced version.
    /// Within one version, last writer wins; there is no merge.
    pub fn fill_at_version<T: Serialize>(
        &self,
        kind: ContentKind,
        observed_version: u64,
        items: &T,
    ) -> bool {
        let payload = match serde_json::to_value(items) {
            Ok(v) => v,
            Err(_) => return false,
        };
        if let Ok(mut inner) = self.inner.write() {
            let current = inner.versions.get(&kind).copied().unwrap_or(0);
            if current != observed_version {
                return false;
            }
            inner.snapshots.insert(kind, Snapshot { payload });
            return true;
        }
        false
    }

    /// Drop the kind's snapshot and bump its version. Returns the new
    /// version, which the caller publishes on the change feed.
    pub fn invalidate(&self, kind: ContentKind) -> u64 {
        match self.inner.write() {
            Ok(mut inner) => {
                inner.snapshots.remove(&kind);
                let version = inner.versions.entry(kind).or_insert(0);
                *version += 1;
                *version
            }
            Err(_) => 0,
        }
    }

    pub fn version(&self, kind: ContentKind) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.versions.get(&kind).copied())
            .unwrap_or(0)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_then_get_round_trips() {
        let cache = SnapshotCache::new();
        cache.fill_at_version(ContentKind::Notes, 0, &vec!["a".to_string(), "b".to_string()]);
        let got: Vec<String> = cache.get(ContentKind::Notes).unwrap();
        assert_eq!(got, vec!["a", "b"]);
        assert!(cache.get::<Vec<String>>(ContentKind::Videos).is_none());
    }

    #[test]
    fn last_writer_wins_within_a_version() {
        let cache = SnapshotCache::new();
        cache.fill_at_version(ContentKind::Videos, 0, &vec![1, 2]);
        cache.fill_at_version(ContentKind::Videos, 0, &vec![9]);
        let got: Vec<i32> = cache.get(ContentKind::Videos).unwrap();
        assert_eq!(got, vec![9]);
    }

    #[test]
    fn invalidate_clears_snapshot_and_bumps_version() {
        let cache = SnapshotCache::new();
        cache.fill_at_version(ContentKind::Materials, 0, &vec!["x".to_string()]);
        assert_eq!(cache.version(ContentKind::Materials), 0);

        let v1 = cache.invalidate(ContentKind::Materials);
        assert_eq!(v1, 1);
        assert!(cache.get::<Vec<String>>(ContentKind::Materials).is_none());

        let v2 = cache.invalidate(ContentKind::Materials);
        assert_eq!(v2, 2);
        // Versions are per kind.
        assert_eq!(cache.version(ContentKind::Notes), 0);
    }

    #[test]
    fn refill_after_invalidation_keeps_version() {
        let cache = SnapshotCache::new();
        let v1 = cache.invalidate(ContentKind::Videos);
        assert!(cache.fill_at_version(ContentKind::Videos, v1, &vec![7]));
        assert_eq!(cache.version(ContentKind::Videos), 1);
        let got: Vec<i32> = cache.get(ContentKind::Videos).unwrap();
        assert_eq!(got, vec![7]);
    }

    #[test]
    fn slow_refill_after_invalidation_is_discarded() {
        let cache = SnapshotCache::new();

        // A reader starts loading while the kind is at version 0...
        let observed = cache.version(ContentKind::Notes);

        // ...a mutation invalidates, and a fresh reader refills at the new
        // version...
        let v1 = cache.invalidate(ContentKind::Notes);
        assert!(cache.fill_at_version(ContentKind::Notes, v1, &vec!["post-mutation".to_string()]));

        // ...then the slow reader's fill arrives with pre-mutation data.
        let accepted =
            cache.fill_at_version(ContentKind::Notes, observed, &vec!["pre-mutation".to_string()]);
        assert!(!accepted);

        let got: Vec<String> = cache.get(ContentKind::Notes).unwrap();
        assert_eq!(got, vec!["post-mutation"]);
        assert_eq!(cache.version(ContentKind::Notes), 1);
    }
}
