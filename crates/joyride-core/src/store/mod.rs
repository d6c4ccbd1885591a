// # Record Store
//
// Concurrent hostname -> IPv4 map shared by the hosts detector (writer)
// and the DNS responder (reader).
//
// ## Normalization
//
// Every key passes through `normalize_hostname` on the way in and on lookup,
// so `Example.COM.` and `example.com` address the same record.
//
// ## Concurrency
//
// Individual operations are atomic. A burst of `set`/`remove` calls made by
// one detector tick is not; readers may observe it half applied.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::RwLock;

/// Canonical form of a hostname: trimmed, without trailing dot, lowercase
pub fn normalize_hostname(hostname: &str) -> String {
    hostname.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// In-memory record store
///
/// Cloning is cheap; clones share the same underlying map.
///
/// # Example
///
/// ```rust
/// use joyride_core::store::RecordStore;
///
/// let store = RecordStore::new();
/// store.set("Web.Local.", "10.0.0.5".parse().unwrap());
/// assert_eq!(store.get("web.local"), Some("10.0.0.5".parse().unwrap()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    inner: Arc<RwLock<HashMap<String, Ipv4Addr>>>,
}

impl RecordStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the address for `hostname`
    pub fn set(&self, hostname: &str, address: Ipv4Addr) {
        let key = normalize_hostname(hostname);
        if key.is_empty() {
            return;
        }
        self.inner.write().insert(key, address);
    }

    /// Remove `hostname`; returns whether a record existed
    pub fn remove(&self, hostname: &str) -> bool {
        self.inner
            .write()
            .remove(&normalize_hostname(hostname))
            .is_some()
    }

    /// Look up the address for `hostname`
    pub fn get(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.inner.read().get(&normalize_hostname(hostname)).copied()
    }

    /// Copy of every record
    pub fn snapshot(&self) -> HashMap<String, Ipv4Addr> {
        self.inner.read().clone()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove every record
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
