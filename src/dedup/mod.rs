//! Bounded "already delivered" identity cache
//!
//! A pure size cap: once more than `capacity` identities are recorded, the
//! oldest-inserted ones are evicted. Lookups do not refresh an entry.


use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub const MAX_CACHE: usize = 1000;

/// FIFO-bounded set of event identities
#[derive(Debug, Clone)]
pub struct DedupCache {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(MAX_CACHE)
    }
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// True iff `id` was recorded and has not been evicted since
    pub fn seen(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// Record `id`, evicting the oldest entries beyond capacity.
    ///
    /// Recording an id that is already present leaves its position unchanged.
    pub fn record(&mut self, id: &str) {
        if !self.members.insert(id.to_string()) {
            return;
        }
        self.order.push_back(id.to_string());

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Identities from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Cache handle shared between the poller (sole writer) and command readers
#[derive(Debug, Clone, Default)]
pub struct SharedSeenSet {
    inner: Arc<RwLock<DedupCache>>,
}

impl SharedSeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DedupCache::new(capacity))),
        }
    }

    pub fn seen(&self, id: &str) -> bool {
        self.inner.read().seen(id)
    }

    /// Record `id` unless present; returns true if it was new
    pub fn check_and_record(&self, id: &str) -> bool {
        let mut cache = self.inner.write();
        if cache.seen(id) {
            return false;
        }
        cache.record(id);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Point-in-time copy for readers outside the poll loop
    pub fn snapshot(&self) -> DedupCache {
        self.inner.read().clone()
    }
}
