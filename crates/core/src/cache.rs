use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug)]
pub struct CachedEntry<T> {
    pub value: T,
    pub expires_at: Instant,
}

/// Tenant-keyed TTL cache for one cached artifact kind. Each owner (provider
/// resolver, digest reader) holds its own instance, so invalidation is
/// per-tenant and per-kind and tests never share state through globals.
///
/// Writes replace the whole entry; entries past `expires_at` are never
/// served. Time is threaded explicitly through the `*_at` variants so TTL
/// behavior is deterministic under test.
pub struct TtlCache<T: Clone> {
    ttl: Duration,
    entries: RwLock<HashMap<TenantId, CachedEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, tenant: &TenantId) -> Option<T> {
        self.get_at(tenant, Instant::now())
    }

    pub fn get_at(&self, tenant: &TenantId, now: Instant) -> Option<T> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.get(tenant).filter(|entry| now <= entry.expires_at).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, tenant: TenantId, value: T) {
        self.insert_at(tenant, value, Instant::now());
    }

    pub fn insert_at(&self, tenant: TenantId, value: T, now: Instant) {
        let entry = CachedEntry { value, expires_at: now + self.ttl };
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(tenant, entry);
    }

    /// Drops a tenant's entry immediately. Must be called whenever the
    /// underlying artifact changes (credential saved, rotated, removed);
    /// waiting out the TTL would serve a stale config in the meantime.
    pub fn invalidate(&self, tenant: &TenantId) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(tenant);
    }

    pub fn purge_expired_at(&self, now: Instant) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, entry| now <= entry.expires_at);
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
