//! In-memory repositories for tests and ephemeral tooling. They honor the
//! same tenant-scoping contracts as the SQL implementations.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use pulsedesk_core::audit::AuditEntry;
use pulsedesk_core::digest::DigestKind;
use pulsedesk_core::domain::credential::{CredentialStatus, ProviderCredential};
use pulsedesk_core::domain::spend::SpendEvent;
use pulsedesk_core::domain::tenant::TenantId;

use super::{
    AuditRepository, CredentialRepository, DigestRepository, RepositoryError, SpendRepository,
    StoredDigest,
};

#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    rows: Arc<RwLock<HashMap<TenantId, ProviderCredential>>>,
}

#[async_trait::async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_active(
        &self,
        tenant: &TenantId,
    ) -> Result<Option<ProviderCredential>, RepositoryError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(tenant)
            .filter(|credential| credential.is_active && credential.status == CredentialStatus::Valid)
            .cloned())
    }

    async fn upsert(&self, credential: ProviderCredential) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.insert(credential.tenant_id.clone(), credential);
        Ok(())
    }

    async fn mark_invalid(&self, tenant: &TenantId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        if let Some(credential) = rows.get_mut(tenant) {
            credential.status = CredentialStatus::Invalid;
            credential.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn touch_last_used(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        if let Some(credential) = rows.get_mut(tenant) {
            credential.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn deactivate(&self, tenant: &TenantId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        if let Some(credential) = rows.get_mut(tenant) {
            credential.is_active = false;
            credential.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDigestRepository {
    rows: Arc<RwLock<HashMap<(TenantId, DigestKind), StoredDigest>>>,
}

#[async_trait::async_trait]
impl DigestRepository for InMemoryDigestRepository {
    async fn upsert(&self, digest: StoredDigest) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.insert((digest.tenant_id.clone(), digest.kind), digest);
        Ok(())
    }

    async fn find(
        &self,
        tenant: &TenantId,
        kind: DigestKind,
    ) -> Result<Option<StoredDigest>, RepositoryError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(tenant.clone(), kind)).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySpendRepository {
    rows: Arc<RwLock<Vec<SpendEvent>>>,
}

#[async_trait::async_trait]
impl SpendRepository for InMemorySpendRepository {
    async fn list_window(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SpendEvent>, RepositoryError> {
        let rows = self.rows.read().await;
        let mut events: Vec<SpendEvent> = rows
            .iter()
            .filter(|event| {
                &event.tenant_id == tenant && event.occurred_at >= from && event.occurred_at < to
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.occurred_at);
        Ok(events)
    }

    async fn insert_batch(&self, events: Vec<SpendEvent>) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.extend(events);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditRepository {
    rows: Arc<RwLock<Vec<AuditEntry>>>,
}

impl InMemoryAuditRepository {
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.rows.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.push(entry);
        Ok(())
    }
}
