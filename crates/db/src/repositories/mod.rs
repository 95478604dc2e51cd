use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use pulsedesk_core::audit::AuditEntry;
use pulsedesk_core::digest::DigestKind;
use pulsedesk_core::domain::credential::ProviderCredential;
use pulsedesk_core::domain::spend::SpendEvent;
use pulsedesk_core::domain::tenant::TenantId;

pub mod audit;
pub mod credential;
pub mod digest;
pub mod memory;
pub mod spend;

pub use audit::SqlAuditRepository;
pub use credential::SqlCredentialRepository;
pub use digest::SqlDigestRepository;
pub use memory::{
    InMemoryAuditRepository, InMemoryCredentialRepository, InMemoryDigestRepository,
    InMemorySpendRepository,
};
pub use spend::SqlSpendRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// A persisted digest row: the serialized digest plus the bookkeeping the
/// read path needs. Upserts replace the row wholesale, keyed by tenant+kind.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDigest {
    pub tenant_id: TenantId,
    pub kind: DigestKind,
    pub payload: serde_json::Value,
    pub token_estimate: u32,
    pub generated_at: DateTime<Utc>,
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// The tenant's active, validated credential, if any. Inactive or
    /// invalidated rows are never returned.
    async fn find_active(&self, tenant: &TenantId)
        -> Result<Option<ProviderCredential>, RepositoryError>;

    async fn upsert(&self, credential: ProviderCredential) -> Result<(), RepositoryError>;

    /// Permanently flags a credential whose ciphertext failed to decrypt or
    /// whose key failed provider validation.
    async fn mark_invalid(&self, tenant: &TenantId) -> Result<(), RepositoryError>;

    async fn touch_last_used(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    async fn deactivate(&self, tenant: &TenantId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait DigestRepository: Send + Sync {
    async fn upsert(&self, digest: StoredDigest) -> Result<(), RepositoryError>;

    /// `None` means no digest has ever been computed for this tenant+kind.
    /// Callers operate without context in that case; it is not an error.
    async fn find(
        &self,
        tenant: &TenantId,
        kind: DigestKind,
    ) -> Result<Option<StoredDigest>, RepositoryError>;
}

#[async_trait]
pub trait SpendRepository: Send + Sync {
    /// Spend events in `[from, to)` for one tenant. Every implementation
    /// must filter by tenant id; cross-tenant reads do not exist here.
    async fn list_window(
        &self,
        tenant: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SpendEvent>, RepositoryError>;

    async fn insert_batch(&self, events: Vec<SpendEvent>) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append-only; there is deliberately no update or delete.
    async fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
}
