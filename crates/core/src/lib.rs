pub mod audit;
pub mod cache;
pub mod config;
pub mod digest;
pub mod domain;
pub mod errors;
pub mod vault;

pub use audit::{AuditAction, AuditEntry, AuditSink, InMemoryAuditSink};
pub use cache::{CachedEntry, TtlCache};
pub use digest::{
    growth_rate, token_estimate, AccountSummary, AgencyDigest, DigestKind, DigestSettings,
    EntityContext, FunnelSummary, HealthSummary, RevenueSummary, SpenderSummary, TrendDirection,
};
pub use domain::actor::{ActorId, ActorRole, ToolTier};
pub use domain::credential::{CredentialStatus, ProviderCredential, ProviderKind};
pub use domain::spend::{AccountId, SpendEvent};
pub use domain::tenant::TenantId;
pub use errors::{OrchestratorError, ToolError};
pub use vault::{CredentialVault, VaultError};
