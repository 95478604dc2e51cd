pub mod audit_sink;
pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use audit_sink::SqlAuditSink;
pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    AuditRepository, CredentialRepository, DigestRepository, InMemoryAuditRepository,
    InMemoryCredentialRepository, InMemoryDigestRepository, InMemorySpendRepository,
    RepositoryError, SpendRepository, SqlAuditRepository, SqlCredentialRepository,
    SqlDigestRepository, SqlSpendRepository, StoredDigest,
};
