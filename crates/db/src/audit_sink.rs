use std::sync::Arc;

use pulsedesk_core::audit::{AuditEntry, AuditSink};

use crate::repositories::AuditRepository;

/// Fire-and-forget persistence for audit entries. Each `emit` detaches a
/// write task; a failed insert is logged at debug and dropped so that audit
/// persistence can never fail a tenant request.
#[derive(Clone)]
pub struct SqlAuditSink {
    repository: Arc<dyn AuditRepository>,
}

impl SqlAuditSink {
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }
}

impl AuditSink for SqlAuditSink {
    fn emit(&self, entry: AuditEntry) {
        let repository = Arc::clone(&self.repository);
        tokio::spawn(async move {
            let entry_id = entry.entry_id.clone();
            if let Err(error) = repository.append(entry).await {
                tracing::debug!(%entry_id, %error, "dropping audit entry after failed append");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pulsedesk_core::audit::{AuditAction, AuditEntry, AuditSink};
    use pulsedesk_core::domain::actor::ActorId;
    use pulsedesk_core::domain::tenant::TenantId;

    use super::SqlAuditSink;
    use crate::repositories::InMemoryAuditRepository;

    #[tokio::test]
    async fn emit_appends_without_blocking_the_caller() {
        let repository = InMemoryAuditRepository::default();
        let sink = SqlAuditSink::new(Arc::new(repository.clone()));

        sink.emit(AuditEntry::new(
            TenantId("tenant-a".to_string()),
            ActorId("user-1".to_string()),
            AuditAction::Invoke,
            true,
        ));

        // The write is detached; poll briefly for it to land.
        for _ in 0..50 {
            if !repository.entries().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let entries = repository.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Invoke);
    }
}
