use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use secrecy::SecretString;

use pulsedesk_core::cache::TtlCache;
use pulsedesk_core::config::FallbackConfig;
use pulsedesk_core::domain::credential::ProviderKind;
use pulsedesk_core::domain::tenant::TenantId;
use pulsedesk_core::errors::OrchestratorError;
use pulsedesk_core::vault::CredentialVault;

use pulsedesk_db::repositories::CredentialRepository;

/// A ready-to-use provider handle for one request. Holds the decrypted API
/// key for the duration of the call; `Debug` output redacts it.
#[derive(Clone, Debug)]
pub struct ResolvedProvider {
    pub provider: ProviderKind,
    pub model_name: String,
    pub api_key: SecretString,
    pub is_system_fallback: bool,
}

/// Resolves which provider credential serves a tenant's request.
///
/// Resolution order: unexpired cache entry, then the tenant's stored
/// credential, then the system fallback from configuration. Only successful
/// tenant-owned resolutions are cached; a credential whose ciphertext fails
/// to decrypt is marked invalid and never retried.
pub struct ProviderResolver {
    credentials: Arc<dyn CredentialRepository>,
    vault: Arc<CredentialVault>,
    cache: TtlCache<ResolvedProvider>,
    fallback: FallbackConfig,
}

impl ProviderResolver {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        vault: Arc<CredentialVault>,
        fallback: FallbackConfig,
        cache_ttl: Duration,
    ) -> Self {
        Self { credentials, vault, cache: TtlCache::new(cache_ttl), fallback }
    }

    pub async fn resolve(&self, tenant: &TenantId) -> Result<ResolvedProvider, OrchestratorError> {
        self.resolve_at(tenant, Instant::now()).await
    }

    pub async fn resolve_at(
        &self,
        tenant: &TenantId,
        now: Instant,
    ) -> Result<ResolvedProvider, OrchestratorError> {
        if let Some(resolved) = self.cache.get_at(tenant, now) {
            return Ok(resolved);
        }

        let credential = match self.credentials.find_active(tenant).await {
            Ok(credential) => credential,
            Err(error) => {
                tracing::warn!(tenant = tenant.as_str(), %error, "credential lookup failed, using system fallback");
                return self.system_fallback();
            }
        };

        let Some(credential) = credential else {
            return self.system_fallback();
        };

        match self.vault.decrypt(&credential.api_key_ciphertext) {
            Ok(api_key) => {
                let resolved = ResolvedProvider {
                    provider: credential.provider,
                    model_name: credential.model_name,
                    api_key,
                    is_system_fallback: false,
                };
                self.cache.insert_at(tenant.clone(), resolved.clone(), now);
                self.touch_last_used(tenant.clone());
                Ok(resolved)
            }
            Err(error) => {
                tracing::warn!(tenant = tenant.as_str(), %error, "stored credential failed to decrypt, marking invalid");
                if let Err(error) = self.credentials.mark_invalid(tenant).await {
                    tracing::warn!(tenant = tenant.as_str(), %error, "could not mark credential invalid");
                }
                self.system_fallback()
            }
        }
    }

    /// Drops the tenant's cached resolution. Must be called whenever the
    /// tenant's credential is saved, rotated, or removed; otherwise a stale
    /// entry keeps serving until the TTL runs out.
    pub fn invalidate(&self, tenant: &TenantId) {
        self.cache.invalidate(tenant);
    }

    fn system_fallback(&self) -> Result<ResolvedProvider, OrchestratorError> {
        let Some(api_key) = self.fallback.api_key.clone() else {
            return Err(OrchestratorError::ProviderUnavailable);
        };
        Ok(ResolvedProvider {
            provider: self.fallback.provider,
            model_name: self.fallback.model.clone(),
            api_key,
            is_system_fallback: true,
        })
    }

    fn touch_last_used(&self, tenant: TenantId) {
        let credentials = Arc::clone(&self.credentials);
        tokio::spawn(async move {
            if let Err(error) = credentials.touch_last_used(&tenant, Utc::now()).await {
                tracing::debug!(tenant = tenant.as_str(), %error, "last_used_at update failed");
            }
        });
    }
}
