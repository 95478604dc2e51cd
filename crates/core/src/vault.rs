use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault master key must be base64 for exactly 32 bytes")]
    InvalidMasterKey,
    #[error("ciphertext is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("ciphertext is too short to contain a nonce")]
    Truncated,
    #[error("vault cryptographic operation failed")]
    Crypto,
}

/// Encrypts and decrypts per-tenant provider API keys under one process-wide
/// AES-256-GCM master key. The key is read-only after construction; plaintext
/// keys never appear in logs or `Debug` output.
pub struct CredentialVault {
    key: [u8; 32],
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

impl CredentialVault {
    pub fn new(master_key: &SecretString) -> Result<Self, VaultError> {
        let decoded = BASE64
            .decode(master_key.expose_secret().trim())
            .map_err(|_| VaultError::InvalidMasterKey)?;
        if decoded.len() != MASTER_KEY_LEN {
            return Err(VaultError::InvalidMasterKey);
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }

    /// Encrypts a plaintext API key, returning base64 of `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &SecretString) -> Result<String, VaultError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| VaultError::Crypto)?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, plaintext.expose_secret().as_bytes())
            .map_err(|_| VaultError::Crypto)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + sealed.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&sealed);
        Ok(BASE64.encode(combined))
    }

    /// Decrypts stored ciphertext. A failure here is permanent for that
    /// ciphertext: callers must mark the credential invalid and fall back,
    /// never retry.
    pub fn decrypt(&self, ciphertext: &str) -> Result<SecretString, VaultError> {
        let combined = BASE64.decode(ciphertext.trim())?;
        if combined.len() <= NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce_bytes, sealed) = combined.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| VaultError::Crypto)?;
        let nonce = Nonce::from_slice(nonce_bytes);
        let opened = cipher.decrypt(nonce, sealed).map_err(|_| VaultError::Crypto)?;
        let plaintext = String::from_utf8(opened).map_err(|_| VaultError::Crypto)?;
        Ok(plaintext.into())
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use secrecy::{ExposeSecret, SecretString};

    use super::{CredentialVault, VaultError};

    fn test_key() -> SecretString {
        BASE64.encode([7u8; 32]).into()
    }

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let vault = CredentialVault::new(&test_key()).expect("vault");
        let plaintext: SecretString = "sk-tenant-alpha-key".to_string().into();

        let sealed = vault.encrypt(&plaintext).expect("encrypt");
        assert_ne!(sealed, plaintext.expose_secret());

        let opened = vault.decrypt(&sealed).expect("decrypt");
        assert_eq!(opened.expose_secret(), "sk-tenant-alpha-key");
    }

    #[test]
    fn nonces_are_fresh_per_encryption() {
        let vault = CredentialVault::new(&test_key()).expect("vault");
        let plaintext: SecretString = "sk-same".to_string().into();

        let first = vault.encrypt(&plaintext).expect("encrypt");
        let second = vault.encrypt(&plaintext).expect("encrypt");
        assert_ne!(first, second);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let vault = CredentialVault::new(&test_key()).expect("vault");
        let other =
            CredentialVault::new(&BASE64.encode([9u8; 32]).into()).expect("other vault");

        let sealed = vault.encrypt(&"sk-x".to_string().into()).expect("encrypt");
        assert!(matches!(other.decrypt(&sealed), Err(VaultError::Crypto)));
    }

    #[test]
    fn rejects_short_master_key() {
        let short: SecretString = BASE64.encode([1u8; 16]).into();
        assert!(matches!(CredentialVault::new(&short), Err(VaultError::InvalidMasterKey)));
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let vault = CredentialVault::new(&test_key()).expect("vault");
        let sealed = vault.encrypt(&"sk-x".to_string().into()).expect("encrypt");

        let mut bytes = BASE64.decode(&sealed).expect("decode");
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let tampered = BASE64.encode(bytes);

        assert!(matches!(vault.decrypt(&tampered), Err(VaultError::Crypto)));
    }

    #[test]
    fn debug_output_reveals_nothing() {
        let vault = CredentialVault::new(&test_key()).expect("vault");
        let debug = format!("{vault:?}");
        assert!(!debug.contains("key"));
    }
}
