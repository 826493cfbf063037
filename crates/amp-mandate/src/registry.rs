//! # Key and Credential Registry
//!
//! Supplies public keys per signer identity and device credentials per
//! credential id. The registry is an external collaborator in production
//! (an identity service); the trait here is the contract surface, with an
//! in-memory implementation for tests and the demo driver.
//!
//! The merchant binding invariant lives here: a cart's `merchant_id` is
//! resolved through this registry, so a signature only counts as the
//! merchant's if it verifies against the key registered for that exact
//! identity.

use std::collections::HashMap;
use std::sync::RwLock;

use amp_core::{CredentialId, MerchantId};
use amp_crypto::{CredentialRecord, Ed25519PublicKey};

/// Lookup surface for signer key material.
pub trait KeyRegistry: Send + Sync {
    /// Public key registered for a merchant identity.
    fn merchant_key(&self, merchant_id: &MerchantId) -> Option<Ed25519PublicKey>;

    /// Public key registered for a payment network identity.
    fn network_key(&self, network_id: &str) -> Option<Ed25519PublicKey>;

    /// Device credential registered for a shopper's authenticator.
    fn credential(&self, credential_id: &CredentialId) -> Option<CredentialRecord>;

    /// Record the signature counter accepted for a credential.
    ///
    /// Called after a successful attestation verification; the verifier
    /// itself never mutates the registry.
    fn commit_counter(&self, credential_id: &CredentialId, counter: u32);
}

/// In-memory registry for tests and the demo driver.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    merchants: RwLock<HashMap<MerchantId, Ed25519PublicKey>>,
    networks: RwLock<HashMap<String, Ed25519PublicKey>>,
    credentials: RwLock<HashMap<CredentialId, CredentialRecord>>,
}

impl InMemoryKeyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a merchant's verification key.
    pub fn register_merchant(&self, merchant_id: MerchantId, key: Ed25519PublicKey) {
        self.merchants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(merchant_id, key);
    }

    /// Register (or replace) a network's verification key.
    pub fn register_network(&self, network_id: impl Into<String>, key: Ed25519PublicKey) {
        self.networks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(network_id.into(), key);
    }

    /// Register (or replace) a device credential.
    pub fn register_credential(&self, record: CredentialRecord) {
        self.credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.credential_id.clone(), record);
    }
}

impl KeyRegistry for InMemoryKeyRegistry {
    fn merchant_key(&self, merchant_id: &MerchantId) -> Option<Ed25519PublicKey> {
        self.merchants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(merchant_id)
            .cloned()
    }

    fn network_key(&self, network_id: &str) -> Option<Ed25519PublicKey> {
        self.networks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(network_id)
            .cloned()
    }

    fn credential(&self, credential_id: &CredentialId) -> Option<CredentialRecord> {
        self.credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(credential_id)
            .cloned()
    }

    fn commit_counter(&self, credential_id: &CredentialId, counter: u32) {
        if let Some(record) = self
            .credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(credential_id)
        {
            record.counter = counter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_crypto::Ed25519KeyPair;

    #[test]
    fn merchant_lookup() {
        let registry = InMemoryKeyRegistry::new();
        let kp = Ed25519KeyPair::from_seed(&[1u8; 32]);
        let merchant = MerchantId::new("merchant-1");
        registry.register_merchant(merchant.clone(), kp.public_key());
        assert_eq!(registry.merchant_key(&merchant), Some(kp.public_key()));
        assert!(registry.merchant_key(&MerchantId::new("other")).is_none());
    }

    #[test]
    fn counter_commit() {
        let registry = InMemoryKeyRegistry::new();
        let kp = Ed25519KeyPair::from_seed(&[2u8; 32]);
        let id = CredentialId::new("cred-1");
        registry.register_credential(CredentialRecord {
            credential_id: id.clone(),
            public_key: kp.public_key(),
            counter: 0,
        });
        registry.commit_counter(&id, 7);
        assert_eq!(registry.credential(&id).unwrap().counter, 7);
        // Committing for an unknown credential is a no-op.
        registry.commit_counter(&CredentialId::new("ghost"), 1);
    }
}
