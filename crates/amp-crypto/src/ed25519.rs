//! # Ed25519 — Asymmetric Signatures over Mandate Digests
//!
//! Signing and verification for the merchant and network signer roles.
//!
//! ## Security Invariant
//!
//! - Signing input MUST be `&MandateDigest` — you cannot sign raw bytes.
//!   A digest can only be computed from `CanonicalBytes`, so every
//!   signature in the chain transitively covers canonical contents.
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does
//!   not implement `Serialize` and its `Debug` output is redacted.
//!
//! ## Serde
//!
//! Public keys and signatures serialize as lowercase hex strings.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use amp_core::MandateDigest;

use crate::error::SignatureVerificationError;

/// An Ed25519 public key (32 bytes) for signature verification.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

/// An Ed25519 signature (64 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Ed25519Signature(pub [u8; 64]);

/// An Ed25519 key pair for signing operations.
///
/// Does not implement `Serialize` — private keys must not leak into
/// logs, responses, or stored mandates.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519PublicKey {
    /// Wrap raw 32-byte key material.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, SignatureVerificationError> {
        let bytes = hex_to_array::<32>(hex)
            .map_err(SignatureVerificationError::Key)?;
        Ok(Self(bytes))
    }

    fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, SignatureVerificationError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| SignatureVerificationError::Key(format!("invalid public key: {e}")))
    }
}

impl Ed25519Signature {
    /// Wrap raw 64-byte signature material.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// The raw 64-byte signature.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse from a 128-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, SignatureVerificationError> {
        let bytes = hex_to_array::<64>(hex)
            .map_err(|e| SignatureVerificationError::BadSignature(e))?;
        Ok(Self(bytes))
    }
}

impl Ed25519KeyPair {
    /// Generate a new random key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Deterministic key pair from a 32-byte seed (tests, fixtures).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// The public half of this key pair.
    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a mandate digest.
    ///
    /// The input type enforces that only canonical-pipeline digests can be
    /// signed — there is no API for signing arbitrary bytes.
    pub fn sign_digest(&self, digest: &MandateDigest) -> Ed25519Signature {
        let sig = self.signing_key.sign(digest.as_bytes());
        Ed25519Signature(sig.to_bytes())
    }

    /// Sign an arbitrary pre-composed payload.
    ///
    /// Reserved for the device-attestation path, where the signed bytes
    /// are `authenticator data || SHA-256(client data)` rather than a
    /// mandate digest. Crate-internal so external callers cannot bypass
    /// the digest discipline.
    pub(crate) fn sign_payload(&self, payload: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(payload).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

/// Verify an Ed25519 signature over a mandate digest.
///
/// Returns `Ok(())` when valid, `SignatureVerificationError::BadSignature`
/// otherwise. Pure beyond reading the key material.
pub fn verify_digest(
    digest: &MandateDigest,
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), SignatureVerificationError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(digest.as_bytes(), &sig)
        .map_err(|e| SignatureVerificationError::BadSignature(format!("ed25519: {e}")))
}

/// Verify an Ed25519 signature over a raw payload (attestation path).
pub(crate) fn verify_payload(
    payload: &[u8],
    signature: &Ed25519Signature,
    public_key: &Ed25519PublicKey,
) -> Result<(), SignatureVerificationError> {
    let vk = public_key.to_verifying_key()?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    vk.verify(payload, &sig)
        .map_err(|e| SignatureVerificationError::BadSignature(format!("ed25519: {e}")))
}

// ---------------------------------------------------------------------------
// Serde (hex strings)
// ---------------------------------------------------------------------------

impl Serialize for Ed25519PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Ed25519Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ed25519Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519PublicKey({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519Signature({}...)", hex_prefix(&self.0))
    }
}

impl std::fmt::Display for Ed25519Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Hex utilities (no external hex crate dependency)
// ---------------------------------------------------------------------------

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

fn hex_to_array<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let hex = hex.trim().to_lowercase();
    if hex.len() != N * 2 {
        return Err(format!("hex must be {} chars, got {}", N * 2, hex.len()));
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        let pos = i * 2;
        *byte = u8::from_str_radix(&hex[pos..pos + 2], 16)
            .map_err(|e| format!("invalid hex at position {pos}: {e}"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_core::{sha256_digest, CanonicalBytes};

    fn digest_of(value: serde_json::Value) -> MandateDigest {
        sha256_digest(&CanonicalBytes::new(&value).unwrap())
    }

    #[test]
    fn sign_and_verify() {
        let kp = Ed25519KeyPair::generate();
        let digest = digest_of(serde_json::json!({"merchant_id": "m-1", "total": "4950"}));
        let sig = kp.sign_digest(&digest);
        verify_digest(&digest, &sig, &kp.public_key()).expect("valid signature should verify");
    }

    #[test]
    fn wrong_key_fails() {
        let kp1 = Ed25519KeyPair::generate();
        let kp2 = Ed25519KeyPair::generate();
        let digest = digest_of(serde_json::json!({"x": 1}));
        let sig = kp1.sign_digest(&digest);
        assert!(verify_digest(&digest, &sig, &kp2.public_key()).is_err());
    }

    #[test]
    fn tampered_digest_fails() {
        let kp = Ed25519KeyPair::generate();
        let original = digest_of(serde_json::json!({"total": "4950"}));
        let tampered = digest_of(serde_json::json!({"total": "6000"}));
        let sig = kp.sign_digest(&original);
        let err = verify_digest(&tampered, &sig, &kp.public_key()).unwrap_err();
        assert_eq!(err.reason_code(), "bad-signature");
    }

    #[test]
    fn deterministic_from_seed() {
        let kp1 = Ed25519KeyPair::from_seed(&[7u8; 32]);
        let kp2 = Ed25519KeyPair::from_seed(&[7u8; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        let digest = digest_of(serde_json::json!({"k": "v"}));
        assert_eq!(kp1.sign_digest(&digest), kp2.sign_digest(&digest));
    }

    #[test]
    fn hex_roundtrips() {
        let kp = Ed25519KeyPair::generate();
        let pk = kp.public_key();
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        let sig = kp.sign_digest(&digest_of(serde_json::json!({"a": 1})));
        assert_eq!(Ed25519Signature::from_hex(&sig.to_hex()).unwrap(), sig);
    }

    #[test]
    fn invalid_hex_rejected() {
        assert!(Ed25519PublicKey::from_hex("not-hex").is_err());
        assert!(Ed25519PublicKey::from_hex(&"zz".repeat(32)).is_err());
        assert!(Ed25519Signature::from_hex("aabb").is_err());
    }

    #[test]
    fn serde_is_hex_string() {
        let kp = Ed25519KeyPair::generate();
        let json = serde_json::to_string(&kp.public_key()).unwrap();
        assert_eq!(json.len(), 64 + 2);
        let parsed: Ed25519PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kp.public_key());
    }

    #[test]
    fn debug_never_leaks_private_key() {
        let kp = Ed25519KeyPair::generate();
        assert_eq!(format!("{kp:?}"), "Ed25519KeyPair(<private>)");
    }
}
