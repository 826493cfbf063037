//! # Mandate Digest — Tamper-Evident Content Addressing
//!
//! Defines `MandateDigest`, the SHA-256 digest that links the mandate chain:
//! a Cart mandate references its Intent by digest, a Payment mandate
//! references its Cart, and every signature covers a digest.
//!
//! ## Security Invariant
//!
//! A `MandateDigest` can only be computed from `CanonicalBytes`, ensuring
//! that every digest in the system is produced through the canonicalization
//! pipeline. This is enforced by the signature of [`sha256_digest()`] —
//! there is no path from raw `&[u8]` to a digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::AmpError;

/// A SHA-256 digest of canonicalized mandate contents.
///
/// Displays and serializes as `sha256:<64 lowercase hex chars>` so chain
/// references are self-describing on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MandateDigest([u8; 32]);

impl MandateDigest {
    /// Wrap raw digest bytes. Prefer [`sha256_digest()`] for computing
    /// digests from contents.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as lowercase hex without the algorithm prefix.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a `sha256:<hex>` reference back into a digest.
    ///
    /// # Errors
    ///
    /// Fails on a missing/unknown algorithm prefix or malformed hex.
    pub fn parse(s: &str) -> Result<Self, AmpError> {
        let hex = s
            .strip_prefix("sha256:")
            .ok_or_else(|| AmpError::Schema(format!("digest must start with sha256: {s:?}")))?;
        if hex.len() != 64 {
            return Err(AmpError::Schema(format!(
                "digest hex must be 64 chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in bytes.iter_mut().enumerate() {
            let pos = i * 2;
            *chunk = u8::from_str_radix(&hex[pos..pos + 2], 16)
                .map_err(|e| AmpError::Schema(format!("invalid digest hex at {pos}: {e}")))?;
        }
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for MandateDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

impl Serialize for MandateDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MandateDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the SHA-256 digest of canonical mandate contents.
///
/// Accepts only `&CanonicalBytes`, not raw `&[u8]` — no code path can
/// compute a chain digest over non-canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> MandateDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    MandateDigest(bytes)
}
