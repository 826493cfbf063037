//! # One-Time Authentication Challenges
//!
//! The relying party issues a high-entropy challenge per mandate awaiting
//! device attestation. The authenticator must echo it exactly inside the
//! signed client data, within a bounded window, and each challenge is
//! consumed on first successful use — replaying a previously accepted
//! assertion always fails with `stale-challenge`.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use amp_core::{MandateId, Timestamp};

use crate::error::SignatureVerificationError;

/// Default challenge validity window: the attestation must be countersigned
/// within this many seconds of issuance.
pub const CHALLENGE_TTL_SECS: i64 = 60;

/// A server-issued authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// 32 random bytes, lowercase hex.
    pub value: String,
    /// When the challenge was issued.
    pub issued_at: Timestamp,
}

#[derive(Debug, Clone)]
struct IssuedChallenge {
    value: String,
    issued_at: Timestamp,
}

/// Registry of outstanding challenges, keyed by the mandate they protect.
///
/// Issuing a new challenge for a mandate invalidates any prior one; taking
/// a challenge consumes it. Interior mutability keeps the registry shareable
/// across concurrent sessions.
#[derive(Debug)]
pub struct ChallengeRegistry {
    ttl_secs: i64,
    issued: Mutex<HashMap<MandateId, IssuedChallenge>>,
}

impl ChallengeRegistry {
    /// Registry with the default 60-second validity window.
    pub fn new() -> Self {
        Self::with_ttl(CHALLENGE_TTL_SECS)
    }

    /// Registry with a custom validity window (tests use short windows).
    pub fn with_ttl(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            issued: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a fresh challenge for a mandate, replacing any outstanding one.
    pub fn issue(&self, mandate_id: &MandateId) -> Challenge {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let value: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let challenge = Challenge {
            value: value.clone(),
            issued_at: Timestamp::now(),
        };
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.insert(
            mandate_id.clone(),
            IssuedChallenge {
                value,
                issued_at: challenge.issued_at,
            },
        );
        challenge
    }

    /// Consume the outstanding challenge for a mandate if `presented`
    /// matches it exactly and the validity window has not passed.
    ///
    /// The challenge is removed on success, so a second presentation of
    /// the same value fails — this is the anti-replay property.
    ///
    /// # Errors
    ///
    /// `SignatureVerificationError::StaleChallenge` on mismatch, absence,
    /// or expiry. An expired challenge is also removed.
    pub fn take(
        &self,
        mandate_id: &MandateId,
        presented: &str,
    ) -> Result<(), SignatureVerificationError> {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        let entry = issued.get(mandate_id).ok_or_else(|| {
            SignatureVerificationError::StaleChallenge(format!(
                "no outstanding challenge for {mandate_id}"
            ))
        })?;
        if Timestamp::now().secs_since(&entry.issued_at) > self.ttl_secs {
            issued.remove(mandate_id);
            return Err(SignatureVerificationError::StaleChallenge(format!(
                "challenge for {mandate_id} expired"
            )));
        }
        if entry.value != presented {
            // Mismatch does not consume the outstanding challenge: a bad
            // guess must not deny the legitimate authenticator.
            return Err(SignatureVerificationError::StaleChallenge(
                "presented challenge does not match the issued one".to_string(),
            ));
        }
        issued.remove(mandate_id);
        Ok(())
    }

    /// Drop all expired challenges; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Timestamp::now();
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        let before = issued.len();
        issued.retain(|_, c| now.secs_since(&c.issued_at) <= self.ttl_secs);
        before - issued.len()
    }

    /// Number of outstanding challenges.
    pub fn outstanding(&self) -> usize {
        self.issued.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ChallengeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_take() {
        let registry = ChallengeRegistry::new();
        let mandate = MandateId::new();
        let challenge = registry.issue(&mandate);
        assert_eq!(challenge.value.len(), 64);
        registry.take(&mandate, &challenge.value).expect("fresh challenge should verify");
    }

    #[test]
    fn taking_twice_is_replay() {
        let registry = ChallengeRegistry::new();
        let mandate = MandateId::new();
        let challenge = registry.issue(&mandate);
        registry.take(&mandate, &challenge.value).unwrap();
        let err = registry.take(&mandate, &challenge.value).unwrap_err();
        assert_eq!(err.reason_code(), "stale-challenge");
    }

    #[test]
    fn mismatch_rejected_without_consuming() {
        let registry = ChallengeRegistry::new();
        let mandate = MandateId::new();
        let challenge = registry.issue(&mandate);
        assert!(registry.take(&mandate, "0000").is_err());
        // The real challenge still works after a bad guess.
        registry.take(&mandate, &challenge.value).unwrap();
    }

    #[test]
    fn unknown_mandate_rejected() {
        let registry = ChallengeRegistry::new();
        let err = registry.take(&MandateId::new(), "anything").unwrap_err();
        assert_eq!(err.reason_code(), "stale-challenge");
    }

    #[test]
    fn reissue_replaces_prior() {
        let registry = ChallengeRegistry::new();
        let mandate = MandateId::new();
        let first = registry.issue(&mandate);
        let second = registry.issue(&mandate);
        assert_ne!(first.value, second.value);
        assert!(registry.take(&mandate, &first.value).is_err());
    }

    #[test]
    fn expired_challenge_rejected() {
        let registry = ChallengeRegistry::with_ttl(-1);
        let mandate = MandateId::new();
        let challenge = registry.issue(&mandate);
        let err = registry.take(&mandate, &challenge.value).unwrap_err();
        assert_eq!(err.reason_code(), "stale-challenge");
    }

    #[test]
    fn sweep_removes_expired_only() {
        let expired = ChallengeRegistry::with_ttl(-1);
        expired.issue(&MandateId::new());
        expired.issue(&MandateId::new());
        assert_eq!(expired.sweep_expired(), 2);
        assert_eq!(expired.outstanding(), 0);

        let fresh = ChallengeRegistry::new();
        fresh.issue(&MandateId::new());
        assert_eq!(fresh.sweep_expired(), 0);
        assert_eq!(fresh.outstanding(), 1);
    }

    #[test]
    fn challenges_are_high_entropy() {
        let registry = ChallengeRegistry::new();
        let a = registry.issue(&MandateId::new());
        let b = registry.issue(&MandateId::new());
        assert_ne!(a.value, b.value);
    }
}
