//! # Signature Verification Errors
//!
//! Reason-coded failures for both signature schemes. The codes are part of
//! the audit contract: the session layer logs them verbatim and the
//! dialogue layer phrases them, but no layer ever downgrades one to a
//! soft warning or retries it automatically.

use thiserror::Error;

/// A rejected signature or assertion, with its reason code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureVerificationError {
    /// The cryptographic signature does not verify over the expected bytes.
    #[error("bad signature: {0}")]
    BadSignature(String),

    /// The echoed challenge does not exactly match the issued one, the
    /// challenge was already consumed, or its validity window has passed.
    #[error("stale challenge: {0}")]
    StaleChallenge(String),

    /// The authenticator's signature counter did not increase — a possible
    /// cloned-credential indicator.
    #[error("signature counter regression: stored {stored}, presented {presented}")]
    CounterRegression {
        /// Counter currently recorded for the credential.
        stored: u32,
        /// Counter presented in the assertion.
        presented: u32,
    },

    /// The assertion was produced for a different origin.
    #[error("origin mismatch: expected {expected:?}, got {actual:?}")]
    OriginMismatch {
        /// Origin the relying party expects.
        expected: String,
        /// Origin embedded in the client data.
        actual: String,
    },

    /// Key material could not be parsed or looked up.
    #[error("key error: {0}")]
    Key(String),
}

impl SignatureVerificationError {
    /// The stable reason code surfaced to callers and audit logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::BadSignature(_) => "bad-signature",
            Self::StaleChallenge(_) => "stale-challenge",
            Self::CounterRegression { .. } => "counter-regression",
            Self::OriginMismatch { .. } => "origin-mismatch",
            Self::Key(_) => "key-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(
            SignatureVerificationError::BadSignature("x".into()).reason_code(),
            "bad-signature"
        );
        assert_eq!(
            SignatureVerificationError::StaleChallenge("x".into()).reason_code(),
            "stale-challenge"
        );
        assert_eq!(
            SignatureVerificationError::CounterRegression { stored: 5, presented: 5 }
                .reason_code(),
            "counter-regression"
        );
        assert_eq!(
            SignatureVerificationError::OriginMismatch {
                expected: "https://a".into(),
                actual: "https://b".into()
            }
            .reason_code(),
            "origin-mismatch"
        );
    }
}
