//! # amp-crypto — Signature Schemes for the Mandate Chain
//!
//! Two independent verification paths feed the authorization state machine:
//!
//! - **Asymmetric signatures over mandate digests** ([`ed25519`]) — used by
//!   the merchant and network roles. Signing input is restricted to
//!   `&MandateDigest`, so only digests produced by the canonicalization
//!   pipeline can ever be signed.
//! - **Device-attested assertions** ([`attestation`]) — used by the payer
//!   role. A platform authenticator signs over its authenticator data and
//!   a hash of the client data; verification checks origin binding, exact
//!   challenge echo, and per-credential signature counter monotonicity.
//!
//! One-time challenges with a bounded validity window live in [`challenge`].
//!
//! All failures are reason-coded (`bad-signature`, `stale-challenge`,
//! `counter-regression`, `origin-mismatch`) and are never downgraded to
//! warnings — the session layer logs them for audit and rejects.

pub mod attestation;
pub mod challenge;
pub mod ed25519;
pub mod error;

pub use attestation::{
    AuthenticatorData, ClientData, CredentialRecord, DeviceAssertion, VerifiedAssertion,
    verify_device_attestation, CLIENT_DATA_TYPE,
};
pub use challenge::{Challenge, ChallengeRegistry, CHALLENGE_TTL_SECS};
pub use ed25519::{verify_digest, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
pub use error::SignatureVerificationError;
