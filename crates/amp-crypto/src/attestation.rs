//! # Device-Attested Assertions
//!
//! Verification of platform-authenticator assertions (passkeys) for the
//! payer role. The authenticator signs over its authenticator data and the
//! SHA-256 of the client data, which embeds the server-issued challenge
//! and the origin the assertion was produced for.
//!
//! ## Checks, in order
//!
//! 1. Client data parses and carries the expected request type.
//! 2. Origin binding — the embedded origin must equal the relying party's
//!    expected origin (`origin-mismatch`).
//! 3. Challenge echo — the embedded challenge must exactly equal the one
//!    issued for this mandate (`stale-challenge`; the caller consumes the
//!    challenge through [`crate::ChallengeRegistry`] first).
//! 4. Counter monotonicity — the authenticator's signature counter must
//!    strictly increase per credential (`counter-regression`, a possible
//!    cloned-credential indicator).
//! 5. Signature over `canonical(authenticator data) || SHA-256(client data)`
//!    against the registered credential key (`bad-signature`).
//!
//! Verification is pure beyond reading key material: the incremented
//! counter is returned in [`VerifiedAssertion`] for the caller to commit
//! to its credential registry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use amp_core::{CanonicalBytes, CredentialId};

use crate::ed25519::{self, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
use crate::error::SignatureVerificationError;

/// The request type an assertion's client data must carry.
pub const CLIENT_DATA_TYPE: &str = "amp.mandate-auth";

/// The client-side context the authenticator signed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientData {
    /// Request type discriminator; must be [`CLIENT_DATA_TYPE`].
    #[serde(rename = "type")]
    pub request_type: String,
    /// Echo of the server-issued challenge (hex).
    pub challenge: String,
    /// Origin the assertion was produced for.
    pub origin: String,
}

/// Authenticator-side data covered by the assertion signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorData {
    /// Relying party identifier the credential is scoped to.
    pub relying_party_id: String,
    /// Whether the authenticator verified user presence.
    pub user_present: bool,
    /// Monotonically increasing signature counter.
    pub counter: u32,
}

/// A signed assertion produced by the shopper's device authenticator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAssertion {
    /// The credential that produced this assertion.
    pub credential_id: CredentialId,
    /// Authenticator-side signed data.
    pub authenticator_data: AuthenticatorData,
    /// Raw client data JSON, kept verbatim — the signature covers its
    /// exact bytes, so it is never re-serialized.
    pub client_data_json: String,
    /// Signature over `canonical(authenticator_data) || SHA-256(client_data_json)`.
    pub signature: Ed25519Signature,
}

/// A registered device credential: public key plus last-seen counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// The credential identifier.
    pub credential_id: CredentialId,
    /// The credential's public key.
    pub public_key: Ed25519PublicKey,
    /// Highest signature counter accepted so far.
    pub counter: u32,
}

/// Outcome of a successful verification.
///
/// The caller commits `new_counter` to the credential registry; the
/// verifier itself mutates nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedAssertion {
    /// Counter value to record for the credential.
    pub new_counter: u32,
}

impl DeviceAssertion {
    /// Produce an assertion with a device key pair.
    ///
    /// This is the authenticator side of the protocol, used by tests,
    /// fixtures, and the demo driver; a real deployment receives
    /// assertions from actual platform authenticators.
    pub fn create(
        keypair: &Ed25519KeyPair,
        credential_id: CredentialId,
        relying_party_id: &str,
        challenge: &str,
        origin: &str,
        counter: u32,
    ) -> Result<Self, SignatureVerificationError> {
        let client_data = ClientData {
            request_type: CLIENT_DATA_TYPE.to_string(),
            challenge: challenge.to_string(),
            origin: origin.to_string(),
        };
        let client_data_json = serde_json::to_string(&client_data)
            .map_err(|e| SignatureVerificationError::BadSignature(format!("client data: {e}")))?;
        let authenticator_data = AuthenticatorData {
            relying_party_id: relying_party_id.to_string(),
            user_present: true,
            counter,
        };
        let payload = signing_payload(&authenticator_data, &client_data_json)?;
        let signature = keypair.sign_payload(&payload);
        Ok(Self {
            credential_id,
            authenticator_data,
            client_data_json,
            signature,
        })
    }

    /// Parse the embedded client data.
    pub fn client_data(&self) -> Result<ClientData, SignatureVerificationError> {
        serde_json::from_str(&self.client_data_json).map_err(|e| {
            SignatureVerificationError::BadSignature(format!("malformed client data: {e}"))
        })
    }
}

/// Verify a device-attested assertion.
///
/// `expected_challenge` is the challenge value issued for the mandate under
/// authorization; the caller is responsible for having consumed it through
/// the [`crate::ChallengeRegistry`] (which enforces the one-time and
/// validity-window properties).
pub fn verify_device_attestation(
    expected_challenge: &str,
    assertion: &DeviceAssertion,
    credential: &CredentialRecord,
    expected_origin: &str,
) -> Result<VerifiedAssertion, SignatureVerificationError> {
    let client_data = assertion.client_data()?;

    if client_data.request_type != CLIENT_DATA_TYPE {
        return Err(SignatureVerificationError::BadSignature(format!(
            "unexpected client data type {:?}",
            client_data.request_type
        )));
    }

    if client_data.origin != expected_origin {
        return Err(SignatureVerificationError::OriginMismatch {
            expected: expected_origin.to_string(),
            actual: client_data.origin,
        });
    }

    if client_data.challenge != expected_challenge {
        return Err(SignatureVerificationError::StaleChallenge(
            "assertion challenge does not match the issued challenge".to_string(),
        ));
    }

    let presented = assertion.authenticator_data.counter;
    if presented <= credential.counter {
        return Err(SignatureVerificationError::CounterRegression {
            stored: credential.counter,
            presented,
        });
    }

    let payload = signing_payload(&assertion.authenticator_data, &assertion.client_data_json)?;
    ed25519::verify_payload(&payload, &assertion.signature, &credential.public_key)?;

    Ok(VerifiedAssertion {
        new_counter: presented,
    })
}

/// The exact bytes the authenticator signs:
/// `canonical(authenticator_data) || SHA-256(client_data_json bytes)`.
///
/// The client data hash covers the verbatim JSON bytes as transmitted, so
/// any re-serialization on the relying-party side is irrelevant to the
/// signature.
fn signing_payload(
    authenticator_data: &AuthenticatorData,
    client_data_json: &str,
) -> Result<Vec<u8>, SignatureVerificationError> {
    let auth_bytes = CanonicalBytes::new(authenticator_data)
        .map_err(|e| SignatureVerificationError::BadSignature(format!("authenticator data: {e}")))?;
    let mut payload = auth_bytes.as_bytes().to_vec();
    payload.extend_from_slice(&Sha256::digest(client_data_json.as_bytes()));
    Ok(payload)
}
