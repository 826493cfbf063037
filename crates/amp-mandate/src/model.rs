//! # Mandate Envelope and Signatures
//!
//! The generic mandate record: identifier, kind-specific contents, and an
//! append-only signature list. Digests cover contents only — attaching a
//! signature never changes what later signers sign over.
//!
//! Signature dispatch is a tagged union over the two schemes in play
//! (asymmetric Ed25519 for merchant/network, device attestation for the
//! payer); verification has a single entry point in the session layer
//! that matches on the tag.

use serde::{Deserialize, Serialize};

use amp_core::{sha256_digest, CanonicalBytes, CanonicalizationError, MandateDigest, MandateId, Timestamp};
use amp_crypto::{DeviceAssertion, Ed25519Signature};

use crate::contents::{CartContents, IntentContents, PaymentContents};

/// The three mandate kinds in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MandateKind {
    /// The shopper's spending authority.
    Intent,
    /// A priced basket from one merchant.
    Cart,
    /// The charge instruction.
    Payment,
}

impl MandateKind {
    /// The signer roles a mandate of this kind requires before it is
    /// fully authorized, in required signing order.
    pub fn required_roles(&self) -> &'static [SignerRole] {
        match self {
            Self::Intent => &[SignerRole::Payer],
            Self::Cart => &[SignerRole::Merchant, SignerRole::Payer],
            Self::Payment => &[SignerRole::Payer],
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Cart => "cart",
            Self::Payment => "payment",
        }
    }
}

impl std::fmt::Display for MandateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal a signature speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerRole {
    /// The shopper.
    Payer,
    /// The merchant.
    Merchant,
    /// The payment network.
    Network,
}

impl std::fmt::Display for SignerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Payer => "payer",
            Self::Merchant => "merchant",
            Self::Network => "network",
        })
    }
}

/// Scheme-specific signature material — the tagged union the verifier
/// dispatches on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum SignatureProof {
    /// Asymmetric Ed25519 signature over the mandate digest.
    Ed25519 {
        /// Identity the key was resolved under (merchant id, network id).
        key_ref: String,
        /// The signature value.
        signature: Ed25519Signature,
    },
    /// Device-attested assertion bound to a server challenge.
    DeviceAttestation {
        /// The full assertion, including authenticator and client data.
        assertion: DeviceAssertion,
    },
}

/// A signature attached to a mandate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// The role this signature fulfils.
    pub role: SignerRole,
    /// Scheme-specific proof material.
    pub proof: SignatureProof,
    /// When the signature was accepted.
    pub signed_at: Timestamp,
}

/// Kind-discriminated mandate contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum MandateContents {
    /// Intent payload.
    Intent(IntentContents),
    /// Cart payload.
    Cart(CartContents),
    /// Payment payload.
    Payment(PaymentContents),
}

impl MandateContents {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> MandateKind {
        match self {
            Self::Intent(_) => MandateKind::Intent,
            Self::Cart(_) => MandateKind::Cart,
            Self::Payment(_) => MandateKind::Payment,
        }
    }
}

/// A mandate record: immutable contents plus an append-only signature list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mandate {
    /// Unique mandate identifier.
    pub id: MandateId,
    /// Kind-specific contents; covered by the digest.
    pub contents: MandateContents,
    /// Attached signatures, in acceptance order; never covered by the digest.
    pub signatures: Vec<Signature>,
}

impl Mandate {
    /// Wrap contents in a fresh, unsigned mandate.
    pub fn new(contents: MandateContents) -> Self {
        Self {
            id: MandateId::new(),
            contents,
            signatures: Vec::new(),
        }
    }

    /// The mandate kind.
    pub fn kind(&self) -> MandateKind {
        self.contents.kind()
    }

    /// The digest of the canonicalized contents.
    ///
    /// Signatures are excluded by construction: only `contents` is
    /// canonicalized, so attaching a signature never shifts the digest
    /// that parents and children link against.
    pub fn digest(&self) -> Result<MandateDigest, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(&self.contents)?))
    }

    /// The signature attached for a role, if any.
    pub fn signature_for(&self, role: SignerRole) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.role == role)
    }

    /// Whether a role has already signed.
    pub fn has_signed(&self, role: SignerRole) -> bool {
        self.signature_for(role).is_some()
    }

    /// The next role expected to sign, per the kind's signing order.
    pub fn next_expected_role(&self) -> Option<SignerRole> {
        self.kind()
            .required_roles()
            .iter()
            .copied()
            .find(|role| !self.has_signed(*role))
    }

    /// Whether every role required by this mandate's kind has signed.
    ///
    /// Signatures are verified before they are attached, so presence of
    /// all required roles is the full-authorization condition.
    pub fn is_fully_authorized(&self) -> bool {
        self.kind().required_roles().iter().all(|r| self.has_signed(*r))
    }

    /// The Intent payload, if this is an Intent mandate.
    pub fn as_intent(&self) -> Option<&IntentContents> {
        match &self.contents {
            MandateContents::Intent(c) => Some(c),
            _ => None,
        }
    }

    /// The Cart payload, if this is a Cart mandate.
    pub fn as_cart(&self) -> Option<&CartContents> {
        match &self.contents {
            MandateContents::Cart(c) => Some(c),
            _ => None,
        }
    }

    /// The Payment payload, if this is a Payment mandate.
    pub fn as_payment(&self) -> Option<&PaymentContents> {
        match &self.contents {
            MandateContents::Payment(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::{IntentConstraints, LineItem};
    use amp_core::{Amount, CurrencyCode, MerchantId, UserId};

    fn jpy(v: &str) -> Amount {
        Amount::new(v, CurrencyCode::new("JPY").unwrap()).unwrap()
    }

    fn intent_mandate() -> Mandate {
        Mandate::new(MandateContents::Intent(IntentContents {
            user_id: UserId::new("user-1"),
            max_amount: jpy("5000"),
            constraints: IntentConstraints::default(),
        }))
    }

    fn cart_mandate() -> Mandate {
        Mandate::new(MandateContents::Cart(CartContents {
            merchant_id: MerchantId::new("merchant-1"),
            line_items: vec![LineItem {
                sku: "sku-1".into(),
                description: "Mug".into(),
                quantity: 1,
                unit_price: jpy("4500"),
                total_price: jpy("4500"),
                category: None,
            }],
            subtotal: jpy("4500"),
            tax: jpy("450"),
            shipping: jpy("0"),
            total: jpy("4950"),
            shipping_address: None,
            intent_hash: None,
        }))
    }

    fn dummy_signature(role: SignerRole) -> Signature {
        Signature {
            role,
            proof: SignatureProof::Ed25519 {
                key_ref: "test".into(),
                signature: amp_crypto::Ed25519Signature::from_bytes([0u8; 64]),
            },
            signed_at: Timestamp::now(),
        }
    }

    #[test]
    fn required_roles_per_kind() {
        assert_eq!(MandateKind::Intent.required_roles(), &[SignerRole::Payer]);
        assert_eq!(
            MandateKind::Cart.required_roles(),
            &[SignerRole::Merchant, SignerRole::Payer]
        );
        assert_eq!(MandateKind::Payment.required_roles(), &[SignerRole::Payer]);
    }

    #[test]
    fn digest_ignores_signatures() {
        let mut mandate = intent_mandate();
        let before = mandate.digest().unwrap();
        mandate.signatures.push(dummy_signature(SignerRole::Payer));
        assert_eq!(mandate.digest().unwrap(), before);
    }

    #[test]
    fn authorization_requires_all_roles() {
        let mut cart = cart_mandate();
        assert!(!cart.is_fully_authorized());
        assert_eq!(cart.next_expected_role(), Some(SignerRole::Merchant));

        cart.signatures.push(dummy_signature(SignerRole::Merchant));
        assert!(!cart.is_fully_authorized());
        assert_eq!(cart.next_expected_role(), Some(SignerRole::Payer));

        cart.signatures.push(dummy_signature(SignerRole::Payer));
        assert!(cart.is_fully_authorized());
        assert_eq!(cart.next_expected_role(), None);
    }

    #[test]
    fn intent_with_payer_signature_is_authorized() {
        let mut intent = intent_mandate();
        intent.signatures.push(dummy_signature(SignerRole::Payer));
        assert!(intent.is_fully_authorized());
    }

    #[test]
    fn serde_roundtrip_preserves_digest() {
        let mandate = cart_mandate();
        let json = serde_json::to_string(&mandate).unwrap();
        let parsed: Mandate = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.digest().unwrap(), mandate.digest().unwrap());
    }

    #[test]
    fn accessors() {
        assert!(intent_mandate().as_intent().is_some());
        assert!(intent_mandate().as_cart().is_none());
        assert!(cart_mandate().as_cart().is_some());
    }
}
