//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier namespace in the mandate stack.
//! You cannot pass a `SessionId` where a `StepUpSessionId` is expected —
//! the step-up sub-protocol depends on those two namespaces never mixing,
//! because the external redirect context only ever carries the latter.
//!
//! UUID-backed types are minted by this stack; string-backed types
//! (`UserId`, `MerchantId`, `CredentialId`, `PaymentMethodId`) are owned
//! by external identity registries and carried opaquely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a mandate (Intent, Cart, or Payment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MandateId(pub Uuid);

/// Unique identifier for an authorization session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

/// Unique identifier for a suspended step-up sub-session.
///
/// Deliberately distinct from [`SessionId`]: the external challenge
/// context carries only this handle, and `complete_step_up` reconciles
/// it against the originating session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepUpSessionId(pub Uuid);

/// Opaque shopper identifier from the external identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Opaque merchant identifier from the external identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MerchantId(pub String);

/// Identifier of a registered device credential (passkey).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub String);

/// Reference to a stored payment method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(pub String);

macro_rules! impl_uuid_id {
    ($ty:ident, $prefix:literal) => {
        impl $ty {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

impl_uuid_id!(MandateId, "mandate");
impl_uuid_id!(SessionId, "session");
impl_uuid_id!(StepUpSessionId, "stepup");

macro_rules! impl_string_id {
    ($ty:ident) => {
        impl $ty {
            /// Wrap an externally owned identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_string_id!(UserId);
impl_string_id!(MerchantId);
impl_string_id!(CredentialId);
impl_string_id!(PaymentMethodId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        assert_ne!(MandateId::new(), MandateId::new());
        assert_ne!(SessionId::new(), SessionId::new());
        assert_ne!(StepUpSessionId::new(), StepUpSessionId::new());
    }

    #[test]
    fn display_prefixes() {
        assert!(MandateId::new().to_string().starts_with("mandate:"));
        assert!(SessionId::new().to_string().starts_with("session:"));
        assert!(StepUpSessionId::new().to_string().starts_with("stepup:"));
    }

    #[test]
    fn string_ids_carry_external_values() {
        let m = MerchantId::new("merchant-tokyo-1");
        assert_eq!(m.as_str(), "merchant-tokyo-1");
        assert_eq!(m.to_string(), "merchant-tokyo-1");
    }

    #[test]
    fn serde_roundtrip() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
