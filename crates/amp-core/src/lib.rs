//! # amp-core — Foundational Types for the Agent Mandate Protocol
//!
//! This crate is the bedrock of the mandate authorization chain. It defines
//! the type-system primitives that make tampering structurally detectable:
//! every digest in the system is computed over bytes produced by a single
//! canonicalization pipeline, every amount is an exact decimal, and every
//! timestamp is UTC with seconds precision.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `MandateId`, `SessionId`,
//!    `StepUpSessionId`, `CredentialId`, `UserId`, `MerchantId` — all
//!    newtypes. No bare strings for identifiers.
//!
//! 2. **`CanonicalBytes` newtype.** ALL digest computation flows through
//!    `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for digests.
//!    Two logically equal mandate contents hash identically regardless of
//!    field insertion order or source encoding.
//!
//! 3. **Exact decimal money.** `Amount` carries a decimal string and an
//!    ISO-4217 currency; arithmetic happens in integer minor units and
//!    reconciliation is exact-match. Floats never enter the pipeline.
//!
//! 4. **UTC-only timestamps.** The `Timestamp` type enforces UTC with Z
//!    suffix and seconds precision, matching the canonicalization rules.
//!
//! 5. **`sha256_digest()` accepts only `&CanonicalBytes`.** Compile-time
//!    enforcement that all digest paths flow through canonicalization.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `amp-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, and implement
//!   `Serialize`/`Deserialize`.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod money;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, MandateDigest};
pub use error::{AmpError, CanonicalizationError, ValidationError};
pub use identity::{
    CredentialId, MandateId, MerchantId, PaymentMethodId, SessionId, StepUpSessionId, UserId,
};
pub use money::{Amount, CurrencyCode, MoneyError};
pub use temporal::Timestamp;
