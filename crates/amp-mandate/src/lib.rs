//! # amp-mandate — The Mandate Chain
//!
//! A purchase authorization is a chain of three signed, hash-linked
//! documents:
//!
//! 1. **Intent** — the shopper's spending authority: a ceiling amount and
//!    optional merchant/category/expiry constraints. Signed by the payer.
//! 2. **Cart** — a priced basket from one merchant, referencing the Intent
//!    by digest. Signed by the merchant (prices and availability), then by
//!    the payer (acceptance of the priced cart).
//! 3. **Payment** — the charge instruction, referencing the Cart by digest.
//!    Signed by the payer via device attestation.
//!
//! The [`chain::MandateChain`] builds and validates these records. It
//! recomputes cart totals from the authoritative [`catalog::Catalog`] —
//! client-declared prices are never trusted — and refuses to let a role
//! sign out of order, twice, or on top of an unauthorized parent.
//!
//! Cryptographic verification of signatures lives in `amp-crypto` and is
//! driven by the session layer; this crate enforces the structural
//! invariants (role completeness, ordering, linkage, reconciliation).

pub mod catalog;
pub mod chain;
pub mod contents;
pub mod error;
pub mod model;
pub mod registry;

pub use catalog::{Catalog, CatalogError, InMemoryCatalog, PriceAndStock};
pub use chain::{CartSelection, MandateChain};
pub use contents::{
    CartContents, IntentConstraints, IntentContents, LineItem, PaymentContents, PaymentMethod,
};
pub use error::ChainError;
pub use model::{Mandate, MandateContents, MandateKind, Signature, SignatureProof, SignerRole};
pub use registry::{InMemoryKeyRegistry, KeyRegistry};
