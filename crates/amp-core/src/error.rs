//! # Error Types — Core Error Hierarchy
//!
//! Defines the error types shared across the mandate stack. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Protocol-level failures (non-reconciling totals, malformed contents)
//!   are always rejected, never auto-corrected or downgraded to warnings.
//! - Validation errors name the violating field and the expected vs actual
//!   values so the dialogue layer can phrase them for the user.

use thiserror::Error;

use crate::money::MoneyError;

/// Top-level error type for the mandate stack core.
#[derive(Error, Debug)]
pub enum AmpError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Mandate contents failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Money parsing or arithmetic failed.
    #[error("money error: {0}")]
    Money(#[from] MoneyError),

    /// Malformed timestamp or other schema-level defect.
    #[error("schema error: {0}")]
    Schema(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Amounts must be decimal strings or integers.
    #[error("float values are not permitted in canonical representations; use string or integer for amount: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Malformed or non-reconciling mandate contents.
///
/// Always rejected before any signature is accepted — a mandate with
/// contents that fail validation never enters the signing path.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Line item totals, tax, and shipping do not sum to the stated total.
    #[error("cart does not reconcile: {field} expected {expected}, got {actual}")]
    Reconciliation {
        /// The field whose recomputed value disagrees.
        field: &'static str,
        /// The recomputed value.
        expected: String,
        /// The value stated in the contents.
        actual: String,
    },

    /// A referenced amount exceeds the intent's spending ceiling.
    #[error("amount {amount} exceeds intent max_amount {max_amount}")]
    ExceedsMaxAmount {
        /// The offending amount.
        amount: String,
        /// The intent ceiling.
        max_amount: String,
    },

    /// The merchant is not in the intent's allow-list.
    #[error("merchant {merchant_id} is not permitted by the intent constraints")]
    MerchantNotAllowed {
        /// The rejected merchant.
        merchant_id: String,
    },

    /// A line item's category is not in the intent's allow-list.
    #[error("category {category:?} is not permitted by the intent constraints")]
    CategoryNotAllowed {
        /// The rejected category.
        category: String,
    },

    /// The referenced intent mandate has expired.
    #[error("intent expired at {expiry}")]
    IntentExpired {
        /// The expiry recorded in the intent constraints.
        expiry: String,
    },

    /// Currencies of amounts that must reconcile do not match.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// First currency.
        left: String,
        /// Second currency.
        right: String,
    },

    /// A required field is missing or structurally malformed.
    #[error("malformed contents: {0}")]
    Malformed(String),
}
