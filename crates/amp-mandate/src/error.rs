//! # Chain Builder Errors
//!
//! Structural failures of the mandate chain. These are protocol-level
//! rejections: none of them is retried automatically, and a failed
//! operation never partially mutates a mandate.

use thiserror::Error;

use amp_core::{CanonicalizationError, MoneyError, ValidationError};

use crate::catalog::CatalogError;
use crate::model::{MandateKind, SignerRole};

/// Error constructing or signing a mandate.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The referenced mandate does not exist in the store.
    #[error("unknown mandate: {0}")]
    UnknownMandate(String),

    /// The signer role is not expected for this mandate type, or is
    /// signing out of order (a payer cannot accept a cart the merchant
    /// has not priced yet).
    #[error("invalid signer role {role} for {kind} mandate")]
    InvalidSignerRole {
        /// The rejected role.
        role: SignerRole,
        /// The mandate type being signed.
        kind: MandateKind,
    },

    /// The role has already signed this mandate; signatures append, they
    /// never replace.
    #[error("role {role} has already signed mandate {mandate_id}")]
    AlreadySigned {
        /// The duplicate role.
        role: SignerRole,
        /// The mandate in question.
        mandate_id: String,
    },

    /// A parent-hash reference points at a mandate that is not yet fully
    /// authorized.
    #[error("prior link incomplete: referenced mandate {reference} is not fully authorized")]
    PriorLinkIncomplete {
        /// The dangling or unauthorized reference.
        reference: String,
    },

    /// Catalog lookup failed while pricing a cart.
    #[error("cart build failed: {0}")]
    CartBuild(#[from] CatalogError),

    /// Mandate contents failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Canonicalization failed while computing a digest.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// Money arithmetic failed while recomputing totals.
    #[error(transparent)]
    Money(#[from] MoneyError),
}
