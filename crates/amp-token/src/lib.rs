//! # amp-token — Authorization Tokens
//!
//! Short-lived bearer tokens that attest "this authorization event
//! occurred". A token is minted only after a payment mandate reaches
//! `PAYMENT_AUTHORIZED` (the session layer enforces the precondition and
//! surfaces [`TokenError::NotAuthorized`] otherwise) and is consumed by
//! the downstream settlement call.
//!
//! Token values come from the OS CSPRNG — never a counter or a weak
//! PRNG. Each token binds its subject mandate, the exact authorized
//! amount, and an expiry of at most one hour.
//!
//! Two redemption policies exist; the default is expiry-based reuse,
//! with [`TokenPolicy::SingleUse`] available where the settlement
//! contract demands it.

pub mod error;
pub mod issuer;
pub mod store;

pub use error::TokenError;
pub use issuer::{AuthorizationToken, TokenConfig, TokenIssuer, TokenPolicy, TokenStatus};
pub use store::{InMemoryTokenStore, TokenStore};
