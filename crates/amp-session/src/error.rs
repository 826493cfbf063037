//! # Session-Layer Errors
//!
//! Every failure the flow can surface to the dialogue layer. Protocol
//! failures are typed and surfaced verbatim — a cryptographic failure is
//! never downgraded to a warning, and none of these are retried
//! automatically.

use thiserror::Error;

use amp_core::SessionId;
use amp_crypto::SignatureVerificationError;
use amp_mandate::{ChainError, SignerRole};
use amp_token::TokenError;

use crate::state::SessionState;

/// An attempted move the transition matrix forbids. The session is left
/// in its prior state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateTransitionError {
    /// The matrix has no edge from `from` to `to`.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// An operation requires a specific current state.
    #[error("operation requires state {expected}, session is in {actual}")]
    UnexpectedState {
        /// The state the operation needs.
        expected: SessionState,
        /// The state the session is in.
        actual: SessionState,
    },
}

/// Step-up sub-protocol failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepUpError {
    /// No suspended session is recorded under this handle.
    #[error("unknown step-up session: {0}")]
    UnknownStepUpSession(String),

    /// The completion's `original_session_id` does not match the session
    /// recorded at `begin_step_up` time.
    #[error("step-up session {step_up_session_id} was not begun by session {presented}")]
    SessionMismatch {
        /// The step-up handle.
        step_up_session_id: String,
        /// The session id the completion claimed.
        presented: String,
    },

    /// The suspension outlived its bounded interval.
    #[error("step-up session {0} timed out")]
    TimedOut(String),

    /// Step-up was requested for an instrument that does not demand it.
    #[error("payment method does not require step-up")]
    NotRequired,
}

/// Top-level error surfaced by the authorization flow.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The session id is unknown (never created, destroyed, or swept).
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// A required mandate has not been built yet.
    #[error("session has no {0} mandate yet")]
    MissingMandate(&'static str),

    /// The proof scheme does not match the signer role (payer signs by
    /// device attestation; merchant and network sign over digests).
    #[error("role {role} cannot sign with the presented proof scheme")]
    ProofSchemeMismatch {
        /// The offending role.
        role: SignerRole,
    },

    /// No key or credential is registered for the presented reference.
    #[error("no registered key material for {0}")]
    UnknownKeyMaterial(String),

    /// An Ed25519 `key_ref` must equal the identity the mandate binds
    /// (the cart's `merchant_id` for merchant signatures).
    #[error("key_ref {key_ref} does not match the mandate's bound identity {expected}")]
    KeyRefMismatch {
        /// The presented reference.
        key_ref: String,
        /// The identity the mandate requires.
        expected: String,
    },

    /// No mandate is awaiting a signature in the session's current state.
    #[error("no mandate is awaiting a signature in state {0}")]
    NoPendingSignature(SessionState),

    /// The presented token is bound to a different payment mandate.
    #[error("token subject {subject} does not match the session's payment mandate")]
    TokenSubjectMismatch {
        /// The subject recorded in the token.
        subject: String,
    },

    /// Transition matrix violation.
    #[error(transparent)]
    State(#[from] StateTransitionError),

    /// Mandate construction or structural signing failure.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Cryptographic verification failure (logged for audit upstream).
    #[error(transparent)]
    Signature(#[from] SignatureVerificationError),

    /// Step-up sub-protocol failure.
    #[error(transparent)]
    StepUp(#[from] StepUpError),

    /// Token issuance or redemption failure.
    #[error(transparent)]
    Token(#[from] TokenError),
}
