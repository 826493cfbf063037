//! # amp-session — Authorization Sessions
//!
//! Drives one purchase from intent collection to settlement:
//!
//! - [`state`] — the session record and its transition matrix, with a
//!   per-session audit log of every accepted transition.
//! - [`store`] — sessions keyed by id, each behind its own mutex; one
//!   operation holds one session's lock for its whole duration.
//! - [`stepup`] — the suspension/resumption sub-protocol for out-of-band
//!   verification, joined across execution contexts by a durable handle.
//! - [`flow`] — the [`flow::AuthorizationFlow`] orchestrator the
//!   dialogue layer calls; it verifies signatures and attestations,
//!   builds mandates through the chain, and mints the settlement token
//!   once the payment mandate is authorized.

pub mod error;
pub mod flow;
pub mod state;
pub mod stepup;
pub mod store;

pub use error::{FlowError, StateTransitionError, StepUpError};
pub use flow::{AuthorizationFlow, ChallengeDescriptor, FlowConfig, SweepReport};
pub use state::{Session, SessionState, TransitionRecord};
pub use stepup::{StepUpContext, StepUpHandler, StepUpOutcome};
pub use store::{InMemorySessionStore, SessionStore};
