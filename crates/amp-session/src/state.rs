//! # Authorization State Machine
//!
//! The session lifecycle from intent collection to settlement. States
//! serialize as SCREAMING_SNAKE_CASE; the transition matrix is the single
//! source of truth for which moves are legal, and every accepted move is
//! appended to the session's transition log with a timestamp and reason.
//!
//! A rejected transition mutates nothing: callers verify whatever the
//! move depends on (signatures, reconciliation) *before* asking the
//! session to advance, and [`Session::transition`] itself only mutates
//! after the matrix check passes.

use serde::{Deserialize, Serialize};
use tracing::info;

use amp_core::{MandateId, SessionId, Timestamp, UserId};
use amp_mandate::PaymentMethod;

use crate::error::StateTransitionError;
use crate::stepup::StepUpContext;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Gathering the shopper's spending intent.
    CollectingIntent,
    /// Intent mandate fully authorized by the payer.
    IntentSigned,
    /// Cart built and priced, awaiting merchant signature.
    CartProposed,
    /// Merchant has signed the priced cart.
    CartMerchantSigned,
    /// Payer has accepted the priced cart.
    CartUserSigned,
    /// A payment instrument has been selected and the payment mandate built.
    PaymentMethodSelected,
    /// Waiting for the payer's device attestation.
    AwaitingUserAuth,
    /// Suspended pending an out-of-band step-up challenge.
    StepUpSuspended,
    /// Payment mandate fully authorized; token issued.
    PaymentAuthorized,
    /// Settlement completed. Terminal.
    Settled,
    /// Protocol failure or step-up timeout/cancellation. Terminal.
    Failed,
    /// Explicit user cancellation. Terminal.
    Cancelled,
}

impl SessionState {
    /// Whether the session can never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed | Self::Cancelled)
    }

    /// Forward transitions legal from this state, excluding the
    /// universal `Failed`/`Cancelled` exits.
    pub fn forward_transitions(&self) -> &'static [SessionState] {
        match self {
            Self::CollectingIntent => &[Self::IntentSigned],
            Self::IntentSigned => &[Self::CartProposed],
            Self::CartProposed => &[Self::CartMerchantSigned],
            Self::CartMerchantSigned => &[Self::CartUserSigned],
            Self::CartUserSigned => &[Self::PaymentMethodSelected],
            Self::PaymentMethodSelected => &[Self::AwaitingUserAuth],
            Self::AwaitingUserAuth => &[Self::StepUpSuspended, Self::PaymentAuthorized],
            Self::StepUpSuspended => &[Self::AwaitingUserAuth],
            Self::PaymentAuthorized => &[Self::Settled],
            Self::Settled | Self::Failed | Self::Cancelled => &[],
        }
    }

    /// Whether moving to `to` is legal from this state.
    ///
    /// `Failed` and `Cancelled` are reachable from every non-terminal
    /// state; everything else follows [`Self::forward_transitions`].
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(to, Self::Failed | Self::Cancelled) {
            return true;
        }
        self.forward_transitions().contains(&to)
    }

    /// Canonical SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectingIntent => "COLLECTING_INTENT",
            Self::IntentSigned => "INTENT_SIGNED",
            Self::CartProposed => "CART_PROPOSED",
            Self::CartMerchantSigned => "CART_MERCHANT_SIGNED",
            Self::CartUserSigned => "CART_USER_SIGNED",
            Self::PaymentMethodSelected => "PAYMENT_METHOD_SELECTED",
            Self::AwaitingUserAuth => "AWAITING_USER_AUTH",
            Self::StepUpSuspended => "STEP_UP_SUSPENDED",
            Self::PaymentAuthorized => "PAYMENT_AUTHORIZED",
            Self::Settled => "SETTLED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted state transition, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before.
    pub from: SessionState,
    /// State after.
    pub to: SessionState,
    /// When the transition was accepted.
    pub at: Timestamp,
    /// Why it happened (e.g., "payer signature attached").
    pub reason: String,
}

/// One shopper's authorization session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub session_id: SessionId,
    /// The shopper driving the session.
    pub user_id: UserId,
    /// Current lifecycle state.
    pub state: SessionState,
    /// The Intent mandate, once built.
    pub intent: Option<MandateId>,
    /// The Cart mandate, once built.
    pub cart: Option<MandateId>,
    /// The Payment mandate, once built.
    pub payment: Option<MandateId>,
    /// The selected payment instrument.
    pub payment_method: Option<PaymentMethod>,
    /// Step-up context; kept after resumption so duplicate completion
    /// signals can be recognized as no-ops.
    pub step_up: Option<StepUpContext>,
    /// Value of the issued authorization token, if any.
    pub token_value: Option<String>,
    /// Audit trail of every accepted transition.
    pub transitions: Vec<TransitionRecord>,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Last mutation instant; drives the idle sweep.
    pub updated_at: Timestamp,
}

impl Session {
    /// Fresh session in `COLLECTING_INTENT`.
    pub fn new(user_id: UserId) -> Self {
        let now = Timestamp::now();
        Self {
            session_id: SessionId::new(),
            user_id,
            state: SessionState::CollectingIntent,
            intent: None,
            cart: None,
            payment: None,
            payment_method: None,
            step_up: None,
            token_value: None,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance to `to`, recording the transition.
    ///
    /// # Errors
    ///
    /// `StateTransitionError::InvalidTransition` when the matrix forbids
    /// the move; the session is left untouched.
    pub fn transition(
        &mut self,
        to: SessionState,
        reason: impl Into<String>,
    ) -> Result<(), StateTransitionError> {
        if !self.state.can_transition_to(to) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        let reason = reason.into();
        let record = TransitionRecord {
            from: self.state,
            to,
            at: Timestamp::now(),
            reason: reason.clone(),
        };
        info!(
            session = %self.session_id,
            from = %record.from,
            to = %record.to,
            reason = %reason,
            "session transition"
        );
        self.state = to;
        self.updated_at = record.at;
        self.transitions.push(record);
        Ok(())
    }

    /// Error unless the session is currently in `expected`.
    pub fn require_state(&self, expected: SessionState) -> Result<(), StateTransitionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(StateTransitionError::UnexpectedState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Touch `updated_at` without a state change (non-transition mutation).
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    /// Seconds since the last mutation.
    pub fn idle_secs(&self, now: &Timestamp) -> i64 {
        now.secs_since(&self.updated_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(UserId::new("user-1"))
    }

    #[test]
    fn happy_path_is_legal() {
        let mut s = session();
        let path = [
            SessionState::IntentSigned,
            SessionState::CartProposed,
            SessionState::CartMerchantSigned,
            SessionState::CartUserSigned,
            SessionState::PaymentMethodSelected,
            SessionState::AwaitingUserAuth,
            SessionState::PaymentAuthorized,
            SessionState::Settled,
        ];
        for to in path {
            s.transition(to, "test").unwrap();
        }
        assert_eq!(s.state, SessionState::Settled);
        assert_eq!(s.transitions.len(), 8);
        assert_eq!(s.transitions[0].from, SessionState::CollectingIntent);
    }

    #[test]
    fn step_up_loop() {
        let mut s = session();
        for to in [
            SessionState::IntentSigned,
            SessionState::CartProposed,
            SessionState::CartMerchantSigned,
            SessionState::CartUserSigned,
            SessionState::PaymentMethodSelected,
            SessionState::AwaitingUserAuth,
            SessionState::StepUpSuspended,
            SessionState::AwaitingUserAuth,
            SessionState::PaymentAuthorized,
        ] {
            s.transition(to, "test").unwrap();
        }
    }

    #[test]
    fn skipping_states_is_rejected_without_mutation() {
        let mut s = session();
        let err = s
            .transition(SessionState::PaymentAuthorized, "skip")
            .unwrap_err();
        assert!(matches!(err, StateTransitionError::InvalidTransition { .. }));
        assert_eq!(s.state, SessionState::CollectingIntent);
        assert!(s.transitions.is_empty());
    }

    #[test]
    fn failed_and_cancelled_reachable_from_any_non_terminal() {
        let mut s = session();
        s.transition(SessionState::Cancelled, "user abort").unwrap();
        assert!(s.state.is_terminal());

        let mut s = session();
        s.transition(SessionState::IntentSigned, "t").unwrap();
        s.transition(SessionState::Failed, "t").unwrap();
        assert_eq!(s.state, SessionState::Failed);
    }

    #[test]
    fn terminal_states_admit_nothing() {
        let mut s = session();
        s.transition(SessionState::Failed, "t").unwrap();
        assert!(s.transition(SessionState::Cancelled, "t").is_err());
        assert!(s.transition(SessionState::CollectingIntent, "t").is_err());
    }

    #[test]
    fn from_step_up_only_resume_or_fail() {
        assert!(SessionState::StepUpSuspended.can_transition_to(SessionState::AwaitingUserAuth));
        assert!(SessionState::StepUpSuspended.can_transition_to(SessionState::Failed));
        assert!(SessionState::StepUpSuspended.can_transition_to(SessionState::Cancelled));
        assert!(!SessionState::StepUpSuspended.can_transition_to(SessionState::PaymentAuthorized));
        assert!(!SessionState::StepUpSuspended.can_transition_to(SessionState::Settled));
    }

    #[test]
    fn serde_names_are_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&SessionState::AwaitingUserAuth).unwrap(),
            "\"AWAITING_USER_AUTH\""
        );
        assert_eq!(
            serde_json::to_string(&SessionState::StepUpSuspended).unwrap(),
            "\"STEP_UP_SUSPENDED\""
        );
        assert_eq!(SessionState::CartMerchantSigned.to_string(), "CART_MERCHANT_SIGNED");
    }

    #[test]
    fn require_state() {
        let s = session();
        s.require_state(SessionState::CollectingIntent).unwrap();
        assert!(matches!(
            s.require_state(SessionState::Settled),
            Err(StateTransitionError::UnexpectedState { .. })
        ));
    }
}
