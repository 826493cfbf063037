//! # Step-Up Sub-Protocol
//!
//! The one mandatory asynchronous boundary: a suspension that returns
//! immediately with a challenge reference, and a completion that arrives
//! later, possibly from an entirely different execution context. The two
//! halves are joined by a durable [`StepUpSessionId`] — deliberately not
//! the session id, because the external redirect target only carries the
//! step-up handle plus the original session id as a tamper-resistant
//! return parameter.
//!
//! Resolution is single-winner: the pending entry is consumed atomically
//! under the handler's lock, so of two concurrent completions exactly one
//! resolves and the other observes the already-advanced session. The flow
//! layer turns that observation into an idempotent no-op.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use amp_core::{SessionId, StepUpSessionId, Timestamp};

use crate::error::StepUpError;

/// Reported result of the external challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepUpOutcome {
    /// The user passed the external verification.
    Success,
    /// The user abandoned or failed it.
    Cancelled,
}

/// The suspension handle returned to the dialogue layer and recorded on
/// the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepUpContext {
    /// Durable handle joining suspension and completion.
    pub step_up_session_id: StepUpSessionId,
    /// Where the external challenge is performed.
    pub challenge_url: String,
    /// The suspension transitions to failure past this instant.
    pub deadline: Timestamp,
}

#[derive(Debug, Clone)]
struct PendingStepUp {
    original_session_id: SessionId,
    deadline: Timestamp,
}

/// Records suspended sessions and reconciles completions against them.
#[derive(Debug)]
pub struct StepUpHandler {
    challenge_base_url: String,
    ttl_secs: i64,
    pending: Mutex<HashMap<StepUpSessionId, PendingStepUp>>,
}

impl StepUpHandler {
    /// Handler issuing challenges under `challenge_base_url`, expiring
    /// suspensions after `ttl_secs`.
    pub fn new(challenge_base_url: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            challenge_base_url: challenge_base_url.into(),
            ttl_secs,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Record a suspension for `session_id` and mint its handle.
    pub fn begin(&self, session_id: &SessionId) -> StepUpContext {
        let step_up_session_id = StepUpSessionId::new();
        let deadline = Timestamp::now().plus_secs(self.ttl_secs);
        let context = StepUpContext {
            step_up_session_id: step_up_session_id.clone(),
            challenge_url: format!(
                "{}/{}",
                self.challenge_base_url.trim_end_matches('/'),
                step_up_session_id.as_uuid()
            ),
            deadline,
        };
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).insert(
            step_up_session_id.clone(),
            PendingStepUp {
                original_session_id: session_id.clone(),
                deadline,
            },
        );
        info!(session = %session_id, step_up = %step_up_session_id, "step-up begun");
        context
    }

    /// Resolve a completion, consuming the pending entry.
    ///
    /// Validates that `presented_session_id` is the session recorded at
    /// begin time and that the deadline has not passed. Exactly one
    /// caller can resolve a given handle; later callers get
    /// `UnknownStepUpSession` and must check the session itself for the
    /// idempotent outcome.
    pub fn resolve(
        &self,
        step_up_session_id: &StepUpSessionId,
        presented_session_id: &SessionId,
    ) -> Result<SessionId, StepUpError> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let entry = pending.get(step_up_session_id).ok_or_else(|| {
            StepUpError::UnknownStepUpSession(step_up_session_id.to_string())
        })?;
        if entry.original_session_id != *presented_session_id {
            // A wrong pairing never consumes the suspension.
            warn!(
                step_up = %step_up_session_id,
                presented = %presented_session_id,
                "step-up completion with mismatched session id"
            );
            return Err(StepUpError::SessionMismatch {
                step_up_session_id: step_up_session_id.to_string(),
                presented: presented_session_id.to_string(),
            });
        }
        if Timestamp::now() > entry.deadline {
            pending.remove(step_up_session_id);
            return Err(StepUpError::TimedOut(step_up_session_id.to_string()));
        }
        let entry = pending
            .remove(step_up_session_id)
            .ok_or_else(|| StepUpError::UnknownStepUpSession(step_up_session_id.to_string()))?;
        Ok(entry.original_session_id)
    }

    /// Remove a pending suspension without resolving it (cancellation).
    pub fn abandon(&self, step_up_session_id: &StepUpSessionId) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(step_up_session_id);
    }

    /// Drain every suspension past its deadline, returning the sessions
    /// to be failed.
    pub fn drain_expired(&self) -> Vec<(StepUpSessionId, SessionId)> {
        let now = Timestamp::now();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let expired: Vec<StepUpSessionId> = pending
            .iter()
            .filter(|(_, p)| now > p.deadline)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|p| (id, p.original_session_id)))
            .collect()
    }

    /// Number of outstanding suspensions.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_then_resolve() {
        let handler = StepUpHandler::new("https://stepup.example/challenge", 300);
        let session = SessionId::new();
        let context = handler.begin(&session);
        assert!(context
            .challenge_url
            .starts_with("https://stepup.example/challenge/"));
        let resolved = handler
            .resolve(&context.step_up_session_id, &session)
            .unwrap();
        assert_eq!(resolved, session);
        assert_eq!(handler.outstanding(), 0);
    }

    #[test]
    fn second_resolution_sees_unknown() {
        let handler = StepUpHandler::new("https://stepup.example", 300);
        let session = SessionId::new();
        let context = handler.begin(&session);
        handler.resolve(&context.step_up_session_id, &session).unwrap();
        let err = handler
            .resolve(&context.step_up_session_id, &session)
            .unwrap_err();
        assert!(matches!(err, StepUpError::UnknownStepUpSession(_)));
    }

    #[test]
    fn mismatched_session_rejected_without_consuming() {
        let handler = StepUpHandler::new("https://stepup.example", 300);
        let session = SessionId::new();
        let context = handler.begin(&session);
        let err = handler
            .resolve(&context.step_up_session_id, &SessionId::new())
            .unwrap_err();
        assert!(matches!(err, StepUpError::SessionMismatch { .. }));
        // The legitimate completion still works.
        handler.resolve(&context.step_up_session_id, &session).unwrap();
    }

    #[test]
    fn expired_suspension_times_out() {
        let handler = StepUpHandler::new("https://stepup.example", -1);
        let session = SessionId::new();
        let context = handler.begin(&session);
        let err = handler
            .resolve(&context.step_up_session_id, &session)
            .unwrap_err();
        assert!(matches!(err, StepUpError::TimedOut(_)));
    }

    #[test]
    fn drain_expired_returns_sessions_to_fail() {
        let handler = StepUpHandler::new("https://stepup.example", -1);
        let a = SessionId::new();
        let b = SessionId::new();
        handler.begin(&a);
        handler.begin(&b);
        let mut drained: Vec<SessionId> = handler
            .drain_expired()
            .into_iter()
            .map(|(_, session)| session)
            .collect();
        drained.sort_by_key(|s| s.to_string());
        let mut expected = vec![a, b];
        expected.sort_by_key(|s| s.to_string());
        assert_eq!(drained, expected);
        assert_eq!(handler.outstanding(), 0);
    }

    #[test]
    fn fresh_suspensions_are_not_drained() {
        let handler = StepUpHandler::new("https://stepup.example", 300);
        handler.begin(&SessionId::new());
        assert!(handler.drain_expired().is_empty());
        assert_eq!(handler.outstanding(), 1);
    }

    #[test]
    fn abandon_removes_pending() {
        let handler = StepUpHandler::new("https://stepup.example", 300);
        let session = SessionId::new();
        let context = handler.begin(&session);
        handler.abandon(&context.step_up_session_id);
        assert!(handler
            .resolve(&context.step_up_session_id, &session)
            .is_err());
    }
}
