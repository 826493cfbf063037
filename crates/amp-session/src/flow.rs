//! # Authorization Flow
//!
//! The orchestrator the dialogue layer talks to. Every operation locks
//! the target session for its whole duration (per-session serialization),
//! verifies whatever the move depends on — signatures through
//! `amp-crypto`, structure through the mandate chain — and only then asks
//! the session to advance. A failed verification therefore never moves a
//! session.
//!
//! Proof schemes are bound to roles: the payer signs by device
//! attestation against a one-time challenge; merchant and network sign
//! Ed25519 over the mandate digest, resolved through the key registry.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use amp_core::{Amount, MandateId, SessionId, StepUpSessionId, Timestamp, UserId};
use amp_crypto::{
    verify_device_attestation, verify_digest, ChallengeRegistry, DeviceAssertion,
};
use amp_mandate::{
    CartSelection, Catalog, ChainError, IntentConstraints, KeyRegistry, Mandate, MandateChain,
    PaymentMethod, Signature, SignatureProof, SignerRole,
};
use amp_token::{AuthorizationToken, TokenConfig, TokenError, TokenIssuer, TokenStatus, TokenStore};

use crate::error::FlowError;
use crate::state::{Session, SessionState};
use crate::stepup::{StepUpContext, StepUpHandler, StepUpOutcome};
use crate::store::SessionStore;

/// Flow timeouts and relying-party identity.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Relying party identifier sent with attestation challenges.
    pub relying_party_id: String,
    /// Origin every assertion must be bound to.
    pub expected_origin: String,
    /// Base URL step-up challenge URLs are minted under.
    pub step_up_base_url: String,
    /// Attestation challenge validity window.
    pub challenge_ttl_secs: i64,
    /// Suspended-session lifetime before automatic failure.
    pub step_up_ttl_secs: i64,
    /// Idle lifetime before a session is swept.
    pub session_idle_ttl_secs: i64,
    /// Token issuer configuration.
    pub token: TokenConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            relying_party_id: "pay.example".to_string(),
            expected_origin: "https://pay.example".to_string(),
            step_up_base_url: "https://stepup.example/challenge".to_string(),
            challenge_ttl_secs: amp_crypto::CHALLENGE_TTL_SECS,
            step_up_ttl_secs: 300,
            session_idle_ttl_secs: 1800,
            token: TokenConfig::default(),
        }
    }
}

/// What the dialogue layer needs to drive a device attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeDescriptor {
    /// The one-time challenge to echo in the signed client data.
    pub challenge: String,
    /// Relying party the credential is scoped to.
    pub relying_party_id: String,
    /// Seconds before the challenge goes stale.
    pub timeout_secs: i64,
}

/// Counts from one [`AuthorizationFlow::sweep`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale attestation challenges dropped.
    pub expired_challenges: usize,
    /// Suspended sessions moved to `FAILED` on timeout.
    pub failed_step_ups: usize,
    /// Terminal or idle sessions removed from the store.
    pub removed_sessions: usize,
    /// Expired tokens dropped.
    pub expired_tokens: usize,
}

/// The authorization flow orchestrator.
pub struct AuthorizationFlow {
    config: FlowConfig,
    chain: MandateChain,
    challenges: ChallengeRegistry,
    step_up: StepUpHandler,
    sessions: Arc<dyn SessionStore>,
    catalog: Arc<dyn Catalog>,
    keys: Arc<dyn KeyRegistry>,
    tokens: TokenIssuer,
}

impl AuthorizationFlow {
    /// Wire the flow over its collaborators.
    pub fn new(
        config: FlowConfig,
        sessions: Arc<dyn SessionStore>,
        catalog: Arc<dyn Catalog>,
        keys: Arc<dyn KeyRegistry>,
        token_store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            chain: MandateChain::new(),
            challenges: ChallengeRegistry::with_ttl(config.challenge_ttl_secs),
            step_up: StepUpHandler::new(&config.step_up_base_url, config.step_up_ttl_secs),
            tokens: TokenIssuer::new(config.token.clone(), token_store),
            sessions,
            catalog,
            keys,
            config,
        }
    }

    /// Start a session for a shopper.
    pub fn create_session(&self, user_id: UserId) -> SessionId {
        let session = Session::new(user_id);
        let session_id = session.session_id.clone();
        info!(session = %session_id, "session created");
        self.sessions.insert(session);
        session_id
    }

    /// Snapshot of a session.
    pub fn session(&self, session_id: &SessionId) -> Result<Session, FlowError> {
        let handle = self.locked(session_id)?;
        let session = handle.lock().unwrap_or_else(|e| e.into_inner());
        Ok(session.clone())
    }

    /// Fetch a mandate from the chain store.
    pub fn mandate(&self, mandate_id: &MandateId) -> Option<Mandate> {
        self.chain.get(mandate_id)
    }

    /// Build the Intent mandate for a session.
    ///
    /// Legal only in `COLLECTING_INTENT`; the state advances when the
    /// payer's signature lands, not here.
    pub fn submit_intent(
        &self,
        session_id: &SessionId,
        max_amount: Amount,
        constraints: IntentConstraints,
    ) -> Result<Mandate, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.require_state(SessionState::CollectingIntent)?;
        let intent = self
            .chain
            .build_intent(session.user_id.clone(), max_amount, constraints)?;
        session.intent = Some(intent.id.clone());
        session.touch();
        Ok(intent)
    }

    /// Issue a one-time challenge for the mandate currently awaiting the
    /// payer, returning the descriptor the authenticator needs.
    ///
    /// From `PAYMENT_METHOD_SELECTED` this also advances the session to
    /// `AWAITING_USER_AUTH`. Re-requesting in `AWAITING_USER_AUTH`
    /// replaces the outstanding challenge (e.g., after a step-up detour
    /// outlived the first one).
    pub fn request_user_auth(
        &self,
        session_id: &SessionId,
    ) -> Result<ChallengeDescriptor, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        let mandate_id = match session.state {
            SessionState::CollectingIntent => {
                session.intent.clone().ok_or(FlowError::MissingMandate("intent"))?
            }
            SessionState::CartMerchantSigned => {
                session.cart.clone().ok_or(FlowError::MissingMandate("cart"))?
            }
            SessionState::PaymentMethodSelected => {
                let payment = session
                    .payment
                    .clone()
                    .ok_or(FlowError::MissingMandate("payment"))?;
                session.transition(SessionState::AwaitingUserAuth, "awaiting device attestation")?;
                payment
            }
            SessionState::AwaitingUserAuth => {
                session.payment.clone().ok_or(FlowError::MissingMandate("payment"))?
            }
            other => return Err(FlowError::NoPendingSignature(other)),
        };
        let challenge = self.challenges.issue(&mandate_id);
        session.touch();
        Ok(ChallengeDescriptor {
            challenge: challenge.value,
            relying_party_id: self.config.relying_party_id.clone(),
            timeout_secs: self.config.challenge_ttl_secs,
        })
    }

    /// Verify and attach a signature to the mandate the session is
    /// waiting on, advancing the state on success.
    pub fn submit_signature(
        &self,
        session_id: &SessionId,
        role: SignerRole,
        proof: SignatureProof,
    ) -> Result<Session, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        let (mandate_id, next, reason) = match session.state {
            SessionState::CollectingIntent => (
                session.intent.clone().ok_or(FlowError::MissingMandate("intent"))?,
                SessionState::IntentSigned,
                "payer signed intent",
            ),
            SessionState::CartProposed => (
                session.cart.clone().ok_or(FlowError::MissingMandate("cart"))?,
                SessionState::CartMerchantSigned,
                "merchant signed cart",
            ),
            SessionState::CartMerchantSigned => (
                session.cart.clone().ok_or(FlowError::MissingMandate("cart"))?,
                SessionState::CartUserSigned,
                "payer accepted priced cart",
            ),
            other => return Err(FlowError::NoPendingSignature(other)),
        };
        self.verify_proof(&mandate_id, role, &proof)?;
        self.chain.attach_signature(
            &mandate_id,
            Signature {
                role,
                proof,
                signed_at: Timestamp::now(),
            },
        )?;
        session.transition(next, reason)?;
        Ok(session.clone())
    }

    /// Build the priced Cart mandate from the shopper's selections.
    ///
    /// Prices come from the catalog; the intent's ceiling, allow-lists,
    /// and expiry are enforced during the build.
    pub fn submit_cart_selection(
        &self,
        session_id: &SessionId,
        merchant_id: amp_core::MerchantId,
        selections: &[CartSelection],
        tax: Amount,
        shipping: Amount,
        shipping_address: Option<String>,
    ) -> Result<Mandate, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.require_state(SessionState::IntentSigned)?;
        let intent_id = session.intent.clone().ok_or(FlowError::MissingMandate("intent"))?;
        let cart = self.chain.build_cart(
            self.catalog.as_ref(),
            merchant_id,
            selections,
            tax,
            shipping,
            shipping_address,
            Some(&intent_id),
        )?;
        session.cart = Some(cart.id.clone());
        session.transition(SessionState::CartProposed, "cart built and priced")?;
        Ok(cart)
    }

    /// Select the payment instrument and build the Payment mandate over
    /// the fully authorized cart.
    pub fn select_payment_method(
        &self,
        session_id: &SessionId,
        method: PaymentMethod,
    ) -> Result<Mandate, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.require_state(SessionState::CartUserSigned)?;
        let cart_id = session.cart.clone().ok_or(FlowError::MissingMandate("cart"))?;
        let payment =
            self.chain
                .build_payment(&cart_id, method.clone(), session.user_id.clone(), None)?;
        session.payment = Some(payment.id.clone());
        session.payment_method = Some(method);
        session.transition(
            SessionState::PaymentMethodSelected,
            "payment method selected",
        )?;
        Ok(payment)
    }

    /// Suspend the session for an out-of-band step-up challenge.
    ///
    /// Legal only from `AWAITING_USER_AUTH` and only when the selected
    /// instrument is flagged `requires_step_up`.
    pub fn begin_step_up(&self, session_id: &SessionId) -> Result<StepUpContext, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.require_state(SessionState::AwaitingUserAuth)?;
        let requires = session
            .payment_method
            .as_ref()
            .is_some_and(|m| m.requires_step_up);
        if !requires {
            return Err(crate::error::StepUpError::NotRequired.into());
        }
        let context = self.step_up.begin(session_id);
        session.step_up = Some(context.clone());
        session.transition(
            SessionState::StepUpSuspended,
            "step-up required by payment method",
        )?;
        Ok(context)
    }

    /// Deliver the external step-up outcome.
    ///
    /// Single-winner and idempotent: the first delivery advances the
    /// session (back to `AWAITING_USER_AUTH` on success, to `FAILED` on
    /// cancellation); re-delivering against an already-advanced session
    /// returns the current state without side effects.
    pub fn submit_step_up_outcome(
        &self,
        step_up_session_id: &StepUpSessionId,
        outcome: StepUpOutcome,
        original_session_id: &SessionId,
    ) -> Result<SessionState, FlowError> {
        let handle = self.locked(original_session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());

        if session.state != SessionState::StepUpSuspended {
            // Duplicate delivery after the winner already advanced the
            // session is a no-op, provided the handle matches.
            let known = session
                .step_up
                .as_ref()
                .is_some_and(|c| c.step_up_session_id == *step_up_session_id);
            if known {
                info!(
                    session = %original_session_id,
                    step_up = %step_up_session_id,
                    state = %session.state,
                    "duplicate step-up completion ignored"
                );
                return Ok(session.state);
            }
            return Err(
                crate::error::StepUpError::UnknownStepUpSession(step_up_session_id.to_string())
                    .into(),
            );
        }

        match self.step_up.resolve(step_up_session_id, original_session_id) {
            Ok(_) => {}
            Err(crate::error::StepUpError::TimedOut(id)) => {
                session.transition(SessionState::Failed, "step-up timed out")?;
                return Err(crate::error::StepUpError::TimedOut(id).into());
            }
            Err(err) => return Err(err.into()),
        }

        match outcome {
            StepUpOutcome::Success => {
                session.transition(SessionState::AwaitingUserAuth, "step-up completed")?;
            }
            StepUpOutcome::Cancelled => {
                session.transition(SessionState::Failed, "step-up cancelled")?;
            }
        }
        Ok(session.state)
    }

    /// Verify the payer's device attestation over the Payment mandate,
    /// authorize it, and mint the settlement token.
    pub fn submit_attestation(
        &self,
        session_id: &SessionId,
        assertion: &DeviceAssertion,
    ) -> Result<AuthorizationToken, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        session.require_state(SessionState::AwaitingUserAuth)?;
        let payment_id = session.payment.clone().ok_or(FlowError::MissingMandate("payment"))?;

        self.verify_payer_assertion(&payment_id, assertion)?;
        let payment = self.chain.attach_signature(
            &payment_id,
            Signature {
                role: SignerRole::Payer,
                proof: SignatureProof::DeviceAttestation {
                    assertion: assertion.clone(),
                },
                signed_at: Timestamp::now(),
            },
        )?;
        session.transition(
            SessionState::PaymentAuthorized,
            "device attestation verified",
        )?;

        let contents = payment
            .as_payment()
            .ok_or(FlowError::MissingMandate("payment"))?;
        let token = self.tokens.issue(payment_id, contents.amount.clone());
        session.token_value = Some(token.value.clone());
        Ok(token)
    }

    /// Redeem the token and settle the session.
    pub fn settle(&self, session_id: &SessionId, token_value: &str) -> Result<Session, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        if session.state != SessionState::PaymentAuthorized {
            return Err(TokenError::NotAuthorized.into());
        }
        let token = self.tokens.redeem(token_value)?;
        if session.payment.as_ref() != Some(&token.subject) {
            return Err(FlowError::TokenSubjectMismatch {
                subject: token.subject.to_string(),
            });
        }
        session.transition(SessionState::Settled, "settlement completed")?;
        Ok(session.clone())
    }

    /// Cancel a session. Always accepted while the session is
    /// non-terminal, including while suspended for step-up.
    pub fn cancel(&self, session_id: &SessionId, reason: &str) -> Result<SessionState, FlowError> {
        let handle = self.locked(session_id)?;
        let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(context) = &session.step_up {
            self.step_up.abandon(&context.step_up_session_id);
        }
        session.transition(SessionState::Cancelled, format!("cancelled: {reason}"))?;
        Ok(session.state)
    }

    /// Read-only token check (settlement stubs, audits).
    pub fn verify_token(&self, value: &str) -> TokenStatus {
        self.tokens.verify(value)
    }

    /// Run every expiry sweep once: stale challenges, timed-out step-up
    /// suspensions (their sessions fail), idle/terminal sessions, and
    /// expired tokens.
    pub fn sweep(&self) -> SweepReport {
        let expired_challenges = self.challenges.sweep_expired();

        let mut failed_step_ups = 0;
        for (step_up_id, session_id) in self.step_up.drain_expired() {
            if let Some(handle) = self.sessions.session(&session_id) {
                let mut session = handle.lock().unwrap_or_else(|e| e.into_inner());
                if session.state == SessionState::StepUpSuspended
                    && session.transition(SessionState::Failed, "step-up timed out").is_ok()
                {
                    warn!(session = %session_id, step_up = %step_up_id, "step-up timed out");
                    failed_step_ups += 1;
                }
            }
        }

        let now = Timestamp::now();
        let removed_sessions = self.sessions.sweep(&now, self.config.session_idle_ttl_secs);
        let expired_tokens = self.tokens.sweep_expired();

        SweepReport {
            expired_challenges,
            failed_step_ups,
            removed_sessions,
            expired_tokens,
        }
    }

    fn locked(&self, session_id: &SessionId) -> Result<Arc<Mutex<Session>>, FlowError> {
        self.sessions
            .session(session_id)
            .ok_or_else(|| FlowError::UnknownSession(session_id.clone()))
    }

    /// Dispatch verification on the proof scheme, enforcing the
    /// role-to-scheme binding.
    fn verify_proof(
        &self,
        mandate_id: &MandateId,
        role: SignerRole,
        proof: &SignatureProof,
    ) -> Result<(), FlowError> {
        match (role, proof) {
            (SignerRole::Merchant, SignatureProof::Ed25519 { key_ref, signature }) => {
                let mandate = self.chain.get(mandate_id).ok_or_else(|| {
                    amp_mandate::ChainError::UnknownMandate(mandate_id.to_string())
                })?;
                let merchant_id = mandate
                    .as_cart()
                    .map(|c| c.merchant_id.clone())
                    .ok_or(FlowError::MissingMandate("cart"))?;
                // Merchant binding: the key_ref must name the identity the
                // cart is bound to, and the key is resolved under it.
                if *key_ref != merchant_id.to_string() {
                    return Err(FlowError::KeyRefMismatch {
                        key_ref: key_ref.clone(),
                        expected: merchant_id.to_string(),
                    });
                }
                let key = self
                    .keys
                    .merchant_key(&merchant_id)
                    .ok_or_else(|| FlowError::UnknownKeyMaterial(merchant_id.to_string()))?;
                self.audit(role, mandate_id, verify_digest(&mandate.digest().map_err(ChainError::from)?, signature, &key))
            }
            (SignerRole::Network, SignatureProof::Ed25519 { key_ref, signature }) => {
                let mandate = self.chain.get(mandate_id).ok_or_else(|| {
                    amp_mandate::ChainError::UnknownMandate(mandate_id.to_string())
                })?;
                let key = self
                    .keys
                    .network_key(key_ref)
                    .ok_or_else(|| FlowError::UnknownKeyMaterial(key_ref.clone()))?;
                self.audit(role, mandate_id, verify_digest(&mandate.digest().map_err(ChainError::from)?, signature, &key))
            }
            (SignerRole::Payer, SignatureProof::DeviceAttestation { assertion }) => {
                self.verify_payer_assertion(mandate_id, assertion)
            }
            (role, _) => Err(FlowError::ProofSchemeMismatch { role }),
        }
    }

    /// Consume the mandate's one-time challenge, verify the assertion,
    /// and commit the advanced signature counter.
    fn verify_payer_assertion(
        &self,
        mandate_id: &MandateId,
        assertion: &DeviceAssertion,
    ) -> Result<(), FlowError> {
        let client_data = assertion.client_data()?;
        self.challenges.take(mandate_id, &client_data.challenge)?;
        let credential = self
            .keys
            .credential(&assertion.credential_id)
            .ok_or_else(|| FlowError::UnknownKeyMaterial(assertion.credential_id.to_string()))?;
        let verified = self.audit(
            SignerRole::Payer,
            mandate_id,
            verify_device_attestation(
                &client_data.challenge,
                assertion,
                &credential,
                &self.config.expected_origin,
            ),
        )?;
        self.keys
            .commit_counter(&assertion.credential_id, verified.new_counter);
        Ok(())
    }

    /// Audit-log a verification failure, then propagate it.
    fn audit<T>(
        &self,
        role: SignerRole,
        mandate_id: &MandateId,
        result: Result<T, amp_crypto::SignatureVerificationError>,
    ) -> Result<T, FlowError> {
        result.map_err(|err| {
            warn!(
                mandate = %mandate_id,
                role = %role,
                reason = err.reason_code(),
                "signature verification failed"
            );
            err.into()
        })
    }
}

impl std::fmt::Debug for AuthorizationFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationFlow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
