//! # Token Issuer
//!
//! Mints and redeems authorization tokens. `verify` is read-only and
//! never changes redemption state; `redeem` is the settlement-side
//! operation and consumes the token under [`TokenPolicy::SingleUse`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use amp_core::{Amount, MandateId, Timestamp};

use crate::error::TokenError;
use crate::store::TokenStore;

/// Default token lifetime: one hour. The protocol caps lifetime at one
/// hour; configuring a longer TTL is clamped to this.
pub const MAX_TOKEN_TTL_SECS: i64 = 3600;

/// A short-lived bearer token bound to one authorized payment mandate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationToken {
    /// 32 random bytes, lowercase hex. The bearer credential itself.
    pub value: String,
    /// The payment mandate this token attests.
    pub subject: MandateId,
    /// The issuing network identifier.
    pub issuer: String,
    /// Issuance instant.
    pub issued_at: Timestamp,
    /// Expiry instant; at most one hour after issuance.
    pub expires_at: Timestamp,
    /// The exact amount the authorization covers.
    pub bound_amount: Amount,
}

impl AuthorizationToken {
    /// Whether the token's validity window has passed as of `now`.
    pub fn is_expired(&self, now: &Timestamp) -> bool {
        *now >= self.expires_at
    }
}

/// Redemption policy for issued tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenPolicy {
    /// A token stays redeemable until it expires.
    #[default]
    ExpiryOnly,
    /// A token is consumed on first redemption.
    SingleUse,
}

/// Issuer configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// The network identifier stamped into every token.
    pub issuer: String,
    /// Token lifetime in seconds; clamped to [`MAX_TOKEN_TTL_SECS`].
    pub ttl_secs: i64,
    /// Redemption policy.
    pub policy: TokenPolicy,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "amp-network".to_string(),
            ttl_secs: MAX_TOKEN_TTL_SECS,
            policy: TokenPolicy::default(),
        }
    }
}

/// Outcome of a read-only token check.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    /// The token exists and is inside its validity window.
    Valid(AuthorizationToken),
    /// The token exists but has expired.
    Expired {
        /// The recorded expiry.
        expires_at: Timestamp,
    },
    /// The token value is unknown.
    NotFound,
    /// The token was redeemed under the single-use policy.
    Consumed,
}

/// Mints and redeems authorization tokens against a [`TokenStore`].
pub struct TokenIssuer {
    config: TokenConfig,
    store: Arc<dyn TokenStore>,
    consumed: Mutex<HashSet<String>>,
}

impl TokenIssuer {
    /// Issuer over a store.
    pub fn new(config: TokenConfig, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            store,
            consumed: Mutex::new(HashSet::new()),
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> TokenPolicy {
        self.config.policy
    }

    /// Mint a token for an authorized payment mandate.
    ///
    /// The `PAYMENT_AUTHORIZED` precondition is enforced by the session
    /// layer before this is reached; the issuer binds subject, amount,
    /// and expiry and stores the token.
    pub fn issue(&self, subject: MandateId, bound_amount: Amount) -> AuthorizationToken {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        let value: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let issued_at = Timestamp::now();
        let ttl = self.config.ttl_secs.min(MAX_TOKEN_TTL_SECS);
        let token = AuthorizationToken {
            value,
            subject: subject.clone(),
            issuer: self.config.issuer.clone(),
            issued_at,
            expires_at: issued_at.plus_secs(ttl),
            bound_amount,
        };
        self.store.put(token.clone());
        info!(subject = %subject, expires_at = %token.expires_at, "authorization token issued");
        token
    }

    /// Read-only check of a token value.
    pub fn verify(&self, value: &str) -> TokenStatus {
        if self
            .consumed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(value)
        {
            return TokenStatus::Consumed;
        }
        match self.store.get(value) {
            None => TokenStatus::NotFound,
            Some(token) if token.is_expired(&Timestamp::now()) => TokenStatus::Expired {
                expires_at: token.expires_at,
            },
            Some(token) => TokenStatus::Valid(token),
        }
    }

    /// Redeem a token for settlement.
    ///
    /// Under [`TokenPolicy::SingleUse`] the token is consumed: the store
    /// entry is deleted and later checks report [`TokenStatus::Consumed`].
    /// Under the default policy redemption leaves the token redeemable
    /// until expiry.
    pub fn redeem(&self, value: &str) -> Result<AuthorizationToken, TokenError> {
        match self.verify(value) {
            TokenStatus::Valid(token) => {
                if self.config.policy == TokenPolicy::SingleUse {
                    self.store.delete(value);
                    self.consumed
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(value.to_string());
                }
                info!(subject = %token.subject, "authorization token redeemed");
                Ok(token)
            }
            TokenStatus::Expired { expires_at } => Err(TokenError::Expired {
                expires_at: expires_at.to_string(),
            }),
            TokenStatus::NotFound => Err(TokenError::NotFound),
            TokenStatus::Consumed => Err(TokenError::Consumed),
        }
    }

    /// Drop expired tokens from the store; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired(&Timestamp::now())
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
