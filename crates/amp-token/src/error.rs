use thiserror::Error;

/// Token issuance and redemption failures.
///
/// Redemption failures are explicit about which of the not-found /
/// expired / consumed cases applies; the dialogue layer phrases them
/// differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Issuance requested for a session that is not in the authorized
    /// state.
    #[error("token issuance refused: payment mandate is not authorized")]
    NotAuthorized,

    /// The token value is unknown.
    #[error("token not found")]
    NotFound,

    /// The token exists but its validity window has passed.
    #[error("token expired at {expires_at}")]
    Expired {
        /// The recorded expiry.
        expires_at: String,
    },

    /// The token was already redeemed under the single-use policy.
    #[error("token already consumed")]
    Consumed,
}
