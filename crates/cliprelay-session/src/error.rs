//! Error types for the session layer.

/// Errors that can occur while issuing credentials or confirming pairings.
///
/// The display strings double as the client-facing error messages, so
/// they stay short and reveal nothing beyond the failure class.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No pairing request exists for the given id. Either it never
    /// existed, was already confirmed, or was removed after expiring.
    #[error("pairing not found or expired")]
    PairingNotFound,

    /// The pairing request's TTL elapsed before confirmation. The entry
    /// is removed when this is returned, so a later confirm sees
    /// [`SessionError::PairingNotFound`].
    #[error("pairing expired")]
    PairingExpired,

    /// The submitted code does not match the pairing request. The entry
    /// is kept so the user can retry within the TTL.
    #[error("invalid code")]
    WrongCode,

    /// Credential verification failed. Bad signature, malformed token,
    /// and expired all collapse into this one variant; the distinction
    /// is logged server-side only.
    #[error("invalid token")]
    InvalidToken,

    /// Signing a credential failed.
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}
