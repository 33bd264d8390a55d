//! Signed session credentials.
//!
//! A credential is a compact JWT binding a device identity to its role
//! and room. It is self-contained: the server keeps no record of issued
//! tokens and never revokes them. Validity is signature plus expiry,
//! nothing else.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use cliprelay_protocol::{DeviceId, Role, RoomId};

use crate::SessionError;

/// How long issued credentials stay valid.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The claims embedded in a session credential.
///
/// Serialized with camelCase keys (`deviceId`), plus the standard `iat`
/// and `exp` timestamps in whole seconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub device_id: DeviceId,
    pub role: Role,
    pub room: RoomId,
    pub iat: u64,
    pub exp: u64,
}

/// Mints and verifies session credentials (HS256 JWTs).
///
/// Stateless: issuing records nothing, so verification works on any
/// server process that shares the secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
    header: Header,
    validation: Validation,
}

impl TokenIssuer {
    /// Creates an issuer with the standard validity window.
    pub fn new(secret: &str) -> Self {
        Self::with_validity(secret, TOKEN_VALIDITY)
    }

    /// Creates an issuer with a custom validity window.
    pub fn with_validity(secret: &str, validity: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock slack: an expired credential is expired.
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validity,
            header: Header::new(Algorithm::HS256),
            validation,
        }
    }

    /// Signs a credential binding `device_id`, as `role`, to `room`.
    ///
    /// # Errors
    /// Returns [`SessionError::Signing`] if the JWT library rejects the
    /// claims or key.
    pub fn issue(
        &self,
        device_id: &DeviceId,
        role: Role,
        room: &RoomId,
    ) -> Result<String, SessionError> {
        let now = unix_now_secs();
        let claims = Claims {
            device_id: device_id.clone(),
            role,
            room: room.clone(),
            iat: now,
            exp: now + self.validity.as_secs(),
        };

        jsonwebtoken::encode(&self.header, &claims, &self.encoding_key)
            .map_err(SessionError::Signing)
    }

    /// Verifies a credential and returns its claims.
    ///
    /// # Errors
    /// Every failure mode (bad signature, malformed token, expired)
    /// returns [`SessionError::InvalidToken`]. The underlying cause is
    /// logged at debug level only.
    pub fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token verify failed");
                SessionError::InvalidToken
            })
    }
}

/// Whole seconds since the Unix epoch.
fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// =========================================================================
// Tests
// =========================================================================
