//! Pairing request lifecycle.
//!
//! A pairing request is the short-lived rendezvous between a desktop that
//! displayed a code and the mobile device that scanned it. The registry
//! owns every pending request. Expiry is checked in exactly one place,
//! lazily, at confirmation time: there is no background sweep, so an
//! abandoned request stays resident until something tries to confirm it
//! or the process restarts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use uuid::Uuid;

use cliprelay_protocol::{DeviceId, PairingId, Role, RoomId, ServerMessage};

use crate::{ClientSender, SessionError, TokenIssuer};

/// Default time a pairing request stays confirmable.
pub const PAIRING_TTL: Duration = Duration::from_secs(5 * 60);

/// A pending pairing request.
///
/// `waiter` is the push channel of the desktop connection that opened the
/// pairing, once it registers. The code is compared verbatim; it is never
/// logged.
struct PairingRequest {
    code: String,
    created_at: Instant,
    ttl: Duration,
    waiter: Option<ClientSender>,
}

/// Everything the desktop needs to render a pairing QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingOffer {
    pub pairing_id: PairingId,
    pub code: String,
    pub expires_in: Duration,
}

/// The outcome of a confirmed pairing: a fresh room and credentials for
/// both sides.
#[derive(Debug, Clone)]
pub struct PairingGrant {
    pub room_id: RoomId,
    pub desktop_device_id: DeviceId,
    pub desktop_token: String,
    pub mobile_token: String,
}

/// Tracks every pending pairing request.
///
/// Not thread-safe by itself: the server wraps it in an async mutex and
/// routes all access through it, the same as the room registry.
pub struct PairingRegistry {
    requests: HashMap<PairingId, PairingRequest>,
    ttl: Duration,
}

impl PairingRegistry {
    /// Creates a registry with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(PAIRING_TTL)
    }

    /// Creates a registry whose requests expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            ttl,
        }
    }

    /// Creates a new pairing request.
    ///
    /// The pairing id is globally unique; the 6-digit code is random and
    /// only meaningful together with its pairing id.
    pub fn create(&mut self) -> PairingOffer {
        let pairing_id = PairingId(Uuid::new_v4().to_string());
        let code = generate_code();

        self.requests.insert(
            pairing_id.clone(),
            PairingRequest {
                code: code.clone(),
                created_at: Instant::now(),
                ttl: self.ttl,
                waiter: None,
            },
        );

        tracing::info!(%pairing_id, "pairing request created");

        PairingOffer {
            pairing_id,
            code,
            expires_in: self.ttl,
        }
    }

    /// Registers `sender` as the connection waiting for this pairing to
    /// be confirmed.
    ///
    /// A later registration for the same id replaces the earlier one.
    /// Expiry is not checked here; only [`confirm`](Self::confirm)
    /// decides whether a request is still alive.
    ///
    /// # Errors
    /// Returns [`SessionError::PairingNotFound`] for an unknown id.
    pub fn attach_waiter(
        &mut self,
        pairing_id: &PairingId,
        sender: ClientSender,
    ) -> Result<(), SessionError> {
        let request = self
            .requests
            .get_mut(pairing_id)
            .ok_or(SessionError::PairingNotFound)?;
        request.waiter = Some(sender);

        tracing::debug!(%pairing_id, "waiter attached to pairing");
        Ok(())
    }

    /// Confirms a pairing with the code the mobile device scanned.
    ///
    /// On success this allocates a new room, mints credentials for both
    /// sides, pushes [`ServerMessage::Paired`] to the attached waiter (if
    /// any is still reachable), and consumes the request. An expired
    /// request is removed; a wrong code leaves the request confirmable so
    /// the user can retry within the TTL.
    ///
    /// # Errors
    /// - [`SessionError::PairingNotFound`]: unknown id
    /// - [`SessionError::PairingExpired`]: TTL elapsed (entry removed)
    /// - [`SessionError::WrongCode`]: code mismatch (entry kept)
    /// - [`SessionError::Signing`]: credential minting failed (entry kept)
    pub fn confirm(
        &mut self,
        pairing_id: &PairingId,
        code: &str,
        issuer: &TokenIssuer,
        mobile_device_id: &DeviceId,
    ) -> Result<PairingGrant, SessionError> {
        {
            let request = self
                .requests
                .get(pairing_id)
                .ok_or(SessionError::PairingNotFound)?;

            if request.created_at.elapsed() > request.ttl {
                self.requests.remove(pairing_id);
                tracing::info!(%pairing_id, "pairing request expired");
                return Err(SessionError::PairingExpired);
            }
            if request.code != code {
                tracing::debug!(%pairing_id, "pairing code mismatch");
                return Err(SessionError::WrongCode);
            }
        }

        let room_id = RoomId(Uuid::new_v4().to_string());
        let desktop_device_id = DeviceId(format!("desktop-{pairing_id}"));
        let desktop_token = issuer.issue(&desktop_device_id, Role::Desktop, &room_id)?;
        let mobile_token = issuer.issue(mobile_device_id, Role::Mobile, &room_id)?;

        // The request is consumed only now that both credentials exist.
        // A pairing is single-use: this removal happens whether or not a
        // waiter is attached or reachable.
        if let Some(request) = self.requests.remove(pairing_id) {
            if let Some(waiter) = request.waiter {
                let notify = ServerMessage::Paired {
                    desktop_token: desktop_token.clone(),
                    mobile_token: mobile_token.clone(),
                    room_id: room_id.clone(),
                    mobile_device_id: mobile_device_id.clone(),
                };
                if waiter.send(notify).is_err() {
                    tracing::debug!(
                        %pairing_id,
                        "pairing waiter already gone, skipping notify"
                    );
                }
            }
        }

        tracing::info!(%pairing_id, %room_id, "pairing confirmed");

        Ok(PairingGrant {
            room_id,
            desktop_device_id,
            desktop_token,
            mobile_token,
        })
    }

    /// Returns the number of pending pairing requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` if there are no pending requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl Default for PairingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Generates a 6-digit pairing code, uniform over 100000..=999999.
fn generate_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(100_000..1_000_000).to_string()
}

// =========================================================================
// Tests
// =========================================================================
