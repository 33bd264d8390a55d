//! Session API.
//!
//! The HTTP half of the server: pairing creation and confirmation, room
//! teardown, and a liveness probe. Field names and error bodies follow
//! the shapes the clients already parse, camelCase on the wire.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use cliprelay_protocol::{DeviceId, PairingId, RoomId, ServerMessage};
use cliprelay_session::SessionError;

use crate::server::ServerState;

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/pair/create", post(create_pairing))
        .route("/pair/confirm", post(confirm_pairing))
        .route("/pair/disconnect", post(disconnect_room))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "Clipboard sync server"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePairingResponse {
    pairing_id: PairingId,
    code: String,
    expires_in_ms: u64,
}

/// Opens a new pairing request for a desktop about to display a code.
async fn create_pairing(State(state): State<Arc<ServerState>>) -> Json<CreatePairingResponse> {
    let offer = state.pairings.lock().await.create();
    Json(CreatePairingResponse {
        pairing_id: offer.pairing_id,
        code: offer.code,
        expires_in_ms: offer.expires_in.as_millis() as u64,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPairingRequest {
    pairing_id: Option<String>,
    code: Option<String>,
    mobile_device_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPairingResponse {
    mobile_token: String,
    room_id: RoomId,
}

/// Confirms a pairing with the code the mobile device scanned.
///
/// On success the waiting desktop has already been notified by the time
/// the mobile device sees its token.
async fn confirm_pairing(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ConfirmPairingRequest>,
) -> Result<Json<ConfirmPairingResponse>, ApiError> {
    let (Some(pairing_id), Some(code), Some(mobile_device_id)) = (
        non_empty(request.pairing_id),
        non_empty(request.code),
        non_empty(request.mobile_device_id),
    ) else {
        return Err(ApiError::missing());
    };

    let grant = {
        let mut pairings = state.pairings.lock().await;
        pairings.confirm(
            &PairingId(pairing_id),
            &code,
            &state.issuer,
            &DeviceId(mobile_device_id),
        )?
    };

    Ok(Json(ConfirmPairingResponse {
        mobile_token: grant.mobile_token,
        room_id: grant.room_id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DisconnectRequest {
    desktop_token: Option<String>,
    mobile_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct DisconnectResponse {
    success: bool,
}

/// Tears a room down on behalf of either side.
///
/// At least one presented token must verify; the first valid one (desktop
/// preferred) names the room whose members get the `disconnected` push.
async fn disconnect_room(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DisconnectRequest>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let room_id = [request.desktop_token, request.mobile_token]
        .into_iter()
        .flatten()
        .find_map(|token| state.issuer.verify(&token).ok())
        .map(|claims| claims.room);

    let Some(room_id) = room_id else {
        return Err(ApiError::invalid_token());
    };

    let notified = {
        let rooms = state.rooms.lock().await;
        rooms.broadcast(&room_id, &ServerMessage::Disconnected)
    };
    tracing::info!(%room_id, notified, "room disconnected");

    Ok(Json(DisconnectResponse { success: true }))
}

/// JSON clients send absent fields and empty strings interchangeably.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// A session API failure, rendered as `{"error": "..."}` with the status
/// the client contract expects.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn missing() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "missing".to_string(),
        }
    }

    fn invalid_token() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "invalid token".to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::PairingNotFound => StatusCode::NOT_FOUND,
            SessionError::PairingExpired => StatusCode::GONE,
            SessionError::WrongCode => StatusCode::UNAUTHORIZED,
            SessionError::InvalidToken => StatusCode::BAD_REQUEST,
            SessionError::Signing(_) => {
                tracing::error!(error = %err, "credential minting failed");
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal error".to_string(),
                };
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use tokio::sync::{mpsc, Mutex};
    use tower::ServiceExt;

    use cliprelay_protocol::{JsonCodec, Role};
    use cliprelay_room::RoomRegistry;
    use cliprelay_session::{PairingRegistry, TokenIssuer};
    use cliprelay_transport::ConnectionId;

    // ------------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------------

    fn state_with_ttl(ttl: Duration) -> Arc<ServerState> {
        Arc::new(ServerState {
            pairings: Mutex::new(PairingRegistry::with_ttl(ttl)),
            rooms: Mutex::new(RoomRegistry::new()),
            issuer: TokenIssuer::new("http-test-secret"),
            codec: JsonCodec,
        })
    }

    fn test_state() -> Arc<ServerState> {
        state_with_ttl(Duration::from_secs(300))
    }

    async fn get_text(router: &Router, path: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .body(Body::empty())
                    .expect("request should build"),
            )
            .await
            .expect("request should be served");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        (status, String::from_utf8(bytes.to_vec()).expect("utf8 body"))
    }

    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("request should be served");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value = serde_json::from_slice(&bytes).expect("json body");
        (status, value)
    }

    async fn create_offer(state: &Arc<ServerState>) -> (String, String) {
        let offer = state.pairings.lock().await.create();
        (offer.pairing_id.to_string(), offer.code)
    }

    // ========================================================================
    // GET /
    // ========================================================================

    #[tokio::test]
    async fn test_health_returns_banner() {
        let router = router(test_state());

        let (status, body) = get_text(&router, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Clipboard sync server");
    }

    // ========================================================================
    // POST /pair/create
    // ========================================================================

    #[tokio::test]
    async fn test_create_pairing_returns_offer() {
        let router = router(test_state());

        let (status, body) = post_json(&router, "/pair/create", json!({})).await;

        assert_eq!(status, StatusCode::OK);
        let pairing_id = body["pairingId"].as_str().expect("pairingId");
        assert!(!pairing_id.is_empty());
        let code = body["code"].as_str().expect("code");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(body["expiresInMs"].as_u64(), Some(300_000));
    }

    // ========================================================================
    // POST /pair/confirm
    // ========================================================================

    #[tokio::test]
    async fn test_confirm_missing_fields_returns_400() {
        let router = router(test_state());

        let (status, body) = post_json(&router, "/pair/confirm", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing");

        // Leaving out any one field is just as bad.
        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": "p-1", "code": "123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing");
    }

    #[tokio::test]
    async fn test_confirm_empty_fields_count_as_missing() {
        let router = router(test_state());

        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": "", "code": "", "mobileDeviceId": "" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing");
    }

    #[tokio::test]
    async fn test_confirm_unknown_pairing_returns_404() {
        let router = router(test_state());

        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": "nope", "code": "123456", "mobileDeviceId": "phone-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "pairing not found or expired");
    }

    #[tokio::test]
    async fn test_confirm_wrong_code_returns_401_and_keeps_pairing() {
        let state = test_state();
        let router = router(state.clone());
        let (pairing_id, code) = create_offer(&state).await;

        let wrong = if code == "000000" { "000001" } else { "000000" };
        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": pairing_id, "code": wrong, "mobileDeviceId": "phone-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid code");

        // The pairing survives a wrong code; the right one still works.
        let (status, _) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": pairing_id, "code": code, "mobileDeviceId": "phone-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_confirm_returns_mobile_token_bound_to_room() {
        let state = test_state();
        let router = router(state.clone());
        let (pairing_id, code) = create_offer(&state).await;

        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": pairing_id, "code": code, "mobileDeviceId": "phone-1" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let token = body["mobileToken"].as_str().expect("mobileToken");
        let room_id = body["roomId"].as_str().expect("roomId");

        let claims = state.issuer.verify(token).expect("token should verify");
        assert_eq!(claims.device_id, DeviceId("phone-1".into()));
        assert_eq!(claims.role, Role::Mobile);
        assert_eq!(claims.room, RoomId(room_id.to_string()));
    }

    #[tokio::test]
    async fn test_confirm_expired_returns_410_then_404() {
        let state = state_with_ttl(Duration::ZERO);
        let router = router(state.clone());
        let (pairing_id, code) = create_offer(&state).await;

        let (status, body) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": pairing_id, "code": code, "mobileDeviceId": "phone-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body["error"], "pairing expired");

        // Expiry consumed the request.
        let (status, _) = post_json(
            &router,
            "/pair/confirm",
            json!({ "pairingId": pairing_id, "code": code, "mobileDeviceId": "phone-1" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_confirm_is_single_use() {
        let state = test_state();
        let router = router(state.clone());
        let (pairing_id, code) = create_offer(&state).await;

        let confirm = json!({ "pairingId": pairing_id, "code": code, "mobileDeviceId": "phone-1" });
        let (status, _) = post_json(&router, "/pair/confirm", confirm.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(&router, "/pair/confirm", confirm).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "pairing not found or expired");
    }

    // ========================================================================
    // POST /pair/disconnect
    // ========================================================================

    #[tokio::test]
    async fn test_disconnect_without_tokens_returns_400() {
        let router = router(test_state());

        let (status, body) = post_json(&router, "/pair/disconnect", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_disconnect_with_garbage_tokens_returns_400() {
        let router = router(test_state());

        let (status, body) = post_json(
            &router,
            "/pair/disconnect",
            json!({ "desktopToken": "garbage", "mobileToken": "junk" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_disconnect_with_valid_token_notifies_room() {
        let state = test_state();
        let router = router(state.clone());

        let room_id = RoomId("room-1".into());
        let token = state
            .issuer
            .issue(&DeviceId("desktop-1".into()), Role::Desktop, &room_id)
            .expect("issue");
        let (tx, mut rx) = mpsc::unbounded_channel();
        state
            .rooms
            .lock()
            .await
            .join(DeviceId("mobile-1".into()), ConnectionId::new(1), room_id, tx);

        let (status, body) =
            post_json(&router, "/pair/disconnect", json!({ "desktopToken": token })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Disconnected)));
    }

    #[tokio::test]
    async fn test_disconnect_ignores_invalid_token_when_other_is_valid() {
        let state = test_state();
        let router = router(state.clone());

        let room_id = RoomId("room-1".into());
        let token = state
            .issuer
            .issue(&DeviceId("mobile-1".into()), Role::Mobile, &room_id)
            .expect("issue");

        let (status, body) = post_json(
            &router,
            "/pair/disconnect",
            json!({ "desktopToken": "garbage", "mobileToken": token }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn test_disconnect_prefers_desktop_room_when_both_valid() {
        let state = test_state();
        let router = router(state.clone());

        let desktop_room = RoomId("room-desktop".into());
        let mobile_room = RoomId("room-mobile".into());
        let desktop_token = state
            .issuer
            .issue(&DeviceId("desktop-1".into()), Role::Desktop, &desktop_room)
            .expect("issue");
        let mobile_token = state
            .issuer
            .issue(&DeviceId("mobile-1".into()), Role::Mobile, &mobile_room)
            .expect("issue");

        let (tx_d, mut rx_d) = mpsc::unbounded_channel();
        let (tx_m, mut rx_m) = mpsc::unbounded_channel();
        {
            let mut rooms = state.rooms.lock().await;
            rooms.join(
                DeviceId("listener-d".into()),
                ConnectionId::new(1),
                desktop_room,
                tx_d,
            );
            rooms.join(
                DeviceId("listener-m".into()),
                ConnectionId::new(2),
                mobile_room,
                tx_m,
            );
        }

        let (status, _) = post_json(
            &router,
            "/pair/disconnect",
            json!({ "desktopToken": desktop_token, "mobileToken": mobile_token }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(matches!(rx_d.try_recv(), Ok(ServerMessage::Disconnected)));
        assert!(rx_m.try_recv().is_err());
    }
}
