use std::collections::HashMap;

use axum::http::{HeaderMap, Method};
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_shared::types::UserId;

use crate::error::GatewayError;
use crate::gateway;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(gateway::ws_handler))
        .route("/auth/send-otp", post(send_otp))
        .route("/auth/verify-otp", post(verify_otp))
        .route("/auth/logout", post(logout))
        .route("/chats/unread", get(unread_counts))
        .route("/users/online", get(online_users))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connections: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: state.rooms.connection_count(),
    })
}

/// Resolve the request's bearer token to an authenticated identity.
async fn identify(headers: &HeaderMap, state: &AppState) -> Result<UserId, GatewayError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::Unauthenticated)?;

    state.auth.authenticate(token).await
}

#[derive(Deserialize)]
struct SendOtpRequest {
    mobile_number: String,
}

#[derive(Serialize)]
struct SendOtpResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<String>,
}

async fn send_otp(
    State(state): State<AppState>,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, GatewayError> {
    let code = state.auth.request_otp(&req.mobile_number).await?;

    Ok(Json(SendOtpResponse {
        success: true,
        message: "OTP sent successfully to your mobile number",
        otp: state.config.expose_otp.then_some(code),
    }))
}

#[derive(Deserialize)]
struct VerifyOtpRequest {
    mobile_number: String,
    otp: String,
}

#[derive(Serialize)]
struct UserSummary {
    id: UserId,
    mobile_number: String,
    name: String,
    avatar: Option<String>,
    last_seen: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct VerifyOtpResponse {
    success: bool,
    message: &'static str,
    token: String,
    user: UserSummary,
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, GatewayError> {
    let (user, token) = state.auth.verify_otp(&req.mobile_number, &req.otp).await?;

    info!(user = %user.id, "Login successful");

    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "Login successful",
        token,
        user: UserSummary {
            id: user.id,
            mobile_number: user.mobile_number,
            name: user.name,
            avatar: user.avatar,
            last_seen: user.last_seen,
        },
    }))
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
}

async fn logout(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<LogoutResponse>, GatewayError> {
    let user = identify(&headers, &state).await?;
    state.presence.remove(user).await?;

    info!(user = %user, "Logged out");
    Ok(Json(LogoutResponse { success: true }))
}

#[derive(Serialize)]
struct UnreadResponse {
    success: bool,
    unread_counts: HashMap<String, i64>,
}

async fn unread_counts(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<UnreadResponse>, GatewayError> {
    let user = identify(&headers, &state).await?;
    let counts = state.unread.counts(user).await?;

    Ok(Json(UnreadResponse {
        success: true,
        unread_counts: counts
            .into_iter()
            .map(|(sender, count)| (sender.to_string(), count))
            .collect(),
    }))
}

#[derive(Serialize)]
struct OnlineUsersResponse {
    online: Vec<UserId>,
}

async fn online_users(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<OnlineUsersResponse>, GatewayError> {
    identify(&headers, &state).await?;

    Ok(Json(OnlineUsersResponse {
        online: state.presence.online_users().await,
    }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP/WebSocket server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
