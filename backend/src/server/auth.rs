//! Login, logout, session verification and password change

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::authn::bearer::{extract_token, removal_cookie, session_cookie};
use crate::errors::AppError;
use crate::server::state::ServerState;
use crate::utils::token_prefix;

/// Shortest accepted new password
const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

fn invalid_body(_: JsonRejection) -> AppError {
    AppError::Validation("Invalid request body".to_string())
}

/// `POST /auth/login`
pub async fn login_handler(
    State(state): State<Arc<ServerState>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    let Json(request) = payload.map_err(invalid_body)?;

    if !state.sessions.validate_password(&request.password).await {
        warn!("Rejected login attempt");
        return Err(AppError::Auth("Invalid password".to_string()));
    }

    let token = state.sessions.issue_token().await?;
    info!("Login successful, session {}...", token_prefix(&token));

    let jar = jar.add(session_cookie(token.clone(), state.sessions.ttl()));
    Ok((
        jar,
        Json(LoginResponse {
            token,
            message: "Login successful".to_string(),
        }),
    ))
}

/// `POST /auth/logout`
pub async fn logout_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let token = extract_token(&headers).ok_or_else(|| AppError::Auth("Unauthorized".to_string()))?;
    state.sessions.revoke_token(&token).await;

    // Cleared even when the token came from the header
    Ok((
        jar.add(removal_cookie()),
        MessageResponse::new("Logout successful"),
    ))
}

/// `GET /auth/verify`
pub async fn verify_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AppError> {
    match extract_token(&headers) {
        Some(token) if state.sessions.validate_token(&token).await => {
            Ok(MessageResponse::new("Session valid"))
        }
        _ => Err(AppError::Auth("Invalid or expired session".to_string())),
    }
}

/// `POST /auth/change-password`
pub async fn change_password_handler(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = payload.map_err(invalid_body)?;

    if request.old_password.is_empty() || request.new_password.is_empty() {
        return Err(AppError::Validation(
            "Old password and new password are required".to_string(),
        ));
    }
    if request.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "New password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }

    if !state
        .sessions
        .change_password(&request.old_password, &request.new_password)
        .await
    {
        return Err(AppError::Auth("Invalid old password".to_string()));
    }

    Ok(MessageResponse::new(
        "Password changed successfully. Please login again.",
    ))
}

/// Rejects requests without a valid session token
pub async fn require_session(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match extract_token(request.headers()) {
        Some(token) if state.sessions.validate_token(&token).await => Ok(next.run(request).await),
        _ => Err(AppError::Auth("Unauthorized".to_string())),
    }
}
