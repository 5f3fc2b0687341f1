use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::api::AppState;
use crate::auth::{
    current_user, generate_token, hash_password, validate_new_password, verify_password,
    CurrentUser, UserProfile, SESSION_TOKEN_KEY,
};
use crate::error::{AppError, Result};
use crate::store::ClientInfo;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub senha: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub senha_atual: Option<String>,
    pub nova_senha: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    ClientInfo {
        ip_address: header_str("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .or_else(|| header_str("x-real-ip"))
            .map(|v| v.trim().to_string()),
        user_agent: header_str(header::USER_AGENT.as_str()).map(str::to_string),
    }
}

pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    let (Some(email), Some(password)) = (present(req.email), present(req.senha)) else {
        return Err(AppError::validation("Email and password are required"));
    };

    let user = match state.store.find_active_by_email(&email).await? {
        Some(user) if verify_password(&password, &user.password_hash) => user,
        _ => {
            tracing::warn!(email = %email.trim(), "login refused");
            return Err(AppError::Unauthenticated(
                "Incorrect email or password".into(),
            ));
        }
    };

    let token = generate_token();
    let user = state
        .store
        .record_login(
            user,
            &token,
            client_info(&headers),
            state.config.session_ttl_hours,
        )
        .await?;

    session.insert(SESSION_TOKEN_KEY, &token).await?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(json!({
        "sucesso": true,
        "mensagem": "Login successful",
        "usuario": UserProfile::from(&user),
        "token": token,
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Value>> {
    let user_id = user.id;
    state.store.logout(user).await?;
    session.flush().await?;
    tracing::info!(user_id, "user logged out");

    Ok(Json(json!({
        "sucesso": true,
        "mensagem": "Logout successful",
    })))
}

pub async fn profile(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<Value> {
    Json(json!({ "usuario": UserProfile::from(&user) }))
}

pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    body: std::result::Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    let (Some(current), Some(new_password)) = (present(req.senha_atual), present(req.nova_senha))
    else {
        return Err(AppError::validation(
            "Current password and new password are required",
        ));
    };

    if !verify_password(&current, &user.password_hash) {
        return Err(AppError::Unauthenticated(
            "Current password is incorrect".into(),
        ));
    }
    validate_new_password(&new_password)?;

    let hash = hash_password(&new_password, state.config.bcrypt_cost)?;
    let token = generate_token();
    let user = state.store.change_password(user, hash, &token).await?;
    session.insert(SESSION_TOKEN_KEY, &token).await?;
    tracing::info!(user_id = user.id, "password changed");

    Ok(Json(json!({
        "sucesso": true,
        "mensagem": "Password changed",
        "token": token,
    })))
}

/// Public: reports whether the caller's token resolves to an active user.
pub async fn check_session(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let body = match current_user(&state.store, &headers, Some(&session)).await? {
        Some(user) => json!({ "logado": true, "usuario": UserProfile::from(&user) }),
        None => json!({ "logado": false }),
    };
    Ok(Json(body))
}
