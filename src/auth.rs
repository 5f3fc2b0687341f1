//! Staff authentication: password hashing, opaque tokens and the request guard.
//!
//! The guard is token-only. A request is resolved to the active user whose
//! `session_token` equals the bearer token exactly; expiring
//! [`user_session`](crate::entity::user_session) rows are bookkeeping and are
//! not consulted here.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use rand::RngCore;
use serde::Serialize;
use tower_sessions::Session;

use crate::api::AppState;
use crate::entity::user;
use crate::error::{AppError, Result};
use crate::store::Store;

/// Cookie-session key holding the bearer token of a browser login.
pub const SESSION_TOKEN_KEY: &str = "token_usuario";

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str, cost: u32) -> std::result::Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Malformed hashes count as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "stored password hash could not be verified");
        false
    })
}

/// 32 random bytes, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Strips an optional `Bearer ` prefix.
pub fn bearer_token(raw: &str) -> &str {
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}

pub fn validate_new_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Login,
    Admin,
}

/// Outcome of checking a request against an [`AccessLevel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted(user::Model),
    Unauthenticated,
    Forbidden,
}

impl Access {
    pub fn check(user: Option<user::Model>, level: AccessLevel) -> Self {
        match (user, level) {
            (None, _) => Access::Unauthenticated,
            (Some(user), AccessLevel::Admin) if !user.is_admin => Access::Forbidden,
            (Some(user), _) => Access::Granted(user),
        }
    }

    pub fn into_result(self) -> Result<user::Model> {
        match self {
            Access::Granted(user) => Ok(user),
            Access::Unauthenticated => Err(AppError::Unauthenticated("Login required".into())),
            Access::Forbidden => Err(AppError::Forbidden(
                "Access denied. Administrator privileges required.".into(),
            )),
        }
    }
}

/// The user a guarded request was resolved to, placed in request extensions.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

/// Resolves the token of a request: the `Authorization` header when present,
/// else the token stored in the cookie session.
pub async fn request_token(headers: &HeaderMap, session: Option<&Session>) -> Result<Option<String>> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let raw = value.to_str().unwrap_or_default();
        return Ok(Some(bearer_token(raw).to_string()));
    }
    match session {
        Some(session) => Ok(session
            .get::<String>(SESSION_TOKEN_KEY)
            .await?
            .map(|raw| bearer_token(&raw).to_string())),
        None => Ok(None),
    }
}

pub async fn current_user(
    store: &Store,
    headers: &HeaderMap,
    session: Option<&Session>,
) -> Result<Option<user::Model>> {
    match request_token(headers, session).await? {
        Some(token) => store.find_active_by_token(&token).await,
        None => Ok(None),
    }
}

async fn guard(state: &AppState, mut req: Request, next: Next, level: AccessLevel) -> Response {
    let session = req.extensions().get::<Session>().cloned();
    let user = match current_user(&state.store, req.headers(), session.as_ref()).await {
        Ok(user) => user,
        Err(e) => return e.into_response(),
    };

    match Access::check(user, level).into_result() {
        Ok(user) => {
            req.extensions_mut().insert(CurrentUser(user));
            next.run(req).await
        }
        Err(e) => {
            tracing::warn!(path = %req.uri().path(), error = %e, "access refused");
            e.into_response()
        }
    }
}

/// Admits any active user.
pub async fn require_login(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(&state, req, next, AccessLevel::Login).await
}

/// Admits active users with the admin flag.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    guard(&state, req, next, AccessLevel::Admin).await
}

/// Public view of a user; never includes the hash or the token.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub email: String,
    pub nome: String,
    pub is_admin: bool,
    pub ativo: bool,
    pub data_criacao: DateTime<FixedOffset>,
    pub ultimo_login: Option<DateTime<FixedOffset>>,
}

impl From<&user::Model> for UserProfile {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            nome: u.name.clone(),
            is_admin: u.is_admin,
            ativo: u.active,
            data_criacao: u.created_at,
            ultimo_login: u.last_login_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(is_admin: bool) -> user::Model {
        user::Model {
            id: 1,
            email: "a@b.c".into(),
            name: "A".into(),
            password_hash: String::new(),
            is_admin,
            active: true,
            created_at: chrono::Utc::now().fixed_offset(),
            last_login_at: None,
            session_token: Some("t".into()),
        }
    }

    #[test]
    fn passwords_verify_against_their_hash_only() {
        let hash = hash_password("hunter22", 4).unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn tokens_are_url_safe_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(bearer_token("Bearer abc"), "abc");
        assert_eq!(bearer_token("abc"), "abc");
        assert_eq!(bearer_token("Bearer "), "");
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_new_password("12345").is_err());
        assert!(validate_new_password("123456").is_ok());
    }

    #[test]
    fn access_levels() {
        assert_eq!(
            Access::check(None, AccessLevel::Login),
            Access::Unauthenticated
        );
        assert_eq!(
            Access::check(Some(user(false)), AccessLevel::Admin),
            Access::Forbidden
        );
        assert!(matches!(
            Access::check(Some(user(false)), AccessLevel::Login),
            Access::Granted(_)
        ));
        assert!(matches!(
            Access::check(Some(user(true)), AccessLevel::Admin),
            Access::Granted(_)
        ));
    }

    #[tokio::test]
    async fn header_token_takes_precedence() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_token(&headers, None).await.unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(
            request_token(&headers, None).await.unwrap().as_deref(),
            Some("xyz")
        );
    }
}
