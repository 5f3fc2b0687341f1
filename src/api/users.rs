use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::auth::{hash_password, validate_new_password, CurrentUser, UserProfile};
use crate::error::{AppError, Result};
use crate::store::{NewUser, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub nome: Option<String>,
    pub senha: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub nome: Option<String>,
    pub ativo: Option<bool>,
    pub is_admin: Option<bool>,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::validation(format!("Required field: {field}")))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>> {
    let users = state.store.list_users().await?;
    let profiles: Vec<UserProfile> = users.iter().map(UserProfile::from).collect();
    Ok(Json(json!({
        "total": profiles.len(),
        "usuarios": profiles,
    })))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    body: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(req) = body?;
    let email = required(req.email, "email")?;
    let name = required(req.nome, "nome")?;
    let password = required(req.senha, "senha")?;
    validate_new_password(&password)?;

    let user = state
        .store
        .create_user(NewUser {
            email,
            name,
            password_hash: hash_password(&password, state.config.bcrypt_cost)?,
            is_admin: req.is_admin,
        })
        .await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, "user created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "sucesso": true,
            "mensagem": "User created",
            "usuario": UserProfile::from(&user),
        })),
    ))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    path: std::result::Result<Path<i32>, PathRejection>,
    body: std::result::Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Path(id) = path?;
    let Json(req) = body?;
    if req.nome.is_none() && req.ativo.is_none() && req.is_admin.is_none() {
        return Err(AppError::validation("No data provided"));
    }

    let user = state
        .store
        .update_user(
            admin.id,
            id,
            UserUpdate {
                name: req.nome,
                active: req.ativo,
                is_admin: req.is_admin,
            },
        )
        .await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, "user updated");

    Ok(Json(json!({
        "sucesso": true,
        "mensagem": "User updated",
        "usuario": UserProfile::from(&user),
    })))
}

/// Soft delete: the account is deactivated, never removed.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    path: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<Value>> {
    let Path(id) = path?;
    let user = state.store.deactivate_user(admin.id, id).await?;
    tracing::info!(admin_id = admin.id, user_id = user.id, "user deactivated");

    Ok(Json(json!({
        "sucesso": true,
        "mensagem": "User deactivated",
    })))
}
