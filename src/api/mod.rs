//! HTTP surface.
//!
//! Routes are grouped by the guard they sit behind: public, login, admin.
//! Guards are attached per group with `route_layer`, so unknown paths still
//! answer 404 rather than 401.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_sessions::{Expiry, SessionManagerLayer};

use crate::auth::{require_admin, require_login};
use crate::config::AppConfig;
use crate::logging::request_logging;
use crate::session_store::SeaOrmSessionStore;
use crate::store::Store;

mod auth;
mod reports;
mod surveys;
mod users;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Store, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route(
            "/api/pesquisas",
            post(surveys::create_survey).get(surveys::list_surveys),
        )
        .route("/api/estatisticas", get(surveys::statistics))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verificar-sessao", get(auth::check_session));

    let logged_in = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/perfil", get(auth::profile))
        .route("/api/auth/alterar-senha", post(auth::change_password))
        .route("/api/relatorios", get(reports::list_reports))
        .route("/api/relatorios/estatisticas", get(reports::statistics))
        .route("/api/relatorios/{id}", get(reports::get_report))
        .route(
            "/api/relatorios/{id}/download/{formato}",
            get(reports::download),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    let admin = Router::new()
        .route(
            "/api/auth/usuarios",
            get(users::list_users).post(users::create_user),
        )
        .route(
            "/api/auth/usuarios/{id}",
            put(users::update_user).delete(users::delete_user),
        )
        .route("/api/forcar-relatorio/{linha}", post(surveys::force_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let sessions = SessionManagerLayer::new(SeaOrmSessionStore::new(state.store.conn().clone()))
        .with_secure(state.config.secure_cookies)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            state.config.session_ttl_hours,
        )));

    let cors = cors_layer(&state.config.cors_allowed_origins);

    Router::new()
        .merge(public)
        .merge(logged_in)
        .merge(admin)
        .layer(sessions)
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
        .with_state(state)
}

/// Any origin when none are configured; otherwise only the listed origins,
/// with credentials so the session cookie travels.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}
