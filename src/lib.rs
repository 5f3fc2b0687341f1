//! # Transit satisfaction survey collector
//!
//! Citizens rate a bus line from 1 to 10 in five categories. Every response is
//! stored with a per-line running count, and every tenth response of a line
//! freezes a statistical report over that line's ten most recent responses.
//! Staff log in to browse reports and download them as JSON, CSV or HTML
//! (with `pdf`, `excel` and `word` served as HTML/CSV placeholders).
//!
//! Persistence is SeaORM over PostgreSQL or SQLite; the HTTP surface is axum,
//! with a `tower-sessions` cookie session persisted through SeaORM as a
//! fallback carrier for the bearer token.
//!
//! ## Quick Start
//!
//! ```no_run
//! use transit_survey::{api, AppConfig, Store};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let store = Store::connect(&config.database_url).await?;
//! store.migrate().await?;
//!
//! let app = api::build_router(api::AppState::new(store, config.clone()));
//! let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Synthesizing a report directly
//!
//! [`reporting::synthesize`] is pure apart from the timestamp it is given:
//!
//! ```
//! use transit_survey::reporting::{synthesize, Rating};
//! # use transit_survey::entity::survey_response;
//! # let now = chrono::Utc::now().fixed_offset();
//! # let responses: Vec<survey_response::Model> = (1..=10).map(|id| survey_response::Model {
//! #     id, line_id: "101".into(), itinerary: None,
//! #     punctuality: 10, frequency: 5, comfort: 5, service: 5, infrastructure: 5,
//! #     comment: None, created_at: now,
//! # }).collect();
//! let report = synthesize("101", &responses, now).unwrap();
//! assert_eq!(report.overall, 6.0);
//! assert_eq!(report.rating(), Rating::Regular);
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod logging;
pub mod migration;
pub mod reporting;
pub mod session_store;
pub mod store;

pub use config::AppConfig;
pub use error::AppError;
pub use session_store::SeaOrmSessionStore;
pub use store::Store;
