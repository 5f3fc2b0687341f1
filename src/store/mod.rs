//! Persistence handle shared by every component.
//!
//! A [`Store`] is constructed once and passed around explicitly; tests build
//! their own isolated instance over an in-memory SQLite database.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

use crate::migration::Migrator;

mod reports;
mod surveys;
mod users;

pub use reports::{LineReportStats, ReportFilter, ReportPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use surveys::{Ingestion, LineStats, NewSurvey, SurveyStatistics, REPORT_INTERVAL};
pub use users::{ClientInfo, NewUser, UserUpdate};

#[derive(Debug, Clone)]
pub struct Store {
    conn: DatabaseConnection,
}

impl Store {
    /// Opens a connection pool for `url`.
    ///
    /// In-memory SQLite databases live and die with their connection, so for
    /// those the pool is pinned to one connection that never idles out.
    pub async fn connect(url: &str) -> Result<Self, DbErr> {
        let mut options = ConnectOptions::new(url.to_owned());
        options.sqlx_logging(false);
        if url.starts_with("sqlite:") && url.contains(":memory:") {
            options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(Duration::from_secs(u32::MAX.into()))
                .max_lifetime(Duration::from_secs(u32::MAX.into()));
        }
        Self::connect_with(options).await
    }

    pub async fn connect_with(options: ConnectOptions) -> Result<Self, DbErr> {
        let conn = Database::connect(options).await?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Applies every pending migration.
    pub async fn migrate(&self) -> Result<(), DbErr> {
        Migrator::up(&self.conn, None).await?;
        tracing::info!("database schema is up to date");
        Ok(())
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}

/// Current instant in the offset every stored timestamp uses (UTC).
pub(crate) fn now() -> chrono::DateTime<chrono::FixedOffset> {
    chrono::Utc::now().fixed_offset()
}
