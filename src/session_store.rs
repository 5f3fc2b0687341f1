use async_trait::async_trait;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use time::OffsetDateTime;
use tower_sessions::{session::Id, session::Record, session_store, ExpiredDeletion, SessionStore};

use crate::entity::web_session::{self, ActiveModel as WebSessionActiveModel, Entity as WebSession};

/// Cookie-session backend for `tower-sessions`, persisted through SeaORM.
///
/// Browser clients that log in receive a session cookie; the record behind it
/// holds the staff bearer token under [`crate::auth::SESSION_TOKEN_KEY`], which
/// the guard falls back to when a request carries no `Authorization` header.
///
/// Records live in the `web_sessions` table created by
/// [`crate::migration::Migrator`], so the same connection that serves the
/// survey tables serves the sessions. Each record is stored whole as
/// MessagePack.
///
/// # Usage
///
/// ```no_run
/// use time::Duration;
/// use tower_sessions::{Expiry, SessionManagerLayer};
/// use transit_survey::{SeaOrmSessionStore, Store};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Store::connect("sqlite::memory:").await?;
/// store.migrate().await?;
///
/// let layer = SessionManagerLayer::new(SeaOrmSessionStore::new(store.conn().clone()))
///     .with_expiry(Expiry::OnInactivity(Duration::hours(24)));
/// # Ok(())
/// # }
/// ```
///
/// # Error Handling
///
/// - Database errors → `session_store::Error::Backend`
/// - Serialization errors and unrepresentable expiry dates → `session_store::Error::Encode`
/// - Deserialization errors → `session_store::Error::Decode`
#[derive(Debug, Clone)]
pub struct SeaOrmSessionStore {
    conn: DatabaseConnection,
}

impl SeaOrmSessionStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

fn backend(e: sea_orm::DbErr) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

fn encode(record: &Record) -> session_store::Result<(Vec<u8>, DateTimeWithTimeZone)> {
    let data =
        rmp_serde::to_vec(record).map_err(|e| session_store::Error::Encode(e.to_string()))?;
    Ok((data, to_db_time(record.expiry_date)?))
}

#[async_trait]
impl SessionStore for SeaOrmSessionStore {
    /// Inserts a fresh record, drawing a new id for as long as the current one
    /// is already taken.
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        let txn = self.conn.begin().await.map_err(backend)?;

        while WebSession::find_by_id(record.id.to_string())
            .one(&txn)
            .await
            .map_err(backend)?
            .is_some()
        {
            record.id = Id::default();
        }

        let (data, expiry_date) = encode(record)?;
        WebSessionActiveModel {
            id: Set(record.id.to_string()),
            data: Set(data),
            expiry_date: Set(expiry_date),
        }
        .insert(&txn)
        .await
        .map_err(backend)?;

        txn.commit().await.map_err(backend)
    }

    /// Upserts the record.
    async fn save(&self, record: &Record) -> session_store::Result<()> {
        let (data, expiry_date) = encode(record)?;

        match WebSession::find_by_id(record.id.to_string())
            .one(&self.conn)
            .await
            .map_err(backend)?
        {
            Some(existing) => {
                let mut active = existing.into_active_model();
                active.data = Set(data);
                active.expiry_date = Set(expiry_date);
                active.update(&self.conn).await.map_err(backend)?;
            }
            None => {
                WebSessionActiveModel {
                    id: Set(record.id.to_string()),
                    data: Set(data),
                    expiry_date: Set(expiry_date),
                }
                .insert(&self.conn)
                .await
                .map_err(backend)?;
            }
        }

        Ok(())
    }

    /// Loads a record that has not yet expired.
    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let now = to_db_time(OffsetDateTime::now_utc())?;

        WebSession::find_by_id(session_id.to_string())
            .filter(web_session::Column::ExpiryDate.gt(now))
            .one(&self.conn)
            .await
            .map_err(backend)?
            .map(|model| {
                rmp_serde::from_slice(&model.data)
                    .map_err(|e| session_store::Error::Decode(e.to_string()))
            })
            .transpose()
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        WebSession::delete_by_id(session_id.to_string())
            .exec(&self.conn)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for SeaOrmSessionStore {
    /// Bulk-deletes every record whose expiry is in the past. `main` runs this
    /// on an interval.
    async fn delete_expired(&self) -> session_store::Result<()> {
        let now = to_db_time(OffsetDateTime::now_utc())?;

        WebSession::delete_many()
            .filter(web_session::Column::ExpiryDate.lt(now))
            .exec(&self.conn)
            .await
            .map_err(backend)?;

        Ok(())
    }
}

/// `time` to `chrono`, normalised to UTC so stored values compare correctly.
fn to_db_time(at: OffsetDateTime) -> session_store::Result<DateTimeWithTimeZone> {
    chrono::DateTime::from_timestamp(at.unix_timestamp(), at.nanosecond())
        .map(|utc| utc.fixed_offset())
        .ok_or_else(|| session_store::Error::Encode(format!("expiry date {at} is out of range")))
}
