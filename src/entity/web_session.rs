//! Cookie-session entity for SeaORM.
//!
//! Maps the `web_sessions` table that [`crate::SeaOrmSessionStore`] reads and
//! writes on behalf of the `tower-sessions` layer. Staff logins store their
//! bearer token here so that browser clients without an `Authorization`
//! header can still be resolved by the guard.

use sea_orm::entity::prelude::*;

/// A persisted `tower_sessions` record.
///
/// | Column      | Type        | Description                           |
/// |-------------|-------------|---------------------------------------|
/// | id          | TEXT (PK)   | Session ID                            |
/// | data        | BLOB/BYTEA  | MessagePack-encoded session record    |
/// | expiry_date | TIMESTAMPTZ | Moment after which the record is dead |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "web_sessions")]
pub struct Model {
    /// String form of `tower_sessions::session::Id`.
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub id: String,

    /// MessagePack serialization of the whole `Record`, id and expiry included.
    pub data: Vec<u8>,

    /// Loads filter on this column, and expired-row cleanup deletes by it.
    pub expiry_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
