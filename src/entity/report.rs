//! Frozen statistical snapshot over the most recent responses of a line.
//!
//! Means are stored unrounded; rounding happens in [`crate::reporting`] views.
//! `responses_json` holds the serialized [`crate::reporting::ResponseSnapshot`]
//! list and `comments` the non-empty comments joined with
//! [`crate::reporting::COMMENT_SEPARATOR`].

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub line_id: String,
    pub created_at: DateTimeWithTimeZone,
    pub period_start: DateTimeWithTimeZone,
    pub period_end: DateTimeWithTimeZone,
    pub total_responses: i32,
    pub mean_punctuality: f64,
    pub mean_frequency: f64,
    pub mean_comfort: f64,
    pub mean_service: f64,
    pub mean_infrastructure: f64,
    pub mean_overall: f64,
    #[sea_orm(column_type = "Text")]
    pub responses_json: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub comments: Option<String>,
    pub processed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
