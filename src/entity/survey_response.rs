//! One citizen's rating submission for a line. Rows are never updated.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "survey_responses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[serde(rename = "linha_numero")]
    pub line_id: String,
    #[serde(rename = "linha_itinerario")]
    pub itinerary: Option<String>,
    #[serde(rename = "pontualidade")]
    pub punctuality: i32,
    #[serde(rename = "frequencia")]
    pub frequency: i32,
    #[serde(rename = "conforto")]
    pub comfort: i32,
    #[serde(rename = "atendimento")]
    pub service: i32,
    #[serde(rename = "infraestrutura")]
    pub infrastructure: i32,
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(rename = "observacoes")]
    pub comment: Option<String>,
    #[serde(rename = "data_criacao")]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unweighted mean of this response's five ratings.
    pub fn mean(&self) -> f64 {
        f64::from(
            self.punctuality + self.frequency + self.comfort + self.service + self.infrastructure,
        ) / 5.0
    }
}
