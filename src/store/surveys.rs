use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use serde::Serialize;

use crate::entity::{line_counter, report, survey_response};
use crate::error::{AppError, Result};
use crate::reporting::{self, round1};
use crate::store::{now, Store};

/// A report is synthesized whenever a line's count reaches a multiple of this.
pub const REPORT_INTERVAL: i32 = 10;

/// A submission that already passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSurvey {
    pub line_id: String,
    pub itinerary: Option<String>,
    /// Punctuality, frequency, comfort, service, infrastructure; each in 1..=10.
    pub ratings: [i32; 5],
    pub comment: Option<String>,
}

/// Outcome of [`Store::record_survey`].
#[derive(Debug, Clone)]
pub struct Ingestion {
    pub response: survey_response::Model,
    /// The line's count after this submission.
    pub line_total: i32,
    /// Present only when this submission triggered a report that was persisted.
    pub report: Option<report::Model>,
}

impl Ingestion {
    /// Submissions left until the next automatic report.
    pub fn next_report_in(&self) -> i32 {
        REPORT_INTERVAL - self.line_total % REPORT_INTERVAL
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineStats {
    pub linha: String,
    pub total_pesquisas: i32,
    /// Mean of the per-response five-rating means.
    pub media_geral: f64,
    pub ultimo_envio: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyStatistics {
    pub total_pesquisas: u64,
    pub total_linhas: usize,
    pub linhas: Vec<LineStats>,
}

impl Store {
    /// Persists a response and bumps its line counter in one transaction, then
    /// synthesizes a report when the count hits a multiple of
    /// [`REPORT_INTERVAL`].
    ///
    /// Report failures are logged and leave the committed response in place.
    pub async fn record_survey(&self, survey: NewSurvey) -> Result<Ingestion> {
        let txn = self.conn().begin().await?;
        let [punctuality, frequency, comfort, service, infrastructure] = survey.ratings;

        let response = survey_response::ActiveModel {
            line_id: Set(survey.line_id.clone()),
            itinerary: Set(survey.itinerary),
            punctuality: Set(punctuality),
            frequency: Set(frequency),
            comfort: Set(comfort),
            service: Set(service),
            infrastructure: Set(infrastructure),
            comment: Set(survey.comment),
            created_at: Set(now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // Increment in SQL so concurrent submissions for a line never lose a count.
        let bumped = line_counter::Entity::update_many()
            .col_expr(
                line_counter::Column::Count,
                Expr::col(line_counter::Column::Count).add(1),
            )
            .filter(line_counter::Column::LineId.eq(&survey.line_id))
            .exec(&txn)
            .await?;

        let line_total = if bumped.rows_affected == 0 {
            line_counter::ActiveModel {
                line_id: Set(survey.line_id.clone()),
                count: Set(1),
                last_report_at: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?
            .count
        } else {
            line_counter::Entity::find()
                .filter(line_counter::Column::LineId.eq(&survey.line_id))
                .one(&txn)
                .await?
                .map(|c| c.count)
                .ok_or_else(|| AppError::not_found("line counter vanished mid-transaction"))?
        };

        txn.commit().await?;

        let report = if line_total % REPORT_INTERVAL == 0 {
            match self.generate_report(&survey.line_id).await {
                Ok(report) => {
                    tracing::info!(
                        line = %survey.line_id,
                        report_id = report.id,
                        overall = report.mean_overall,
                        "automatic report generated"
                    );
                    Some(report)
                }
                Err(error) => {
                    tracing::error!(line = %survey.line_id, %error, "automatic report failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(Ingestion {
            response,
            line_total,
            report,
        })
    }

    /// Up to `limit` responses of a line, newest first.
    pub async fn recent_for_line(
        &self,
        line_id: &str,
        limit: u64,
    ) -> Result<Vec<survey_response::Model>> {
        Ok(survey_response::Entity::find()
            .filter(survey_response::Column::LineId.eq(line_id))
            .order_by_desc(survey_response::Column::CreatedAt)
            .order_by_desc(survey_response::Column::Id)
            .limit(limit)
            .all(self.conn())
            .await?)
    }

    /// All responses, newest first, optionally restricted to one line.
    pub async fn list_surveys(&self, line_id: Option<&str>) -> Result<Vec<survey_response::Model>> {
        let mut query = survey_response::Entity::find();
        if let Some(line_id) = line_id {
            query = query.filter(survey_response::Column::LineId.eq(line_id));
        }
        Ok(query
            .order_by_desc(survey_response::Column::CreatedAt)
            .order_by_desc(survey_response::Column::Id)
            .all(self.conn())
            .await?)
    }

    pub async fn survey_statistics(&self) -> Result<SurveyStatistics> {
        let total_pesquisas = survey_response::Entity::find().count(self.conn()).await?;
        let counters = line_counter::Entity::find()
            .order_by_asc(line_counter::Column::LineId)
            .all(self.conn())
            .await?;

        let mut per_line: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for response in survey_response::Entity::find().all(self.conn()).await? {
            let entry = per_line.entry(response.line_id.clone()).or_default();
            entry.0 += response.mean();
            entry.1 += 1;
        }

        let linhas = counters
            .iter()
            .filter_map(|counter| {
                let (sum, n) = per_line.get(&counter.line_id)?;
                Some(LineStats {
                    linha: counter.line_id.clone(),
                    total_pesquisas: counter.count,
                    media_geral: round1(sum / *n as f64),
                    ultimo_envio: counter.last_report_at,
                })
            })
            .collect();

        Ok(SurveyStatistics {
            total_pesquisas,
            total_linhas: counters.len(),
            linhas,
        })
    }

    /// Builds a report from the up-to-ten most recent responses of a line,
    /// regardless of its counter. Returns the report and the line's total
    /// number of responses.
    pub async fn force_report(&self, line_id: &str) -> Result<(report::Model, u64)> {
        let total = survey_response::Entity::find()
            .filter(survey_response::Column::LineId.eq(line_id))
            .count(self.conn())
            .await?;
        if total == 0 {
            return Err(AppError::not_found(format!(
                "No surveys found for line {line_id}"
            )));
        }
        let report = self.generate_report(line_id).await?;
        tracing::info!(
            line = %line_id,
            report_id = report.id,
            responses = report.total_responses,
            "forced report generated"
        );
        Ok((report, total))
    }

    async fn generate_report(&self, line_id: &str) -> Result<report::Model> {
        let recent = self
            .recent_for_line(line_id, REPORT_INTERVAL as u64)
            .await?;
        let draft = reporting::synthesize(line_id, &recent, now()).ok_or_else(|| {
            AppError::not_found(format!("No surveys found for line {line_id}"))
        })?;
        self.insert_report(draft).await
    }
}
