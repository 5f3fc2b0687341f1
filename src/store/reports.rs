use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::Serialize;

use crate::entity::{line_counter, report};
use crate::error::{AppError, Result};
use crate::reporting::{round1, ReportDraft};
use crate::store::Store;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    /// Case-insensitive substring of the line id.
    pub line: Option<String>,
    pub limit: u64,
    /// 1-based.
    pub page: u64,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            line: None,
            limit: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportPage {
    pub reports: Vec<report::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

impl ReportPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineReportStats {
    pub linha: String,
    pub total_relatorios: usize,
    pub media_geral: f64,
    pub ultimo_relatorio: Option<DateTime<FixedOffset>>,
}

impl Store {
    /// Persists a synthesized report and stamps the line counter, atomically.
    pub async fn insert_report(&self, draft: ReportDraft) -> Result<report::Model> {
        let responses_json = serde_json::to_string(&draft.snapshots)?;
        let txn = self.conn().begin().await?;

        let model = report::ActiveModel {
            line_id: Set(draft.line_id.clone()),
            created_at: Set(draft.created_at),
            period_start: Set(draft.period_start),
            period_end: Set(draft.period_end),
            total_responses: Set(draft.snapshots.len() as i32),
            mean_punctuality: Set(draft.means.punctuality),
            mean_frequency: Set(draft.means.frequency),
            mean_comfort: Set(draft.means.comfort),
            mean_service: Set(draft.means.service),
            mean_infrastructure: Set(draft.means.infrastructure),
            mean_overall: Set(draft.overall),
            responses_json: Set(responses_json),
            comments: Set(draft.comments),
            processed: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        line_counter::Entity::update_many()
            .col_expr(
                line_counter::Column::LastReportAt,
                Expr::value(Some(draft.created_at)),
            )
            .filter(line_counter::Column::LineId.eq(&draft.line_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(model)
    }

    /// One page of reports, newest first.
    pub async fn list_reports(&self, filter: &ReportFilter) -> Result<ReportPage> {
        if filter.limit == 0 || filter.page == 0 {
            return Err(AppError::validation("limite and pagina must be at least 1"));
        }
        if filter.limit > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "limite must be at most {MAX_PAGE_SIZE}"
            )));
        }
        // The row offset is bound as a signed 64-bit integer.
        let in_range = (filter.page - 1)
            .checked_mul(filter.limit)
            .is_some_and(|offset| i64::try_from(offset).is_ok());
        if !in_range {
            return Err(AppError::validation("pagina is out of range"));
        }

        let mut query = report::Entity::find();
        if let Some(line) = filter.line.as_deref().filter(|l| !l.is_empty()) {
            query = query.filter(
                Expr::expr(Func::lower(Expr::col(report::Column::LineId)))
                    .like(format!("%{}%", line.to_lowercase())),
            );
        }
        let paginator = query
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .paginate(self.conn(), filter.limit);

        let total = paginator.num_items().await?;
        let reports = paginator.fetch_page(filter.page - 1).await?;

        Ok(ReportPage {
            reports,
            total,
            page: filter.page,
            limit: filter.limit,
        })
    }

    pub async fn get_report(&self, id: i32) -> Result<report::Model> {
        report::Entity::find_by_id(id)
            .one(self.conn())
            .await?
            .ok_or_else(|| AppError::not_found(format!("Report {id} not found")))
    }

    /// Per-line report aggregates, worst mean first.
    pub async fn report_statistics(&self) -> Result<(u64, Vec<LineReportStats>)> {
        let reports = report::Entity::find().all(self.conn()).await?;
        let total = reports.len() as u64;

        let mut grouped: BTreeMap<String, (usize, f64, Option<DateTime<FixedOffset>>)> =
            BTreeMap::new();
        for r in &reports {
            let entry = grouped.entry(r.line_id.clone()).or_default();
            entry.0 += 1;
            entry.1 += r.mean_overall;
            entry.2 = entry.2.max(Some(r.created_at));
        }

        let mut lines: Vec<LineReportStats> = grouped
            .into_iter()
            .map(|(linha, (count, sum, latest))| LineReportStats {
                linha,
                total_relatorios: count,
                media_geral: round1(sum / count as f64),
                ultimo_relatorio: latest,
            })
            .collect();
        lines.sort_by(|a, b| a.media_geral.total_cmp(&b.media_geral));

        Ok((total, lines))
    }
}
