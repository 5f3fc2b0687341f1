use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::error::Result;
use crate::export::{self, ExportFormat};
use crate::logging::TraceId;
use crate::reporting::{ReportDetail, ReportSummary};
use crate::store::ReportFilter;

/// Paging values that do not parse as numbers fall back to the defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub linha: Option<String>,
    pub limite: Option<String>,
    pub pagina: Option<String>,
}

impl From<ReportQuery> for ReportFilter {
    fn from(query: ReportQuery) -> Self {
        let defaults = ReportFilter::default();
        let number = |raw: Option<String>| raw.and_then(|v| v.trim().parse::<u64>().ok());
        ReportFilter {
            line: query.linha.map(|l| l.trim().to_string()),
            limit: number(query.limite).unwrap_or(defaults.limit),
            page: number(query.pagina).unwrap_or(defaults.page),
        }
    }
}

pub async fn list_reports(
    State(state): State<AppState>,
    query: std::result::Result<Query<ReportQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(query) = query?;
    let filter = ReportFilter::from(query);
    let page = state.store.list_reports(&filter).await?;
    let summaries: Vec<ReportSummary> = page.reports.iter().map(ReportSummary::from).collect();

    Ok(Json(json!({
        "relatorios": summaries,
        "total": page.total,
        "pagina": page.page,
        "limite": page.limit,
        "total_paginas": page.total_pages(),
    })))
}

pub async fn statistics(State(state): State<AppState>) -> Result<Json<Value>> {
    let (total, lines) = state.store.report_statistics().await?;
    Ok(Json(json!({
        "total_relatorios": total,
        "total_linhas": lines.len(),
        "linhas": lines,
    })))
}

pub async fn get_report(
    State(state): State<AppState>,
    path: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<ReportDetail>> {
    let Path(id) = path?;
    let report = state.store.get_report(id).await?;
    Ok(Json(ReportDetail::try_from(&report)?))
}

pub async fn download(
    State(state): State<AppState>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    path: std::result::Result<Path<(i32, String)>, PathRejection>,
) -> Result<Response> {
    let Path((id, formato)) = path?;
    let report = state.store.get_report(id).await?;
    let format = ExportFormat::parse(&formato)?;
    let artifact = export::render(&report, format)?;
    tracing::info!(
        trace_id = %trace_id,
        report_id = id,
        format = %formato,
        file = %artifact.file_name,
        "report exported"
    );

    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limite: Option<&str>, pagina: Option<&str>) -> ReportQuery {
        ReportQuery {
            linha: Some(" 101 ".into()),
            limite: limite.map(str::to_string),
            pagina: pagina.map(str::to_string),
        }
    }

    #[test]
    fn unparsable_paging_falls_back_to_defaults() {
        let filter = ReportFilter::from(query(Some("abc"), Some("-3")));
        assert_eq!(filter.limit, crate::store::DEFAULT_PAGE_SIZE);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.line.as_deref(), Some("101"));

        let filter = ReportFilter::from(query(Some("20"), Some("3")));
        assert_eq!((filter.limit, filter.page), (20, 3));

        // Zero parses and is left for the store to reject.
        assert_eq!(ReportFilter::from(query(Some("0"), None)).limit, 0);
    }
}
