use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::logging::TraceId;
use crate::reporting::{Category, ReportSummary};
use crate::store::NewSurvey;

/// Raw survey body. Ratings stay untyped until validated so that strings,
/// floats and out-of-range numbers all get the same 400.
#[derive(Debug, Default, Deserialize)]
pub struct SurveySubmission {
    pub linha_numero: Option<String>,
    pub linha_itinerario: Option<String>,
    pub pontualidade: Option<Value>,
    pub frequencia: Option<Value>,
    pub conforto: Option<Value>,
    pub atendimento: Option<Value>,
    pub infraestrutura: Option<Value>,
    pub observacoes: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn rating(field: &str, value: Option<&Value>) -> Result<i32> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or_else(|| AppError::validation(format!("Required field: {field}")))?;
    value
        .as_i64()
        .filter(|n| (1..=10).contains(n))
        .map(|n| n as i32)
        .ok_or_else(|| {
            AppError::validation(format!("Field {field} must be an integer between 1 and 10"))
        })
}

impl TryFrom<SurveySubmission> for NewSurvey {
    type Error = AppError;

    fn try_from(s: SurveySubmission) -> Result<Self> {
        let line_id = non_blank(s.linha_numero)
            .ok_or_else(|| AppError::validation("Required field: linha_numero"))?;

        let values = [
            s.pontualidade.as_ref(),
            s.frequencia.as_ref(),
            s.conforto.as_ref(),
            s.atendimento.as_ref(),
            s.infraestrutura.as_ref(),
        ];
        let mut ratings = [0; 5];
        for ((slot, category), value) in ratings.iter_mut().zip(Category::ALL).zip(values) {
            *slot = rating(category.field(), value)?;
        }

        Ok(NewSurvey {
            line_id,
            itinerary: non_blank(s.linha_itinerario),
            ratings,
            comment: non_blank(s.observacoes),
        })
    }
}

pub async fn create_survey(
    State(state): State<AppState>,
    Extension(TraceId(trace_id)): Extension<TraceId>,
    body: std::result::Result<Json<SurveySubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(submission) = body?;
    let survey = NewSurvey::try_from(submission)?;
    let ingestion = state.store.record_survey(survey).await?;
    tracing::info!(
        trace_id = %trace_id,
        line = %ingestion.response.line_id,
        line_total = ingestion.line_total,
        report = ?ingestion.report.as_ref().map(|r| r.id),
        "survey recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "sucesso": true,
            "pesquisa": ingestion.response,
            "total_linha": ingestion.line_total,
            "proximo_relatorio": ingestion.next_report_in(),
            "relatorio_gerado": ingestion.report.is_some(),
            "relatorio_id": ingestion.report.as_ref().map(|r| r.id),
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LineQuery {
    pub linha: Option<String>,
}

pub async fn list_surveys(
    State(state): State<AppState>,
    query: std::result::Result<Query<LineQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(query) = query?;
    let line = non_blank(query.linha);
    let surveys = state.store.list_surveys(line.as_deref()).await?;
    Ok(Json(json!({
        "total": surveys.len(),
        "pesquisas": surveys,
    })))
}

pub async fn statistics(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = state.store.survey_statistics().await?;
    Ok(Json(serde_json::to_value(stats)?))
}

pub async fn force_report(
    State(state): State<AppState>,
    Path(linha): Path<String>,
) -> Result<Json<Value>> {
    let (report, line_total) = state.store.force_report(linha.trim()).await?;
    Ok(Json(json!({
        "sucesso": true,
        "mensagem": format!("Report generated for line {}", report.line_id),
        "total_pesquisas_usadas": report.total_responses,
        "total_pesquisas_linha": line_total,
        "relatorio": ReportSummary::from(&report),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(ratings: [Value; 5]) -> SurveySubmission {
        let [p, f, c, a, i] = ratings;
        SurveySubmission {
            linha_numero: Some(" 101 ".into()),
            linha_itinerario: Some("  ".into()),
            pontualidade: Some(p),
            frequencia: Some(f),
            conforto: Some(c),
            atendimento: Some(a),
            infraestrutura: Some(i),
            observacoes: Some(" late ".into()),
        }
    }

    #[test]
    fn accepts_integers_in_range_and_trims_text() {
        let survey =
            NewSurvey::try_from(submission([json!(1), json!(10), json!(5), json!(7), json!(3)]))
                .unwrap();
        assert_eq!(survey.line_id, "101");
        assert_eq!(survey.itinerary, None);
        assert_eq!(survey.comment.as_deref(), Some("late"));
        assert_eq!(survey.ratings, [1, 10, 5, 7, 3]);
    }

    #[test]
    fn rejects_out_of_range_and_non_integer_ratings() {
        for bad in [json!(0), json!(11), json!(5.5), json!("5"), json!(true), Value::Null] {
            let err = NewSurvey::try_from(submission([
                json!(5),
                json!(5),
                bad.clone(),
                json!(5),
                json!(5),
            ]))
            .unwrap_err();
            assert!(
                matches!(&err, AppError::Validation(msg) if msg.contains("conforto")),
                "{bad} gave {err}"
            );
        }
    }

    #[test]
    fn requires_a_line() {
        let mut s = submission([json!(5), json!(5), json!(5), json!(5), json!(5)]);
        s.linha_numero = Some("   ".into());
        assert!(matches!(
            NewSurvey::try_from(s),
            Err(AppError::Validation(msg)) if msg == "Required field: linha_numero"
        ));

        let missing = SurveySubmission {
            linha_numero: Some("101".into()),
            ..Default::default()
        };
        assert!(matches!(
            NewSurvey::try_from(missing),
            Err(AppError::Validation(msg)) if msg == "Required field: pontualidade"
        ));
    }
}
