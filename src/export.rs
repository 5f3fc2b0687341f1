//! Renders a stored report as a downloadable artifact.
//!
//! `pdf`, `excel` and `word` are placeholders: they produce the HTML or CSV
//! artifact under their own name and leave document conversion to the client.
//! Artifacts are built in memory and handed straight to the response.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::entity::report;
use crate::error::{AppError, Result};
use crate::reporting::{
    recommendations, snapshots_of, split_comments, Category, CategoryMeans, Rating,
    ResponseSnapshot, COMMENT_SEPARATOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Html,
    /// Print-ready HTML.
    Pdf,
    /// CSV.
    Excel,
    /// HTML.
    Word,
}

impl ExportFormat {
    /// Case-insensitive; `xlsx` and `docx` are accepted as aliases.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            "pdf" => Ok(Self::Pdf),
            "excel" | "xlsx" => Ok(Self::Excel),
            "word" | "docx" => Ok(Self::Word),
            _ => Err(AppError::UnsupportedFormat(tag.to_string())),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv | Self::Excel => "csv",
            Self::Html | Self::Pdf | Self::Word => "html",
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv | Self::Excel => "text/csv; charset=utf-8",
            Self::Html | Self::Pdf | Self::Word => "text/html; charset=utf-8",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Full JSON form of a report. Means are the stored, unrounded values so the
/// document parses back into an identical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub id: i32,
    pub linha_numero: String,
    pub data_criacao: DateTime<FixedOffset>,
    pub periodo_inicio: DateTime<FixedOffset>,
    pub periodo_fim: DateTime<FixedOffset>,
    pub total_pesquisas: i32,
    pub media_pontualidade: f64,
    pub media_frequencia: f64,
    pub media_conforto: f64,
    pub media_atendimento: f64,
    pub media_infraestrutura: f64,
    pub media_geral: f64,
    pub classificacao_geral: Rating,
    pub recomendacoes: Vec<String>,
    pub processado: bool,
    pub pesquisas: Vec<ResponseSnapshot>,
    pub observacoes_lista: Vec<String>,
}

impl ReportExport {
    pub fn from_model(m: &report::Model) -> Result<Self> {
        Ok(Self {
            id: m.id,
            linha_numero: m.line_id.clone(),
            data_criacao: m.created_at,
            periodo_inicio: m.period_start,
            periodo_fim: m.period_end,
            total_pesquisas: m.total_responses,
            media_pontualidade: m.mean_punctuality,
            media_frequencia: m.mean_frequency,
            media_conforto: m.mean_comfort,
            media_atendimento: m.mean_service,
            media_infraestrutura: m.mean_infrastructure,
            media_geral: m.mean_overall,
            classificacao_geral: Rating::classify(m.mean_overall),
            recomendacoes: recommendations(&CategoryMeans::from(m), m.mean_overall),
            processado: m.processed,
            pesquisas: snapshots_of(m)?,
            observacoes_lista: split_comments(m.comments.as_deref()),
        })
    }

    /// Rebuilds the stored record this document was rendered from.
    pub fn into_model(self) -> Result<report::Model> {
        Ok(report::Model {
            id: self.id,
            line_id: self.linha_numero,
            created_at: self.data_criacao,
            period_start: self.periodo_inicio,
            period_end: self.periodo_fim,
            total_responses: self.total_pesquisas,
            mean_punctuality: self.media_pontualidade,
            mean_frequency: self.media_frequencia,
            mean_comfort: self.media_conforto,
            mean_service: self.media_atendimento,
            mean_infrastructure: self.media_infraestrutura,
            mean_overall: self.media_geral,
            responses_json: serde_json::to_string(&self.pesquisas)?,
            comments: (!self.observacoes_lista.is_empty())
                .then(|| self.observacoes_lista.join(COMMENT_SEPARATOR)),
            processed: self.processado,
        })
    }
}

/// `relatorio_linha_{line}_{YYYYmmdd_HHMMSS}.{ext}`
pub fn file_name(m: &report::Model, format: ExportFormat) -> String {
    let line: String = m
        .line_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!(
        "relatorio_linha_{}_{}.{}",
        line,
        m.created_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn render(m: &report::Model, format: ExportFormat) -> Result<Artifact> {
    let body = match format {
        ExportFormat::Json => serde_json::to_vec_pretty(&ReportExport::from_model(m)?)?,
        ExportFormat::Csv | ExportFormat::Excel => render_csv(m)?.into_bytes(),
        ExportFormat::Html | ExportFormat::Pdf | ExportFormat::Word => render_html(m)?.into_bytes(),
    };
    Ok(Artifact {
        file_name: file_name(m, format),
        content_type: format.content_type(),
        body,
    })
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<I, S>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let row: Vec<String> = fields.into_iter().map(|f| csv_field(f.as_ref())).collect();
    out.push_str(&row.join(","));
    out.push_str("\r\n");
}

fn snapshot_time(raw: &str, pattern: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.format(pattern).to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn render_csv(m: &report::Model) -> Result<String> {
    let means = CategoryMeans::from(m);
    let mut out = String::new();

    csv_row(&mut out, ["TRANSIT SATISFACTION REPORT - MUNICIPAL TRANSPORT"]);
    csv_row(&mut out, [format!("Line: {}", m.line_id)]);
    csv_row(
        &mut out,
        [format!(
            "Period: {} to {}",
            m.period_start.format("%d/%m/%Y"),
            m.period_end.format("%d/%m/%Y")
        )],
    );
    csv_row(&mut out, [format!("Total surveys: {}", m.total_responses)]);
    csv_row(
        &mut out,
        [format!("Generated at: {}", m.created_at.format("%d/%m/%Y %H:%M"))],
    );
    out.push_str("\r\n");

    csv_row(&mut out, ["CATEGORY MEANS"]);
    csv_row(&mut out, ["Category", "Mean", "Rating"]);
    for (category, mean) in means.iter() {
        csv_row(
            &mut out,
            [
                category.label().to_string(),
                format!("{mean:.1}"),
                Rating::classify(mean).to_string(),
            ],
        );
    }
    csv_row(
        &mut out,
        [
            "OVERALL".to_string(),
            format!("{:.1}", m.mean_overall),
            Rating::classify(m.mean_overall).to_string(),
        ],
    );
    out.push_str("\r\n");

    csv_row(&mut out, ["SURVEY DETAILS"]);
    let mut header = vec!["ID", "Date", "Itinerary"];
    header.extend(Category::ALL.iter().map(|c| c.label()));
    header.push("Comments");
    csv_row(&mut out, header);
    for s in snapshots_of(m)? {
        csv_row(
            &mut out,
            [
                s.id.to_string(),
                snapshot_time(&s.data_criacao, "%d/%m/%Y %H:%M"),
                s.linha_itinerario.unwrap_or_default(),
                s.pontualidade.to_string(),
                s.frequencia.to_string(),
                s.conforto.to_string(),
                s.atendimento.to_string(),
                s.infraestrutura.to_string(),
                s.observacoes.unwrap_or_default(),
            ],
        );
    }
    out.push_str("\r\n");

    csv_row(&mut out, ["RECOMMENDATIONS"]);
    for rec in recommendations(&means, m.mean_overall) {
        csv_row(&mut out, [rec]);
    }

    Ok(out)
}

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 20px; background-color: #f4f4f4; }
.container { max-width: 800px; margin: 0 auto; background-color: white; padding: 30px; border-radius: 10px; }
.header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; border-radius: 10px; }
.summary { background-color: #495057; color: white; padding: 25px; border-radius: 10px; margin: 20px 0; text-align: center; }
.score { font-size: 28px; font-weight: bold; }
.metric { margin: 15px 0; padding: 20px; border-radius: 8px; border-left: 5px solid #667eea; background-color: #f8f9fa; }
.excellent { border-left-color: #28a745; background-color: #d4edda; }
.good { border-left-color: #17a2b8; background-color: #d1ecf1; }
.regular { border-left-color: #ffc107; background-color: #fff3cd; }
.poor { border-left-color: #dc3545; background-color: #f8d7da; }
.observations { background-color: #e9ecef; padding: 20px; border-radius: 8px; margin: 20px 0; }
table { width: 100%; border-collapse: collapse; margin: 20px 0; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
@media print { body { background-color: white; } }
"#;

fn esc(text: &str) -> String {
    ammonia::clean_text(text)
}

fn render_html(m: &report::Model) -> Result<String> {
    let means = CategoryMeans::from(m);
    let line = esc(&m.line_id);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Satisfaction Report - Line {line}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <div class=\"container\">\n\
         <div class=\"header\"><h1>Satisfaction Report</h1><h2>Municipal Public Transport</h2>\
         <p>Line: <strong>{line}</strong></p><p>Based on {total} surveys</p></div>\n\
         <div class=\"summary\"><h2>Executive Summary</h2><div class=\"score\">{overall:.1}/10</div>\
         <p>Overall: {rating}</p><p>Period: {start} to {end}</p></div>\n\
         <h2>Category Analysis</h2>\n",
        total = m.total_responses,
        overall = m.mean_overall,
        rating = Rating::classify(m.mean_overall),
        start = m.period_start.format("%d/%m/%Y"),
        end = m.period_end.format("%d/%m/%Y"),
    );

    for (i, (category, mean)) in means.iter().enumerate() {
        let rating = Rating::classify(mean);
        let _ = write!(
            out,
            "<div class=\"metric {class}\"><h3>{n}. {label}</h3>\
             <p><strong>Score:</strong> {mean:.1}/10 - {rating}</p><p>{description}</p></div>\n",
            class = rating.css_class(),
            n = i + 1,
            label = category.label(),
            description = category.description(),
        );
    }

    let comments = split_comments(m.comments.as_deref());
    out.push_str("<div class=\"observations\">");
    if comments.is_empty() {
        out.push_str("<h3>Passenger Comments</h3><p><em>No comments were provided in this period.</em></p>");
    } else {
        let _ = write!(out, "<h3>Passenger Comments ({})</h3><ul>", comments.len());
        for (i, comment) in comments.iter().enumerate() {
            let _ = write!(out, "<li><strong>#{}:</strong> {}</li>", i + 1, esc(comment));
        }
        out.push_str("</ul>");
    }
    out.push_str("</div>\n");

    out.push_str("<h2>Survey Details</h2>\n<table><tr><th>ID</th><th>Date</th><th>Itinerary</th>");
    for category in Category::ALL {
        let _ = write!(out, "<th>{}</th>", category.label());
    }
    out.push_str("<th>Comments</th></tr>\n");
    for s in snapshots_of(m)? {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            s.id,
            snapshot_time(&s.data_criacao, "%d/%m/%Y %H:%M"),
            esc(s.linha_itinerario.as_deref().unwrap_or_default()),
            s.pontualidade,
            s.frequencia,
            s.conforto,
            s.atendimento,
            s.infraestrutura,
            esc(s.observacoes.as_deref().unwrap_or_default()),
        );
    }
    out.push_str("</table>\n");

    out.push_str("<h3>Recommendations</h3><ul>");
    for rec in recommendations(&means, m.mean_overall) {
        let _ = write!(out, "<li>{rec}</li>");
    }
    let _ = write!(
        out,
        "</ul>\n<p><small>Generated at {}</small></p>\n</div>\n</body>\n</html>\n",
        m.created_at.format("%d/%m/%Y %H:%M")
    );

    Ok(out)
}
