//! Report synthesis and presentation.
//!
//! [`synthesize`] is a pure function of the response list and the creation
//! timestamp it is handed, so tests can feed responses directly. Views
//! ([`ReportSummary`], [`ReportDetail`]) round means to one decimal; stored
//! values never are.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::entity::{report, survey_response};

/// Joins the non-empty comments stored on a report.
pub const COMMENT_SEPARATOR: &str = "\n---\n";

/// A line inside a comment that would read as [`COMMENT_SEPARATOR`] is
/// stored as this instead.
const FENCED_SEPARATOR_LINE: &str = "- - -";

/// Category means below this value earn a warning recommendation.
const WARNING_THRESHOLD: f64 = 6.0;
/// Overall means at or above this value earn the congratulatory line.
const PRAISE_THRESHOLD: f64 = 7.0;

/// One of the five rated dimensions of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Punctuality,
    Frequency,
    Comfort,
    Service,
    Infrastructure,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Punctuality,
        Category::Frequency,
        Category::Comfort,
        Category::Service,
        Category::Infrastructure,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Punctuality => "Punctuality",
            Category::Frequency => "Frequency",
            Category::Comfort => "Comfort",
            Category::Service => "Service",
            Category::Infrastructure => "Infrastructure",
        }
    }

    /// Wire name of the rating field, as submitted by the survey form.
    pub fn field(self) -> &'static str {
        match self {
            Category::Punctuality => "pontualidade",
            Category::Frequency => "frequencia",
            Category::Comfort => "conforto",
            Category::Service => "atendimento",
            Category::Infrastructure => "infraestrutura",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Punctuality => "Reliability of the published timetable.",
            Category::Frequency => "Adequacy of service supply and waiting time.",
            Category::Comfort => "Fleet quality, cleanliness and general condition.",
            Category::Service => "The human factor: drivers and fare collectors.",
            Category::Infrastructure => "Stops and terminals: shelter, seating and safety.",
        }
    }

    fn warning(self) -> &'static str {
        match self {
            Category::Punctuality => {
                "🔴 Punctuality: review timetables and implement real-time monitoring."
            }
            Category::Frequency => {
                "🔴 Frequency: evaluate increasing the fleet or optimizing routes."
            }
            Category::Comfort => {
                "🔴 Comfort: intensify preventive maintenance and vehicle cleaning."
            }
            Category::Service => "🔴 Service: provide training for drivers and fare collectors.",
            Category::Infrastructure => "🔴 Infrastructure: improve bus stops and terminals.",
        }
    }

    fn rating_of(self, response: &survey_response::Model) -> i32 {
        match self {
            Category::Punctuality => response.punctuality,
            Category::Frequency => response.frequency,
            Category::Comfort => response.comfort,
            Category::Service => response.service,
            Category::Infrastructure => response.infrastructure,
        }
    }
}

const PRAISE: &str =
    "✅ Congratulations! The line is well rated overall. Keep up the quality standard.";

/// Four-band classification of a mean score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Regular,
    Poor,
}

impl Rating {
    /// First band from the top whose inclusive lower bound `score` reaches.
    pub fn classify(score: f64) -> Self {
        if score >= 9.0 {
            Rating::Excellent
        } else if score >= 7.0 {
            Rating::Good
        } else if score >= 4.0 {
            Rating::Regular
        } else {
            Rating::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Regular => "Regular",
            Rating::Poor => "Poor",
        }
    }

    /// Lowercase form, used as a CSS class by the HTML renderer.
    pub fn css_class(self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Regular => "regular",
            Rating::Poor => "poor",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for `score`; see [`Rating::classify`].
pub fn classify_score(score: f64) -> &'static str {
    Rating::classify(score).as_str()
}

/// Per-category arithmetic means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMeans {
    pub punctuality: f64,
    pub frequency: f64,
    pub comfort: f64,
    pub service: f64,
    pub infrastructure: f64,
}

impl CategoryMeans {
    pub fn of(responses: &[survey_response::Model]) -> Option<Self> {
        if responses.is_empty() {
            return None;
        }
        let n = responses.len() as f64;
        let mean = |category: Category| {
            responses
                .iter()
                .map(|r| f64::from(category.rating_of(r)))
                .sum::<f64>()
                / n
        };
        Some(Self {
            punctuality: mean(Category::Punctuality),
            frequency: mean(Category::Frequency),
            comfort: mean(Category::Comfort),
            service: mean(Category::Service),
            infrastructure: mean(Category::Infrastructure),
        })
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Punctuality => self.punctuality,
            Category::Frequency => self.frequency,
            Category::Comfort => self.comfort,
            Category::Service => self.service,
            Category::Infrastructure => self.infrastructure,
        }
    }

    /// Mean of the five category means, not of the individual ratings.
    pub fn overall(&self) -> f64 {
        Category::ALL.iter().map(|c| self.get(*c)).sum::<f64>() / 5.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

impl From<&report::Model> for CategoryMeans {
    fn from(m: &report::Model) -> Self {
        Self {
            punctuality: m.mean_punctuality,
            frequency: m.mean_frequency,
            comfort: m.mean_comfort,
            service: m.mean_service,
            infrastructure: m.mean_infrastructure,
        }
    }
}

/// One warning per category under 6, then praise when `overall` is at least 7.
/// Both rules apply independently.
pub fn recommendations(means: &CategoryMeans, overall: f64) -> Vec<String> {
    let mut out: Vec<String> = means
        .iter()
        .filter(|(_, mean)| *mean < WARNING_THRESHOLD)
        .map(|(category, _)| category.warning().to_string())
        .collect();
    if overall >= PRAISE_THRESHOLD {
        out.push(PRAISE.to_string());
    }
    out
}

/// Field snapshot of a response embedded in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub id: i32,
    /// ISO-8601 creation timestamp.
    pub data_criacao: String,
    pub linha_itinerario: Option<String>,
    pub pontualidade: i32,
    pub frequencia: i32,
    pub conforto: i32,
    pub atendimento: i32,
    pub infraestrutura: i32,
    pub observacoes: Option<String>,
}

impl From<&survey_response::Model> for ResponseSnapshot {
    fn from(r: &survey_response::Model) -> Self {
        Self {
            id: r.id,
            data_criacao: r.created_at.to_rfc3339(),
            linha_itinerario: r.itinerary.clone(),
            pontualidade: r.punctuality,
            frequencia: r.frequency,
            conforto: r.comfort,
            atendimento: r.service,
            infraestrutura: r.infrastructure,
            observacoes: r.comment.clone(),
        }
    }
}

/// A synthesized report, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    pub line_id: String,
    pub created_at: DateTime<FixedOffset>,
    pub period_start: DateTime<FixedOffset>,
    pub period_end: DateTime<FixedOffset>,
    pub total_responses: usize,
    pub means: CategoryMeans,
    pub overall: f64,
    pub snapshots: Vec<ResponseSnapshot>,
    pub comments: Option<String>,
}

impl ReportDraft {
    pub fn rating(&self) -> Rating {
        Rating::classify(self.overall)
    }

    pub fn recommendations(&self) -> Vec<String> {
        recommendations(&self.means, self.overall)
    }
}

/// Aggregates `responses` into a report for `line_id`.
///
/// Returns `None` for an empty slice. Snapshot order follows the input order.
pub fn synthesize(
    line_id: &str,
    responses: &[survey_response::Model],
    created_at: DateTime<FixedOffset>,
) -> Option<ReportDraft> {
    let means = CategoryMeans::of(responses)?;
    let period_start = responses.iter().map(|r| r.created_at).min()?;
    let period_end = responses.iter().map(|r| r.created_at).max()?;

    let comments: Vec<String> = responses
        .iter()
        .filter_map(|r| r.comment.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(fence_separator)
        .collect();

    Some(ReportDraft {
        line_id: line_id.to_string(),
        created_at,
        period_start,
        period_end,
        total_responses: responses.len(),
        overall: means.overall(),
        means,
        snapshots: responses.iter().map(ResponseSnapshot::from).collect(),
        comments: (!comments.is_empty()).then(|| comments.join(COMMENT_SEPARATOR)),
    })
}

/// Rewrites lines equal to the separator's middle line so a single comment
/// never splits in two.
fn fence_separator(comment: &str) -> String {
    let line = COMMENT_SEPARATOR.trim();
    comment
        .split('\n')
        .map(|l| if l == line { FENCED_SEPARATOR_LINE } else { l })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits a stored comment block back into individual comments. Exact
/// inverse of the join done by [`synthesize`].
pub fn split_comments(comments: Option<&str>) -> Vec<String> {
    comments
        .map(|block| {
            block
                .split(COMMENT_SEPARATOR)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses the response snapshots embedded in a stored report.
pub fn snapshots_of(model: &report::Model) -> Result<Vec<ResponseSnapshot>, serde_json::Error> {
    serde_json::from_str(&model.responses_json)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// List view of a stored report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
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
    pub observacoes_count: usize,
    pub recomendacoes: Vec<String>,
    pub processado: bool,
}

impl From<&report::Model> for ReportSummary {
    fn from(m: &report::Model) -> Self {
        let means = CategoryMeans::from(m);
        Self {
            id: m.id,
            linha_numero: m.line_id.clone(),
            data_criacao: m.created_at,
            periodo_inicio: m.period_start,
            periodo_fim: m.period_end,
            total_pesquisas: m.total_responses,
            media_pontualidade: round1(m.mean_punctuality),
            media_frequencia: round1(m.mean_frequency),
            media_conforto: round1(m.mean_comfort),
            media_atendimento: round1(m.mean_service),
            media_infraestrutura: round1(m.mean_infrastructure),
            media_geral: round1(m.mean_overall),
            classificacao_geral: Rating::classify(m.mean_overall),
            observacoes_count: split_comments(m.comments.as_deref()).len(),
            recomendacoes: recommendations(&means, m.mean_overall),
            processado: m.processed,
        }
    }
}

/// Full view: the summary plus the embedded responses and comments.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDetail {
    #[serde(flatten)]
    pub summary: ReportSummary,
    pub pesquisas: Vec<ResponseSnapshot>,
    pub observacoes_lista: Vec<String>,
}

impl TryFrom<&report::Model> for ReportDetail {
    type Error = serde_json::Error;

    fn try_from(m: &report::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            summary: ReportSummary::from(m),
            pesquisas: snapshots_of(m)?,
            observacoes_lista: split_comments(m.comments.as_deref()),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    pub(crate) fn response(
        id: i32,
        ratings: [i32; 5],
        comment: Option<&str>,
        minutes: i64,
    ) -> survey_response::Model {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        survey_response::Model {
            id,
            line_id: "101".to_string(),
            itinerary: Some("Centro - Bairro".to_string()),
            punctuality: ratings[0],
            frequency: ratings[1],
            comfort: ratings[2],
            service: ratings[3],
            infrastructure: ratings[4],
            comment: comment.map(str::to_string),
            created_at: (base + Duration::minutes(minutes)).fixed_offset(),
        }
    }

    fn now() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap().fixed_offset()
    }

    #[test]
    fn classification_bands_are_inclusive_on_the_lower_edge() {
        assert_eq!(classify_score(10.0), "Excellent");
        assert_eq!(classify_score(9.0), "Excellent");
        assert_eq!(classify_score(8.99), "Good");
        assert_eq!(classify_score(7.0), "Good");
        assert_eq!(classify_score(4.0), "Regular");
        assert_eq!(classify_score(3.99), "Poor");
        assert_eq!(classify_score(1.0), "Poor");
    }

    #[test]
    fn line_101_example() {
        let responses: Vec<_> = (0..10)
            .map(|i| response(i + 1, [10, 5, 5, 5, 5], None, i64::from(i)))
            .collect();
        let draft = synthesize("101", &responses, now()).unwrap();

        assert_eq!(draft.means.punctuality, 10.0);
        assert_eq!(draft.means.frequency, 5.0);
        assert_eq!(draft.means.comfort, 5.0);
        assert_eq!(draft.means.service, 5.0);
        assert_eq!(draft.means.infrastructure, 5.0);
        assert_eq!(draft.overall, 6.0);
        assert_eq!(draft.rating(), Rating::Regular);

        let recs = draft.recommendations();
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|r| !r.contains("Punctuality")));
        assert!(recs.iter().any(|r| r.contains("Frequency")));
        assert!(recs.iter().any(|r| r.contains("Comfort")));
        assert!(recs.iter().any(|r| r.contains("Service")));
        assert!(recs.iter().any(|r| r.contains("Infrastructure")));
        assert!(!recs.iter().any(|r| r.contains("Congratulations")));
    }

    #[test]
    fn overall_is_mean_of_category_means() {
        let responses = vec![
            response(1, [10, 2, 7, 3, 9], None, 0),
            response(2, [6, 4, 1, 8, 5], None, 1),
            response(3, [8, 9, 3, 2, 10], None, 2),
        ];
        let draft = synthesize("101", &responses, now()).unwrap();
        let expected = (8.0 + 5.0 + 11.0 / 3.0 + 13.0 / 3.0 + 8.0) / 5.0;
        assert!((draft.overall - expected).abs() < 1e-12);
        assert!((draft.overall - draft.means.overall()).abs() < 1e-12);
    }

    #[test]
    fn warnings_and_praise_can_co_occur() {
        let responses = vec![response(1, [10, 10, 10, 10, 5], None, 0)];
        let draft = synthesize("101", &responses, now()).unwrap();
        assert_eq!(draft.overall, 9.0);
        let recs = draft.recommendations();
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("Infrastructure"));
        assert!(recs[1].contains("Congratulations"));
    }

    #[test]
    fn period_bounds_ignore_input_order() {
        let responses = vec![
            response(3, [5; 5], None, 30),
            response(1, [5; 5], None, 0),
            response(2, [5; 5], None, 90),
        ];
        let draft = synthesize("101", &responses, now()).unwrap();
        assert_eq!(draft.period_start, responses[1].created_at);
        assert_eq!(draft.period_end, responses[2].created_at);
        assert_eq!(draft.total_responses, 3);
        assert_eq!(draft.created_at, now());
    }

    #[test]
    fn comments_are_trimmed_and_empty_ones_dropped() {
        let responses = vec![
            response(1, [5; 5], Some("  late again  "), 0),
            response(2, [5; 5], Some("   "), 1),
            response(3, [5; 5], None, 2),
            response(4, [5; 5], Some("dirty seats"), 3),
        ];
        let draft = synthesize("101", &responses, now()).unwrap();
        assert_eq!(draft.comments.as_deref(), Some("late again\n---\ndirty seats"));
        assert_eq!(
            split_comments(draft.comments.as_deref()),
            vec!["late again", "dirty seats"]
        );

        let silent = synthesize("101", &responses[1..3], now()).unwrap();
        assert_eq!(silent.comments, None);
        assert!(split_comments(None).is_empty());
    }

    #[test]
    fn separator_inside_a_comment_stays_one_comment() {
        let responses = vec![
            response(1, [5; 5], Some("a \n---\n b"), 0),
            response(2, [5; 5], Some("---\nleading"), 1),
            response(3, [5; 5], Some("trailing\n---"), 2),
        ];
        let draft = synthesize("101", &responses, now()).unwrap();
        let split = split_comments(draft.comments.as_deref());
        assert_eq!(split, vec!["a \n- - -\n b", "- - -\nleading", "trailing\n- - -"]);
        assert_eq!(split.join(COMMENT_SEPARATOR), draft.comments.unwrap());
    }

    #[test]
    fn snapshots_carry_iso_timestamps() {
        let responses = vec![response(7, [1, 2, 3, 4, 5], Some("ok"), 0)];
        let draft = synthesize("101", &responses, now()).unwrap();
        let snap = &draft.snapshots[0];
        assert_eq!(snap.id, 7);
        assert_eq!(snap.data_criacao, "2025-03-01T08:00:00+00:00");
        assert_eq!(snap.atendimento, 4);
        assert_eq!(snap.observacoes.as_deref(), Some("ok"));
    }

    #[test]
    fn empty_input_yields_no_report() {
        assert!(synthesize("101", &[], now()).is_none());
    }

    #[test]
    fn summary_rounds_only_for_presentation() {
        let model = report::Model {
            id: 1,
            line_id: "101".into(),
            created_at: now(),
            period_start: now(),
            period_end: now(),
            total_responses: 3,
            mean_punctuality: 20.0 / 3.0,
            mean_frequency: 5.0,
            mean_comfort: 5.0,
            mean_service: 5.0,
            mean_infrastructure: 5.0,
            mean_overall: (20.0 / 3.0 + 20.0) / 5.0,
            responses_json: "[]".into(),
            comments: Some("a\n---\nb".into()),
            processed: true,
        };
        let summary = ReportSummary::from(&model);
        assert_eq!(summary.media_pontualidade, 6.7);
        assert_eq!(summary.media_geral, 5.3);
        assert_eq!(summary.classificacao_geral, Rating::Regular);
        assert_eq!(summary.observacoes_count, 2);
        assert_eq!(summary.recomendacoes.len(), 4);
    }
}
