use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use validator::Validate;

use crate::error::{GenerationError, Result};
use crate::models::paper::{ComposedPaper, PaperMeta};
use crate::models::question::{CandidateQuestion, Provenance};
use crate::models::quota::RequestedType;
use crate::services::export_service::AnswerKeyFormat;
use crate::services::paper_service::{GenerateRequest, GeneratedPaper};
use crate::services::paper_store::ArtifactPaths;

fn default_language() -> String {
    "english".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePaperPayload {
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[serde(rename = "class")]
    #[validate(length(min = 1, max = 20))]
    pub class_name: String,
    #[validate(length(min = 1, max = 50))]
    pub school_board: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub school_name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub exam_name: String,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 10))]
    pub language: String,
    pub topic: Option<String>,
    #[serde(default)]
    pub chapters: Vec<String>,
    #[validate(length(min = 1, max = 50))]
    pub visitor_id: Option<String>,
    /// Label → `{count, marks}`, in submission order.
    #[serde(default)]
    pub question_distribution: Map<String, JsonValue>,
    /// Label → weight. Advisory only.
    #[serde(default)]
    pub difficulty_distribution: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub count: i64,
    pub marks: i64,
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl GeneratePaperPayload {
    pub fn into_request(self) -> Result<GenerateRequest> {
        let mut requested = Vec::with_capacity(self.question_distribution.len());
        for (label, value) in self.question_distribution {
            let entry: DistributionEntry = serde_json::from_value(value).map_err(|e| {
                GenerationError::InvalidQuota(format!("entry '{}' must be {{count, marks}}: {}", label, e))
            })?;
            requested.push(RequestedType {
                label,
                count: entry.count,
                marks: entry.marks,
            });
        }

        let mut difficulty = Vec::with_capacity(self.difficulty_distribution.len());
        for (label, value) in self.difficulty_distribution {
            match json_number(&value) {
                Some(weight) => difficulty.push((label, weight)),
                None => tracing::debug!(label = %label, "Ignoring non-numeric difficulty weight"),
            }
        }

        Ok(GenerateRequest {
            meta: PaperMeta {
                exam_name: self.exam_name.trim().to_string(),
                school_name: self.school_name.trim().to_string(),
                board: self.school_board.trim().to_string(),
                class_name: self.class_name.trim().to_string(),
                subject: self.subject.trim().to_string(),
                language: self.language.trim().to_lowercase(),
            },
            requested,
            difficulty,
            topic: self.topic.filter(|t| !t.trim().is_empty()),
            chapters: self
                .chapters
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            visitor_id: self.visitor_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Option<i32>,
    pub number: usize,
    pub text: String,
    pub options: Vec<String>,
    pub marks: i32,
    pub difficulty: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub provenance: Provenance,
}

impl From<&CandidateQuestion> for QuestionView {
    fn from(q: &CandidateQuestion) -> Self {
        Self {
            id: q.id,
            number: q.number.unwrap_or_default(),
            text: q.text.clone(),
            options: q.options.clone(),
            marks: q.marks,
            difficulty: q.difficulty.clone(),
            question_type: q.kind.as_str().to_string(),
            provenance: q.provenance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub total_questions: usize,
    pub total_marks: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperResponse {
    pub paper_id: String,
    pub exam_name: String,
    pub school_name: String,
    pub board: String,
    pub class: String,
    pub subject: String,
    pub language: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub questions: Vec<QuestionView>,
    pub summary: PaperSummary,
    pub pdf_url: String,
    pub word_url: String,
    pub answer_key_url: String,
}

impl PaperResponse {
    pub fn new(paper: &ComposedPaper, artifacts: &ArtifactPaths) -> Self {
        Self {
            paper_id: paper.paper_id.clone(),
            exam_name: paper.meta.exam_name.clone(),
            school_name: paper.meta.school_name.clone(),
            board: paper.meta.board.clone(),
            class: paper.meta.class_name.clone(),
            subject: paper.meta.subject.clone(),
            language: paper.meta.language.clone(),
            created_at: paper.created_at,
            questions: paper.questions.iter().map(QuestionView::from).collect(),
            summary: PaperSummary {
                total_questions: paper.total_questions,
                total_marks: paper.total_marks,
            },
            pdf_url: artifacts.pdf.clone(),
            word_url: artifacts.word.clone(),
            answer_key_url: artifacts.answer_key.clone(),
        }
    }
}

impl From<GeneratedPaper> for PaperResponse {
    fn from(generated: GeneratedPaper) -> Self {
        Self::new(&generated.paper, &generated.artifacts)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerKeyQuery {
    #[serde(default)]
    pub format: AnswerKeyFormat,
}
