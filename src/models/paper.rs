use crate::models::question::CandidateQuestion;
use crate::models::question_type::QuestionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

/// Header fields of a paper, taken from the generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMeta {
    pub exam_name: String,
    pub school_name: String,
    pub board: String,
    pub class_name: String,
    pub subject: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedPaper {
    pub paper_id: String,
    #[serde(flatten)]
    pub meta: PaperMeta,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<CandidateQuestion>,
    pub total_questions: usize,
    pub total_marks: i64,
}

/// A run of consecutive questions sharing one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Section<'a> {
    pub kind: &'a QuestionKind,
    pub questions: &'a [CandidateQuestion],
}

impl ComposedPaper {
    /// Splits the ordered question list into one section per kind.
    pub fn sections(&self) -> Vec<Section<'_>> {
        let mut sections = Vec::new();
        let mut start = 0;
        for idx in 1..=self.questions.len() {
            if idx == self.questions.len() || self.questions[idx].kind != self.questions[start].kind {
                sections.push(Section {
                    kind: &self.questions[start].kind,
                    questions: &self.questions[start..idx],
                });
                start = idx;
            }
        }
        sections
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Paper {
    pub id: i32,
    pub paper_id: String,
    pub exam_name: Option<String>,
    pub school_name: Option<String>,
    pub board: Option<String>,
    pub class_: Option<String>,
    pub subject: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub total_questions: Option<i32>,
    pub total_marks: Option<i32>,
    pub pdf_path: Option<String>,
    pub word_path: Option<String>,
    pub answer_key_path: Option<String>,
    pub visitor_id: Option<String>,
    pub snapshot: JsonValue,
}
