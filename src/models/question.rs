use crate::models::question_type::{normalize, QuestionKind};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;

pub const MCQ_OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Generated,
    BankSourced,
    Synthesized,
}

impl Provenance {
    /// Value written to `questions.source`.
    pub fn as_source(&self) -> &'static str {
        match self {
            Provenance::Generated => "ai",
            Provenance::BankSourced => "bank",
            Provenance::Synthesized => "synthetic",
        }
    }
}

/// A question on its way into a paper, whatever its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// Bank row id, once the question has one.
    #[serde(default)]
    pub id: Option<i32>,
    /// 1-based position in the composed paper.
    #[serde(default)]
    pub number: Option<usize>,
    pub type_label: String,
    pub kind: QuestionKind,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub marks: i32,
    pub difficulty: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    pub provenance: Provenance,
    #[serde(default)]
    pub chapter_id: Option<i32>,
}

impl CandidateQuestion {
    pub fn new(type_label: &str, text: impl Into<String>, marks: i32, provenance: Provenance) -> Self {
        Self {
            id: None,
            number: None,
            type_label: type_label.trim().to_string(),
            kind: normalize(type_label),
            text: text.into(),
            options: Vec::new(),
            marks,
            difficulty: "Medium".to_string(),
            answer: None,
            explanation: None,
            provenance,
            chapter_id: None,
        }
    }

    /// Enforces the options invariant: exactly four non-empty options for
    /// multiple choice, none for every other kind.
    pub fn normalize_options(&mut self) {
        if !self.kind.is_mcq() {
            self.options.clear();
            return;
        }
        self.options.truncate(MCQ_OPTION_COUNT);
        for (idx, option) in self.options.iter_mut().enumerate() {
            if option.trim().is_empty() {
                *option = placeholder_option(idx + 1);
            }
        }
        while self.options.len() < MCQ_OPTION_COUNT {
            let n = self.options.len() + 1;
            self.options.push(placeholder_option(n));
        }
    }
}

fn placeholder_option(n: usize) -> String {
    format!("Option {} (auto-filled)", n)
}

/// A `questions` row joined with its curriculum names.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BankQuestion {
    pub id: i32,
    pub chapter_id: i32,
    pub question_type: Option<String>,
    pub difficulty: Option<String>,
    pub marks: Option<i32>,
    pub question_text: Option<String>,
    pub options: Option<JsonValue>,
    pub answer: Option<String>,
    pub source: Option<String>,
    pub explanation: Option<String>,
    pub language: String,
    pub board: Option<String>,
    pub class_number: Option<i32>,
    pub subject: Option<String>,
    pub chapter: Option<String>,
}

impl BankQuestion {
    pub fn into_candidate(self) -> CandidateQuestion {
        let label = self.question_type.unwrap_or_default();
        let options: Vec<String> = self
            .options
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let mut candidate = CandidateQuestion::new(
            &label,
            self.question_text.unwrap_or_default(),
            self.marks.unwrap_or(1),
            Provenance::BankSourced,
        );
        candidate.id = Some(self.id);
        candidate.chapter_id = Some(self.chapter_id);
        candidate.options = options;
        candidate.difficulty = self.difficulty.unwrap_or_else(|| "Medium".to_string());
        candidate.answer = self.answer;
        candidate.explanation = self.explanation;
        candidate
    }
}

/// Values for one `questions` insert.
#[derive(Debug, Clone)]
pub struct NewBankQuestion {
    pub chapter_id: i32,
    pub question_type: String,
    pub difficulty: String,
    pub marks: i32,
    pub question_text: String,
    pub options: JsonValue,
    pub answer: Option<String>,
    pub source: String,
    pub explanation: Option<String>,
    pub language: String,
    pub text_hash: String,
}
