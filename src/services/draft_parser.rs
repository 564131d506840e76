use crate::error::GenerationError;
use crate::models::question::{CandidateQuestion, Provenance};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::OnceLock;

static FENCED_JSON: OnceLock<Regex> = OnceLock::new();

fn fenced_json() -> &'static Regex {
    FENCED_JSON.get_or_init(|| {
        Regex::new(r"(?is)```\s*json\s*(.*?)```").expect("fenced json pattern is valid")
    })
}

/// One question as the model reported it, before validation.
#[derive(Debug, Deserialize)]
struct DraftItem {
    #[serde(rename = "type", alias = "question_type")]
    question_type: Option<String>,
    #[serde(alias = "question_text", alias = "text")]
    question: Option<String>,
    #[serde(default)]
    options: Option<JsonValue>,
    marks: Option<JsonValue>,
    difficulty: Option<JsonValue>,
    answer: Option<JsonValue>,
    explanation: Option<String>,
}

impl DraftItem {
    fn validate(self) -> Option<CandidateQuestion> {
        let label = self.question_type.filter(|t| !t.trim().is_empty())?;
        let text = self.question.map(|q| q.trim().to_string()).filter(|q| !q.is_empty())?;
        let marks = match self.marks {
            None | Some(JsonValue::Null) => 0,
            Some(value) => {
                let marks = json_to_i64(&value)?;
                if marks <= 0 {
                    return None;
                }
                i32::try_from(marks).ok()?
            }
        };

        let mut candidate = CandidateQuestion::new(&label, text, marks, Provenance::Generated);
        candidate.options = self.options.map(options_from_json).unwrap_or_default();
        let difficulty = self.difficulty.as_ref().and_then(json_to_text);
        candidate.difficulty = normalize_difficulty(difficulty.as_deref()).to_string();
        candidate.answer = self.answer.as_ref().and_then(json_to_text);
        candidate.explanation = self.explanation.filter(|e| !e.trim().is_empty());
        Some(candidate)
    }
}

fn json_to_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Options as the model sent them: an array, an object keyed by letter
/// (values in order), or one string separated by newlines or semicolons.
fn options_from_json(value: JsonValue) -> Vec<String> {
    match value {
        JsonValue::Array(items) => items.iter().filter_map(json_to_text).collect(),
        JsonValue::Object(map) => map.values().filter_map(json_to_text).collect(),
        JsonValue::String(s) => {
            let sep = if s.contains('\n') { '\n' } else { ';' };
            s.split(sep)
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Maps a free-text difficulty onto Easy, Medium or Hard. Unknown or
/// missing labels are Medium.
fn normalize_difficulty(label: Option<&str>) -> &'static str {
    let label = label.unwrap_or_default().to_lowercase();
    if ["hard", "difficult", "challeng", "advanced", "high"]
        .iter()
        .any(|k| label.contains(k))
    {
        "Hard"
    } else if ["easy", "simple", "basic", "low"].iter().any(|k| label.contains(k)) {
        "Easy"
    } else {
        "Medium"
    }
}

fn as_item_array(value: JsonValue) -> Option<Vec<JsonValue>> {
    match value {
        JsonValue::Array(items) => Some(items),
        JsonValue::Object(mut obj) => match obj.remove("questions") {
            Some(JsonValue::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn recover_array(raw: &str) -> Option<Vec<JsonValue>> {
    let trimmed = raw.trim();
    if let Some(items) = serde_json::from_str::<JsonValue>(trimmed).ok().and_then(as_item_array) {
        return Some(items);
    }
    let block = fenced_json().captures(trimmed)?.get(1)?.as_str().trim();
    serde_json::from_str::<JsonValue>(block).ok().and_then(as_item_array)
}

/// Extracts candidate questions from a raw model response.
///
/// Tries the whole response as JSON first, then the first fenced `json`
/// block. Items missing a type or question text are dropped one by one; a
/// response with no recoverable array, or whose items all fail validation,
/// is `MalformedDraft`.
pub fn parse(raw: &str) -> Result<Vec<CandidateQuestion>, GenerationError> {
    let items = recover_array(raw).ok_or(GenerationError::MalformedDraft)?;
    let total = items.len();

    let candidates: Vec<CandidateQuestion> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<DraftItem>(item).ok())
        .filter_map(DraftItem::validate)
        .collect();

    if total > 0 && candidates.is_empty() {
        return Err(GenerationError::MalformedDraft);
    }
    if candidates.len() < total {
        tracing::debug!(dropped = total - candidates.len(), "Dropped invalid draft items");
    }
    Ok(candidates)
}

/// `parse`, optionally degrading an unparseable response into a single
/// multiple-choice question carrying the raw text.
pub fn parse_with_text_fallback(
    raw: &str,
    text_fallback: bool,
) -> Result<Vec<CandidateQuestion>, GenerationError> {
    match parse(raw) {
        Err(GenerationError::MalformedDraft) if text_fallback && !raw.trim().is_empty() => {
            let mut candidate =
                CandidateQuestion::new("MCQ", raw.trim(), 1, Provenance::Generated);
            candidate.difficulty = "Medium".to_string();
            Ok(vec![candidate])
        }
        other => other,
    }
}
