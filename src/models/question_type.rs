use serde::{Deserialize, Serialize};
use std::fmt;

/// The six question categories used for quota matching and section order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalQuestionType {
    #[serde(rename = "mcq")]
    MultipleChoice,
    FillInBlank,
    ShortAnswer,
    LongAnswer,
    Matching,
    CaseStudy,
}

impl CanonicalQuestionType {
    /// Section order of a rendered paper.
    pub const ORDER: [CanonicalQuestionType; 6] = [
        CanonicalQuestionType::MultipleChoice,
        CanonicalQuestionType::FillInBlank,
        CanonicalQuestionType::ShortAnswer,
        CanonicalQuestionType::LongAnswer,
        CanonicalQuestionType::Matching,
        CanonicalQuestionType::CaseStudy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalQuestionType::MultipleChoice => "mcq",
            CanonicalQuestionType::FillInBlank => "fill_in_blank",
            CanonicalQuestionType::ShortAnswer => "short_answer",
            CanonicalQuestionType::LongAnswer => "long_answer",
            CanonicalQuestionType::Matching => "matching",
            CanonicalQuestionType::CaseStudy => "case_study",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CanonicalQuestionType::MultipleChoice => "Multiple Choice",
            CanonicalQuestionType::FillInBlank => "Fill in the Blanks",
            CanonicalQuestionType::ShortAnswer => "Short Answer",
            CanonicalQuestionType::LongAnswer => "Long Answer",
            CanonicalQuestionType::Matching => "Match the Following",
            CanonicalQuestionType::CaseStudy => "Case Study",
        }
    }

    pub fn section_title(&self) -> &'static str {
        match self {
            CanonicalQuestionType::MultipleChoice => "Multiple Choice Questions",
            CanonicalQuestionType::FillInBlank => "Fill in the Blanks",
            CanonicalQuestionType::ShortAnswer => "Short Answer Questions",
            CanonicalQuestionType::LongAnswer => "Long Answer Questions",
            CanonicalQuestionType::Matching => "Match the Following",
            CanonicalQuestionType::CaseStudy => "Case Study Questions",
        }
    }

    pub fn rank(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|t| t == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// Every label that normalizes to this type, including the stored tag.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            CanonicalQuestionType::MultipleChoice => &["MCQ", "Multiple Choice", "mcq"],
            CanonicalQuestionType::FillInBlank => &["Fill in the Blanks", "Fill", "fill_in_blank"],
            CanonicalQuestionType::ShortAnswer => &["Short Answer", "Short", "short_answer"],
            CanonicalQuestionType::LongAnswer => &["Long Answer", "Long", "long_answer"],
            CanonicalQuestionType::Matching => &["Matching", "Match", "Match the Following", "matching"],
            CanonicalQuestionType::CaseStudy => &["Case Study", "Case", "case_study"],
        }
    }
}

/// A question type as the rest of the system sees it: either one of the
/// canonical categories or the trimmed label that matched none of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionKind {
    Canonical(CanonicalQuestionType),
    Unrecognized(String),
}

impl QuestionKind {
    pub fn canonical(&self) -> Option<CanonicalQuestionType> {
        match self {
            QuestionKind::Canonical(t) => Some(*t),
            QuestionKind::Unrecognized(_) => None,
        }
    }

    pub fn is_mcq(&self) -> bool {
        matches!(self, QuestionKind::Canonical(CanonicalQuestionType::MultipleChoice))
    }

    /// Sort rank; unrecognized kinds sort after every canonical section.
    pub fn rank(&self) -> usize {
        match self {
            QuestionKind::Canonical(t) => t.rank(),
            QuestionKind::Unrecognized(_) => CanonicalQuestionType::ORDER.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            QuestionKind::Canonical(t) => t.as_str(),
            QuestionKind::Unrecognized(label) => label,
        }
    }

    pub fn section_title(&self) -> String {
        match self {
            QuestionKind::Canonical(t) => t.section_title().to_string(),
            QuestionKind::Unrecognized(label) => format!("{} Questions", label),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a free-text type label onto a canonical type.
///
/// Matching is case-sensitive on the trimmed label. Labels outside the
/// synonym table come back as `Unrecognized` so that quota matching simply
/// never selects them.
pub fn normalize(label: &str) -> QuestionKind {
    let trimmed = label.trim();
    let canonical = match trimmed {
        "MCQ" | "Multiple Choice" | "mcq" => Some(CanonicalQuestionType::MultipleChoice),
        "Fill in the Blanks" | "Fill" | "fill_in_blank" => Some(CanonicalQuestionType::FillInBlank),
        "Short Answer" | "Short" | "short_answer" => Some(CanonicalQuestionType::ShortAnswer),
        "Long Answer" | "Long" | "long_answer" => Some(CanonicalQuestionType::LongAnswer),
        "Matching" | "Match" | "Match the Following" | "matching" => {
            Some(CanonicalQuestionType::Matching)
        }
        "Case Study" | "Case" | "case_study" => Some(CanonicalQuestionType::CaseStudy),
        _ => None,
    };

    match canonical {
        Some(t) => QuestionKind::Canonical(t),
        None => QuestionKind::Unrecognized(trimmed.to_string()),
    }
}
