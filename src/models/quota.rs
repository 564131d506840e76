use crate::error::GenerationError;
use crate::models::question_type::{normalize, QuestionKind};
use serde::{Deserialize, Serialize};

/// Largest count accepted for a single question type, after merging synonyms.
pub const MAX_COUNT_PER_TYPE: usize = 100;
/// Largest number of questions in one paper.
pub const MAX_TOTAL_QUESTIONS: usize = 500;
/// Largest marks value accepted for one question.
pub const MAX_MARKS_PER_QUESTION: i64 = 100;

/// One entry of the submitted question distribution, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedType {
    pub label: String,
    pub count: i64,
    pub marks: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaEntry {
    pub kind: QuestionKind,
    pub required_count: usize,
    pub marks_per_question: i32,
    /// Advisory only; never enforced during reconciliation.
    pub difficulty_target: String,
}

/// The validated distribution for one generation request.
///
/// Entries are keyed by normalized kind and keep the order in which their
/// first label was submitted; that order also defines section order in the
/// generation prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quota {
    requested: Vec<RequestedType>,
    entries: Vec<QuotaEntry>,
    difficulty: Vec<(String, f64)>,
}

impl Quota {
    /// Builds a quota from the submitted distributions.
    ///
    /// Labels that normalize to the same kind are merged by summing their
    /// counts; they must agree on marks. Counts are capped per kind at
    /// `MAX_COUNT_PER_TYPE` and in total at `MAX_TOTAL_QUESTIONS`.
    pub fn build(
        requested: Vec<RequestedType>,
        difficulty: Vec<(String, f64)>,
    ) -> Result<Self, GenerationError> {
        let difficulty_target = dominant_difficulty(&difficulty);
        let mut entries: Vec<QuotaEntry> = Vec::new();

        for item in &requested {
            if item.count < 0 {
                return Err(GenerationError::InvalidQuota(format!(
                    "count for '{}' must not be negative (got {})",
                    item.label, item.count
                )));
            }
            if item.count > MAX_COUNT_PER_TYPE as i64 {
                return Err(GenerationError::InvalidQuota(format!(
                    "count for '{}' must be at most {} (got {})",
                    item.label, MAX_COUNT_PER_TYPE, item.count
                )));
            }
            if item.marks <= 0 {
                return Err(GenerationError::InvalidQuota(format!(
                    "marks for '{}' must be positive (got {})",
                    item.label, item.marks
                )));
            }
            if item.marks > MAX_MARKS_PER_QUESTION {
                return Err(GenerationError::InvalidQuota(format!(
                    "marks for '{}' must be at most {} (got {})",
                    item.label, MAX_MARKS_PER_QUESTION, item.marks
                )));
            }
            let marks = item.marks as i32;
            let count = item.count as usize;

            let kind = normalize(&item.label);
            match entries.iter_mut().find(|e| e.kind == kind) {
                Some(existing) if existing.marks_per_question != marks => {
                    return Err(GenerationError::InvalidQuota(format!(
                        "'{}' requested with conflicting marks {} and {}",
                        kind, existing.marks_per_question, marks
                    )));
                }
                Some(existing) => {
                    existing.required_count = existing
                        .required_count
                        .checked_add(count)
                        .filter(|merged| *merged <= MAX_COUNT_PER_TYPE)
                        .ok_or_else(|| {
                            GenerationError::InvalidQuota(format!(
                                "'{}' requested more than {} times",
                                kind, MAX_COUNT_PER_TYPE
                            ))
                        })?;
                }
                None => entries.push(QuotaEntry {
                    kind,
                    required_count: count,
                    marks_per_question: marks,
                    difficulty_target: difficulty_target.clone(),
                }),
            }
        }

        let total = entries.iter().map(|e| e.required_count).sum::<usize>();
        if total > MAX_TOTAL_QUESTIONS {
            return Err(GenerationError::InvalidQuota(format!(
                "a paper holds at most {} questions (got {})",
                MAX_TOTAL_QUESTIONS, total
            )));
        }

        Ok(Self {
            requested,
            entries,
            difficulty,
        })
    }

    pub fn entries(&self) -> &[QuotaEntry] {
        &self.entries
    }

    /// The distribution exactly as submitted, for prompt text.
    pub fn requested(&self) -> &[RequestedType] {
        &self.requested
    }

    pub fn difficulty(&self) -> &[(String, f64)] {
        &self.difficulty
    }

    pub fn entry(&self, kind: &QuestionKind) -> Option<&QuotaEntry> {
        self.entries.iter().find(|e| &e.kind == kind)
    }

    pub fn total_required(&self) -> usize {
        self.entries.iter().map(|e| e.required_count).sum()
    }

    pub fn total_marks(&self) -> i64 {
        self.entries
            .iter()
            .map(|e| e.required_count as i64 * e.marks_per_question as i64)
            .sum()
    }
}

fn dominant_difficulty(difficulty: &[(String, f64)]) -> String {
    difficulty
        .iter()
        .filter(|(_, weight)| weight.is_finite())
        .fold(None::<&(String, f64)>, |best, item| match best {
            Some(b) if b.1 >= item.1 => Some(b),
            _ => Some(item),
        })
        .map(|(label, _)| label.clone())
        .unwrap_or_else(|| "Medium".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question_type::CanonicalQuestionType;

    fn req(label: &str, count: i64, marks: i64) -> RequestedType {
        RequestedType {
            label: label.to_string(),
            count,
            marks,
        }
    }

    #[test]
    fn keeps_submitted_order_and_canonical_keys() {
        let quota = Quota::build(
            vec![req("Short Answer", 2, 3), req("MCQ", 5, 1), req("Essay", 1, 5)],
            vec![],
        )
        .unwrap();

        let kinds: Vec<_> = quota.entries().iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                QuestionKind::Canonical(CanonicalQuestionType::ShortAnswer),
                QuestionKind::Canonical(CanonicalQuestionType::MultipleChoice),
                QuestionKind::Unrecognized("Essay".into()),
            ]
        );
        assert_eq!(quota.requested()[0].label, "Short Answer");
        assert_eq!(quota.total_required(), 8);
        assert_eq!(quota.total_marks(), 2 * 3 + 5 + 5);
    }

    #[test]
    fn rejects_negative_counts() {
        let err = Quota::build(vec![req("MCQ", -1, 1)], vec![]).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidQuota(_)));
    }

    #[test]
    fn rejects_non_positive_marks() {
        assert!(Quota::build(vec![req("MCQ", 1, 0)], vec![]).is_err());
        assert!(Quota::build(vec![req("MCQ", 1, -2)], vec![]).is_err());
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let huge = Quota::build(vec![req("MCQ", 1 << 40, 1)], vec![]).unwrap_err();
        assert!(matches!(huge, GenerationError::InvalidQuota(_)));

        let at_cap = Quota::build(vec![req("MCQ", MAX_COUNT_PER_TYPE as i64, 1)], vec![]).unwrap();
        assert_eq!(at_cap.total_required(), MAX_COUNT_PER_TYPE);

        // each label is within the cap, the merged kind is not
        let merged = Quota::build(
            vec![req("MCQ", 60, 1), req("Multiple Choice", 60, 1)],
            vec![],
        );
        assert!(merged.is_err());

        let labels = ["MCQ", "Fill", "Short", "Long", "Case Study", "True/False"];
        let many: Vec<_> = labels.iter().map(|l| req(l, 100, 1)).collect();
        assert!(matches!(
            Quota::build(many, vec![]),
            Err(GenerationError::InvalidQuota(_))
        ));
    }

    #[test]
    fn oversized_marks_are_rejected() {
        assert!(Quota::build(vec![req("MCQ", 1, MAX_MARKS_PER_QUESTION + 1)], vec![]).is_err());
        assert!(Quota::build(vec![req("MCQ", 1, i64::MAX)], vec![]).is_err());
        assert!(Quota::build(vec![req("MCQ", 1, MAX_MARKS_PER_QUESTION)], vec![]).is_ok());
    }

    #[test]
    fn zero_count_is_valid() {
        let quota = Quota::build(vec![req("Long", 0, 5)], vec![]).unwrap();
        assert_eq!(quota.total_required(), 0);
    }

    #[test]
    fn synonyms_are_merged() {
        let quota = Quota::build(vec![req("MCQ", 2, 1), req("Multiple Choice", 3, 1)], vec![]).unwrap();
        assert_eq!(quota.entries().len(), 1);
        assert_eq!(quota.entries()[0].required_count, 5);

        let conflict = Quota::build(vec![req("MCQ", 2, 1), req("Multiple Choice", 3, 2)], vec![]);
        assert!(conflict.is_err());
    }

    #[test]
    fn difficulty_target_is_the_heaviest_label() {
        let quota = Quota::build(
            vec![req("MCQ", 1, 1)],
            vec![("Easy".into(), 30.0), ("Hard".into(), 50.0), ("Medium".into(), 20.0)],
        )
        .unwrap();
        assert_eq!(quota.entries()[0].difficulty_target, "Hard");

        let default = Quota::build(vec![req("MCQ", 1, 1)], vec![]).unwrap();
        assert_eq!(default.entries()[0].difficulty_target, "Medium");
    }
}
