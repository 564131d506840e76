use crate::models::question::CandidateQuestion;
use crate::models::question_type::QuestionKind;
use crate::models::quota::Quota;
use crate::utils::text::normalized_text_key;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub selected: Vec<CandidateQuestion>,
    /// Missing count per quota kind, in quota order. Satisfied kinds are absent.
    pub shortfall: Vec<(QuestionKind, usize)>,
    /// Normalized text of every selected question.
    pub used_texts: HashSet<String>,
}

impl Reconciliation {
    pub fn shortfall_for(&self, kind: &QuestionKind) -> usize {
        self.shortfall
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total_shortfall(&self) -> usize {
        self.shortfall.iter().map(|(_, n)| n).sum()
    }
}

/// Matches candidates against the quota.
///
/// Walks the quota in order and, for each canonical kind, takes up to the
/// required count of candidates of that kind in source order. A text already
/// taken by an earlier pick, under any kind, is skipped. Unrecognized quota
/// kinds match nothing and stay fully short. Selected questions get the
/// quota's marks and MCQ options are forced to exactly four.
pub fn reconcile(candidates: &[CandidateQuestion], quota: &Quota) -> Reconciliation {
    let mut selected = Vec::new();
    let mut shortfall = Vec::new();
    let mut used_texts = HashSet::new();

    for entry in quota.entries() {
        let mut taken = 0usize;
        let matchable = entry.kind.canonical().is_some();

        for candidate in candidates
            .iter()
            .filter(|c| matchable && c.kind == entry.kind)
        {
            if taken == entry.required_count {
                break;
            }
            if !used_texts.insert(normalized_text_key(&candidate.text)) {
                continue;
            }

            let mut picked = candidate.clone();
            picked.marks = entry.marks_per_question;
            picked.normalize_options();
            selected.push(picked);
            taken += 1;
        }

        if taken < entry.required_count {
            shortfall.push((entry.kind.clone(), entry.required_count - taken));
        }
    }

    Reconciliation {
        selected,
        shortfall,
        used_texts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::Provenance;
    use crate::models::question_type::{normalize, CanonicalQuestionType};
    use crate::models::quota::RequestedType;

    fn quota(items: &[(&str, i64, i64)]) -> Quota {
        Quota::build(
            items
                .iter()
                .map(|(label, count, marks)| RequestedType {
                    label: label.to_string(),
                    count: *count,
                    marks: *marks,
                })
                .collect(),
            vec![],
        )
        .unwrap()
    }

    fn q(label: &str, text: &str) -> CandidateQuestion {
        CandidateQuestion::new(label, text, 0, Provenance::Generated)
    }

    #[test]
    fn never_exceeds_required_count_per_kind() {
        let quota = quota(&[("MCQ", 2, 1), ("Short Answer", 1, 3)]);
        let candidates: Vec<_> = (0..5)
            .map(|i| q("MCQ", &format!("mcq {i}")))
            .chain((0..3).map(|i| q("Short", &format!("short {i}"))))
            .collect();

        let result = reconcile(&candidates, &quota);
        for entry in quota.entries() {
            let count = result.selected.iter().filter(|c| c.kind == entry.kind).count();
            assert!(count <= entry.required_count);
        }
        assert_eq!(result.selected.len(), 3);
        assert!(result.shortfall.is_empty());
    }

    #[test]
    fn keeps_source_order_within_a_kind() {
        let quota = quota(&[("MCQ", 2, 1)]);
        let candidates = vec![q("MCQ", "first"), q("MCQ", "second"), q("MCQ", "third")];
        let result = reconcile(&candidates, &quota);
        let texts: Vec<_> = result.selected.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn duplicate_text_is_selected_once_across_kinds() {
        let quota = quota(&[("MCQ", 2, 1), ("Short Answer", 2, 3)]);
        let candidates = vec![
            q("MCQ", "What is an atom?"),
            q("Short Answer", "  what is  an ATOM? "),
            q("Short Answer", "Define molecule."),
        ];
        let result = reconcile(&candidates, &quota);

        let keys: Vec<_> = result.selected.iter().map(|c| normalized_text_key(&c.text)).collect();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
        assert_eq!(result.selected[0].kind, normalize("MCQ"));
        assert_eq!(result.shortfall_for(&normalize("MCQ")), 1);
        assert_eq!(result.shortfall_for(&normalize("Short Answer")), 1);
    }

    #[test]
    fn scenario_duplicate_mcq_leaves_one_short() {
        let quota = quota(&[("MCQ", 2, 1), ("Short Answer", 1, 3)]);
        let mut mcq = q("MCQ", "Which gas do plants absorb?");
        mcq.options = vec!["O2".into(), "CO2".into(), "N2".into(), "H2".into()];
        let candidates = vec![
            mcq.clone(),
            q("MCQ", "which gas do plants absorb?"),
            q("Short Answer", "Explain transpiration."),
        ];

        let result = reconcile(&candidates, &quota);
        let mcqs: Vec<_> = result.selected.iter().filter(|c| c.kind.is_mcq()).collect();
        assert_eq!(mcqs.len(), 1);
        assert_eq!(result.shortfall, vec![(normalize("MCQ"), 1)]);
        assert_eq!(result.shortfall_for(&normalize("Short Answer")), 0);
    }

    #[test]
    fn selected_items_take_quota_marks_and_four_options() {
        let quota = quota(&[("MCQ", 3, 2)]);
        let mut two = q("MCQ", "two options");
        two.options = vec!["a".into(), "b".into()];
        let mut six = q("MCQ", "six options");
        six.options = (0..6).map(|i| i.to_string()).collect();
        let none = q("MCQ", "no options");

        let result = reconcile(&[two, six, none], &quota);
        assert_eq!(result.selected.len(), 3);
        for selected in &result.selected {
            assert_eq!(selected.options.len(), 4);
            assert_eq!(selected.marks, 2);
        }
    }

    #[test]
    fn empty_draft_is_full_shortfall() {
        let quota = quota(&[("MCQ", 2, 1), ("Long", 1, 5)]);
        let result = reconcile(&[], &quota);
        assert!(result.selected.is_empty());
        assert_eq!(result.total_shortfall(), 3);
        assert_eq!(
            result.shortfall[1],
            (QuestionKind::Canonical(CanonicalQuestionType::LongAnswer), 1)
        );
    }

    #[test]
    fn unrecognized_quota_kinds_never_match() {
        let quota = quota(&[("Essay", 2, 5)]);
        let result = reconcile(&[q("Essay", "Write about monsoon."), q("Long", "x")], &quota);
        assert!(result.selected.is_empty());
        assert_eq!(result.shortfall, vec![(normalize("Essay"), 2)]);
    }
}
