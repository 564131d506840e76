use crate::models::paper::{ComposedPaper, PaperMeta};
use crate::models::question::CandidateQuestion;
use chrono::{DateTime, Utc};

/// Orders the selection into sections and numbers it.
///
/// The sort is stable: questions of one kind keep their selection order.
/// Numbering runs 1..=n across all sections.
pub fn compose(
    paper_id: String,
    meta: PaperMeta,
    created_at: DateTime<Utc>,
    mut selected: Vec<CandidateQuestion>,
) -> ComposedPaper {
    selected.sort_by_key(|q| q.kind.rank());
    for (idx, question) in selected.iter_mut().enumerate() {
        question.number = Some(idx + 1);
    }

    let total_marks = selected.iter().map(|q| q.marks as i64).sum();
    ComposedPaper {
        paper_id,
        meta,
        created_at,
        total_questions: selected.len(),
        total_marks,
        questions: selected,
    }
}
