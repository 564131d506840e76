use crate::error::Result;
use crate::models::question::{BankQuestion, CandidateQuestion, Provenance};
use crate::models::question_type::{CanonicalQuestionType, QuestionKind};
use crate::models::quota::Quota;
use crate::utils::text::normalized_text_key;
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;

/// How far a bank lookup is narrowed, most precise first.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeFilter {
    Chapters(Vec<i32>),
    Topic {
        topic: String,
        board: String,
        class_name: String,
        subject: String,
    },
    SubjectClass {
        board: String,
        class_name: String,
        subject: String,
    },
}

impl ScopeFilter {
    /// Picks the most precise filter the request allows.
    pub fn select(
        chapter_ids: &[i32],
        topic: Option<&str>,
        board: &str,
        class_name: &str,
        subject: &str,
    ) -> Self {
        if !chapter_ids.is_empty() {
            return ScopeFilter::Chapters(chapter_ids.to_vec());
        }
        match topic.map(str::trim).filter(|t| !t.is_empty()) {
            Some(topic) => ScopeFilter::Topic {
                topic: topic.to_string(),
                board: board.to_string(),
                class_name: class_name.to_string(),
                subject: subject.to_string(),
            },
            None => ScopeFilter::SubjectClass {
                board: board.to_string(),
                class_name: class_name.to_string(),
                subject: subject.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankScope {
    pub language: String,
    pub filter: ScopeFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankQuery {
    pub question_type: CanonicalQuestionType,
    pub marks: i32,
    pub language: String,
    pub scope: ScopeFilter,
    pub limit: i64,
}

/// Read access to the persisted question bank.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Rows matching the query, in no particular order, at most `limit`.
    async fn find_candidates(&self, query: &BankQuery) -> Result<Vec<BankQuestion>>;

    /// Chapter ids under board/class/subject whose English or Hindi title is
    /// one of `names`.
    async fn resolve_chapter_ids(
        &self,
        board: &str,
        class_name: &str,
        subject: &str,
        names: &[String],
    ) -> Result<Vec<i32>>;
}

/// Pulls the class number out of labels such as "8", "Class 8" or "VIII-8".
pub fn class_number(class_name: &str) -> Option<i32> {
    let digits: String = class_name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Escapes `ILIKE` wildcards so the topic matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct PgQuestionBank {
    pool: PgPool,
}

impl PgQuestionBank {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuestionBank for PgQuestionBank {
    async fn find_candidates(&self, query: &BankQuery) -> Result<Vec<BankQuestion>> {
        let labels: Vec<String> = query
            .question_type
            .labels()
            .iter()
            .map(|l| l.to_string())
            .collect();

        let (chapter_ids, topic, board, class_no, subject) = match &query.scope {
            ScopeFilter::Chapters(ids) => (Some(ids.clone()), None, None, None, None),
            ScopeFilter::Topic {
                topic,
                board,
                class_name,
                subject,
            } => (
                None,
                Some(format!("%{}%", escape_like(topic))),
                Some(board.clone()),
                class_number(class_name),
                Some(subject.clone()),
            ),
            ScopeFilter::SubjectClass {
                board,
                class_name,
                subject,
            } => (
                None,
                None,
                Some(board.clone()),
                class_number(class_name),
                Some(subject.clone()),
            ),
        };

        let rows = sqlx::query_as::<_, BankQuestion>(
            r#"
            SELECT
                q.id, q.chapter_id, q.question_type, q.difficulty, q.marks,
                q.question_text, q.options, q.answer, q.source, q.explanation, q.language,
                b.name AS board, c.class_number, s.name_en AS subject, ch.title_en AS chapter
            FROM questions q
            JOIN chapters ch ON ch.chapter_id = q.chapter_id
            JOIN subjects s ON s.subject_id = ch.subject_id
            JOIN classes c ON c.class_id = s.class_id
            JOIN boards b ON b.board_id = c.board_id
            WHERE q.question_type = ANY($1)
              AND q.marks = $2
              AND q.language = $3
              AND ($4::int[] IS NULL OR q.chapter_id = ANY($4))
              AND ($5::text IS NULL OR q.question_text ILIKE $5 ESCAPE '\')
              AND ($6::text IS NULL OR LOWER(b.name) = LOWER($6))
              AND ($7::int IS NULL OR c.class_number = $7)
              AND ($8::text IS NULL OR LOWER(s.name_en) = LOWER($8) OR s.name_hi = $8)
            ORDER BY RANDOM()
            LIMIT $9
            "#,
        )
        .bind(labels)
        .bind(query.marks)
        .bind(&query.language)
        .bind(chapter_ids)
        .bind(topic)
        .bind(board)
        .bind(class_no)
        .bind(subject)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn resolve_chapter_ids(
        &self,
        board: &str,
        class_name: &str,
        subject: &str,
        names: &[String],
    ) -> Result<Vec<i32>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT ch.chapter_id
            FROM chapters ch
            JOIN subjects s ON s.subject_id = ch.subject_id
            JOIN classes c ON c.class_id = s.class_id
            JOIN boards b ON b.board_id = c.board_id
            WHERE LOWER(b.name) = LOWER($1)
              AND ($2::int IS NULL OR c.class_number = $2)
              AND (LOWER(s.name_en) = LOWER($3) OR s.name_hi = $3)
              AND (ch.title_en = ANY($4) OR ch.title_hi = ANY($4))
            ORDER BY ch.chapter_number NULLS LAST, ch.chapter_id
            "#,
        )
        .bind(board)
        .bind(class_number(class_name))
        .bind(subject)
        .bind(names.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

/// Fills quota gaps from the bank, then with synthesized placeholders.
#[derive(Clone)]
pub struct FallbackSourcer {
    bank: Arc<dyn QuestionBank>,
    synthetic_marks: i32,
}

impl FallbackSourcer {
    /// Bank rows requested per missing question, to absorb dedup losses.
    const OVER_FETCH: usize = 2;

    pub fn new(bank: Arc<dyn QuestionBank>, synthetic_marks: i32) -> Self {
        Self {
            bank,
            synthetic_marks: synthetic_marks.max(1),
        }
    }

    /// Up to `count` bank questions of `kind` worth `marks` each, skipping any
    /// whose normalized text is already in `used`. Accepted texts are added
    /// to `used`. A failing bank lookup yields no questions.
    pub async fn fill_shortfall(
        &self,
        kind: &QuestionKind,
        marks: i32,
        count: usize,
        scope: &BankScope,
        used: &mut HashSet<String>,
    ) -> Vec<CandidateQuestion> {
        let Some(question_type) = kind.canonical() else {
            return Vec::new();
        };
        if count == 0 {
            return Vec::new();
        }

        let query = BankQuery {
            question_type,
            marks,
            language: scope.language.clone(),
            scope: scope.filter.clone(),
            limit: count
                .checked_mul(Self::OVER_FETCH)
                .and_then(|limit| i64::try_from(limit).ok())
                .unwrap_or(i64::MAX),
        };
        let rows = match self.bank.find_candidates(&query).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = ?e, kind = %kind, "Question bank lookup failed");
                return Vec::new();
            }
        };

        let mut accepted = Vec::with_capacity(count);
        for row in rows {
            if accepted.len() == count {
                break;
            }
            let mut candidate = row.into_candidate();
            if &candidate.kind != kind || candidate.text.trim().is_empty() {
                continue;
            }
            if !used.insert(normalized_text_key(&candidate.text)) {
                continue;
            }
            candidate.marks = marks;
            candidate.normalize_options();
            accepted.push(candidate);
        }
        accepted
    }

    /// Placeholder short-answer questions about the subject and class.
    pub fn synthesize(
        &self,
        count: usize,
        subject: &str,
        class_name: &str,
        used: &mut HashSet<String>,
    ) -> Vec<CandidateQuestion> {
        let mut out = Vec::with_capacity(count);
        let mut n = 1usize;
        while out.len() < count {
            let text = format!(
                "Explain an important concept from {} (Class {}) in your own words. [{}]",
                subject, class_name, n
            );
            n += 1;
            if !used.insert(normalized_text_key(&text)) {
                continue;
            }
            let mut candidate = CandidateQuestion::new(
                CanonicalQuestionType::ShortAnswer.display_name(),
                text,
                self.synthetic_marks,
                Provenance::Synthesized,
            );
            candidate.difficulty = "Medium".to_string();
            out.push(candidate);
        }
        out
    }

    /// Completes a reconciled selection so it holds exactly the quota's total.
    #[allow(clippy::too_many_arguments)]
    pub async fn backfill(
        &self,
        quota: &Quota,
        mut selected: Vec<CandidateQuestion>,
        shortfall: &[(QuestionKind, usize)],
        scope: &BankScope,
        subject: &str,
        class_name: &str,
        used: &mut HashSet<String>,
    ) -> Vec<CandidateQuestion> {
        for (kind, missing) in shortfall {
            let Some(entry) = quota.entry(kind) else {
                continue;
            };
            let found = self
                .fill_shortfall(kind, entry.marks_per_question, *missing, scope, used)
                .await;
            tracing::info!(
                kind = %kind,
                missing = *missing,
                found = found.len(),
                "Backfilled from question bank"
            );
            selected.extend(found);
        }

        let target = quota.total_required();
        if selected.len() < target {
            let gap = target - selected.len();
            tracing::warn!(gap, "Question bank exhausted, synthesizing placeholders");
            selected.extend(self.synthesize(gap, subject, class_name, used));
        }
        selected
    }
}
