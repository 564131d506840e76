use crate::error::{Error, Result};
use crate::models::paper::{ComposedPaper, Paper};
use crate::models::question::NewBankQuestion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Where the rendered documents of a paper can be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub pdf: String,
    pub word: String,
    pub answer_key: String,
}

impl ArtifactPaths {
    pub fn for_paper(base_url: &str, paper_id: &str) -> Self {
        let root = format!("{}/api/papers/{}", base_url.trim_end_matches('/'), paper_id);
        Self {
            pdf: format!("{}/pdf", root),
            word: format!("{}/word", root),
            answer_key: format!("{}/answer-key", root),
        }
    }
}

/// Write access to the bank and the paper tables.
#[async_trait]
pub trait PaperStore: Send + Sync {
    /// Inserts bank rows in one transaction and returns their ids, in input
    /// order. A row whose text is already banked resolves to the existing id.
    async fn save_questions(&self, rows: &[NewBankQuestion]) -> Result<Vec<i32>>;

    /// Stores the paper, its question rows and the visitor in one transaction.
    async fn save_paper(
        &self,
        paper: &ComposedPaper,
        paths: &ArtifactPaths,
        visitor_id: Option<&str>,
    ) -> Result<()>;

    async fn load_paper(&self, paper_id: &str) -> Result<ComposedPaper>;
}

fn to_column<T: TryInto<i32>>(value: T, column: &str) -> Result<i32> {
    value
        .try_into()
        .map_err(|_| Error::Internal(format!("{} does not fit an INTEGER column", column)))
}

#[derive(Clone)]
pub struct PgPaperStore {
    pool: PgPool,
}

impl PgPaperStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaperStore for PgPaperStore {
    async fn save_questions(&self, rows: &[NewBankQuestion]) -> Result<Vec<i32>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(rows.len());

        for row in rows {
            // no-op update so RETURNING yields the existing id on conflict
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO questions
                    (chapter_id, question_type, difficulty, marks, question_text,
                     options, answer, source, explanation, language, text_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (text_hash, language) DO UPDATE SET text_hash = EXCLUDED.text_hash
                RETURNING id
                "#,
            )
            .bind(row.chapter_id)
            .bind(&row.question_type)
            .bind(&row.difficulty)
            .bind(row.marks)
            .bind(&row.question_text)
            .bind(&row.options)
            .bind(&row.answer)
            .bind(&row.source)
            .bind(&row.explanation)
            .bind(&row.language)
            .bind(&row.text_hash)
            .fetch_one(&mut *tx)
            .await?;
            ids.push(id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn save_paper(
        &self,
        paper: &ComposedPaper,
        paths: &ArtifactPaths,
        visitor_id: Option<&str>,
    ) -> Result<()> {
        let snapshot = serde_json::to_value(paper)?;
        let total_questions = to_column(paper.total_questions, "total_questions")?;
        let total_marks = to_column(paper.total_marks, "total_marks")?;
        let mut tx = self.pool.begin().await?;

        if let Some(visitor_id) = visitor_id {
            sqlx::query(
                r#"
                INSERT INTO visitors (visitor_id) VALUES ($1)
                ON CONFLICT (visitor_id) DO UPDATE
                SET last_visit = NOW(), visit_count = visitors.visit_count + 1
                "#,
            )
            .bind(visitor_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO papers
                (paper_id, exam_name, school_name, board, class_, subject, created_at,
                 total_questions, total_marks, pdf_path, word_path, answer_key_path,
                 visitor_id, snapshot)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&paper.paper_id)
        .bind(&paper.meta.exam_name)
        .bind(&paper.meta.school_name)
        .bind(&paper.meta.board)
        .bind(&paper.meta.class_name)
        .bind(&paper.meta.subject)
        .bind(paper.created_at)
        .bind(total_questions)
        .bind(total_marks)
        .bind(&paths.pdf)
        .bind(&paths.word)
        .bind(&paths.answer_key)
        .bind(visitor_id)
        .bind(&snapshot)
        .execute(&mut *tx)
        .await?;

        for (idx, question) in paper.questions.iter().enumerate() {
            let position = to_column(question.number.unwrap_or(idx + 1), "position")?;
            sqlx::query(
                r#"
                INSERT INTO paper_questions
                    (paper_id, question_id, position, question_text, type, difficulty,
                     marks, options, answer)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&paper.paper_id)
            .bind(question.id)
            .bind(position)
            .bind(&question.text)
            .bind(question.kind.as_str())
            .bind(&question.difficulty)
            .bind(question.marks)
            .bind(serde_json::to_value(&question.options)?)
            .bind(&question.answer)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_paper(&self, paper_id: &str) -> Result<ComposedPaper> {
        let row = sqlx::query_as::<_, Paper>("SELECT * FROM papers WHERE paper_id = $1")
            .bind(paper_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Paper {} not found", paper_id)))?;

        Ok(serde_json::from_value(row.snapshot)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Rejects values wider than their column, as Postgres does.
    fn fits(value: &str, width: usize) -> Result<()> {
        if value.chars().count() > width {
            return Err(Error::Internal(format!(
                "value too long for type character varying({})",
                width
            )));
        }
        Ok(())
    }

    /// Keeps everything in maps; `fail_papers` makes `save_paper` error.
    /// Bounded columns are checked at their schema widths.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub banked: Mutex<Vec<NewBankQuestion>>,
        pub papers: Mutex<HashMap<String, (ComposedPaper, ArtifactPaths, Option<String>)>>,
        pub fail_papers: bool,
    }

    #[async_trait]
    impl PaperStore for MemoryStore {
        async fn save_questions(&self, rows: &[NewBankQuestion]) -> Result<Vec<i32>> {
            let mut banked = self.banked.lock().unwrap();
            let mut ids = Vec::with_capacity(rows.len());
            for row in rows {
                fits(&row.question_type, 50)?;
                fits(&row.difficulty, 20)?;
                fits(&row.language, 10)?;
                let existing = banked
                    .iter()
                    .position(|b| b.text_hash == row.text_hash && b.language == row.language);
                let idx = match existing {
                    Some(idx) => idx,
                    None => {
                        banked.push(row.clone());
                        banked.len() - 1
                    }
                };
                ids.push(1000 + idx as i32);
            }
            Ok(ids)
        }

        async fn save_paper(
            &self,
            paper: &ComposedPaper,
            paths: &ArtifactPaths,
            visitor_id: Option<&str>,
        ) -> Result<()> {
            if self.fail_papers {
                return Err(Error::Internal("disk full".into()));
            }
            for question in &paper.questions {
                fits(question.kind.as_str(), 50)?;
                fits(&question.difficulty, 20)?;
            }
            self.papers.lock().unwrap().insert(
                paper.paper_id.clone(),
                (paper.clone(), paths.clone(), visitor_id.map(str::to_string)),
            );
            Ok(())
        }

        async fn load_paper(&self, paper_id: &str) -> Result<ComposedPaper> {
            self.papers
                .lock()
                .unwrap()
                .get(paper_id)
                .map(|(paper, _, _)| paper.clone())
                .ok_or_else(|| Error::NotFound(format!("Paper {} not found", paper_id)))
        }
    }

    #[test]
    fn counters_must_fit_integer_columns() {
        assert_eq!(to_column(42usize, "total_questions").unwrap(), 42);
        assert_eq!(to_column(-3i64, "total_marks").unwrap(), -3);
        assert!(to_column(i64::from(i32::MAX) + 1, "total_marks").is_err());
        assert!(to_column(usize::MAX, "position").is_err());
    }

    #[test]
    fn artifact_paths_hang_off_the_paper_route() {
        let paths = ArtifactPaths::for_paper("https://exams.example.org/", "paper_abc");
        assert_eq!(paths.pdf, "https://exams.example.org/api/papers/paper_abc/pdf");
        assert_eq!(paths.word, "https://exams.example.org/api/papers/paper_abc/word");
        assert_eq!(
            paths.answer_key,
            "https://exams.example.org/api/papers/paper_abc/answer-key"
        );
        assert_eq!(ArtifactPaths::for_paper("", "p").pdf, "/api/papers/p/pdf");
    }
}
