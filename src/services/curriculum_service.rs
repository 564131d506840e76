use crate::error::Result;
use crate::models::curriculum::{Board, Chapter, Class, Subject};
use sqlx::PgPool;

/// Board → class → subject → chapter lookups for request forms.
#[derive(Clone)]
pub struct CurriculumService {
    pool: PgPool,
}

impl CurriculumService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        let boards = sqlx::query_as::<_, Board>("SELECT board_id, name FROM boards ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(boards)
    }

    pub async fn list_classes(&self, board_id: i32) -> Result<Vec<Class>> {
        let classes = sqlx::query_as::<_, Class>(
            "SELECT class_id, board_id, class_number FROM classes WHERE board_id = $1 ORDER BY class_number",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(classes)
    }

    pub async fn list_subjects(&self, class_id: i32) -> Result<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT subject_id, class_id, name_en, name_hi FROM subjects WHERE class_id = $1 ORDER BY name_en",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    pub async fn list_chapters(&self, subject_id: i32) -> Result<Vec<Chapter>> {
        let chapters = sqlx::query_as::<_, Chapter>(
            r#"
            SELECT chapter_id, subject_id, chapter_number, title_en, title_hi
            FROM chapters
            WHERE subject_id = $1
            ORDER BY chapter_number NULLS LAST, chapter_id
            "#,
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chapters)
    }
}
