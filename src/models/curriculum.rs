use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Board {
    pub board_id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Class {
    pub class_id: i32,
    pub board_id: i32,
    pub class_number: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subject {
    pub subject_id: i32,
    pub class_id: i32,
    pub name_en: String,
    pub name_hi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Chapter {
    pub chapter_id: i32,
    pub subject_id: i32,
    pub chapter_number: Option<i32>,
    pub title_en: String,
    pub title_hi: String,
}
