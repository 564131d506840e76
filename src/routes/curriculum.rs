use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};

use crate::{error::Result, AppState};

#[utoipa::path(
    get,
    path = "/api/boards",
    responses((status = 200, description = "All boards"))
)]
#[axum::debug_handler]
pub async fn list_boards(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.curriculum_service.list_boards().await?))
}

#[utoipa::path(
    get,
    path = "/api/boards/{board_id}/classes",
    params(("board_id" = i32, Path, description = "Board ID")),
    responses((status = 200, description = "Classes of the board"))
)]
#[axum::debug_handler]
pub async fn list_classes(
    State(state): State<AppState>,
    Path(board_id): Path<i32>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.curriculum_service.list_classes(board_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/classes/{class_id}/subjects",
    params(("class_id" = i32, Path, description = "Class ID")),
    responses((status = 200, description = "Subjects of the class"))
)]
#[axum::debug_handler]
pub async fn list_subjects(
    State(state): State<AppState>,
    Path(class_id): Path<i32>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.curriculum_service.list_subjects(class_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/subjects/{subject_id}/chapters",
    params(("subject_id" = i32, Path, description = "Subject ID")),
    responses((status = 200, description = "Chapters of the subject"))
)]
#[axum::debug_handler]
pub async fn list_chapters(
    State(state): State<AppState>,
    Path(subject_id): Path<i32>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.curriculum_service.list_chapters(subject_id).await?))
}
