use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::paper_dto::{AnswerKeyQuery, GeneratePaperPayload, PaperResponse},
    error::Result,
    services::export_service::{DocumentFormat, Export},
    AppState,
};

fn download(export: Export) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.bytes,
    )
}

#[utoipa::path(
    post,
    path = "/api/generate",
    request_body = GeneratePaperPayload,
    responses(
        (status = 201, description = "Paper generated", body = Json<PaperResponse>),
        (status = 400, description = "Invalid payload or question distribution"),
        (status = 500, description = "Paper could not be generated or stored")
    )
)]
#[axum::debug_handler]
pub async fn generate_paper(
    State(state): State<AppState>,
    Json(payload): Json<GeneratePaperPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let request = payload.into_request()?;
    let generated = state.paper_service.generate(request).await?;
    Ok((StatusCode::CREATED, Json(PaperResponse::from(generated))))
}

#[utoipa::path(
    get,
    path = "/api/papers/{paper_id}",
    params(
        ("paper_id" = String, Path, description = "Paper ID")
    ),
    responses(
        (status = 200, description = "Stored paper", body = Json<PaperResponse>),
        (status = 404, description = "Paper not found")
    )
)]
#[axum::debug_handler]
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<impl IntoResponse> {
    let paper = state.paper_service.load(&paper_id).await?;
    let artifacts = state.paper_service.artifacts(&paper.paper_id);
    Ok(Json(PaperResponse::new(&paper, &artifacts)))
}

#[utoipa::path(
    get,
    path = "/api/papers/{paper_id}/pdf",
    params(
        ("paper_id" = String, Path, description = "Paper ID")
    ),
    responses(
        (status = 200, description = "Paper as PDF"),
        (status = 404, description = "Paper not found")
    )
)]
#[axum::debug_handler]
pub async fn download_pdf(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<impl IntoResponse> {
    let paper = state.paper_service.load(&paper_id).await?;
    let export = state.export_service.paper(&paper, DocumentFormat::Pdf).await?;
    Ok(download(export))
}

#[utoipa::path(
    get,
    path = "/api/papers/{paper_id}/word",
    params(
        ("paper_id" = String, Path, description = "Paper ID")
    ),
    responses(
        (status = 200, description = "Paper as DOCX"),
        (status = 404, description = "Paper not found")
    )
)]
#[axum::debug_handler]
pub async fn download_word(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
) -> Result<impl IntoResponse> {
    let paper = state.paper_service.load(&paper_id).await?;
    let export = state.export_service.paper(&paper, DocumentFormat::Docx).await?;
    Ok(download(export))
}

#[utoipa::path(
    get,
    path = "/api/papers/{paper_id}/answer-key",
    params(
        ("paper_id" = String, Path, description = "Paper ID"),
        ("format" = Option<String>, Query, description = "txt (default), pdf or xlsx")
    ),
    responses(
        (status = 200, description = "Answer key"),
        (status = 400, description = "Unknown format"),
        (status = 404, description = "Paper not found")
    )
)]
#[axum::debug_handler]
pub async fn download_answer_key(
    State(state): State<AppState>,
    Path(paper_id): Path<String>,
    Query(query): Query<AnswerKeyQuery>,
) -> Result<impl IntoResponse> {
    let paper = state.paper_service.load(&paper_id).await?;
    let export = state.export_service.answer_key(&paper, query.format).await?;
    Ok(download(export))
}
