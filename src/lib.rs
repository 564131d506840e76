pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    ai_service::ProviderChain,
    bank_service::PgQuestionBank,
    curriculum_service::CurriculumService,
    export_service::{ExportService, LibreOfficeRenderer},
    paper_service::PaperService,
    paper_store::PgPaperStore,
};
use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub paper_service: PaperService,
    pub export_service: ExportService,
    pub curriculum_service: CurriculumService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.ai_timeout_secs))
            .build()?;

        let chain = ProviderChain::from_config(config, http_client);
        tracing::info!(providers = chain.len(), "Generative provider chain ready");

        let paper_service = PaperService::new(
            chain,
            Arc::new(PgQuestionBank::new(pool.clone())),
            Arc::new(PgPaperStore::new(pool.clone())),
            config.synthetic_marks,
            config.draft_text_fallback,
            config.public_base_url.clone(),
        );
        let export_service =
            ExportService::new(Arc::new(LibreOfficeRenderer::new(config.libreoffice_bin.clone())));

        Ok(Self::from_parts(pool, paper_service, export_service))
    }

    /// State over caller-supplied services, e.g. in-memory collaborators.
    pub fn from_parts(pool: PgPool, paper_service: PaperService, export_service: ExportService) -> Self {
        Self {
            curriculum_service: CurriculumService::new(pool.clone()),
            pool,
            paper_service,
            export_service,
        }
    }
}

/// Every route of the service. `generate_rps` caps paper generation only.
pub fn build_router(state: AppState, generate_rps: u32) -> Router {
    let generate_api = Router::new()
        .route("/api/generate", post(routes::paper::generate_paper))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(generate_rps),
            middleware::rate_limit::rps_middleware,
        ));

    let paper_api = Router::new()
        .route("/api/papers/:paper_id", get(routes::paper::get_paper))
        .route("/api/papers/:paper_id/pdf", get(routes::paper::download_pdf))
        .route("/api/papers/:paper_id/word", get(routes::paper::download_word))
        .route(
            "/api/papers/:paper_id/answer-key",
            get(routes::paper::download_answer_key),
        );

    let curriculum_api = Router::new()
        .route("/api/boards", get(routes::curriculum::list_boards))
        .route(
            "/api/boards/:board_id/classes",
            get(routes::curriculum::list_classes),
        )
        .route(
            "/api/classes/:class_id/subjects",
            get(routes::curriculum::list_subjects),
        )
        .route(
            "/api/subjects/:subject_id/chapters",
            get(routes::curriculum::list_chapters),
        );

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(generate_api)
        .merge(paper_api)
        .merge(curriculum_api)
        .layer(middleware::cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
