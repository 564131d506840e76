use axum::http::header;
use tower_http::cors::{Any, CorsLayer};

/// Open CORS; downloads expose their filename header to browsers.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any)
        .expose_headers([header::CONTENT_DISPOSITION])
}
