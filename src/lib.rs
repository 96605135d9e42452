pub mod api;
pub mod config;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::ocr::MistralOcrClient;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::ocr::process_document,
        api::handlers::ocr::capture_image,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            api::handlers::ocr::ProcessResponse,
            api::handlers::ocr::CaptureRequest,
            api::handlers::ocr::CaptureResponse,
            services::ocr::OcrPage,
            services::ocr::OcrDocument,
            services::ocr::DocumentInfo,
            utils::media::ImageInfo,
        )
    ),
    tags(
        (name = "ocr", description = "Document OCR endpoints"),
        (name = "system", description = "Health and service metadata")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub ocr: Arc<MistralOcrClient>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    // Leave headroom above the document limit for multipart framing.
    let body_limit = state.config.max_file_size + 1024 * 1024;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/ocr/process", post(api::handlers::ocr::process_document))
        .route("/ocr/capture", post(api::handlers::ocr::capture_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
