use crate::AppState;
use crate::api::error::AppError;
use crate::services::ocr::{self, OcrDocument};
use crate::utils::format::format_file_size;
use crate::utils::media::{self, ImageInfo};
use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// Document types we forward to the OCR provider.
const SUPPORTED_MIME_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png"];

#[derive(Serialize, ToSchema)]
pub struct ProcessResponse {
    pub filename: String,
    pub size: usize,
    pub size_human: String,
    pub document: OcrDocument,
    pub markdown: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CaptureRequest {
    /// Captured frame as a `data:image/...;base64,` URL or bare base64
    pub image: String,
    pub filename: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CaptureResponse {
    pub image: ImageInfo,
    pub size_human: String,
    pub document: OcrDocument,
    pub markdown: String,
}

#[utoipa::path(
    post,
    path = "/ocr/process",
    request_body(content = Multipart, description = "PDF or image upload in a 'file' field"),
    responses(
        (status = 200, description = "Document processed", body = ProcessResponse),
        (status = 400, description = "Missing, empty or unsupported document"),
        (status = 413, description = "Document exceeds the size limit"),
        (status = 502, description = "OCR provider request failed")
    ),
    tag = "ocr"
)]
pub async fn process_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("document.pdf").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some((filename, data.to_vec()));
        }
    }

    let (filename, data) =
        upload.ok_or_else(|| AppError::BadRequest("missing 'file' field".to_string()))?;

    if data.is_empty() {
        return Err(AppError::BadRequest("uploaded file is empty".to_string()));
    }
    check_size(&state, data.len())?;

    let mime = infer::get(&data)
        .map(|k| k.mime_type())
        .unwrap_or("application/octet-stream");
    if !SUPPORTED_MIME_TYPES.contains(&mime) {
        return Err(AppError::BadRequest(format!(
            "unsupported document type '{mime}'; expected PDF, JPEG or PNG"
        )));
    }

    info!(
        filename = %filename,
        size = data.len(),
        mime = %mime,
        "processing uploaded document"
    );

    let result = state
        .ocr
        .process_bytes(&data, &filename)
        .await
        .map_err(|e| AppError::Upstream(format!("{e:#}")))?;

    let document = ocr::combine_results(vec![result], "upload");
    let markdown = ocr::render_markdown(&document);

    Ok(Json(ProcessResponse {
        size: data.len(),
        size_human: format_file_size(data.len() as u64),
        filename,
        document,
        markdown,
    }))
}

#[utoipa::path(
    post,
    path = "/ocr/capture",
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Capture processed", body = CaptureResponse),
        (status = 400, description = "Payload is not a decodable image"),
        (status = 413, description = "Image exceeds the size limit"),
        (status = 502, description = "OCR provider request failed")
    ),
    tag = "ocr"
)]
pub async fn capture_image(
    State(state): State<AppState>,
    Json(req): Json<CaptureRequest>,
) -> Result<Json<CaptureResponse>, AppError> {
    let data = media::decode_data_url(&req.image)
        .map_err(|e| AppError::BadRequest(format!("invalid image payload: {e}")))?;

    check_size(&state, data.len())?;

    // Gate before spending an upstream call: reject anything that does not
    // decode as an image.
    let image = media::image_info(&data)
        .ok_or_else(|| AppError::BadRequest("payload is not a valid image".to_string()))?;

    let filename = req.filename.unwrap_or_else(|| "camera_image.jpg".to_string());
    info!(
        filename = %filename,
        width = image.width,
        height = image.height,
        format = %image.format,
        "processing camera capture"
    );

    let result = state
        .ocr
        .process_bytes(&data, &filename)
        .await
        .map_err(|e| AppError::Upstream(format!("{e:#}")))?;

    let document = ocr::combine_results(vec![result], "camera_capture");
    let markdown = ocr::render_camera_markdown(&document);

    Ok(Json(CaptureResponse {
        image,
        size_human: format_file_size(data.len() as u64),
        document,
        markdown,
    }))
}

fn check_size(state: &AppState, size: usize) -> Result<(), AppError> {
    if size > state.config.max_file_size {
        return Err(AppError::PayloadTooLarge(format!(
            "file is {}, limit is {}",
            format_file_size(size as u64),
            format_file_size(state.config.max_file_size as u64),
        )));
    }
    Ok(())
}
