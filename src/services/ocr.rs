use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::debug;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::utils::staging::TempStaging;

/// One page of OCR output. Indexes are zero-based and rewritten when pages
/// from several responses are combined.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OcrPage {
    pub index: usize,
    #[serde(default)]
    pub markdown: String,
}

/// Raw response from the `/v1/ocr` endpoint. Fields we do not consume
/// (images, usage info) are dropped on deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DocumentInfo {
    pub total_pages: usize,
    pub processed_at: String,
    /// Where the document came from: "upload", "camera_capture" or "batch"
    pub source: String,
}

/// Final OCR result handed back to callers: all pages plus provenance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OcrDocument {
    pub pages: Vec<OcrPage>,
    pub document_info: DocumentInfo,
}

#[derive(Debug, Deserialize)]
pub struct FileUpload {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    url: String,
}

/// How a signed URL is presented to the `/v1/ocr` endpoint: images are
/// submitted as `image_url`, PDFs and everything else as `document_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Document,
    Image,
}

impl DocumentType {
    /// Chooses the document type from the filename extension. Unknown
    /// extensions are submitted as documents.
    pub fn from_filename(filename: &str) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("jpg" | "jpeg" | "png") => Self::Image,
            _ => Self::Document,
        }
    }
}

fn ocr_request_body(model: &str, document_type: DocumentType, url: &str) -> serde_json::Value {
    let document = match document_type {
        DocumentType::Document => json!({
            "type": "document_url",
            "document_url": url,
        }),
        DocumentType::Image => json!({
            "type": "image_url",
            "image_url": url,
        }),
    };
    json!({
        "model": model,
        "document": document,
    })
}

/// Client for the Mistral OCR pipeline: file upload, signed URL retrieval and
/// OCR submission.
pub struct MistralOcrClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    staging: TempStaging,
}

impl MistralOcrClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            model: config.ocr_model.clone(),
            staging: TempStaging::new(&config.staging_dir),
        }
    }

    /// Uploads a document with `purpose=ocr` and returns the provider's file
    /// handle.
    pub async fn upload_file(&self, bytes: Vec<u8>, filename: &str) -> Result<FileUpload> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().text("purpose", "ocr").part("file", part);

        let resp = self
            .http
            .post(format!("{}/v1/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("uploading file to Mistral")?
            .error_for_status()
            .context("file upload rejected")?;

        resp.json().await.context("decoding upload response")
    }

    /// Short-lived signed URL for a previously uploaded file.
    pub async fn get_signed_url(&self, file_id: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/v1/files/{}/url", self.base_url, file_id))
            .query(&[("expiry", "24")])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("requesting signed URL")?
            .error_for_status()
            .context("signed URL request rejected")?;

        let signed: SignedUrl = resp.json().await.context("decoding signed URL response")?;
        Ok(signed.url)
    }

    /// Runs OCR against a signed URL, submitted as the given document type.
    pub async fn process_document(
        &self,
        document_url: &str,
        document_type: DocumentType,
    ) -> Result<OcrResponse> {
        let body = ocr_request_body(&self.model, document_type, document_url);

        let resp = self
            .http
            .post(format!("{}/v1/ocr", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("submitting OCR request")?
            .error_for_status()
            .context("OCR request rejected")?;

        resp.json().await.context("decoding OCR response")
    }

    /// Full pipeline for one in-memory document: stage to disk, upload, fetch
    /// a signed URL, run OCR. The staged file is removed on every exit path.
    pub async fn process_bytes(&self, bytes: &[u8], filename: &str) -> Result<OcrResponse> {
        let temp_path = self
            .staging
            .create_temp_file(bytes, filename)
            .context("staging upload")?;

        let result = self.run_pipeline(&temp_path, filename).await;
        self.staging.cleanup_temp_files(&[&temp_path]);
        result
    }

    async fn run_pipeline(&self, path: &Path, filename: &str) -> Result<OcrResponse> {
        let data = tokio::fs::read(path).await.context("reading staged file")?;

        let uploaded = self.upload_file(data, filename).await?;
        debug!(file_id = %uploaded.id, "document uploaded to Mistral");

        let url = self.get_signed_url(&uploaded.id).await?;
        self.process_document(&url, DocumentType::from_filename(filename))
            .await
    }
}

/// Merges OCR responses into a single document, renumbering pages so the
/// combined sequence stays contiguous.
pub fn combine_results(results: Vec<OcrResponse>, source: &str) -> OcrDocument {
    let mut pages = Vec::new();
    for result in results {
        for mut page in result.pages {
            page.index = pages.len();
            pages.push(page);
        }
    }

    OcrDocument {
        document_info: DocumentInfo {
            total_pages: pages.len(),
            processed_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            source: source.to_string(),
        },
        pages,
    }
}

/// Renders a document as markdown: one `## Page N` section per page,
/// separated by horizontal rules.
pub fn render_markdown(document: &OcrDocument) -> String {
    let mut out = String::new();
    for page in &document.pages {
        out.push_str(&format!("## Page {}\n\n", page.index + 1));
        out.push_str(&page.markdown);
        out.push_str("\n\n---\n\n");
    }
    out
}

/// Camera-capture variant of [`render_markdown`] with a document header.
pub fn render_camera_markdown(document: &OcrDocument) -> String {
    let mut out = format!(
        "# Camera OCR Document\n\n**Total Pages:** {}\n**Processed:** {}\n\n---\n\n",
        document.document_info.total_pages, document.document_info.processed_at,
    );
    out.push_str(&render_markdown(document));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(markdowns: &[&str]) -> OcrResponse {
        OcrResponse {
            pages: markdowns
                .iter()
                .enumerate()
                .map(|(i, m)| OcrPage {
                    index: i,
                    markdown: m.to_string(),
                })
                .collect(),
            model: None,
        }
    }

    #[test]
    fn test_document_type_from_filename() {
        assert_eq!(DocumentType::from_filename("scan.pdf"), DocumentType::Document);
        assert_eq!(DocumentType::from_filename("photo.jpg"), DocumentType::Image);
        assert_eq!(DocumentType::from_filename("photo.JPEG"), DocumentType::Image);
        assert_eq!(DocumentType::from_filename("shot.png"), DocumentType::Image);
        // No or unknown extension falls back to the document type.
        assert_eq!(DocumentType::from_filename("capture"), DocumentType::Document);
        assert_eq!(DocumentType::from_filename("notes.txt"), DocumentType::Document);
    }

    #[test]
    fn test_ocr_request_body_for_documents() {
        let body = ocr_request_body("mistral-ocr-latest", DocumentType::Document, "https://signed");
        assert_eq!(body["model"], "mistral-ocr-latest");
        assert_eq!(body["document"]["type"], "document_url");
        assert_eq!(body["document"]["document_url"], "https://signed");
        assert!(body["document"].get("image_url").is_none());
    }

    #[test]
    fn test_ocr_request_body_for_images() {
        let body = ocr_request_body("mistral-ocr-latest", DocumentType::Image, "https://signed");
        assert_eq!(body["document"]["type"], "image_url");
        assert_eq!(body["document"]["image_url"], "https://signed");
        assert!(body["document"].get("document_url").is_none());
    }

    #[test]
    fn test_combine_renumbers_pages() {
        let combined = combine_results(
            vec![response(&["first", "second"]), response(&["third"])],
            "camera_capture",
        );

        assert_eq!(combined.document_info.total_pages, 3);
        assert_eq!(combined.document_info.source, "camera_capture");
        let indexes: Vec<usize> = combined.pages.iter().map(|p| p.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(combined.pages[2].markdown, "third");
    }

    #[test]
    fn test_combine_empty() {
        let combined = combine_results(vec![], "upload");
        assert_eq!(combined.document_info.total_pages, 0);
        assert!(combined.pages.is_empty());
    }

    #[test]
    fn test_render_markdown_sections() {
        let document = combine_results(vec![response(&["alpha", "beta"])], "upload");
        let md = render_markdown(&document);

        assert!(md.contains("## Page 1\n\nalpha"));
        assert!(md.contains("## Page 2\n\nbeta"));
        assert_eq!(md.matches("---").count(), 2);
    }

    #[test]
    fn test_render_camera_markdown_header() {
        let document = combine_results(vec![response(&["alpha"])], "camera_capture");
        let md = render_camera_markdown(&document);

        assert!(md.starts_with("# Camera OCR Document"));
        assert!(md.contains("**Total Pages:** 1"));
        assert!(md.contains("## Page 1"));
    }
}
