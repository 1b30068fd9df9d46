use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::{
    config::ClientConfig,
    error::{FlowError, Result},
    models::{AnalyzeResponse, CreateCaseResponse, LoginRequest, LoginResponse},
};

pub const CORRELATION_HEADER: &str = "x-correlation-id";

const LOGIN_FAILED: &str = "Login failed";

/// A file ready to be sent as one multipart part.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self {
            mime: mime_for(path),
            file_name,
            bytes,
        })
    }

    fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(self.mime)?)
    }
}

/// Everything `POST /cases` accepts.
#[derive(Debug, Clone, Default)]
pub struct CaseSubmission {
    pub receipt_files: Vec<FileUpload>,
    pub product_images: Vec<FileUpload>,
    pub issue_description: String,
    pub receipt_id: Option<String>,
}

/// Thin async wrapper over the refund backend's HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /cases`: stores receipts, product images and the description; returns the case id.
    pub async fn create_case(&self, submission: CaseSubmission) -> Result<CreateCaseResponse> {
        let mut form = Form::new();
        for file in submission.receipt_files {
            form = form.part("receipt_files", file.into_part()?);
        }
        for image in submission.product_images {
            form = form.part("product_images", image.into_part()?);
        }
        form = form.text("issue_description", submission.issue_description);
        if let Some(receipt_id) = submission.receipt_id.filter(|id| !id.is_empty()) {
            form = form.text("receipt_id", receipt_id);
        }

        self.post_form("/cases", form).await
    }

    /// `POST /analyze`: asks the backend to analyze an issue, optionally tied to a case.
    pub async fn analyze(
        &self,
        issue_description: &str,
        case_id: Option<&str>,
    ) -> Result<AnalyzeResponse> {
        let mut form = Form::new().text("issue_description", issue_description.to_string());
        if let Some(case_id) = case_id.filter(|id| !id.is_empty()) {
            form = form.text("case_id", case_id.to_string());
        }

        self.post_form("/analyze", form).await
    }

    /// `POST /api/auth/login`. A rejection carries the backend's `detail` text verbatim.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let correlation_id = Uuid::new_v4().to_string();
        let span = info_span!("backend_request", correlation_id = %correlation_id, path = "/api/auth/login");

        async {
            info!("Sending login request");
            let response = self
                .http
                .post(self.url("/api/auth/login"))
                .header(CORRELATION_HEADER, &correlation_id)
                .json(&LoginRequest { email, password })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let detail = response
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|body| error_detail(&body));
                error!(status = status.as_u16(), "Login rejected");
                return Err(FlowError::Auth(
                    detail.unwrap_or_else(|| LOGIN_FAILED.to_string()),
                ));
            }

            let login = response.json::<LoginResponse>().await?;
            info!(status = status.as_u16(), "Login accepted");
            Ok(login)
        }
        .instrument(span)
        .await
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let correlation_id = Uuid::new_v4().to_string();
        let span = info_span!("backend_request", correlation_id = %correlation_id, path = %path);

        async {
            info!("Sending multipart request");
            let response = self
                .http
                .post(self.url(path))
                .header(CORRELATION_HEADER, &correlation_id)
                .multipart(form)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!(status = status.as_u16(), body_length = body.len(), "Backend returned an error");
                return Err(FlowError::Backend {
                    status: status.as_u16(),
                    body: body.trim().to_string(),
                });
            }

            let parsed = response.json::<T>().await?;
            info!(status = status.as_u16(), "Request completed");
            Ok(parsed)
        }
        .instrument(span)
        .await
    }
}

/// Message from an error body's `detail` field; non-string details keep their JSON form.
fn error_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(detail) if detail.is_empty() => None,
        Value::String(detail) => Some(detail.clone()),
        other => Some(other.to_string()),
    }
}

/// MIME type for an upload, from its extension.
pub fn mime_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
