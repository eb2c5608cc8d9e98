//! Analysis operation boundary.
//!
//! The analysis service takes an invoice (plus an optional purchase order)
//! and answers with a structured JSON result. The result is opaque here: it
//! is carried to the downstream transition untouched.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AnalysisConfig;
use crate::error::{ConfigError, OperationError, ValidationError};

/// Structured result of one analysis, forwarded as-is.
pub type AnalysisResult = serde_json::Value;

const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Documents submitted for one audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub invoice: Option<PathBuf>,
    /// Reference document to compare the invoice against.
    #[serde(default)]
    pub purchase_order: Option<PathBuf>,
}

impl AuditRequest {
    pub fn new(invoice: impl Into<PathBuf>) -> Self {
        Self {
            invoice: Some(invoice.into()),
            purchase_order: None,
        }
    }

    pub fn with_purchase_order(mut self, path: impl Into<PathBuf>) -> Self {
        self.purchase_order = Some(path.into());
        self
    }

    /// Check the request before anything is started.
    ///
    /// # Errors
    ///
    /// Fails when the invoice is missing, or when a document has an
    /// unsupported extension or does not exist.
    pub fn validate(&self) -> Result<&Path, ValidationError> {
        let invoice = self
            .invoice
            .as_deref()
            .ok_or(ValidationError::MissingInvoice)?;
        check_document(invoice)?;
        if let Some(po) = self.purchase_order.as_deref() {
            check_document(po)?;
        }
        Ok(invoice)
    }
}

fn check_document(path: &Path) -> Result<(), ValidationError> {
    if mime_for(path).is_none() {
        return Err(ValidationError::UnsupportedDocument {
            path: path.to_path_buf(),
        });
    }
    if !path.is_file() {
        return Err(ValidationError::DocumentNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        _ => "image/jpeg",
    })
}

/// The external analysis call.
pub trait AnalysisOperation {
    fn analyze(
        &self,
        request: &AuditRequest,
    ) -> impl Future<Output = Result<AnalysisResult, OperationError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Multipart HTTP client for the audit upload endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: Client,
    endpoint: Url,
}

impl HttpAnalysisClient {
    pub fn new(endpoint: Url, timeout: Duration) -> Result<Self, OperationError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn from_config(config: &AnalysisConfig) -> crate::error::Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| ConfigError::InvalidValue {
            key: "analysis.endpoint".into(),
            message: e.to_string(),
        })?;
        Ok(Self::new(endpoint, Duration::from_secs(config.timeout_secs))?)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn document_part(path: &Path) -> Result<Part, OperationError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            OperationError::Transport(format!("failed to read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime = mime_for(path).unwrap_or("application/octet-stream");
        Ok(Part::bytes(bytes).file_name(file_name).mime_str(mime)?)
    }

    async fn upload(&self, request: &AuditRequest) -> Result<AnalysisResult, OperationError> {
        let invoice = request
            .invoice
            .as_deref()
            .ok_or_else(|| OperationError::Transport(ValidationError::MissingInvoice.to_string()))?;

        let mut form = Form::new().part("file", Self::document_part(invoice).await?);
        if let Some(po) = request.purchase_order.as_deref() {
            form = form.part("po_file", Self::document_part(po).await?);
        }

        tracing::debug!(endpoint = %self.endpoint, "uploading audit documents");
        let response = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| {
                    format!("Error: {}", status.canonical_reason().unwrap_or(status.as_str()))
                });
            return Err(OperationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| OperationError::MalformedResponse(e.to_string()))
    }
}

impl AnalysisOperation for HttpAnalysisClient {
    fn analyze(
        &self,
        request: &AuditRequest,
    ) -> impl Future<Output = Result<AnalysisResult, OperationError>> + Send {
        self.upload(request)
    }
}
