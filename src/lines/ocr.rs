// src/lines/ocr.rs
use crate::models::Line;
use crate::utils::error::OcrError;
use async_trait::async_trait;
use reqwest::header;
use std::path::Path;
use std::time::Duration;

/// Black-box text recognition over a scanned document.
///
/// Implementations must return lines with the same schema as the native
/// path (positions as page proportions, 1-based page numbers) and must not
/// look past `max_pages`. A document with nothing recognizable yields an
/// empty list, not an error.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, path: &Path, max_pages: usize) -> Result<Vec<Line>, OcrError>;
}

/// Used when no OCR backend is configured: scanned documents fail cleanly.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn recognize(&self, path: &Path, _max_pages: usize) -> Result<Vec<Line>, OcrError> {
        tracing::warn!("{} needs OCR but no OCR engine is configured", path.display());
        Err(OcrError::Failure("no OCR engine configured".to_string()))
    }
}

/// Client for a remote OCR service.
///
/// The document is POSTed as `application/pdf` to the endpoint with a
/// `max_pages` query parameter; the service answers with a JSON array of
/// lines.
pub struct HttpOcrClient {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpOcrClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OcrError::Failure(format!("cannot build OCR client: {}", e)))?;
        Ok(Self { endpoint: endpoint.into(), client, timeout })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::Timeout(self.timeout)
        } else {
            OcrError::Failure(e.to_string())
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrClient {
    async fn recognize(&self, path: &Path, max_pages: usize) -> Result<Vec<Line>, OcrError> {
        let body = tokio::fs::read(path)
            .await
            .map_err(|e| OcrError::Failure(format!("cannot read {}: {}", path.display(), e)))?;

        tracing::info!("Sending {} ({} bytes, max {} pages) to OCR service {}", path.display(), body.len(), max_pages, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("max_pages", max_pages)])
            .header(header::CONTENT_TYPE, "application/pdf")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("OCR service answered {} for {}", status, path.display());
            return Err(OcrError::Failure(format!("OCR service returned HTTP {}", status)));
        }

        let lines: Vec<Line> = response.json().await.map_err(|e| self.map_transport_error(e))?;
        tracing::debug!("OCR service returned {} lines", lines.len());
        Ok(lines.into_iter().map(with_clean_content).collect())
    }
}

// Services may send raw text only; derive the clean form the same way the native path does.
fn with_clean_content(mut line: Line) -> Line {
    for text in line.texts.iter_mut().filter(|t| t.clean_content.is_empty()) {
        text.clean_content = crate::utils::text::clean(&text.raw_content);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_engine_fails() {
        let result = tokio_test::block_on(DisabledOcr.recognize(Path::new("scan.pdf"), 5));
        assert!(matches!(result, Err(OcrError::Failure(_))));
    }

    #[test]
    fn test_service_payload_without_clean_content() {
        let payload = r#"[{"startPosition":{"pageNumber":1,"xProportion":0.1,"yProportion":0.2},
                           "texts":[{"position":{"pageNumber":1,"xProportion":0.1,"yProportion":0.2},
                                     "rawContent":"Propriétés"}]}]"#;
        let lines: Vec<Line> = serde_json::from_str(payload).unwrap();
        let line = with_clean_content(lines.into_iter().next().unwrap());
        assert_eq!(line.texts[0].clean_content, "Proprietes");
        assert!(line.end_position.is_none());
    }
}
