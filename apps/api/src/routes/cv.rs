//! The protected CV endpoint: resume PDF in, markdown CV out.
//!
//! Ordering matters here: the license is validated first, the resume is
//! processed, and only after the model call succeeds is a remote key's
//! consumption committed to the ledger. Any failure in between drops the
//! grant, which releases the key unconsumed.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::extract;
use crate::license::LicenseClass;
use crate::llm_client::prompts::cv_format_prompt;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ParseCvResponse {
    pub markdown: String,
    /// How the key was accepted: "local" or "remote".
    pub license: LicenseClass,
}

/// POST /api/v1/cv/parse
///
/// Multipart fields: `license` (text) and `file` (an `application/pdf` upload).
pub async fn handle_parse_cv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseCvResponse>, AppError> {
    let upload = read_upload(multipart).await?;

    let grant = state.validator.validate(&upload.license).await?;

    let resume_text = extract::pdf_text(upload.pdf)
        .await
        .map_err(|e| AppError::Pdf(e.to_string()))?;
    info!("Extracted {} characters of resume text", resume_text.len());

    let markdown = state
        .llm
        .call_markdown(&cv_format_prompt(&resume_text))
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    // The protected operation succeeded; consume the key.
    let license = state.validator.commit(grant).await?;

    Ok(Json(ParseCvResponse { markdown, license }))
}

struct CvUpload {
    license: String,
    pdf: bytes::Bytes,
}

async fn read_upload(mut multipart: Multipart) -> Result<CvUpload, AppError> {
    let mut license: Option<String> = None;
    let mut pdf: Option<bytes::Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("license") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable license field: {e}")))?;
                // Surrounding whitespace is not part of the key.
                license = Some(raw.trim().to_string());
            }
            Some("file") => {
                if field.content_type() != Some("application/pdf") {
                    return Err(AppError::Validation("File must be a PDF".to_string()));
                }
                pdf = Some(field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Unreadable file field: {e}"))
                })?);
            }
            _ => {} // unknown fields are ignored
        }
    }

    let license = license
        .filter(|k| !k.is_empty())
        .ok_or_else(|| AppError::Validation("Missing 'license' field".to_string()))?;
    let pdf = pdf.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    Ok(CvUpload { license, pdf })
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::license::{GumroadVerifier, KeyStore, LicenseValidator, RedemptionLedger};
    use crate::llm_client::LlmClient;
    use crate::routes::build_router;
    use crate::state::AppState;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        let licenses_path = dir.path().join("licenses.json");
        std::fs::write(&licenses_path, r#"["LOCAL-1"]"#).unwrap();

        let config = Config {
            openai_api_key: "test-key".to_string(),
            gumroad_product_id: "test-product".to_string(),
            licenses_path: licenses_path.clone(),
            ledger_path: dir.path().join("used_licenses.json"),
            docs_dir: dir.path().to_path_buf(),
            port: 0,
            rust_log: "info".to_string(),
        };

        let validator = Arc::new(LicenseValidator::new(
            KeyStore::load(&licenses_path).unwrap(),
            Arc::new(RedemptionLedger::new(config.ledger_path.clone())),
            Arc::new(GumroadVerifier::new(config.gumroad_product_id.clone())),
        ));

        AppState {
            validator,
            llm: LlmClient::new(config.openai_api_key.clone()),
            config,
        }
    }

    fn multipart_upload(boundary: &str, license: &str, pdf: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"license\"\r\n\r\n{license}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"cv.pdf\"\r\ncontent-type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(pdf);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[tokio::test]
    async fn test_large_resume_upload_passes_the_body_limit() {
        // A 3 MB upload would be rejected with 413 under axum's 2 MB default.
        // With a valid local key it must instead reach PDF extraction, which
        // fails on the garbage bytes with 422.
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir));

        let boundary = "cvmark-test-boundary";
        let body = multipart_upload(boundary, "LOCAL-1", &vec![0u8; 3 * 1024 * 1024]);

        let response = app
            .oneshot(
                Request::post("/api/v1/cv/parse")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_non_pdf_content_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir));

        let boundary = "cvmark-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"license\"\r\n\r\nLOCAL-1\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\ncontent-type: text/plain\r\n\r\nplain text\r\n--{boundary}--\r\n"
            )
            .as_bytes(),
        );

        let response = app
            .oneshot(
                Request::post("/api/v1/cv/parse")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
