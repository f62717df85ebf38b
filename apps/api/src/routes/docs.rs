//! Static-document download endpoint: bundled markdown rendered to PDF.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::errors::AppError;
use crate::render::markdown_to_pdf;
use crate::state::AppState;

/// GET /api/v1/documents/:name
///
/// Loads `{docs_dir}/{name}.md` and returns it rendered to PDF as an
/// attachment download.
pub async fn handle_download_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    if !is_safe_document_name(&name) {
        return Err(AppError::Validation(format!("Invalid document name '{name}'")));
    }

    let path = state.config.docs_dir.join(format!("{name}.md"));
    let markdown = match tokio::fs::read_to_string(&path).await {
        Ok(md) => md,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Document '{name}' not found")));
        }
        Err(e) => return Err(AppError::Render(e.to_string())),
    };

    // PDF layout is CPU-bound; keep it off the async workers.
    let title = name.clone();
    let pdf = tokio::task::spawn_blocking(move || markdown_to_pdf(&title, &markdown))
        .await
        .map_err(|e| AppError::Render(format!("render task failed: {e}")))?
        .map_err(|e| AppError::Render(e.to_string()))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}.pdf\""),
        ),
    ];
    Ok((headers, pdf).into_response())
}

/// Document names map directly to filenames; anything that could traverse
/// out of the docs directory is rejected.
fn is_safe_document_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_safe() {
        assert!(is_safe_document_name("user-guide"));
        assert!(is_safe_document_name("cv_template"));
        assert!(is_safe_document_name("faq2"));
    }

    #[test]
    fn test_traversal_attempts_are_rejected() {
        assert!(!is_safe_document_name("../secrets"));
        assert!(!is_safe_document_name("a/b"));
        assert!(!is_safe_document_name("a\\b"));
        assert!(!is_safe_document_name(""));
        assert!(!is_safe_document_name("name.with.dots"));
    }

    #[test]
    fn test_overlong_names_are_rejected() {
        assert!(!is_safe_document_name(&"a".repeat(65)));
    }
}
