//! Client for the remote AI layout endpoint.
//!
//! The endpoint receives the base image plus the form and answers with a
//! `LayoutData` JSON. Every failure class here is recoverable: callers fall
//! back to [`crate::fallback::default_layout`] and never retry.

use reqwest::StatusCode;
use thiserror::Error;

use crate::layout::{FlyerForm, LayoutData};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI_LAYOUT_URL is not set")]
    MissingUrl,
    #[error("http: {0}")]
    Http(String),
    #[error("layout api error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("invalid layout payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn layout_api_url() -> Result<String, AiError> {
    std::env::var("AI_LAYOUT_URL").map_err(|_| AiError::MissingUrl)
}

/// Best-effort token, mirroring the upstream client: an unset token sends an
/// empty bearer string rather than blocking the request.
fn layout_api_token() -> String {
    std::env::var("AI_LAYOUT_TOKEN").unwrap_or_default()
}

pub async fn request_layout(
    http: &reqwest::Client,
    image_b64: &str,
    form: &FlyerForm,
) -> Result<LayoutData, AiError> {
    let url = layout_api_url()?;
    request_layout_with(http, &url, &layout_api_token(), image_b64, form).await
}

pub async fn request_layout_with(
    http: &reqwest::Client,
    url: &str,
    token: &str,
    image_b64: &str,
    form: &FlyerForm,
) -> Result<LayoutData, AiError> {
    let body = serde_json::json!({
        "imageBase64": image_b64,
        "formData": form,
    });

    let resp = http
        .post(url)
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .map_err(|e| AiError::Http(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AiError::Api { status, body });
    }

    let text = resp
        .text()
        .await
        .map_err(|e| AiError::Http(e.to_string()))?;
    let data: LayoutData = serde_json::from_str(&text)?;
    Ok(data.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_to_payload_variant() {
        let err = serde_json::from_str::<LayoutData>("{not json").unwrap_err();
        let err: AiError = err.into();
        assert!(matches!(err, AiError::Payload(_)));
        assert!(err.to_string().starts_with("invalid layout payload"));
    }
}
