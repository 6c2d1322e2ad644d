use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    ai,
    cache::LayoutCache,
    fallback,
    layout::{FlyerForm, LayoutData},
    render::{self, RenderError},
    AppState,
};

static LAYOUT_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-layout-source");

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlyerRequest {
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub form_data: FlyerForm,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Which path produced the layout; reported back in a response header so
/// clients can tell users the AI was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutSource {
    Ai,
    Cache,
    Fallback,
}

impl LayoutSource {
    fn as_str(self) -> &'static str {
        match self {
            LayoutSource::Ai => "ai",
            LayoutSource::Cache => "cache",
            LayoutSource::Fallback => "fallback",
        }
    }
}

#[utoipa::path(get, path = "/health", tag = "flowgen", responses((status=200, body=HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".into() })
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let v = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = v.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn verify_api_key(st: &AppState, headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    let token = extract_bearer(headers).ok_or((
        StatusCode::UNAUTHORIZED,
        "API key required. Please provide an Authorization: Bearer header".to_string(),
    ))?;
    if !st.api_keys.validate(&token) {
        return Err((StatusCode::UNAUTHORIZED, "Invalid API key".to_string()));
    }
    Ok(st.api_keys.name(&token).unwrap_or_else(|| "default".into()))
}

#[utoipa::path(
    get,
    path = "/api/status",
    tag = "flowgen",
    params(("Authorization" = String, Header, description = "Bearer API key")),
    responses((status=200, body=serde_json::Value), (status=401, description="Unauthorized"))
)]
pub async fn api_status(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let key_name = verify_api_key(&st, &headers)?;
    Ok(Json(serde_json::json!({
        "status": "active",
        "key_name": key_name,
        "message": "API key is valid"
    })))
}

/// Layout for the request, in order of preference: disk cache, AI endpoint,
/// local default. Every AI failure class degrades to the default layout; the
/// distinction only reaches the logs.
async fn obtain_layout(
    st: &AppState,
    image_b64: &str,
    form: &FlyerForm,
) -> (LayoutData, LayoutSource) {
    let cache = LayoutCache::new(image_b64, form);
    let caching = LayoutCache::enabled();

    if caching {
        match cache.load() {
            Ok(data) => {
                tracing::debug!(path = %cache.path().display(), "layout cache hit");
                return (data, LayoutSource::Cache);
            }
            Err(crate::cache::CacheError::Miss(_)) => {}
            Err(e) => tracing::debug!(error = %e, "layout cache unreadable"),
        }
    }

    let _t = crate::perf_scope!("layout_request");
    match ai::request_layout(&st.http, image_b64, form).await {
        Ok(data) => {
            if caching {
                if let Err(e) = cache.save(&data) {
                    tracing::warn!(error = %e, "failed to store layout in cache");
                }
            }
            (data, LayoutSource::Ai)
        }
        Err(e) => {
            tracing::warn!(error = %e, "layout request failed, using local default layout");
            (fallback::default_layout(form), LayoutSource::Fallback)
        }
    }
}

fn render_error_response(e: RenderError) -> (StatusCode, String) {
    let status = match e {
        RenderError::BadRequest(_) | RenderError::InvalidColor(_) | RenderError::Image(_) => {
            StatusCode::BAD_REQUEST
        }
        RenderError::Font(_) | RenderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[utoipa::path(
    post,
    path = "/api/analyze-layout",
    tag = "flowgen",
    request_body = FlyerRequest,
    params(("Authorization" = String, Header, description = "Bearer API key")),
    responses(
        (status=200, description="Layout for the submitted flyer", body=LayoutData),
        (status=400, description="Bad request"),
        (status=401, description="Unauthorized")
    )
)]
pub async fn analyze_layout(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<FlyerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let _ = verify_api_key(&st, &headers)?;

    // validate the image before spending a network call on it
    render::decode_image(&req.image_base64).map_err(render_error_response)?;

    let (data, source) = obtain_layout(&st, &req.image_base64, &req.form_data).await;

    let mut out = HeaderMap::new();
    out.insert(LAYOUT_SOURCE_HEADER.clone(), HeaderValue::from_static(source.as_str()));
    Ok((out, Json(data)))
}

#[utoipa::path(
    post,
    path = "/api/generate",
    tag = "flowgen",
    request_body = FlyerRequest,
    params(("Authorization" = String, Header, description = "Bearer API key")),
    responses(
        (status=200, description="Composited flyer PNG", content_type="image/png"),
        (status=400, description="Bad request"),
        (status=401, description="Unauthorized"),
        (status=500, description="Internal error")
    )
)]
pub async fn generate(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<FlyerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let _ = verify_api_key(&st, &headers)?;

    let img = render::decode_image(&req.image_base64).map_err(render_error_response)?;
    let (data, source) = obtain_layout(&st, &req.image_base64, &req.form_data).await;
    let png = render::compose(&img, &data).map_err(render_error_response)?;

    let mut out = HeaderMap::new();
    out.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    out.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"arte-profissional.png\""),
    );
    out.insert(LAYOUT_SOURCE_HEADER.clone(), HeaderValue::from_static(source.as_str()));
    Ok((out, png))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(
            extract_bearer(&headers_with_auth("Bearer tok_abc")).as_deref(),
            Some("tok_abc")
        );
        assert_eq!(
            extract_bearer(&headers_with_auth("bearer tok_abc")).as_deref(),
            Some("tok_abc")
        );
        // the original client sends an empty token when it has none
        assert!(extract_bearer(&headers_with_auth("Bearer ")).is_none());
        assert!(extract_bearer(&headers_with_auth("Basic abc")).is_none());
        assert!(extract_bearer(&HeaderMap::new()).is_none());
    }

    #[test]
    fn layout_source_wire_values() {
        assert_eq!(LayoutSource::Ai.as_str(), "ai");
        assert_eq!(LayoutSource::Cache.as_str(), "cache");
        assert_eq!(LayoutSource::Fallback.as_str(), "fallback");
    }
}
