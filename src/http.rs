//! HTTP 辅助工具：表单取值、CORS 与安全头。

use axum::body::Body as AxumBody;
use axum::extract::{Form, FromRequest, Query, Request};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::{middleware, response::Response};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::error::ApiError;

/// 查询串与 urlencoded 请求体中的表单值，同名字段取第一个，请求体优先。
#[derive(Debug, Default)]
pub struct FormValues {
    body: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl FormValues {
    /// 读取字段（先请求体后查询串），缺失时返回空串。
    pub fn get(&self, key: &str) -> &str {
        first_value(&self.body, key)
            .or_else(|| first_value(&self.query, key))
            .unwrap_or("")
    }

    /// 只从查询串读取字段，缺失时返回空串。
    pub fn query(&self, key: &str) -> &str {
        first_value(&self.query, key).unwrap_or("")
    }
}

fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

impl<S> FromRequest<S> for FormValues
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<Vec<(String, String)>>::try_from_uri(req.uri())
            .map_err(|err| ApiError::Internal(err.body_text()))?;

        let has_body = !matches!(*req.method(), Method::GET | Method::HEAD);
        let body = if has_body && is_urlencoded(req.headers()) {
            let Form(body) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|err| ApiError::Internal(err.body_text()))?;
            body
        } else {
            Vec::new()
        };

        Ok(Self { body, query })
    }
}

fn is_urlencoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"))
}

/// 构建 CORS Layer（支持逗号分隔的来源列表）。
pub fn build_cors_layer(cors_origins: Option<&str>) -> Option<CorsLayer> {
    let origins = cors_origins?
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// 添加基础安全响应头。
pub async fn add_security_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    #[tokio::test]
    async fn form_values_prefer_body_over_query() {
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/download?path=from-query&extra=1")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AxumBody::from("path=from-body"))
            .expect("request");
        let values = FormValues::from_request(request, &()).await.expect("extract");
        assert_eq!(values.get("path"), "from-body");
        assert_eq!(values.get("extra"), "1");
        assert_eq!(values.get("missing"), "");
    }

    #[tokio::test]
    async fn form_values_take_first_duplicate() {
        let request = HttpRequest::builder()
            .method(Method::POST)
            .uri("/detail?path=q1&path=q2&response_type=base64&response_type=raw")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AxumBody::from("path=b1&path=b2"))
            .expect("request");
        let values = FormValues::from_request(request, &()).await.expect("extract");
        assert_eq!(values.get("path"), "b1");
        assert_eq!(values.query("path"), "q1");
        assert_eq!(values.query("response_type"), "base64");
    }

    #[tokio::test]
    async fn form_values_ignore_body_on_get() {
        let request = HttpRequest::builder()
            .uri("/download?path=%2Ftmp%2Fa%20b.txt")
            .body(AxumBody::empty())
            .expect("request");
        let values = FormValues::from_request(request, &()).await.expect("extract");
        assert_eq!(values.get("path"), "/tmp/a b.txt");
    }

    #[test]
    fn cors_layer_requires_valid_origin() {
        assert!(build_cors_layer(None).is_none());
        assert!(build_cors_layer(Some(" , ")).is_none());
        assert!(build_cors_layer(Some("http://localhost:3000")).is_some());
    }
}
