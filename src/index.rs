//! 首页：读取 HTML 模板原样返回。

use axum::extract::Extension;
use axum::http::Method;
use axum::response::Html;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::warn;

use crate::error::ApiError;

#[derive(Debug)]
pub struct IndexPage {
    pub template: PathBuf,
}

/// 首页处理器，同时作为未匹配路由的回退。
pub async fn index_page(
    method: Method,
    Extension(page): Extension<Arc<IndexPage>>,
) -> Result<Html<String>, ApiError> {
    if method != Method::GET {
        return Err(ApiError::wrong_method());
    }
    let body = fs::read_to_string(&page.template).await.map_err(|err| {
        warn!(template = %page.template.display(), error = %err, "template render failed");
        ApiError::Internal(err.to_string())
    })?;
    Ok(Html(body))
}
