//! 路由表：启动时一次性构建，进程生命周期内不变。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::any;
use axum::{Router, middleware};
use std::sync::Arc;

use crate::index::{self, IndexPage};
use crate::storage::Storage;
use crate::{files, http, upload};

/// 构建全部路由；`upload_max_size` 为 0 时不限制上传请求体。
pub fn build_router(storage: Arc<Storage>, page: Arc<IndexPage>, upload_max_size: u64) -> Router {
    let upload_limit = if upload_max_size == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(usize::try_from(upload_max_size).unwrap_or(usize::MAX))
    };

    Router::new()
        .route("/", any(index::index_page))
        .route("/process", any(upload::process_upload).layer(upload_limit))
        .route("/list-files", any(files::list_files))
        .route("/download", any(files::download_file))
        .route("/detail", any(files::file_detail))
        .fallback(index::index_page)
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(Extension(storage))
        .layer(Extension(page))
}
