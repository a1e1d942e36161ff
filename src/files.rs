//! 文件列表、下载与详情处理器。

use axum::body::Body as AxumBody;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::http::FormValues;
use crate::storage::{FileEntry, Storage};

/// 递归列出存储目录中的全部文件。
pub async fn list_files(
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<JsonResponse<Vec<FileEntry>>, ApiError> {
    let entries = storage.list_files().await.map_err(|err| {
        let err = ApiError::from(err);
        warn!(error = ?err, "list files failed");
        err
    })?;
    info!(count = entries.len(), "list files");
    Ok(JsonResponse(entries))
}

/// 以附件形式下载文件。
pub async fn download_file(
    Extension(storage): Extension<Arc<Storage>>,
    form: FormValues,
) -> Result<Response, ApiError> {
    let path = form.get("path");
    let (target, file, size) = open_file(&storage, path).await?;
    let filename = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_bytes(format!("attachment; filename={filename}").as_bytes())
            .map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    info!(path, size, "download file");
    Ok((
        StatusCode::OK,
        headers,
        AxumBody::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// 返回文件内容：`response_type=base64` 时为 JSON 字符串，否则为原始字节。
pub async fn file_detail(
    Extension(storage): Extension<Arc<Storage>>,
    form: FormValues,
) -> Result<Response, ApiError> {
    let path = form.get("path");

    if form.query("response_type") == "base64" {
        let path = path.split('?').next().unwrap_or_default();
        let target = confine_file(&storage, path).await?;
        let bytes = fs::read(&target).await.map_err(|err| {
            warn!(path, error = %err, "detail read failed");
            ApiError::Internal(err.to_string())
        })?;
        info!(path, size = bytes.len(), "detail base64");
        return Ok(JsonResponse(STANDARD.encode(bytes)).into_response());
    }

    let (_, file, size) = open_file(&storage, path).await?;
    info!(path, size, "detail raw");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_LENGTH, HeaderValue::from(size))],
        AxumBody::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

async fn confine_file(storage: &Storage, path: &str) -> Result<PathBuf, ApiError> {
    let target = storage.confine(path).await.map_err(|err| {
        let err = ApiError::from(err);
        warn!(path, error = ?err, "path rejected");
        err
    })?;
    let metadata = fs::metadata(&target)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    if metadata.is_dir() {
        return Err(ApiError::BadRequest("path is not a file".into()));
    }
    Ok(target)
}

async fn open_file(storage: &Storage, path: &str) -> Result<(PathBuf, File, u64), ApiError> {
    let target = confine_file(storage, path).await?;
    let file = File::open(&target)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .len();
    Ok((target, file, size))
}
