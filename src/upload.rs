//! 表单上传处理器：`file` 文件字段与可选的 `alias` 别名。

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Extension, Multipart};
use axum::http::Method;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::atomic::AtomicFile;
use crate::error::ApiError;
use crate::storage::Storage;

/// 已写入临时文件、尚未落盘的上传内容。
struct StagedFile {
    original_name: String,
    atomic: AtomicFile,
    size: u64,
}

/// 接收 multipart 表单并写入存储目录，成功时返回 `done`。
pub async fn process_upload(
    method: Method,
    Extension(storage): Extension<Arc<Storage>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, ApiError> {
    if method != Method::POST {
        return Err(ApiError::wrong_method());
    }
    let mut multipart = multipart.map_err(|err| ApiError::Internal(err.body_text()))?;

    let mut alias = String::new();
    let mut staged: Option<StagedFile> = None;
    let read_result: Result<(), ApiError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ApiError::Internal(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "alias" => {
                    alias = field
                        .text()
                        .await
                        .map_err(|err| ApiError::Internal(err.body_text()))?;
                }
                "file" if staged.is_none() => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    if original_name.is_empty() {
                        continue;
                    }
                    let mut atomic = AtomicFile::new(&storage.upload_temp_dir()).await?;
                    match copy_field(field, &mut atomic).await {
                        Ok(size) => {
                            staged = Some(StagedFile {
                                original_name,
                                atomic,
                                size,
                            })
                        }
                        Err(err) => {
                            atomic.cleanup().await;
                            return Err(err);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    if let Err(err) = read_result {
        if let Some(staged) = staged {
            staged.atomic.cleanup().await;
        }
        warn!(error = ?err, "upload rejected");
        return Err(err);
    }

    let Some(staged) = staged else {
        return Err(ApiError::Internal("no such file".into()));
    };
    let filename = stored_file_name(&staged.original_name, &alias);
    let target = match storage.resolve_name(&filename) {
        Ok(target) => target,
        Err(err) => {
            staged.atomic.cleanup().await;
            return Err(err.into());
        }
    };
    staged.atomic.finalize(&target).await?;
    info!(filename, size = staged.size, "file uploaded");
    Ok("done")
}

async fn copy_field(mut field: Field<'_>, atomic: &mut AtomicFile) -> Result<u64, ApiError> {
    let mut total_written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| ApiError::Internal(err.body_text()))?
    {
        if chunk.is_empty() {
            continue;
        }
        atomic
            .file_mut()
            .write_all(&chunk)
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        total_written += chunk.len() as u64;
    }
    debug!(bytes = total_written, "upload field staged");
    Ok(total_written)
}

/// 计算落盘文件名：别名非空时为别名加原扩展名，否则沿用原文件名。
pub fn stored_file_name(original: &str, alias: &str) -> String {
    if alias.is_empty() {
        original.to_string()
    } else {
        format!("{alias}{}", extension(original))
    }
}

/// 最后一个路径段中最后一个 `.` 起的后缀（含点），没有则为空。
fn extension(name: &str) -> &str {
    let base = name.rfind(['/', '\\']).map_or(0, |idx| idx + 1);
    name[base..].rfind('.').map_or("", |idx| &name[base + idx..])
}
