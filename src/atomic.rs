//! 上传临时文件：边接收边写入，完成后原子替换目标文件。

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use uuid::Uuid;

use crate::error::ApiError;

/// 可用于原子替换的临时文件封装。
pub struct AtomicFile {
    temp_path: PathBuf,
    file: File,
}

impl AtomicFile {
    /// 在临时目录中创建权限宽松（0666，受 umask 影响）的临时文件。
    pub async fn new(temp_dir: &Path) -> Result<Self, ApiError> {
        let temp_path = temp_dir.join(format!(".upload.tmp.{}", Uuid::new_v4()));
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o666);
        let file = options
            .open(&temp_path)
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        Ok(Self { temp_path, file })
    }

    /// 返回临时文件的可写句柄。
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// 放弃并清理临时文件。
    pub async fn cleanup(self) {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
    }

    /// 同步并原子替换目标文件，已存在的同名文件会被覆盖。
    pub async fn finalize(self, target: &Path) -> Result<(), ApiError> {
        if let Err(err) = self.file.sync_all().await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(ApiError::Internal(err.to_string()));
        }
        drop(self.file);

        if let Err(err) = fs::rename(&self.temp_path, target).await {
            #[cfg(windows)]
            {
                if fs::remove_file(target).await.is_ok() {
                    if let Err(err) = fs::rename(&self.temp_path, target).await {
                        let _ = fs::remove_file(&self.temp_path).await;
                        return Err(ApiError::Internal(err.to_string()));
                    }
                    return Ok(());
                }
            }
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(ApiError::Internal(err.to_string()));
        }

        if let Some(parent) = target.parent() {
            let _ = sync_dir(parent).await;
        }

        Ok(())
    }
}

async fn sync_dir(path: &Path) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = std::fs::File::open(path)?;
        dir.sync_all()
    })
    .await
    .map_err(|err| io::Error::other(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn finalize_replaces_existing_target() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("report.txt");
        std::fs::write(&target, b"old contents that are longer").expect("seed target");

        let mut atomic = AtomicFile::new(temp.path()).await.expect("create temp");
        atomic.file_mut().write_all(b"new").await.expect("write");
        atomic.finalize(&target).await.expect("finalize");

        assert_eq!(std::fs::read(&target).expect("read"), b"new");
        assert_eq!(std::fs::read_dir(temp.path()).expect("read dir").count(), 1);
    }

    #[tokio::test]
    async fn failed_finalize_removes_temp_file() {
        let temp = tempdir().expect("tempdir");
        let staging = temp.path().join("staging");
        std::fs::create_dir_all(&staging).expect("create staging");
        let target = temp.path().join("missing-dir").join("out.txt");

        let mut atomic = AtomicFile::new(&staging).await.expect("create temp");
        atomic.file_mut().write_all(b"lost").await.expect("write");
        assert!(matches!(
            atomic.finalize(&target).await,
            Err(ApiError::Internal(_))
        ));
        assert_eq!(std::fs::read_dir(&staging).expect("read dir").count(), 0);
    }

    #[tokio::test]
    async fn cleanup_removes_temp_file() {
        let temp = tempdir().expect("tempdir");
        let atomic = AtomicFile::new(temp.path()).await.expect("create temp");
        atomic.cleanup().await;
        assert_eq!(std::fs::read_dir(temp.path()).expect("read dir").count(), 0);
    }
}
