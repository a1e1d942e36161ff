use serde::Serialize;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::ErrorKind;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::UPLOAD_TEMP_DIR;

#[derive(Clone, Debug)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(self.upload_temp_dir()).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    pub fn upload_temp_dir(&self) -> PathBuf {
        self.root.join(UPLOAD_TEMP_DIR)
    }

    /// Joins a stored file name onto the root, one component at a time.
    pub fn resolve_name(&self, name: &str) -> Result<PathBuf, StorageError> {
        let mut normalized = PathBuf::new();
        for component in Path::new(name).components() {
            match component {
                Component::Normal(segment) => normalized.push(segment),
                Component::CurDir => continue,
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath);
                }
            }
        }
        if normalized.as_os_str().is_empty() || normalized.starts_with(UPLOAD_TEMP_DIR) {
            return Err(StorageError::InvalidPath);
        }
        Ok(self.root.join(normalized))
    }

    /// Canonicalizes a caller supplied path and requires it to sit under the root.
    ///
    /// Relative paths resolve against the working directory, so the absolute
    /// paths handed out by [`Storage::list_files`] round-trip unchanged.
    pub async fn confine(&self, requested: &str) -> Result<PathBuf, StorageError> {
        let root = fs::canonicalize(&self.root).await?;
        let target = fs::canonicalize(requested).await?;
        if !target.starts_with(&root) || target.starts_with(root.join(UPLOAD_TEMP_DIR)) {
            return Err(StorageError::InvalidPath);
        }
        Ok(target)
    }

    /// Walks the root recursively and returns every regular file.
    pub async fn list_files(&self) -> Result<Vec<FileEntry>, StorageError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|err| StorageError::Io(io::Error::other(err.to_string())))?
    }

    /// Removes temp files left behind by interrupted uploads.
    pub async fn purge_upload_temp(&self) -> Result<usize, StorageError> {
        let mut dir = match fs::read_dir(self.upload_temp_dir()).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn walk_files(root: &Path) -> Result<Vec<FileEntry>, StorageError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == UPLOAD_TEMP_DIR));

    for entry in walker {
        let entry = entry.map_err(|err| StorageError::Io(err.into()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let (Some(filename), Some(path)) = (entry.file_name().to_str(), entry.path().to_str())
        else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        entries.push(FileEntry {
            filename: filename.to_string(),
            path: path.to_string(),
        });
    }

    Ok(entries)
}

#[derive(Debug)]
pub enum StorageError {
    InvalidPath,
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub filename: String,
    pub path: String,
}
