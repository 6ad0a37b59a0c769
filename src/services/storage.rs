use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CatalogError;

/// Upload directory a file is sorted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Images,
    Documents,
    Archives,
    Others,
}

impl FileCategory {
    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            FileCategory::Images => "images",
            FileCategory::Documents => "documents",
            FileCategory::Archives => "archives",
            FileCategory::Others => "others",
        }
    }

    /// Classify by MIME type first, then by extension.
    #[must_use]
    pub fn classify(filename: &str, content_type: Option<&str>) -> Self {
        if let Some(mime) = content_type.map(str::to_ascii_lowercase) {
            match mime.as_str() {
                "application/zip"
                | "application/x-rar-compressed"
                | "application/x-7z-compressed"
                | "application/x-tar"
                | "application/gzip" => return FileCategory::Archives,
                m if m.starts_with("image/") => return FileCategory::Images,
                "application/pdf" | "application/msword" | "application/vnd.ms-excel"
                | "application/vnd.ms-powerpoint" => return FileCategory::Documents,
                m if m.starts_with("text/")
                    || m.starts_with("application/vnd.openxmlformats-officedocument") =>
                {
                    return FileCategory::Documents;
                }
                _ => {}
            }
        }
        match extension_of(filename).as_str() {
            ".jpg" | ".jpeg" | ".png" | ".gif" | ".bmp" | ".webp" | ".svg" => FileCategory::Images,
            ".pdf" | ".doc" | ".docx" | ".ppt" | ".pptx" | ".xls" | ".xlsx" | ".txt" | ".csv"
            | ".html" => FileCategory::Documents,
            ".zip" | ".rar" | ".7z" | ".tar" | ".gz" => FileCategory::Archives,
            _ => FileCategory::Others,
        }
    }
}

impl fmt::Display for FileCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Lowercased extension including the dot, or an empty string.
#[must_use]
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Where a stored file lives: its directory and generated file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub category: String,
    pub path: String,
    pub filename: String,
}

impl StoredFile {
    #[must_use]
    pub fn full_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.filename)
    }
}

#[async_trait]
pub trait FileStore: Send + Sync + fmt::Debug {
    /// Persist `content` under a fresh name in the category's directory.
    ///
    /// # Errors
    /// Returns `Storage` on I/O failure.
    async fn store(
        &self,
        content: &[u8],
        original_name: &str,
        category: FileCategory,
    ) -> Result<StoredFile, CatalogError>;

    /// Remove a stored file. A file that is already gone is not an error.
    ///
    /// # Errors
    /// Returns `Storage` on I/O failure.
    async fn remove(&self, file: &StoredFile) -> Result<(), CatalogError>;
}

/// Stores files on local disk under `<root>/<category>/`.
#[derive(Debug)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A random v4 name keeps stores sharing one root from colliding.
    fn fresh_name(original_name: &str) -> String {
        format!("{}{}", Uuid::new_v4(), extension_of(original_name))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(
        &self,
        content: &[u8],
        original_name: &str,
        category: FileCategory,
    ) -> Result<StoredFile, CatalogError> {
        let dir = self.root.join(category.dir_name());
        tokio::fs::create_dir_all(&dir).await?;
        let filename = Self::fresh_name(original_name);
        tokio::fs::write(dir.join(&filename), content).await?;
        tracing::info!(%filename, %category, bytes = content.len(), "stored file");
        Ok(StoredFile {
            category: category.dir_name().to_string(),
            path: dir.to_string_lossy().into_owned(),
            filename,
        })
    }

    async fn remove(&self, file: &StoredFile) -> Result<(), CatalogError> {
        match tokio::fs::remove_file(file.full_path()).await {
            Ok(()) => {
                tracing::info!(filename = %file.filename, "removed stored file");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                tracing::error!(filename = %file.filename, error = %err, "file removal failed");
                Err(CatalogError::Storage(err))
            }
        }
    }
}
