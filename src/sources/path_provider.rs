use std::{path::{Component, Path, PathBuf}, pin::Pin};

use axum::async_trait;
use tokio::{fs::{create_dir_all, metadata, remove_file, File}, io::{AsyncWrite, BufReader, BufWriter}};

use super::{error::{SourcesError, SourcesResult}, AsyncReadPinBox, FileStreamResult, LocalSource, Source};

pub struct PathProvider {
    root: PathBuf
}

impl PathProvider {
    pub fn new_for_local(root: PathBuf) -> Self {
        PathProvider { root }
    }

    // Keys are relative storage identifiers. Anything absolute or escaping
    // the root is refused before touching the filesystem.
    fn checked_key(key: &str) -> SourcesResult<&str> {
        let path = Path::new(key);
        let valid = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
        if valid {
            Ok(key)
        } else {
            Err(SourcesError::InvalidKey(key.to_string()))
        }
    }
}

impl LocalSource for PathProvider {
    fn get_full_path(&self, key: &str) -> SourcesResult<PathBuf> {
        let key = Self::checked_key(key)?;
        let mut path = self.root.clone();
        path.push(key);
        Ok(path)
    }
}

#[async_trait]
impl Source for PathProvider {
    async fn exists(&self, key: &str) -> bool {
        if let Ok(path) = self.get_full_path(key) {
            metadata(path).await.is_ok()
        } else {
            false
        }
    }

    async fn remove(&self, key: &str) -> SourcesResult<()> {
        let path = self.get_full_path(key)?;
        remove_file(path).await?;
        Ok(())
    }

    async fn get_file(&self, key: &str) -> SourcesResult<FileStreamResult<AsyncReadPinBox>> {
        let path = self.get_full_path(key)?;
        let size = metadata(&path).await.map_err(|_| SourcesError::NotFound(Some(key.to_string())))?.len();
        let file = File::open(&path).await.map_err(|_| SourcesError::NotFound(Some(key.to_string())))?;
        let filereader = BufReader::new(file);
        let guess = mime_guess::from_path(&path);
        let name = path.file_name().and_then(|f| f.to_str()).map(|f| f.to_string());

        Ok(FileStreamResult {
            stream: Box::pin(filereader) as AsyncReadPinBox,
            size: Some(size),
            mime: guess.first(),
            name,
        })
    }

    async fn get_file_write_stream(&self, key: &str) -> SourcesResult<(String, Pin<Box<dyn AsyncWrite + Send>>)> {
        let path = self.get_full_path(key)?;
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        let file = BufWriter::new(File::create(path).await?);

        Ok((key.to_string(), Box::pin(file)))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{copy, AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PathProvider::new_for_local(dir.path().to_path_buf());

        let (key, mut writer) = provider.get_file_write_stream("abc-test.jpg").await.unwrap();
        assert_eq!(key, "abc-test.jpg");
        let mut content: &[u8] = b"some bytes";
        copy(&mut content, &mut writer).await.unwrap();
        writer.shutdown().await.unwrap();

        assert!(provider.exists("abc-test.jpg").await);
        let result = provider.get_file("abc-test.jpg").await.unwrap();
        assert_eq!(result.size, Some(10));
        assert_eq!(result.name.as_deref(), Some("abc-test.jpg"));
        let mut read = Vec::new();
        let mut stream = result.stream;
        stream.read_to_end(&mut read).await.unwrap();
        assert_eq!(read, b"some bytes");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PathProvider::new_for_local(dir.path().to_path_buf());
        let error = provider.get_file("nothere.png").await.unwrap_err();
        assert!(matches!(error, SourcesError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let provider = PathProvider::new_for_local(dir.path().to_path_buf());
        assert!(matches!(provider.get_file("../escape").await.unwrap_err(), SourcesError::InvalidKey(_)));
        assert!(matches!(provider.get_file("/etc/passwd").await.unwrap_err(), SourcesError::InvalidKey(_)));
        assert!(!provider.exists("../escape").await);
    }
}
