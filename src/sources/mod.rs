use std::{path::PathBuf, pin::Pin};
use axum::{async_trait, body::Body, response::IntoResponse};
use hyper::{header, HeaderMap};
use mime::{Mime, APPLICATION_OCTET_STREAM};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::io::ReaderStream;

use self::error::{SourcesError, SourcesResult};

pub mod path_provider;
pub mod error;

pub type AsyncReadPinBox = Pin<Box<dyn AsyncRead + Send>>;

pub struct FileStreamResult<T: Sized + AsyncRead + Send> {
    pub stream: T,
    pub size: Option<u64>,
    pub mime: Option<Mime>,
    pub name: Option<String>,
}

impl<T: Sized + AsyncRead + Send> std::fmt::Debug for FileStreamResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStreamResult")
            .field("stream", &"<stream>")
            .field("size", &self.size)
            .field("mime", &self.mime)
            .field("name", &self.name)
            .finish()
    }
}

impl<T: Sized + AsyncRead + Send> FileStreamResult<T> {
    pub fn hearders(&self) -> SourcesResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mime = self.mime.clone();
        headers.insert(header::CONTENT_TYPE, mime.unwrap_or(APPLICATION_OCTET_STREAM).to_string().parse().map_err(|_| SourcesError::Error)?);
        if let Some(name) = self.name.clone() {
            headers.insert(header::CONTENT_DISPOSITION, format!("attachment; filename={:?}", name).parse().map_err(|_| SourcesError::Error)?);
        }
        if let Some(size) = self.size {
            headers.insert(header::CONTENT_LENGTH, size.to_string().parse().map_err(|_| SourcesError::Error)?);
        }

        Ok(headers)
    }
}

impl FileStreamResult<AsyncReadPinBox> {
    pub fn into_response(self) -> SourcesResult<axum::response::Response> {
        let headers = self.hearders()?;
        let stream = ReaderStream::new(self.stream);
        let body = Body::from_stream(stream);
        Ok((axum::http::StatusCode::OK, headers, body).into_response())
    }
}

#[async_trait]
pub trait Source: Send {
    async fn exists(&self, key: &str) -> bool;
    async fn remove(&self, key: &str) -> SourcesResult<()>;
    async fn get_file(&self, key: &str) -> SourcesResult<FileStreamResult<AsyncReadPinBox>>;
    async fn get_file_write_stream(&self, key: &str) -> SourcesResult<(String, Pin<Box<dyn AsyncWrite + Send>>)>;
}

pub trait LocalSource: Send {
    fn get_full_path(&self, key: &str) -> SourcesResult<PathBuf>;
}
