use bytes::Bytes;
use nanoid::nanoid;
use serde::{Deserialize, Serialize};
use tokio::io::{copy, AsyncWriteExt};

use crate::error::Result as RsResult;
use crate::sources::{AsyncReadPinBox, FileStreamResult, Source};
use crate::tools::auth::{sign_share, verify_share};
use crate::tools::log::{log_info, LogServiceType};

use super::error::Error;
use super::ModelController;

pub const DEFAULT_PRESIGN_EXPIRY: u64 = 3600;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub file_key: String,
    pub bucket: String,
    pub size: usize,
    pub mimetype: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresignResult {
    pub success: bool,
    pub file_key: String,
    pub bucket: String,
    pub presigned_url: String,
    pub expires_in: u64,
}

impl ModelController {

	/// Store uploaded content under a fresh `{nanoid}-{name}` key. Repeated
	/// uploads of the same content intentionally produce distinct keys.
	pub async fn upload_file(&self, file_name: &str, mimetype: Option<String>, content: Bytes) -> RsResult<UploadResult> {
		if content.is_empty() {
			return Err(Error::EmptyFileContent.into());
		}
		let file_key = format!("{}-{}", nanoid!(), sanitize_file_name(file_name));
		let (_, mut writer) = self.bucket.get_file_write_stream(&file_key).await?;
		let mut reader: &[u8] = &content;
		copy(&mut reader, &mut writer).await?;
		writer.shutdown().await?;
		log_info(LogServiceType::Storage, format!("Uploaded {} bytes as {}", content.len(), file_key));

		Ok(UploadResult {
			success: true,
			file_key,
			bucket: self.settings.bucket.clone(),
			size: content.len(),
			mimetype,
			sha256: sha256::digest(content.as_ref()),
		})
	}

	pub async fn download_file(&self, file_key: &str) -> RsResult<FileStreamResult<AsyncReadPinBox>> {
		let reader = self.bucket.get_file(file_key).await?;
		Ok(reader)
	}

	/// Issue a time-limited URL for one file key, signed with the server
	/// secret and served by the `/storage/file` route.
	pub async fn presign_file(&self, file_key: &str, expires_in: Option<u64>) -> RsResult<PresignResult> {
		if !self.bucket.exists(file_key).await {
			return Err(crate::sources::error::SourcesError::NotFound(Some(file_key.to_string())).into());
		}
		let expires_in = expires_in.unwrap_or(DEFAULT_PRESIGN_EXPIRY);
		let token = sign_share(file_key, expires_in, &self.settings.token)?;
		Ok(PresignResult {
			success: true,
			file_key: file_key.to_string(),
			bucket: self.settings.bucket.clone(),
			presigned_url: format!("/storage/file/{}?token={}", file_key, token),
			expires_in,
		})
	}

	pub async fn open_shared_file(&self, file_key: &str, token: &str) -> RsResult<FileStreamResult<AsyncReadPinBox>> {
		verify_share(token, file_key, &self.settings.token)?;
		let reader = self.bucket.get_file(file_key).await?;
		Ok(reader)
	}
}

/// Uploaded file names end up inside storage keys; path separators would
/// make the provider reject the key.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_file_name("a/b\\c.jpg"), "a_b_c.jpg");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("photo.png"), "photo.png");
    }
}
