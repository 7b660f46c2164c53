use derive_more::From;
use hyper::StatusCode;
use serde::Serialize;
use serde_with::{serde_as, DisplayFromStr};

use crate::{error::ClientError, sources::error::SourcesError};


pub type Result<T> = core::result::Result<T, Error>;

#[serde_as]
#[derive(Debug, Serialize, From, strum_macros::AsRefStr)]
pub enum Error {
	Other(String),

	NotFound,
	ImageNotFound(String),
	PersonNotFound(String),
	EmbeddingNotFound(String),

	InvalidIdForAction(String, String),

	EmptyFileContent,

	//faces
	NoFacesDetected(String),
	EmbeddingDimMismatch { expected: usize, got: usize },
	RecognitionModelsNotLoaded,

	CannotOpenDatabase,

	// -- Externals
	#[from]
	TokioRusqlite(#[serde_as(as = "DisplayFromStr")] tokio_rusqlite::Error),

	#[from]
	TokioIo(#[serde_as(as = "DisplayFromStr")] tokio::io::Error),
	#[from]
	Rusqlite(#[serde_as(as = "DisplayFromStr")] rusqlite::Error),
	#[from]
	Serde(#[serde_as(as = "DisplayFromStr")] serde_json::Error),
	#[from]
	Source(#[serde_as(as = "DisplayFromStr")] SourcesError),

}

// region:    --- Error Boilerplate

impl core::fmt::Display for Error {
	fn fmt(
		&self,
		fmt: &mut core::fmt::Formatter,
	) -> core::result::Result<(), core::fmt::Error> {
		write!(fmt, "{self:?}")
	}
}

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate


impl Error {
	pub fn client_status_and_error(&self) -> (StatusCode, ClientError) {
		#[allow(unreachable_patterns)]
		match self {
			Error::NotFound => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),
			Error::ImageNotFound(_) => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),
			Error::PersonNotFound(_) => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),
			Error::EmbeddingNotFound(_) => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),
			Error::NoFacesDetected(_) => (StatusCode::NOT_FOUND, ClientError::NOT_FOUND),

			Error::InvalidIdForAction(action, id) => (StatusCode::BAD_REQUEST, ClientError::Custom(format!("Invalid id {} for {}", id, action))),
			Error::EmptyFileContent => (StatusCode::BAD_REQUEST, ClientError::Custom("File content is empty".to_string())),
			Error::EmbeddingDimMismatch { expected, got } => (StatusCode::BAD_REQUEST, ClientError::Custom(format!("Embedding dimension {} does not match index dimension {}", got, expected))),

			Error::RecognitionModelsNotLoaded => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
			Error::CannotOpenDatabase => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),

			Error::Rusqlite(_) | Error::TokioRusqlite(_) => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
			Error::Serde(_) => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),
			Error::Source(s) => s.client_status_and_error(),

			_ => (StatusCode::INTERNAL_SERVER_ERROR, ClientError::SERVICE_ERROR),

		}
	}
}
