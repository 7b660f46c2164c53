pub mod store;
pub mod error;

pub mod images;
pub mod people;
pub mod embeddings;
pub mod faces;
pub mod bucket;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::server::ServerConfig;
use crate::sources::path_provider::PathProvider;
use crate::tools::recognition::FaceRecognizer;

use self::embeddings::EmbeddingIndex;
use self::store::SqliteStore;
use error::{Result, Error};

/// The slice of server configuration the controller needs at runtime.
#[derive(Debug, Clone)]
pub struct ServerSettings {
	pub bucket: String,
	pub token: String,
	pub match_threshold: f32,
}

impl From<&ServerConfig> for ServerSettings {
	fn from(config: &ServerConfig) -> Self {
		Self {
			bucket: config.bucket.clone(),
			token: config.token.clone(),
			match_threshold: config.match_threshold,
		}
	}
}

#[derive(Clone)]
pub struct ModelController {
	store: Arc<SqliteStore>,
	pub bucket: Arc<PathProvider>,
	pub recognizer: Arc<FaceRecognizer>,
	index: Arc<RwLock<EmbeddingIndex>>,
	settings: ServerSettings,
}


// Constructor
impl ModelController {
	pub async fn new(store: SqliteStore, bucket: PathProvider, recognizer: FaceRecognizer, settings: ServerSettings) -> crate::Result<Self> {
		let mc = Self {
			store: Arc::new(store),
			bucket: Arc::new(bucket),
			recognizer: Arc::new(recognizer),
			index: Arc::new(RwLock::new(EmbeddingIndex::new(crate::tools::recognition::EMBEDDING_DIM))),
			settings,
		};

		mc.rebuild_embedding_index().await?;

		Ok(mc)
	}
}

/// Generated ids travel through path segments and store queries; anything
/// outside the id alphabet is refused with a 400 before touching the store.
pub fn check_id(action: &str, id: &str) -> Result<()> {
	let valid = !id.is_empty()
		&& id.len() <= 36
		&& id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
	if valid {
		Ok(())
	} else {
		Err(Error::InvalidIdForAction(action.to_string(), id.to_string()))
	}
}
