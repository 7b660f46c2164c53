use std::path::Path;

use tokio_rusqlite::Connection;

use crate::model::store::sql::migrate_database;
use crate::tools::log::{log_info, LogServiceType};

use super::error::{Result, Error};


pub mod sql;


pub struct SqliteStore {
	connection: Connection,
}

// Constructor
impl SqliteStore {
	pub async fn new(connection: Connection) -> Result<Self> {
        let version = migrate_database(&connection).await?;
        log_info(LogServiceType::Database, format!("Current Database version: {}", version));
        Ok(Self {
			connection
		})
	}

    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).await.map_err(|_| Error::CannotOpenDatabase)?;
        Self::new(connection).await
    }

}
