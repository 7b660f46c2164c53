use chrono::Utc;
use rusqlite::{params, types::FromSqlError, OptionalExtension, Row};
use serde_json::Value;

use crate::{domain::image::{ImageForInsert, ImageForUpdate, ImageRecord, ImagesQuery}, model::store::sql::{OrderBuilder, QueryBuilder, QueryWhereType, SqlOrder}};
use super::super::SqliteStore;
use super::super::super::error::Result;


impl SqliteStore {

    fn row_to_image(row: &Row) -> rusqlite::Result<ImageRecord> {
        let faces: Value = row.get(4)?;
        Ok(ImageRecord {
            id: row.get(0)?,
            file_key: row.get(1)?,
            user_ref: row.get(2)?,
            album_ref: row.get(3)?,
            faces: serde_json::from_value(faces).map_err(|_| FromSqlError::InvalidType)?,
            added: row.get(5)?,
            modified: row.get(6)?,
        })
    }

    pub async fn get_images(&self, query: ImagesQuery) -> Result<Vec<ImageRecord>> {
        let rows = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            if let Some(album) = &query.album {
                where_query.add_where(QueryWhereType::Equal("album_ref", album));
            }
            if let Some(user) = &query.user {
                where_query.add_where(QueryWhereType::Equal("user_ref", user));
            }
            if let Some(after) = &query.after {
                where_query.add_where(QueryWhereType::After("modified", after));
            }
            if query.after.is_some() {
                where_query.add_oder(OrderBuilder::new("modified".to_string(), SqlOrder::ASC))
            }

            let mut stmt = conn.prepare(&format!("SELECT id, file_key, user_ref, album_ref, faces, added, modified FROM images {}{}", where_query.format(), where_query.format_order()))?;
            let rows = stmt.query_map(
            where_query.values(), Self::row_to_image,
            )?;
            let images:Vec<ImageRecord> = rows.collect::<std::result::Result<Vec<ImageRecord>, rusqlite::Error>>()?;
            Ok(images)
        }).await?;
        Ok(rows)
    }

    pub async fn get_image(&self, image_id: &str) -> Result<Option<ImageRecord>> {
        let image_id = image_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut stmt = conn.prepare("SELECT id, file_key, user_ref, album_ref, faces, added, modified FROM images WHERE id = ?")?;
            let row = stmt.query_row(
            [image_id],Self::row_to_image).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    pub async fn add_image(&self, image: ImageForInsert) -> Result<()> {
        self.connection.call( move |conn| {
            let now = Utc::now().timestamp_millis();
            conn.execute("INSERT INTO images (id, file_key, user_ref, album_ref, faces, added, modified)
            VALUES (?, ?, ?, ?, '[]', ?, ?)", params![
                image.id,
                image.file_key,
                image.user_ref,
                image.album_ref,
                now,
                now
            ])?;

            Ok(())
        }).await?;
        Ok(())
    }

    pub async fn update_image(&self, image_id: &str, update: ImageForUpdate) -> Result<()> {
        let id = image_id.to_string();
        self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            where_query.add_update(&update.file_key, "file_key");
            where_query.add_update(&update.user_ref, "user_ref");
            where_query.add_update(&update.album_ref, "album_ref");
            let modified = Some(Utc::now().timestamp_millis());
            where_query.add_update(&modified, "modified");

            where_query.add_where(QueryWhereType::Equal("id", &id));


            let update_sql = format!("UPDATE images SET {} {}", where_query.format_update(), where_query.format());

            conn.execute(&update_sql, where_query.values())?;
            Ok(())
        }).await?;

        Ok(())
    }

    pub async fn remove_image(&self, image_id: String) -> Result<()> {
        self.connection.call( move |conn| {
            conn.execute("DELETE FROM images WHERE id = ?", &[&image_id])?;
            Ok(())
        }).await?;
        Ok(())
    }
}
