use chrono::Utc;
use rusqlite::{params, Row};
use serde_json::Value;

use crate::domain::face::EmbeddingRecord;
use crate::domain::image::{merge_face_entry, FaceEntry};
use crate::domain::people::UNKNOWN_PERSON;
use crate::model::faces::FaceCommit;
use crate::model::store::sql::{apply_initial_schema, blob_to_embedding, embedding_to_blob};
use super::super::SqliteStore;
use super::super::super::error::Result;


impl SqliteStore {

    fn row_to_embedding(row: &Row) -> rusqlite::Result<EmbeddingRecord> {
        let blob: Vec<u8> = row.get(3)?;
        Ok(EmbeddingRecord {
            id: row.get(0)?,
            person_ref: row.get(1)?,
            image_ref: row.get(2)?,
            embedding: blob_to_embedding(&blob),
            added: row.get(4)?,
        })
    }

    pub async fn get_embeddings(&self) -> Result<Vec<EmbeddingRecord>> {
        let rows = self.connection.call( move |conn| {
            let mut stmt = conn.prepare("SELECT id, person_ref, image_ref, embedding, added FROM embeddings")?;
            let rows = stmt.query_map([], Self::row_to_embedding)?;
            let embeddings:Vec<EmbeddingRecord> = rows.collect::<std::result::Result<Vec<EmbeddingRecord>, rusqlite::Error>>()?;
            Ok(embeddings)
        }).await?;
        Ok(rows)
    }

    pub async fn get_embeddings_for_person(&self, person_id: &str) -> Result<Vec<EmbeddingRecord>> {
        let person_id = person_id.to_string();
        let rows = self.connection.call( move |conn| {
            let mut stmt = conn.prepare("SELECT id, person_ref, image_ref, embedding, added FROM embeddings WHERE person_ref = ?")?;
            let rows = stmt.query_map([person_id], Self::row_to_embedding)?;
            let embeddings:Vec<EmbeddingRecord> = rows.collect::<std::result::Result<Vec<EmbeddingRecord>, rusqlite::Error>>()?;
            Ok(embeddings)
        }).await?;
        Ok(rows)
    }

    /// Embedding insert, face-entry merge and (optional) person registration
    /// commit in one transaction so the vector table and the image record
    /// cannot diverge. A `no such table` failure repairs the schema and
    /// retries the write once.
    pub async fn commit_face(&self, commit: FaceCommit) -> Result<()> {
        self.connection.call( move |conn| {
            let result = write_face_commit(conn, &commit);
            if let Err(error) = &result {
                if error.to_string().contains("no such table") {
                    apply_initial_schema(conn)?;
                    write_face_commit(conn, &commit)?;
                    return Ok(());
                }
            }
            result?;
            Ok(())
        }).await?;
        Ok(())
    }

    /// Reassign every embedding and face entry of `source_id` to
    /// `target_id`, then drop the source person. Returns the number of
    /// reassigned embeddings.
    pub async fn merge_people(&self, source_id: String, target_id: String) -> Result<usize> {
        let moved = self.connection.call( move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().timestamp_millis();
            let moved = tx.execute("UPDATE embeddings SET person_ref = ? WHERE person_ref = ?", params![target_id, source_id])?;
            rewrite_face_person(&tx, now, &source_id, &target_id)?;
            tx.execute("DELETE FROM people WHERE id = ?", [&source_id])?;
            tx.commit()?;
            Ok(moved)
        }).await?;
        Ok(moved)
    }

    /// Remove a person; its embeddings become unassigned and its face
    /// entries fall back to the unknown identity.
    pub async fn remove_person_cascade(&self, person_id: String) -> Result<()> {
        self.connection.call( move |conn| {
            let tx = conn.transaction()?;
            let now = Utc::now().timestamp_millis();
            tx.execute("UPDATE embeddings SET person_ref = NULL WHERE person_ref = ?", [&person_id])?;
            rewrite_face_person(&tx, now, &person_id, UNKNOWN_PERSON)?;
            tx.execute("DELETE FROM people WHERE id = ?", [&person_id])?;
            tx.commit()?;
            Ok(())
        }).await?;
        Ok(())
    }
}

fn write_face_commit(conn: &mut rusqlite::Connection, commit: &FaceCommit) -> rusqlite::Result<()> {
    let now = Utc::now().timestamp_millis();
    let tx = conn.transaction()?;
    if let Some(person) = &commit.new_person {
        tx.execute("INSERT INTO people (id, name, type, portrait, added, modified)
        VALUES (?, ?, ?, ?, ?, ?)", params![
            person.id,
            person.name,
            person.kind.to_string(),
            person.portrait,
            now,
            now
        ])?;
    }
    tx.execute("INSERT INTO embeddings (id, person_ref, image_ref, embedding, dim, added)
    VALUES (?, ?, ?, ?, ?, ?)", params![
        commit.face.vector_id,
        commit.face.person_ref,
        commit.image_ref,
        embedding_to_blob(&commit.embedding),
        commit.embedding.len() as i64,
        now
    ])?;

    let faces: Value = tx.query_row("SELECT faces FROM images WHERE id = ?", [&commit.image_ref], |row| row.get(0))?;
    let mut faces: Vec<FaceEntry> = serde_json::from_value(faces).unwrap_or_default();
    merge_face_entry(&mut faces, commit.face.clone());
    let faces = serde_json::to_value(&faces).map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
    tx.execute("UPDATE images SET faces = ?, modified = ? WHERE id = ?", params![faces, now, commit.image_ref])?;
    tx.commit()?;
    Ok(())
}

fn rewrite_face_person(tx: &rusqlite::Transaction, now: i64, from: &str, to: &str) -> rusqlite::Result<()> {
    let images = {
        let mut stmt = tx.prepare("SELECT id, faces FROM images")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?)))?;
        rows.collect::<std::result::Result<Vec<(String, Value)>, rusqlite::Error>>()?
    };
    for (image_id, faces) in images {
        let mut faces: Vec<FaceEntry> = serde_json::from_value(faces).unwrap_or_default();
        let mut changed = false;
        for face in faces.iter_mut() {
            if face.person_ref == from {
                face.person_ref = to.to_string();
                changed = true;
            }
        }
        if changed {
            let faces = serde_json::to_value(&faces).map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
            tx.execute("UPDATE images SET faces = ?, modified = ? WHERE id = ?", params![faces, now, image_id])?;
        }
    }
    Ok(())
}
