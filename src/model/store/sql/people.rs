use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, types::FromSqlError, OptionalExtension, Row};

use crate::{domain::people::{PeopleQuery, Person, PersonForInsert, PersonForUpdate, PersonKind}, model::store::sql::{OrderBuilder, QueryBuilder, QueryWhereType, SqlOrder}};
use super::super::SqliteStore;
use super::super::super::error::Result;


impl SqliteStore {

    fn row_to_person(row: &Row) -> rusqlite::Result<Person> {
        let kind: String = row.get(2)?;
        Ok(Person {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: PersonKind::from_str(&kind).map_err(|_| FromSqlError::InvalidType)?,
            portrait: row.get(3)?,
            added: row.get(4)?,
            modified: row.get(5)?,
        })
    }

    pub async fn get_people(&self, query: PeopleQuery) -> Result<Vec<Person>> {
        let rows = self.connection.call( move |conn| {
            let mut where_query = QueryBuilder::new();
            if let Some(name) = &query.name {
                where_query.add_where(QueryWhereType::Like("name", name));
            }
            if let Some(after) = &query.after {
                where_query.add_where(QueryWhereType::After("modified", after));
            }
            if query.after.is_some() {
                where_query.add_oder(OrderBuilder::new("modified".to_string(), SqlOrder::ASC))
            }

            let mut stmt = conn.prepare(&format!("SELECT id, name, type, portrait, added, modified FROM people {}{}", where_query.format(), where_query.format_order()))?;
            let rows = stmt.query_map(
            where_query.values(), Self::row_to_person,
            )?;
            let people:Vec<Person> = rows.collect::<std::result::Result<Vec<Person>, rusqlite::Error>>()?;
            Ok(people)
        }).await?;
        Ok(rows)
    }

    pub async fn get_person(&self, person_id: &str) -> Result<Option<Person>> {
        let person_id = person_id.to_string();
        let row = self.connection.call( move |conn| {
            let mut stmt = conn.prepare("SELECT id, name, type, portrait, added, modified FROM people WHERE id = ?")?;
            let row = stmt.query_row(
            [person_id],Self::row_to_person).optional()?;
            Ok(row)
        }).await?;
        Ok(row)
    }

    pub async fn add_person(&self, person: PersonForInsert) -> Result<()> {
        self.connection.call( move |conn| {
            let now = Utc::now().timestamp_millis();
            conn.execute("INSERT INTO people (id, name, type, portrait, added, modified)
            VALUES (?, ?, ?, ?, ?, ?)", params![
                person.id,
                person.name,
                person.kind.to_string(),
                person.portrait,
                now,
                now
            ])?;

            Ok(())
        }).await?;
        Ok(())
    }

    pub async fn update_person(&self, person_id: &str, update: PersonForUpdate) -> Result<()> {
        let id = person_id.to_string();
        self.connection.call( move |conn| {
            let kind = update.kind.as_ref().map(|k| k.to_string());
            let mut where_query = QueryBuilder::new();
            where_query.add_update(&update.name, "name");
            where_query.add_update(&kind, "type");
            where_query.add_update(&update.portrait, "portrait");
            let modified = Some(Utc::now().timestamp_millis());
            where_query.add_update(&modified, "modified");

            where_query.add_where(QueryWhereType::Equal("id", &id));


            let update_sql = format!("UPDATE people SET {} {}", where_query.format_update(), where_query.format());

            conn.execute(&update_sql, where_query.values())?;
            Ok(())
        }).await?;

        Ok(())
    }

    pub async fn remove_person(&self, person_id: String) -> Result<()> {
        self.connection.call( move |conn| {
            conn.execute("DELETE FROM people WHERE id = ?", &[&person_id])?;
            Ok(())
        }).await?;
        Ok(())
    }
}
