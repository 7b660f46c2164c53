use nanoid::nanoid;

use crate::domain::face::EmbeddingRecord;
use crate::domain::people::{PeopleQuery, Person, PersonForAdd, PersonForInsert, PersonForUpdate, PersonKind};

use super::{check_id, error::{Error, Result}, ModelController};


impl ModelController {

	pub async fn get_people(&self, query: PeopleQuery) -> Result<Vec<Person>> {
		let people = self.store.get_people(query).await?;
		Ok(people)
	}

	pub async fn get_person(&self, person_id: &str) -> Result<Person> {
		check_id("person", person_id)?;
		let person = self.store.get_person(person_id).await?.ok_or_else(|| Error::PersonNotFound(person_id.to_string()))?;
		Ok(person)
	}

	pub async fn add_person(&self, new_person: PersonForAdd) -> Result<Person> {
		let person = PersonForInsert {
			id: nanoid!(),
			name: new_person.name,
			kind: new_person.kind.unwrap_or(PersonKind::Manual),
			portrait: new_person.portrait,
		};
		self.store.add_person(person.clone()).await?;
		let person = self.get_person(&person.id).await?;
		Ok(person)
	}

	pub async fn update_person(&self, person_id: &str, update: PersonForUpdate) -> Result<Person> {
		check_id("person", person_id)?;
		self.store.get_person(person_id).await?.ok_or_else(|| Error::PersonNotFound(person_id.to_string()))?;
		self.store.update_person(person_id, update).await?;
		let person = self.get_person(person_id).await?;
		Ok(person)
	}

	pub async fn remove_person(&self, person_id: &str) -> Result<Person> {
		check_id("person", person_id)?;
		let existing = self.store.get_person(person_id).await?;
		if let Some(existing) = existing {
			self.store.remove_person_cascade(person_id.to_string()).await?;
			self.index.write().await.reassign_person(person_id, None);
			Ok(existing)
		} else {
			Err(Error::PersonNotFound(person_id.to_string()))
		}
	}

	/// Move every face of `source_id` onto `target_id` and drop the source
	/// person. Used when the pipeline registered two identities for the
	/// same physical person.
	pub async fn merge_people(&self, source_id: &str, target_id: &str) -> Result<Person> {
		check_id("person", source_id)?;
		check_id("person", target_id)?;
		self.store.get_person(source_id).await?.ok_or_else(|| Error::PersonNotFound(source_id.to_string()))?;
		let target = self.store.get_person(target_id).await?.ok_or_else(|| Error::PersonNotFound(target_id.to_string()))?;
		self.store.merge_people(source_id.to_string(), target_id.to_string()).await?;
		self.index.write().await.reassign_person(source_id, Some(target_id));
		Ok(target)
	}

	pub async fn get_person_faces(&self, person_id: &str) -> Result<Vec<EmbeddingRecord>> {
		check_id("person", person_id)?;
		self.store.get_person(person_id).await?.ok_or_else(|| Error::PersonNotFound(person_id.to_string()))?;
		let embeddings = self.store.get_embeddings_for_person(person_id).await?;
		Ok(embeddings)
	}
}
