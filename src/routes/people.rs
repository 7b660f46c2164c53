
use crate::model::ModelController;
use crate::domain::people::{PeopleQuery, PersonForAdd, PersonForUpdate};
use crate::Result;
use axum::{extract::{Path, Query, State}, routing::{delete, get, patch, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/", get(handler_list))
		.route("/", post(handler_post))
		.route("/merge", post(handler_merge))
		.route("/:id", get(handler_get))
		.route("/:id", patch(handler_patch))
		.route("/:id", delete(handler_delete))
		.route("/:id/faces", get(handler_faces))
		.with_state(mc)
}

async fn handler_list(State(mc): State<ModelController>, Query(query): Query<PeopleQuery>) -> Result<Json<Value>> {
	let people = mc.get_people(query).await?;
	let body = Json(json!(people));
	Ok(body)
}

async fn handler_get(Path(person_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let person = mc.get_person(&person_id).await?;
	let body = Json(json!(person));
	Ok(body)
}

async fn handler_post(State(mc): State<ModelController>, Json(person): Json<PersonForAdd>) -> Result<Json<Value>> {
	let person = mc.add_person(person).await?;
	let body = Json(json!(person));
	Ok(body)
}

async fn handler_patch(Path(person_id): Path<String>, State(mc): State<ModelController>, Json(update): Json<PersonForUpdate>) -> Result<Json<Value>> {
	let person = mc.update_person(&person_id, update).await?;
	Ok(Json(json!(person)))
}

async fn handler_delete(Path(person_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let person = mc.remove_person(&person_id).await?;
	let body = Json(json!(person));
	Ok(body)
}

async fn handler_faces(Path(person_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let faces = mc.get_person_faces(&person_id).await?;
	let body = Json(json!(faces));
	Ok(body)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergePeopleRequest {
    source_id: String,
    target_id: String,
}

async fn handler_merge(State(mc): State<ModelController>, Json(request): Json<MergePeopleRequest>) -> Result<Json<Value>> {
	let person = mc.merge_people(&request.source_id, &request.target_id).await?;
	Ok(Json(json!(person)))
}
