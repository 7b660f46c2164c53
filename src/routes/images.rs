
use crate::model::ModelController;
use crate::domain::image::{ImageForAdd, ImageForUpdate, ImagesQuery};
use crate::Result;
use axum::{extract::{Path, Query, State}, routing::{delete, get, patch, post}, Json, Router};
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/", get(handler_list))
		.route("/", post(handler_post))
		.route("/:id", get(handler_get))
		.route("/:id", patch(handler_patch))
		.route("/:id", delete(handler_delete))
		.route("/:id/faces", get(handler_faces))
		.with_state(mc)
}

async fn handler_list(State(mc): State<ModelController>, Query(query): Query<ImagesQuery>) -> Result<Json<Value>> {
	let images = mc.get_images(query).await?;
	let body = Json(json!(images));
	Ok(body)
}

async fn handler_get(Path(image_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let image = mc.get_image(&image_id).await?;
	let body = Json(json!(image));
	Ok(body)
}

async fn handler_post(State(mc): State<ModelController>, Json(image): Json<ImageForAdd>) -> Result<Json<Value>> {
	let image = mc.add_image(image).await?;
	let body = Json(json!(image));
	Ok(body)
}

async fn handler_patch(Path(image_id): Path<String>, State(mc): State<ModelController>, Json(update): Json<ImageForUpdate>) -> Result<Json<Value>> {
	let image = mc.update_image(&image_id, update).await?;
	Ok(Json(json!(image)))
}

async fn handler_delete(Path(image_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let image = mc.remove_image(&image_id).await?;
	let body = Json(json!(image));
	Ok(body)
}

async fn handler_faces(Path(image_id): Path<String>, State(mc): State<ModelController>) -> Result<Json<Value>> {
	let faces = mc.get_image_faces(&image_id).await?;
	let body = Json(json!(faces));
	Ok(body)
}
