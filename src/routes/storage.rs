use std::time::Instant;

use crate::model::ModelController;
use crate::{Error, Result};
use axum::{extract::{Multipart, Path, Query, State}, response::Response, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/upload", post(handler_upload))
		.route("/download", get(handler_download))
		.route("/presigned-url", get(handler_presigned_url))
		.route("/file/:file_key", get(handler_file))
		.with_state(mc)
}

async fn handler_upload(State(mc): State<ModelController>, mut multipart: Multipart) -> Result<Json<Value>> {
	let start = Instant::now();
	while let Some(field) = multipart.next_field().await? {
		let Some(file_name) = field.file_name().map(|f| f.to_string()) else { continue; };
		let mimetype = field.content_type().map(|m| m.to_string());
		let content = field.bytes().await?;
		let result = mc.upload_file(&file_name, mimetype, content).await?;
		let mut body = json!(result);
		body["executionTime"] = json!(elapsed(start));
		return Ok(Json(body));
	}
	Err(Error::Error { message: "Upload request contains no file field".to_string() })
}

fn elapsed(start: Instant) -> f64 {
	(start.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileKeyQuery {
    file_key: String,
}

async fn handler_download(State(mc): State<ModelController>, Query(query): Query<FileKeyQuery>) -> Result<Response> {
	let reader_response = mc.download_file(&query.file_key).await?;
	Ok(reader_response.into_response()?)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PresignQuery {
    file_key: String,
    expires_in: Option<u64>,
}

async fn handler_presigned_url(State(mc): State<ModelController>, Query(query): Query<PresignQuery>) -> Result<Json<Value>> {
	let start = Instant::now();
	let result = mc.presign_file(&query.file_key, query.expires_in).await?;
	let mut body = json!(result);
	body["executionTime"] = json!(elapsed(start));
	Ok(Json(body))
}

#[derive(Deserialize)]
struct ShareTokenQuery {
    token: String,
}

async fn handler_file(Path(file_key): Path<String>, State(mc): State<ModelController>, Query(query): Query<ShareTokenQuery>) -> Result<Response> {
	let reader_response = mc.open_shared_file(&file_key, &query.token).await?;
	Ok(reader_response.into_response()?)
}
