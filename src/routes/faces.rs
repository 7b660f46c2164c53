use std::time::Instant;

use crate::model::ModelController;
use crate::Result;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};


pub fn routes(mc: ModelController) -> Router {
	Router::new()
		.route("/detect", post(handler_detect))
		.with_state(mc)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaceDetectionRequest {
    image_id: String,
}

async fn handler_detect(State(mc): State<ModelController>, Json(request): Json<FaceDetectionRequest>) -> Result<Json<Value>> {
	let start = Instant::now();
	let faces = mc.process_image_faces(&request.image_id).await?;
	let execution_time = (start.elapsed().as_secs_f64() * 10_000.0).round() / 10_000.0;
	Ok(Json(json!({
		"success": true,
		"faces": faces,
		"executionTime": execution_time,
	})))
}
