#![cfg_attr(debug_assertions, allow(dead_code, unused_imports))]

use axum::{http::Method, Router};

use hyper::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use model::{store::SqliteStore, ModelController, ServerSettings};
use server::ServerConfig;
use sources::path_provider::PathProvider;
use tokio::net::TcpListener;
use tools::{log::{log_error, log_info, LogServiceType}, recognition::FaceRecognizer};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

pub use self::error::{Result, Error};

mod model;
mod routes;
mod error;
mod tools;
mod server;
mod domain;
mod sources;


#[tokio::main]
async fn main() ->  Result<()> {
    tools::log::init();
    log_info(LogServiceType::Register, "Starting visage server".to_string());
    log_info(LogServiceType::Register, "Initializing config".to_string());
    let config = server::initialize_config().await;

    let app = app(&config).await?;
    let local_port = server::get_server_port().await;
    let listener = TcpListener::bind(format!("0.0.0.0:{}", local_port)).await?;
    log_info(LogServiceType::Register, format!("->> LISTENING on {:?}\n", listener.local_addr()));

    axum::serve(listener, app).await?;

    Ok(())
}


async fn app(config: &ServerConfig) -> Result<Router> {
    let store = SqliteStore::open(server::get_database_path().await?).await?;
    let bucket = PathProvider::new_for_local(server::get_bucket_path().await?);
    let recognizer = FaceRecognizer::new(server::get_models_path().await?);
    if let Err(error) = recognizer.initialize(config.auto_download_models).await {
        // Detection requests fail until models are present; every other
        // route keeps working.
        log_error(LogServiceType::Recognition, format!("Face models not loaded: {}", error));
    }
    if recognizer.loaded() {
        log_info(LogServiceType::Recognition, "Face models ready".to_string());
    }
    let mc = ModelController::new(store, bucket, recognizer, ServerSettings::from(config)).await?;

    Ok(router(mc))
}

fn router(mc: ModelController) -> Router {
    let cors: CorsLayer = CorsLayer::new()
    .allow_methods(vec![Method::GET, Method::PATCH, Method::DELETE, Method::HEAD, Method::OPTIONS, Method::POST])
    .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
    // allow requests from any origin
    .allow_origin(Any);

    Router::new()
        .nest("/ping", routes::ping::routes())
        .nest("/images", routes::images::routes(mc.clone()))
        .nest("/faces", routes::faces::routes(mc.clone()))
        .nest("/storage", routes::storage::routes(mc.clone()))
        .nest("/people", routes::people::routes(mc.clone()))
        .layer(
        ServiceBuilder::new()
            .layer(cors)
        )
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `call`, `oneshot`, and `ready`

    async fn test_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).await.unwrap();
        let bucket = PathProvider::new_for_local(dir.path().join("bucket"));
        let recognizer = FaceRecognizer::new(dir.path().join("models"));
        let settings = ServerSettings { bucket: "media".to_string(), token: "FORTESTONLY".to_string(), match_threshold: 0.5 };
        let mc = ModelController::new(store, bucket, recognizer, settings).await.unwrap();
        (dir, router(mc))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn multipart_upload(path: &str, file_name: &str, content: &[u8]) -> Request<Body> {
        let boundary = "XTESTBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n", file_name).as_bytes());
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        Request::builder()
            .method(http::Method::POST)
            .uri(path)
            .header(http::header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn json() {
        let (_dir, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(http::Method::GET)
                    .uri("/ping")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*",
        );
        let body: Value = body_json(response).await;
        assert_eq!(body, json!({ "result": {"success": true} }));
    }

    #[tokio::test]
    async fn not_found() {
        let (_dir, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn image_record_crud() {
        let (_dir, app) = test_app().await;

        let response = app.clone()
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/images")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(serde_json::to_vec(&json!({"fileKey": "abc-photo.jpg", "userRef": "u1", "albumRef": "a1"})).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["fileKey"], "abc-photo.jpg");
        assert_eq!(created["faces"], json!([]));

        let response = app.clone()
            .oneshot(Request::builder().uri(format!("/images/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = body_json(response).await;
        assert_eq!(fetched["id"], id.as_str());
        assert_eq!(fetched["albumRef"], "a1");

        let response = app.clone()
            .oneshot(
                Request::builder()
                    .method(http::Method::PATCH)
                    .uri(format!("/images/{}", id))
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(serde_json::to_vec(&json!({"albumRef": "a2"})).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let patched = body_json(response).await;
        assert_eq!(patched["albumRef"], "a2");
        assert_eq!(patched["fileKey"], "abc-photo.jpg");

        let response = app.clone()
            .oneshot(Request::builder().uri("/images/V1StGXR8_Z5jdHi6B-myT").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = body_json(response).await;
        assert_eq!(error["error"]["type"], "NOT_FOUND");

        let response = app.clone()
            .oneshot(Request::builder().uri("/images/bad%20id!").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(Request::builder().method(http::Method::DELETE).uri(format!("/images/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn people_crud() {
        let (_dir, app) = test_app().await;

        let response = app.clone()
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/people")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(serde_json::to_vec(&json!({"name": "Jane Smith"})).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["name"], "Jane Smith");
        assert_eq!(created["type"], "manual");
        let id = created["id"].as_str().unwrap().to_string();

        let response = app.clone()
            .oneshot(Request::builder().uri("/people").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let people = body_json(response).await;
        assert_eq!(people.as_array().unwrap().len(), 1);

        let response = app.clone()
            .oneshot(Request::builder().uri(format!("/people/{}/faces", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));

        let response = app
            .oneshot(Request::builder().method(http::Method::DELETE).uri(format!("/people/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn detect_on_missing_image_is_not_found() {
        let (_dir, app) = test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/faces/detect")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(serde_json::to_vec(&json!({"imageId": "V1StGXR8_Z5jdHi6B-myT"})).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let error = body_json(response).await;
        assert_eq!(error["error"]["type"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn storage_upload_and_shared_download() {
        let (_dir, app) = test_app().await;

        let response = app.clone()
            .oneshot(multipart_upload("/storage/upload", "face.jpg", b"notreallyajpeg"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded = body_json(response).await;
        assert_eq!(uploaded["success"], true);
        assert_eq!(uploaded["bucket"], "media");
        assert_eq!(uploaded["size"], 14);
        let file_key = uploaded["fileKey"].as_str().unwrap().to_string();
        assert!(file_key.ends_with("-face.jpg"));

        // same content again gets a distinct key
        let response = app.clone()
            .oneshot(multipart_upload("/storage/upload", "face.jpg", b"notreallyajpeg"))
            .await
            .unwrap();
        let second = body_json(response).await;
        assert_ne!(second["fileKey"], file_key.as_str());

        let response = app.clone()
            .oneshot(Request::builder().uri(format!("/storage/download?fileKey={}", file_key)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"notreallyajpeg");

        let response = app.clone()
            .oneshot(Request::builder().uri(format!("/storage/presigned-url?fileKey={}&expiresIn=60", file_key)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let presigned = body_json(response).await;
        assert_eq!(presigned["expiresIn"], 60);
        let url = presigned["presignedUrl"].as_str().unwrap().to_string();

        let response = app.clone()
            .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"notreallyajpeg");

        let response = app
            .oneshot(Request::builder().uri(format!("/storage/file/{}?token=not-a-token", file_key)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn download_of_missing_key_is_not_found() {
        let (_dir, app) = test_app().await;

        let response = app
            .oneshot(Request::builder().uri("/storage/download?fileKey=missing.jpg").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
