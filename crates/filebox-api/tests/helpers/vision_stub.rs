//! In-process stand-in for the Computer Vision REST API.

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

pub const STUB_API_KEY: &str = "stub-key";

async fn analyze(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if headers
        .get("Ocp-Apim-Subscription-Key")
        .and_then(|v| v.to_str().ok())
        != Some(STUB_API_KEY)
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "code": "401", "message": "Access denied" } })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "tags": [{ "name": "dog", "confidence": 0.98 }, { "name": "grass", "confidence": 0.91 }],
            "objects": [{ "object": "dog" }]
        })),
    )
}

async fn describe() -> Json<Value> {
    Json(json!({
        "description": { "captions": [{ "text": "a dog running on grass", "confidence": 0.87 }] }
    }))
}

/// Start the stub on a random local port and return its base URL.
pub async fn spawn_vision_stub() -> String {
    let app = Router::new()
        .route("/vision/v3.2/analyze", post(analyze))
        .route("/vision/v3.2/describe", post(describe));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind vision stub");
    let addr = listener.local_addr().expect("Stub has no local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Vision stub crashed");
    });
    format!("http://{}", addr)
}
