use super::{AppState, DEMO_REPLY};
use crate::stream::{ChatStreamRequest, DONE_FRAME, encode_delta};
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode, header},
    response::{IntoResponse, Json},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(super) struct LaunchVerifyBody {
    init_data: String,
}

/// GET /health
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// POST /api/launch/verify -- gate on signed launch data
pub(super) async fn handle_launch_verify(
    State(state): State<AppState>,
    Json(body): Json<LaunchVerifyBody>,
) -> impl IntoResponse {
    let Some(verifier) = state.verifier.as_ref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "ok": false,
                "error": "launch verification is not configured"
            })),
        );
    };

    if !verifier.verify(&body.init_data) {
        tracing::warn!("rejected launch data");
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "ok": false })),
        );
    }

    let user_id = crate::security::extract_user_id(&body.init_data);
    tracing::info!(user_id = user_id.as_deref().unwrap_or("-"), "launch data verified");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "ok": true, "user_id": user_id })),
    )
}

/// POST /v1/chat/stream -- demo producer, one delta frame per character
pub(super) async fn handle_chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatStreamRequest>,
) -> Response<Body> {
    tracing::info!(
        messages = request.messages.len(),
        model = %request.model,
        "serving demo chat stream"
    );

    let delay = state.demo_delay;
    let stream = async_stream::stream! {
        for ch in DEMO_REPLY.chars() {
            let mut buf = [0u8; 4];
            yield Ok::<_, std::convert::Infallible>(encode_delta(ch.encode_utf8(&mut buf)));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        yield Ok(DONE_FRAME.to_string());
    };

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/event-stream"),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response
}
