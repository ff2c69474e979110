use axum::response::{IntoResponse, Response};

use crate::responses::JsonResponse;

pub async fn health() -> Response {
    JsonResponse::success("OK").into_response()
}
