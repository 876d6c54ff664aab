//! Request extractors whose rejections use the [`AppError`] envelope.

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON body extractor. Malformed or mistyped bodies are rejected as
/// `400 BAD_REQUEST` with the usual `{ "error", "code" }` body instead of
/// axum's plain-text rejection.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
