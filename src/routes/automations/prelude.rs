pub(crate) use std::convert::Infallible;
pub(crate) use std::time::Duration;

pub(crate) use async_stream::stream;
pub(crate) use axum::response::sse::{Event, KeepAlive, Sse};
pub(crate) use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub(crate) use serde::Deserialize;
pub(crate) use serde_json::{json, Value};
pub(crate) use time::{format_description::well_known::Rfc3339, OffsetDateTime};
pub(crate) use tracing::error;
pub(crate) use uuid::Uuid;

pub(crate) use crate::{
    flow::Flow, models::automation::CreateAutomation, responses::JsonResponse,
    routes::auth::session::AuthSession, state::AppState,
};
