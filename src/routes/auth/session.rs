use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::state::AppState;
use crate::utils::jwt::{decode_jwt, Claims};

/// Verified bearer identity. Rejection is a bare 401; the response body is
/// uniform so callers cannot probe which check failed.
#[derive(Debug)]
pub struct AuthSession(pub Claims);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let data = decode_jwt(
            bearer.token(),
            &state.jwt_keys,
            &state.config.jwt_issuer,
            &state.config.jwt_audience,
        )
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthSession(data.claims))
    }
}
