use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::header;
use axum::http::request::Parts;

use crate::api::errors::ApiError;
use crate::core::security;
use crate::core::state::AppState;
use crate::exam::models::StudentIdentity;

/// Extracts the authenticated student from the bearer token. Identity lives
/// entirely in the token; there is no account lookup behind it.
pub(crate) struct CurrentStudent(pub(crate) StudentIdentity);

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|err| ApiError::internal(err, "Failed to extract application state"))?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::Unauthorized("Missing authorization header"))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized("Invalid authorization scheme"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token"))?;

        Ok(CurrentStudent(claims.into_identity()))
    }
}
