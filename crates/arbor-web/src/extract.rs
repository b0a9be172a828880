//! Request extractors that reject with [`WebError`] bodies

use crate::services::AppState;
use crate::WebError;
use arbor_core::{ArborError, Identity, TreeId};
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

/// Caller identity resolved from `Authorization: Bearer <token>`
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ArborError::Auth("missing bearer token".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ArborError::Auth("malformed authorization header".into()))?;
        let identity = state
            .resolver
            .resolve(token)
            .ok_or_else(|| ArborError::Auth("unknown token".into()))?;
        Ok(AuthUser(identity))
    }
}

/// `Json<T>` whose rejections are validation errors
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = WebError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ArborError::Validation(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

pub fn parse_tree_id(raw: &str) -> Result<TreeId, WebError> {
    TreeId::parse(raw)
        .ok_or_else(|| ArborError::Validation(format!("invalid tree id: {raw}")).into())
}
