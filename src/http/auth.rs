use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::http::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = state.tokens.authenticate(&parts.headers).map_err(|err| {
            tracing::debug!(error = %err, "rejected bearer token");
            AppError::from(err)
        })?;

        Ok(AuthUser { user_id })
    }
}
