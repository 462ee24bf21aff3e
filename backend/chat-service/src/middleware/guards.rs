//! Extractors that hand authenticated identity to handlers. Handlers cannot
//! reach user identity any other way, so a route without `CurrentUser` in its
//! signature cannot accidentally act on behalf of a user.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::middleware::auth::AuthUser;

/// The authenticated caller, as placed in extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or(AppError::Unauthorized)
    }
}
