use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::MemberProfile;
use crate::state::AppState;

/// Token claims issued by the identity service. `name` and `avatar` are the
/// display snapshot used for sender identity on appended messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub exp: i64,
}

/// Authenticated caller, stored in request extensions by the auth middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl AuthUser {
    /// Identity snapshot attached to membership rows and sent messages.
    pub fn profile(&self) -> MemberProfile {
        MemberProfile {
            user_id: self.id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Validate an HS256 token against the shared secret and extract the caller.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(AuthUser {
        id,
        display_name: data.claims.name,
        avatar_url: data.claims.avatar,
    })
}

/// Middleware for the /api routes: require a Bearer token, stash the caller
/// in request extensions for the `CurrentUser` extractor.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;

    let user = verify_token(token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
pub fn issue_token(user: &AuthUser, secret: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = Claims {
        sub: user.id.to_string(),
        name: user.display_name.clone(),
        avatar: user.avatar_url.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to sign test token")
}
