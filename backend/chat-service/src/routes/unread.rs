use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::BadgeScope;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct TotalUnreadParams {
    /// `direct_only` or `all`; defaults to the service configuration.
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TotalUnreadResponse {
    pub total: i64,
    /// The scope the total was computed over.
    pub scope: String,
}

/// Aggregate unread badge count for the caller.
#[utoipa::path(
    get,
    path = "/api/v1/unread/total",
    tag = "Unread",
    params(TotalUnreadParams),
    responses(
        (status = 200, description = "Sum of unread counts in scope", body = TotalUnreadResponse),
        (status = 400, description = "Unknown scope"),
    ),
    security(("bearer" = []))
)]
pub async fn total_unread(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<TotalUnreadParams>,
) -> Result<Json<TotalUnreadResponse>, AppError> {
    let scope = params
        .scope
        .map(|raw| raw.parse::<BadgeScope>())
        .transpose()
        .map_err(AppError::Validation)?;

    let effective = scope.unwrap_or(state.config.unread_badge_scope);
    let total = state.chat.total_unread(user.id, scope).await?;
    Ok(Json(TotalUnreadResponse {
        total,
        scope: match effective {
            BadgeScope::DirectOnly => "direct_only".to_string(),
            BadgeScope::All => "all".to_string(),
        },
    }))
}
