use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use bytes::Bytes;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tracing::{info, instrument, warn};

use crate::auth::extract::{cache_user, CurrentUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::UserResponse;
use crate::users::repo::User;

/// One request per 20 seconds per client IP on the profile surface.
const RATE_LIMIT_WINDOW_SECONDS: u64 = 20;
const RATE_LIMIT_BURST: u32 = 1;

pub fn user_routes() -> Router<AppState> {
    let limiter = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(RATE_LIMIT_WINDOW_SECONDS)
            .burst_size(RATE_LIMIT_BURST)
            .finish()
            .expect("rate limiter config"),
    );
    Router::new()
        .route("/users/me", get(me))
        .route("/users/avatar", patch(update_avatar))
        .layer(GovernorLayer { config: limiter })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<UserResponse>, ApiError> {
    let mut file: Option<(Bytes, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            file = Some((data, content_type));
            break;
        }
    }
    let (bytes, content_type) =
        file.ok_or_else(|| ApiError::BadRequest("file field is required".into()))?;

    // the response depends on the hosted URL, so upload failures propagate
    let key = format!("avatars/{}", user.email);
    let url = state
        .storage
        .upload(&key, bytes, &content_type)
        .await
        .map_err(ApiError::Upstream)?;

    let updated = User::update_avatar(&state.db, &user.email, &url).await?;

    // re-cache so the new avatar is visible before the old entry expires
    if let Err(e) = cache_user(state.cache.as_ref(), &updated).await {
        warn!(error = %e, "identity cache refresh failed");
    }

    info!(user_id = updated.id, "avatar updated");
    Ok(Json(UserResponse::from(&updated)))
}
