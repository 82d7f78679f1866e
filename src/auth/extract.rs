use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use tracing::{debug, warn};

use crate::auth::tokens::{JwtKeys, TokenScope};
use crate::cache::{Cache, USER_CACHE_TTL_SECONDS};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

/// Resolves the calling user from a bearer access token, going through the
/// identity cache before falling back to the database. Cached snapshots may
/// be stale for up to the cache TTL.
pub struct CurrentUser(pub User);

/// Writes a user snapshot into the identity cache and resets its TTL.
pub async fn cache_user(cache: &dyn Cache, user: &User) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(user)?;
    cache.set(&user.email, &bytes).await?;
    cache.expire(&user.email, USER_CACHE_TTL_SECONDS).await?;
    Ok(())
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("invalid Authorization header".into()))?;

        let keys = JwtKeys::from_ref(state);
        let email = keys.decode(token, TokenScope::Access).map_err(|e| {
            warn!(error = %e, "access token rejected");
            ApiError::Unauthorized("could not validate credentials".into())
        })?;

        // cache hit: serve the snapshot without touching the database
        match state.cache.get(&email).await {
            Ok(Some(bytes)) => {
                if let Ok(user) = serde_json::from_slice::<User>(&bytes) {
                    debug!(email = %email, "user resolved from cache");
                    return Ok(CurrentUser(user));
                }
                warn!(email = %email, "discarding undecodable cache snapshot");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "identity cache read failed"),
        }

        let user = User::find_by_email(&state.db, &email)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("could not validate credentials".into()))?;

        if let Err(e) = cache_user(state.cache.as_ref(), &user).await {
            warn!(error = %e, "identity cache write failed");
        }
        debug!(email = %email, "user resolved from database");

        Ok(CurrentUser(user))
    }
}
