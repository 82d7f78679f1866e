use axum::extract::{FromRef, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    LoginRequest, MessageResponse, RequestEmailBody, SignupRequest, TokenPair,
};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::tokens::{JwtKeys, TokenScope};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::UserResponse;
use crate::users::repo::{gravatar_url, User};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh_token", get(refresh_token))
        .route("/auth/confirmed_email/:token", get(confirmed_email))
        .route("/auth/request_email", post(request_email))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))
}

/// Confirmation mail is best-effort: the signup response never waits on it
/// and delivery failures only get logged.
fn dispatch_confirmation_email(state: &AppState, user: &User) {
    let keys = JwtKeys::from_ref(state);
    let token = match keys.sign_email_token(&user.email) {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "could not sign email-confirmation token");
            return;
        }
    };
    let mailer = state.mailer.clone();
    let base_url = state.config.base_url.clone();
    let email = user.email.clone();
    let username = user.username.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_confirmation(&email, &username, &base_url, &token)
            .await
        {
            warn!(error = %e, to = %email, "confirmation email failed");
        }
    });
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        return Err(ApiError::BadRequest("invalid email".into()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest("password too short".into()));
    }

    // pre-check; the unique constraint backstops the race and also maps
    // to Conflict through the sqlx conversion
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "account already exists");
        return Err(ApiError::Conflict("account already exists".into()));
    }

    let hash = hash_password(&payload.password)?;
    let avatar = gravatar_url(&payload.email);
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        Some(&avatar),
    )
    .await?;

    dispatch_confirmation_email(&state, &user);

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// Login rejections stay distinguishable: unknown email, unconfirmed
/// account, and wrong password each carry their own reason.
fn authenticate(user: Option<User>, password: &str) -> Result<User, ApiError> {
    let Some(user) = user else {
        return Err(ApiError::Unauthorized("invalid email".into()));
    };
    if !user.confirmed {
        warn!(email = %user.email, "login attempt on unconfirmed account");
        return Err(ApiError::Unauthorized("email not confirmed".into()));
    }
    if !verify_password(password, &user.password_hash) {
        warn!(email = %user.email, "login invalid password");
        return Err(ApiError::Unauthorized("invalid password".into()));
    }
    Ok(user)
}

#[derive(Debug, PartialEq, Eq)]
enum RefreshOutcome {
    Rotate,
    /// The presented token decodes but is not the stored one; the stored
    /// token must be cleared before rejecting.
    InvalidateSession,
}

fn evaluate_refresh(user: &User, presented: &str) -> RefreshOutcome {
    if user.refresh_token.as_deref() == Some(presented) {
        RefreshOutcome::Rotate
    } else {
        RefreshOutcome::InvalidateSession
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = authenticate(
        User::find_by_email(&state.db, &payload.email).await?,
        &payload.password,
    )?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign_access(&user.email)?;
    let refresh_token = keys.sign_refresh(&user.email)?;
    User::update_refresh_token(&state.db, user.id, Some(&refresh_token)).await?;

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(Json(TokenPair::bearer(access_token, refresh_token)))
}

#[instrument(skip(state, headers))]
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let presented = bearer_token(&headers)?;

    let keys = JwtKeys::from_ref(&state);
    let email = keys.decode(presented, TokenScope::Refresh).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        ApiError::Unauthorized("could not validate credentials".into())
    })?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("could not validate credentials".into()))?;

    // a presented token that decodes but is not the stored one means the
    // session was rotated or leaked; clear it so nothing can use it again
    if evaluate_refresh(&user, presented) == RefreshOutcome::InvalidateSession {
        User::update_refresh_token(&state.db, user.id, None).await?;
        warn!(user_id = user.id, "stale refresh token, session invalidated");
        return Err(ApiError::Unauthorized("invalid refresh token".into()));
    }

    let access_token = keys.sign_access(&email)?;
    let refresh_token = keys.sign_refresh(&email)?;
    User::update_refresh_token(&state.db, user.id, Some(&refresh_token)).await?;

    Ok(Json(TokenPair::bearer(access_token, refresh_token)))
}

#[instrument(skip(state))]
pub async fn confirmed_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let email = keys.decode_email_token(&token).map_err(|e| {
        warn!(error = %e, "email-confirmation token rejected");
        ApiError::Unauthorized("invalid token for email verification".into())
    })?;

    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("verification error".into()))?;

    if user.confirmed {
        return Ok(Json(MessageResponse {
            message: "your email is already confirmed",
        }));
    }

    User::confirm_email(&state.db, &email).await?;
    info!(user_id = user.id, email = %user.email, "email confirmed");
    Ok(Json(MessageResponse {
        message: "email confirmed",
    }))
}

#[instrument(skip(state, payload))]
pub async fn request_email(
    State(state): State<AppState>,
    Json(mut payload): Json<RequestEmailBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if let Some(user) = User::find_by_email(&state.db, &payload.email).await? {
        if user.confirmed {
            return Ok(Json(MessageResponse {
                message: "your email is already confirmed",
            }));
        }
        dispatch_confirmation_email(&state, &user);
    }

    // unknown addresses get the same reply; do not leak which emails exist
    Ok(Json(MessageResponse {
        message: "check your email for confirmation",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::hash_password;
    use time::OffsetDateTime;

    fn make_user(confirmed: bool, password_hash: &str, refresh_token: Option<&str>) -> User {
        User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: password_hash.into(),
            avatar: None,
            refresh_token: refresh_token.map(str::to_string),
            confirmed,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn unauthorized_reason(err: ApiError) -> String {
        match err {
            ApiError::Unauthorized(msg) => msg,
            other => panic!("expected Unauthorized, got {:?}", other),
        }
    }

    #[test]
    fn login_unknown_email_has_its_own_reason() {
        let err = authenticate(None, "whatever").unwrap_err();
        assert_eq!(unauthorized_reason(err), "invalid email");
    }

    #[test]
    fn login_unconfirmed_account_rejected_even_with_correct_password() {
        let hash = hash_password("hunter22!").expect("hash");
        let user = make_user(false, &hash, None);
        let err = authenticate(Some(user), "hunter22!").unwrap_err();
        assert_eq!(unauthorized_reason(err), "email not confirmed");
    }

    #[test]
    fn login_wrong_password_is_distinct_from_unconfirmed() {
        let hash = hash_password("hunter22!").expect("hash");
        let user = make_user(true, &hash, None);
        let err = authenticate(Some(user), "wrong").unwrap_err();
        assert_eq!(unauthorized_reason(err), "invalid password");
    }

    #[test]
    fn login_succeeds_for_confirmed_account_with_correct_password() {
        let hash = hash_password("hunter22!").expect("hash");
        let user = make_user(true, &hash, None);
        let user = authenticate(Some(user), "hunter22!").expect("login");
        assert_eq!(user.email, "alice@example.com");
    }

    #[test]
    fn refresh_with_matching_stored_token_rotates() {
        let user = make_user(true, "x", Some("stored-token"));
        assert_eq!(evaluate_refresh(&user, "stored-token"), RefreshOutcome::Rotate);
    }

    #[test]
    fn refresh_with_mismatched_token_invalidates_session() {
        let user = make_user(true, "x", Some("stored-token"));
        assert_eq!(
            evaluate_refresh(&user, "some-other-token"),
            RefreshOutcome::InvalidateSession
        );
    }

    #[test]
    fn refresh_with_no_stored_token_invalidates_session() {
        let user = make_user(true, "x", None);
        assert_eq!(
            evaluate_refresh(&user, "stored-token"),
            RefreshOutcome::InvalidateSession
        );
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("user@nodot"));
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Bearer abc.def.ghi".parse().unwrap(),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");

        headers.insert(
            axum::http::header::AUTHORIZATION,
            "Basic dXNlcg==".parse().unwrap(),
        );
        assert!(bearer_token(&headers).is_err());
    }
}
