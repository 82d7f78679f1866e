use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::auth::extract::CurrentUser;
use crate::contacts::birthdays;
use crate::contacts::dto::{ContactCreate, ContactPatch, ContactResponse, ListParams};
use crate::contacts::repo::Contact;
use crate::error::ApiError;
use crate::state::AppState;

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route("/contacts/birthdays", get(upcoming_birthdays))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = Contact::list(
        &state.db,
        user.id,
        params.limit(),
        params.offset(),
        params.search.as_deref(),
    )
    .await?;
    Ok(Json(contacts.into_iter().map(Into::into).collect()))
}

#[instrument(skip_all, fields(user_id = user.id, contact_id = id))]
pub async fn get_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = Contact::get(&state.db, user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("contact not found".into()))?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn create_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ContactCreate>,
) -> Result<(StatusCode, Json<ContactResponse>), ApiError> {
    let contact = Contact::create(&state.db, user.id, &body).await?;
    info!(contact_id = contact.id, "contact created");
    Ok((StatusCode::CREATED, Json(contact.into())))
}

#[instrument(skip_all, fields(user_id = user.id, contact_id = id))]
pub async fn update_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(patch): Json<ContactPatch>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = Contact::update(&state.db, user.id, id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("contact not found".into()))?;
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = user.id, contact_id = id))]
pub async fn delete_contact(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = Contact::delete(&state.db, user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("contact not found".into()))?;
    info!(contact_id = id, "contact deleted");
    Ok(Json(contact.into()))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn upcoming_birthdays(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = Contact::list_all(&state.db, user.id).await?;
    let today = OffsetDateTime::now_utc().date();
    let upcoming = birthdays::upcoming(today, contacts);
    Ok(Json(upcoming.into_iter().map(Into::into).collect()))
}
