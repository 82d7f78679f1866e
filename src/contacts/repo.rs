use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};

use crate::contacts::dto::{ContactCreate, ContactPatch};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub birthday: Date,
    pub note: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Contact {
    /// Owner-scoped page, insertion order with id as the stable tiebreak.
    /// `search` filters on a case-insensitive substring of first name,
    /// last name, or email.
    pub async fn list(
        db: &PgPool,
        owner_id: i64,
        limit: i64,
        offset: i64,
        search: Option<&str>,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = match search {
            Some(search) => {
                let pattern = format!("%{}%", search);
                sqlx::query_as::<_, Contact>(
                    r#"
                    SELECT id, first_name, last_name, email, phone_number, birthday,
                           note, user_id, created_at, updated_at
                    FROM contacts
                    WHERE user_id = $1
                      AND (first_name ILIKE $4 OR last_name ILIKE $4 OR email ILIKE $4)
                    ORDER BY id ASC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .bind(pattern)
                .fetch_all(db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Contact>(
                    r#"
                    SELECT id, first_name, last_name, email, phone_number, birthday,
                           note, user_id, created_at, updated_at
                    FROM contacts
                    WHERE user_id = $1
                    ORDER BY id ASC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(owner_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(db)
                .await?
            }
        };
        Ok(rows)
    }

    /// Every contact the owner has; the birthday scan filters in memory.
    pub async fn list_all(db: &PgPool, owner_id: i64) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday,
                   note, user_id, created_at, updated_at
            FROM contacts
            WHERE user_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(db: &PgPool, owner_id: i64, id: i64) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, first_name, last_name, email, phone_number, birthday,
                   note, user_id, created_at, updated_at
            FROM contacts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    pub async fn create(
        db: &PgPool,
        owner_id: i64,
        body: &ContactCreate,
    ) -> Result<Contact, sqlx::Error> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (first_name, last_name, email, phone_number, birthday, note, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, first_name, last_name, email, phone_number, birthday,
                      note, user_id, created_at, updated_at
            "#,
        )
        .bind(&body.first_name)
        .bind(&body.last_name)
        .bind(&body.email)
        .bind(&body.phone_number)
        .bind(body.birthday)
        .bind(&body.note)
        .bind(owner_id)
        .fetch_one(db)
        .await?;
        Ok(contact)
    }

    /// Merge-patch: only the supplied fields change, everything else keeps
    /// its stored value. Returns None when the contact is absent or owned
    /// by someone else.
    pub async fn update(
        db: &PgPool,
        owner_id: i64,
        id: i64,
        patch: &ContactPatch,
    ) -> anyhow::Result<Option<Contact>> {
        let Some(mut contact) = Contact::get(db, owner_id, id).await? else {
            return Ok(None);
        };
        patch.apply_to(&mut contact);

        let contact = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
            SET first_name = $1, last_name = $2, email = $3, phone_number = $4,
                birthday = $5, note = $6, updated_at = now()
            WHERE id = $7 AND user_id = $8
            RETURNING id, first_name, last_name, email, phone_number, birthday,
                      note, user_id, created_at, updated_at
            "#,
        )
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.email)
        .bind(&contact.phone_number)
        .bind(contact.birthday)
        .bind(&contact.note)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Deletes the contact and returns its last-known values.
    pub async fn delete(db: &PgPool, owner_id: i64, id: i64) -> anyhow::Result<Option<Contact>> {
        let contact = sqlx::query_as::<_, Contact>(
            r#"
            DELETE FROM contacts
            WHERE id = $1 AND user_id = $2
            RETURNING id, first_name, last_name, email, phone_number, birthday,
                      note, user_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }
}
