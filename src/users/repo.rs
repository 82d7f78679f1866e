use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User row. Serialization is only used for the identity-cache snapshot;
/// HTTP responses go through `UserResponse`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub refresh_token: Option<String>,
    pub confirmed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Default avatar for fresh signups, derived from the email address.
pub fn gravatar_url(email: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("https://www.gravatar.com/avatar/{}", hex)
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, avatar, refresh_token,
                   confirmed, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
        avatar: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, avatar, refresh_token,
                      confirmed, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(avatar)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Overwrites the stored refresh token; `None` clears it.
    pub async fn update_refresh_token(
        db: &PgPool,
        user_id: i64,
        token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET refresh_token = $1, updated_at = now()
            WHERE id = $2
            "#,
        )
        .bind(token)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn confirm_email(db: &PgPool, email: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET confirmed = TRUE, updated_at = now()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn update_avatar(db: &PgPool, email: &str, url: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar = $1, updated_at = now()
            WHERE email = $2
            RETURNING id, username, email, password_hash, avatar, refresh_token,
                      confirmed, created_at, updated_at
            "#,
        )
        .bind(url)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
