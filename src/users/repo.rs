use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the credential store. The password digest and stored
/// refresh token never serialize.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub mobile_number: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Insert a new user. Duplicate username/email/mobile number surfaces
    /// as a unique-violation database error; there is no pre-check.
    pub async fn create(
        db: &PgPool,
        username: &str,
        email: &str,
        full_name: &str,
        mobile_number: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, full_name, mobile_number, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, email, full_name, mobile_number, password_hash,
                      refresh_token, created_at, updated_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(full_name)
        .bind(mobile_number)
        .bind(password_hash)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, full_name, mobile_number, password_hash,
                   refresh_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Login lookup: match on email or username, whichever was supplied.
    pub async fn find_by_email_or_username(
        db: &PgPool,
        email: Option<&str>,
        username: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, full_name, mobile_number, password_hash,
                   refresh_token, created_at, updated_at
            FROM users
            WHERE ($1::text IS NOT NULL AND email = $1)
               OR ($2::text IS NOT NULL AND username = $2)
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_optional(db)
        .await
    }

    /// Update the mutable profile fields. A NULL mobile number leaves the
    /// stored value unchanged.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        full_name: &str,
        email: &str,
        mobile_number: Option<&str>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = $2,
                email = $3,
                mobile_number = COALESCE($4, mobile_number),
                updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, full_name, mobile_number, password_hash,
                      refresh_token, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(email)
        .bind(mobile_number)
        .fetch_one(db)
        .await
    }

    pub async fn update_password(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    /// Persist the latest refresh token as the single active one.
    pub async fn set_refresh_token(
        db: &PgPool,
        id: Uuid,
        refresh_token: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(refresh_token)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn clear_refresh_token(db: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = NULL, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Returns the number of rows removed (0 when the user was already gone).
    pub async fn delete(db: &PgPool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
