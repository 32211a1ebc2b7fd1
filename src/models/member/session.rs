use async_graphql::Result;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::member::Member;

/// A member's API login, keyed by the token the client sends back.
#[derive(FromRow)]
pub struct Session {
    pub member: String,
    pub key: String,
}

impl Session {
    pub async fn with_token(token: &str, pool: &PgPool) -> Result<Self> {
        Self::with_token_opt(token, pool)
            .await?
            .ok_or("No login tied to the provided API token")
            .map_err(Into::into)
    }

    pub async fn with_token_opt(token: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT member, key FROM session WHERE key = $1")
            .bind(token)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn get_or_generate_token(email: &str, pool: &PgPool) -> Result<String> {
        Member::with_email(email, pool).await?; // ensure that member exists

        let session = sqlx::query_scalar::<_, String>("SELECT key FROM session WHERE member = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        if let Some(session_key) = session {
            return Ok(session_key);
        }

        let token = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO session (member, key) VALUES ($1, $2)")
            .bind(email)
            .bind(&token)
            .execute(pool)
            .await?;

        Ok(token)
    }

    pub async fn remove(email: &str, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM session WHERE member = $1")
            .bind(email)
            .execute(pool)
            .await?;

        Ok(())
    }
}
