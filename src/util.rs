//! Extra utilities for use elsewhere in the API.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const HUMAN_DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub async fn connect_to_db() -> anyhow::Result<PgPool> {
    let db_url = std::env::var("DATABASE_URL").context("No database URL provided")?;

    PgPoolOptions::new()
        .connect(&db_url)
        .await
        .context("Failed to connect to the database")
}

/// Formats an instant the way it should read in an email.
pub fn format_datetime(time: OffsetDateTime) -> String {
    time.format(HUMAN_DATETIME_FORMAT)
        .unwrap_or_else(|_| time.to_string())
}
