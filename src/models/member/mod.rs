use async_graphql::{ComplexObject, Enum, ErrorExtensions, Result, SimpleObject};
use sqlx::{FromRow, PgPool};

use crate::error::BookingError;
use crate::models::member::session::Session;

pub mod session;

/// What a member is allowed to do, checked by the request layer before
/// any staff-only operation reaches the models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
pub enum Role {
    Member,
    Instructor,
    Admin,
}

#[derive(SimpleObject, FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct Member {
    /// The member's email, which must be unique
    pub email: String,
    /// The member's first name
    pub first_name: String,
    /// The member's last name
    pub last_name: String,
    /// The member's phone number
    pub phone_number: Option<String>,
    /// The member's role at the studio
    pub role: Role,

    #[graphql(skip)]
    pub pass_hash: String,
}

#[ComplexObject]
impl Member {
    /// The member's full name
    pub async fn full_name(&self) -> String {
        self.full_name_inner()
    }
}

impl Member {
    const COLUMNS: &'static str = "email, first_name, last_name, phone_number, role, pass_hash";

    pub fn full_name_inner(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn with_email(email: &str, pool: &PgPool) -> Result<Member> {
        Self::with_email_opt(email, pool).await?.ok_or_else(|| {
            BookingError::NotFound(format!("No member with email {}", email)).extend()
        })
    }

    pub async fn with_email_opt(email: &str, pool: &PgPool) -> Result<Option<Member>> {
        sqlx::query_as::<_, Member>(&format!(
            "SELECT {} FROM member WHERE email = $1",
            Self::COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn with_token(token: &str, pool: &PgPool) -> Result<Member> {
        let session = Session::with_token(token, pool).await?;
        Self::with_email(&session.member, pool).await
    }

    pub async fn login_is_valid(email: &str, password: &str, pool: &PgPool) -> Result<bool> {
        if let Some(member) = Self::with_email_opt(email, pool).await? {
            bcrypt::verify(password, &member.pass_hash)
                .map_err(|err| format!("Failed to check password: {}", err).into())
        } else {
            Ok(false)
        }
    }
}
