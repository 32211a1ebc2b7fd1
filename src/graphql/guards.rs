use async_graphql::{Context, Error, Guard, Result};

use crate::models::member::{Member, Role};

pub struct LoggedIn;

#[async_trait::async_trait]
impl Guard for LoggedIn {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if ctx.data_opt::<Member>().is_some() {
            Ok(())
        } else {
            Err("User must be logged in".into())
        }
    }
}

/// A staff capability, granted by role rather than looked up per member.
pub struct Permission {
    name: &'static str,
}

impl Permission {
    const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub const MANAGE_CLASSES: Self = Self::new("manage-classes");
    pub const EDIT_ATTENDANCE: Self = Self::new("edit-attendance");

    pub fn granted_to(&self, member: &Member) -> bool {
        matches!(member.role, Role::Instructor | Role::Admin)
    }

    pub fn error(&self) -> Error {
        format!("Permission {} required", self.name).into()
    }
}

#[async_trait::async_trait]
impl Guard for Permission {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        if let Some(user) = ctx.data_opt::<Member>() {
            if self.granted_to(user) {
                return Ok(());
            }
        }

        Err(self.error())
    }
}
