use async_graphql::{Context, Object, Result};
use sqlx::PgPool;

use crate::graphql::guards::{LoggedIn, Permission};
use crate::models::booking::Booking;
use crate::models::fitness_class::{ClassCategory, FitnessClass};
use crate::models::member::Member;
use crate::util::current_time;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The currently logged-in member, if any
    pub async fn user(&self, ctx: &Context<'_>) -> Option<Member> {
        ctx.data_opt::<Member>().cloned()
    }

    /// A single class, with its spot count and the requester's booking status
    pub async fn fitness_class(&self, ctx: &Context<'_>, id: i64) -> Result<FitnessClass> {
        let pool: &PgPool = ctx.data_unchecked();
        FitnessClass::with_id(id, pool).await
    }

    /// The upcoming, bookable classes, optionally filtered by category,
    /// instructor, or a free-text search
    pub async fn fitness_classes(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        category: Option<ClassCategory>,
        instructor: Option<String>,
    ) -> Result<Vec<FitnessClass>> {
        let pool: &PgPool = ctx.data_unchecked();
        FitnessClass::upcoming(search, category, instructor, current_time(), pool).await
    }

    /// The current member's active bookings for classes that haven't started
    #[graphql(guard = "LoggedIn")]
    pub async fn my_bookings(&self, ctx: &Context<'_>) -> Result<Vec<Booking>> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &Member = ctx.data_unchecked();
        Booking::upcoming_for_member(&user.email, pool).await
    }

    /// A single booking, visible to its owner and to staff
    #[graphql(guard = "LoggedIn")]
    pub async fn booking(&self, ctx: &Context<'_>, id: i64) -> Result<Booking> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &Member = ctx.data_unchecked();

        let booking = Booking::with_id(id, pool).await?;
        if booking.member != user.email && !Permission::MANAGE_CLASSES.granted_to(user) {
            return Err("Bookings are only visible to their owner".into());
        }

        Ok(booking)
    }
}
