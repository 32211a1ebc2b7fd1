use async_graphql::{Context, Object, Result};
use sqlx::PgPool;

use crate::email::booking::{BookingCancelledEmail, BookingConfirmationEmail};
use crate::email::send_email;
use crate::graphql::guards::{LoggedIn, Permission};
use crate::graphql::SUCCESS_MESSAGE;
use crate::models::booking::{AttendanceUpdate, Booking};
use crate::models::fitness_class::{FitnessClass, NewFitnessClass};
use crate::models::member::session::Session;
use crate::models::member::Member;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Gets a login token on successful login
    pub async fn login(&self, ctx: &Context<'_>, email: String, password: String) -> Result<String> {
        let pool: &PgPool = ctx.data_unchecked();
        if !Member::login_is_valid(&email, &password, pool).await? {
            return Err("Invalid email or password".into());
        }

        Session::get_or_generate_token(&email, pool).await
    }

    /// Logs the member out
    pub async fn logout(&self, ctx: &Context<'_>) -> Result<&'static str> {
        let user = ctx.data_opt::<Member>().ok_or("Not currently logged in")?;
        let pool: &PgPool = ctx.data_unchecked();
        Session::remove(&user.email, pool).await?;

        Ok(SUCCESS_MESSAGE)
    }

    /// Books a spot in the given class for the current member. A booking
    /// the member cancelled earlier is reinstated rather than duplicated.
    #[graphql(guard = "LoggedIn")]
    pub async fn book_class(&self, ctx: &Context<'_>, class_id: i64) -> Result<Booking> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &Member = ctx.data_unchecked();

        let class = FitnessClass::with_id(class_id, pool).await?;
        let booking = Booking::create(&user.email, &class, pool).await?;

        // a lost confirmation email must never undo a committed booking
        let email = BookingConfirmationEmail::new(user, &class);
        if let Err(error) = send_email(email).await {
            eprintln!(
                "Failed to send confirmation email for class `{}`: {:?}",
                class.name, error
            );
        }

        Ok(booking)
    }

    /// Cancels a booking, up to 24 hours before the class starts
    #[graphql(guard = "LoggedIn")]
    pub async fn cancel_booking(
        &self,
        ctx: &Context<'_>,
        id: i64,
        reason: Option<String>,
    ) -> Result<Booking> {
        let pool: &PgPool = ctx.data_unchecked();
        let user: &Member = ctx.data_unchecked();

        let booking = Booking::with_id(id, pool).await?;
        if booking.member != user.email && !Permission::MANAGE_CLASSES.granted_to(user) {
            return Err("Bookings can only be cancelled by their owner".into());
        }

        let class = FitnessClass::with_id(booking.fitness_class, pool).await?;
        let already_cancelled = booking.cancelled;
        let cancelled = booking.cancel(reason, &class, pool).await?;

        if !already_cancelled {
            let member = Member::with_email(&cancelled.member, pool).await?;
            let email = BookingCancelledEmail::new(
                &member,
                &class,
                cancelled.cancellation_reason.clone(),
            );
            if let Err(error) = send_email(email).await {
                eprintln!(
                    "Failed to send cancellation email for class `{}`: {:?}",
                    class.name, error
                );
            }
        }

        Ok(cancelled)
    }

    /// Records attendance for a class's roster
    #[graphql(guard = "Permission::EDIT_ATTENDANCE")]
    pub async fn update_attendance(
        &self,
        ctx: &Context<'_>,
        class_id: i64,
        updates: Vec<AttendanceUpdate>,
    ) -> Result<Vec<Booking>> {
        let pool: &PgPool = ctx.data_unchecked();
        Booking::update_attendance(class_id, updates, pool).await
    }

    /// Adds a new class to the schedule
    #[graphql(guard = "Permission::MANAGE_CLASSES")]
    pub async fn create_class(
        &self,
        ctx: &Context<'_>,
        new_class: NewFitnessClass,
    ) -> Result<FitnessClass> {
        let pool: &PgPool = ctx.data_unchecked();
        let new_id = FitnessClass::create(new_class, pool).await?;

        FitnessClass::with_id(new_id, pool).await
    }

    /// Updates a class. Its start time is locked once bookings exist;
    /// everything else stays editable.
    #[graphql(guard = "Permission::MANAGE_CLASSES")]
    pub async fn update_class(
        &self,
        ctx: &Context<'_>,
        id: i64,
        update: NewFitnessClass,
    ) -> Result<FitnessClass> {
        let pool: &PgPool = ctx.data_unchecked();
        FitnessClass::update(id, update, pool).await?;

        FitnessClass::with_id(id, pool).await
    }
}
