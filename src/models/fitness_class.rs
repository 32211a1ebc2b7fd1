use async_graphql::{
    ComplexObject, Context, Enum, ErrorExtensions, InputObject, Result, SimpleObject,
};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};

use crate::error::BookingError;
use crate::graphql::guards::Permission;
use crate::models::booking::Booking;
use crate::models::member::Member;
use crate::models::GqlDateTime;

/// How long before a class starts that cancellations close.
pub const CANCELLATION_WINDOW: Duration = Duration::hours(24);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enum, sqlx::Type)]
#[sqlx(type_name = "class_category", rename_all = "lowercase")]
pub enum ClassCategory {
    Yoga,
    Pilates,
    Hiit,
    Cycling,
    Strength,
    Dance,
}

#[derive(SimpleObject, FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct FitnessClass {
    /// The ID of the class
    pub id: i64,
    /// The name of the class
    pub name: String,
    /// A description of what the class involves
    pub description: String,
    /// The category of the class
    pub category: ClassCategory,
    /// How many members can book the class
    pub capacity: i64,
    /// The price per spot, in cents
    pub price: i64,
    /// Where the class is held
    pub location: String,
    /// Whether the class is open for booking
    pub is_active: bool,
    /// An optional reference to an image for the class
    pub image: Option<String>,

    #[graphql(skip)]
    pub instructor: String,
    #[graphql(skip)]
    pub start_time: OffsetDateTime,
    #[graphql(skip)]
    pub end_time: OffsetDateTime,
    #[graphql(skip)]
    pub created: OffsetDateTime,
}

#[ComplexObject]
impl FitnessClass {
    /// The member who teaches this class
    pub async fn instructor(&self, ctx: &Context<'_>) -> Result<Member> {
        let pool: &PgPool = ctx.data_unchecked();
        Member::with_email(&self.instructor, pool).await
    }

    /// When the class starts
    pub async fn start_time(&self) -> GqlDateTime {
        GqlDateTime(self.start_time)
    }

    /// When the class ends
    pub async fn end_time(&self) -> GqlDateTime {
        GqlDateTime(self.end_time)
    }

    /// When the class was added to the schedule
    pub async fn created(&self) -> GqlDateTime {
        GqlDateTime(self.created)
    }

    /// How long the class runs, in minutes
    pub async fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).whole_minutes()
    }

    /// How many spots are still open
    pub async fn spots_remaining(&self, ctx: &Context<'_>) -> Result<i64> {
        let pool: &PgPool = ctx.data_unchecked();
        let active = Booking::active_count_for_class(self.id, pool).await?;

        Ok(self.remaining(active))
    }

    /// Whether all spots are taken
    pub async fn is_full(&self, ctx: &Context<'_>) -> Result<bool> {
        Ok(self.spots_remaining(ctx).await? <= 0)
    }

    /// Whether the current user holds an active booking for this class
    pub async fn is_booked(&self, ctx: &Context<'_>) -> Result<bool> {
        let pool: &PgPool = ctx.data_unchecked();

        if let Some(user) = ctx.data_opt::<Member>() {
            let booking = Booking::for_member_at_class_opt(&user.email, self.id, pool).await?;
            Ok(matches!(booking, Some(booking) if !booking.cancelled))
        } else {
            Ok(false)
        }
    }

    /// The roster of active bookings for this class
    pub async fn bookings(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = false)] empty_if_not_permitted: bool,
    ) -> Result<Vec<Booking>> {
        let pool: &PgPool = ctx.data_unchecked();
        let permitted = matches!(
            ctx.data_opt::<Member>(),
            Some(user) if Permission::EDIT_ATTENDANCE.granted_to(user)
        );
        if !permitted {
            if empty_if_not_permitted {
                return Ok(vec![]);
            } else {
                return Err(Permission::EDIT_ATTENDANCE.error());
            }
        }

        Booking::active_for_class(self.id, pool).await
    }
}

impl FitnessClass {
    const COLUMNS: &'static str =
        "id, name, description, instructor, category, start_time, end_time, \
         capacity, price, location, is_active, image, created";

    pub async fn with_id(id: i64, pool: &PgPool) -> Result<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("No class with id {}", id)).extend())
    }

    pub async fn with_id_opt(id: i64, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fitness_class WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// The upcoming, bookable classes, optionally narrowed by category,
    /// instructor, or a free-text search over name, description, and
    /// instructor name.
    pub async fn upcoming(
        search: Option<String>,
        category: Option<ClassCategory>,
        instructor: Option<String>,
        now: OffsetDateTime,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fitness_class
             WHERE is_active AND start_time >= $1
               AND ($2 IS NULL OR category = $2)
               AND ($3 IS NULL OR instructor = $3)
               AND ($4 IS NULL
                    OR name ILIKE '%' || $4 || '%'
                    OR description ILIKE '%' || $4 || '%'
                    OR instructor IN (
                        SELECT email FROM member
                        WHERE first_name || ' ' || last_name ILIKE '%' || $4 || '%'))
             ORDER BY start_time",
            Self::COLUMNS
        ))
        .bind(now)
        .bind(category)
        .bind(instructor)
        .bind(search)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The active classes starting inside the given window, for reminders.
    pub async fn starting_between(
        from: OffsetDateTime,
        to: OffsetDateTime,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM fitness_class
             WHERE is_active AND start_time >= $1 AND start_time < $2
             ORDER BY start_time",
            Self::COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn create(new_class: NewFitnessClass, pool: &PgPool) -> Result<i64> {
        if let Some(issue) = new_class.schedule_issue() {
            return Err(issue.extend());
        }
        // the instructor reference must point at a real member
        Member::with_email(&new_class.instructor, pool).await?;

        sqlx::query_scalar::<_, i64>(
            "INSERT INTO fitness_class
                 (name, description, instructor, category, start_time, end_time,
                  capacity, price, location, is_active, image)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
        )
        .bind(new_class.name)
        .bind(new_class.description)
        .bind(new_class.instructor)
        .bind(new_class.category)
        .bind(new_class.start_time.0)
        .bind(new_class.end_time.0)
        .bind(new_class.capacity)
        .bind(new_class.price)
        .bind(new_class.location)
        .bind(new_class.is_active)
        .bind(new_class.image)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn update(id: i64, update: NewFitnessClass, pool: &PgPool) -> Result<()> {
        let class = Self::with_id(id, pool).await?;

        if let Some(issue) = update.schedule_issue() {
            return Err(issue.extend());
        }

        let active = Booking::active_count_for_class(id, pool).await?;
        if let Some(issue) = class.schedule_change_issue(update.start_time.0, active) {
            return Err(issue.extend());
        }
        // the instructor reference must point at a real member
        Member::with_email(&update.instructor, pool).await?;

        sqlx::query(
            "UPDATE fitness_class
             SET name = $1, description = $2, instructor = $3, category = $4,
                 start_time = $5, end_time = $6, capacity = $7, price = $8,
                 location = $9, is_active = $10, image = $11, modified = now()
             WHERE id = $12",
        )
        .bind(update.name)
        .bind(update.description)
        .bind(update.instructor)
        .bind(update.category)
        .bind(update.start_time.0)
        .bind(update.end_time.0)
        .bind(update.capacity)
        .bind(update.price)
        .bind(update.location)
        .bind(update.is_active)
        .bind(update.image)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// The open spot count given how many active bookings exist,
    /// clamped so over-capacity edits never read as negative.
    pub fn remaining(&self, active_bookings: i64) -> i64 {
        (self.capacity - active_bookings).max(0)
    }

    /// The last instant a booking for this class may be cancelled.
    pub fn cancellation_deadline(&self) -> OffsetDateTime {
        self.start_time - CANCELLATION_WINDOW
    }

    /// Why a member cannot book this class right now, if anything.
    ///
    /// Gates are checked in order and the first failure wins: a past
    /// class, a full class, then an existing active booking. A cancelled
    /// existing booking is not an issue; the caller reinstates it.
    pub fn booking_issue_for(
        &self,
        existing: Option<&Booking>,
        active_bookings: i64,
        now: OffsetDateTime,
    ) -> Option<BookingError> {
        if self.start_time <= now {
            Some(BookingError::PastClass)
        } else if self.remaining(active_bookings) <= 0 {
            Some(BookingError::ClassFull)
        } else if matches!(existing, Some(booking) if !booking.cancelled) {
            Some(BookingError::DuplicateBooking)
        } else {
            None
        }
    }

    /// Why the class cannot be rescheduled, if anything. Moving the start
    /// time is only allowed while nobody holds an active booking; every
    /// other field stays editable.
    pub fn schedule_change_issue(
        &self,
        new_start_time: OffsetDateTime,
        active_bookings: i64,
    ) -> Option<BookingError> {
        if new_start_time != self.start_time && active_bookings > 0 {
            Some(BookingError::ScheduleLocked)
        } else {
            None
        }
    }
}

#[derive(InputObject)]
pub struct NewFitnessClass {
    pub name: String,
    pub description: String,
    /// The email of the member teaching the class
    pub instructor: String,
    pub category: ClassCategory,
    pub start_time: GqlDateTime,
    pub end_time: GqlDateTime,
    pub capacity: i64,
    /// The price per spot, in cents
    #[graphql(default = 0)]
    pub price: i64,
    pub location: String,
    #[graphql(default = true)]
    pub is_active: bool,
    pub image: Option<String>,
}

impl NewFitnessClass {
    pub fn schedule_issue(&self) -> Option<BookingError> {
        if self.end_time.0 <= self.start_time.0 {
            Some(BookingError::InvalidSchedule("class must end after it starts"))
        } else if self.capacity < 1 {
            Some(BookingError::InvalidSchedule("capacity must be at least 1"))
        } else {
            None
        }
    }
}
