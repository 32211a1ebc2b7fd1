use async_graphql::{
    ComplexObject, Context, ErrorExtensions, InputObject, Result, SimpleObject,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::error::BookingError;
use crate::models::fitness_class::FitnessClass;
use crate::models::member::Member;
use crate::models::GqlDateTime;
use crate::util::current_time;

/// A member's claim on one spot in a fitness class.
///
/// Rows are never deleted; cancelling flips the `cancelled` flag so the
/// booking can be reinstated later under the same ID.
#[derive(SimpleObject, FromRow, Clone, Debug)]
#[graphql(complex)]
pub struct Booking {
    /// The ID of the booking
    pub id: i64,
    /// Whether the member showed up to the class
    pub attended: bool,
    /// Whether the booking has been cancelled
    pub cancelled: bool,
    /// Why the booking was cancelled, if a reason was given
    pub cancellation_reason: Option<String>,

    #[graphql(skip)]
    pub member: String,
    #[graphql(skip)]
    pub fitness_class: i64,
    #[graphql(skip)]
    pub created: OffsetDateTime,
}

#[ComplexObject]
impl Booking {
    /// The member who booked the spot
    pub async fn member(&self, ctx: &Context<'_>) -> Result<Member> {
        let pool: &PgPool = ctx.data_unchecked();
        Member::with_email(&self.member, pool).await
    }

    /// The class the spot belongs to
    pub async fn fitness_class(&self, ctx: &Context<'_>) -> Result<FitnessClass> {
        let pool: &PgPool = ctx.data_unchecked();
        FitnessClass::with_id(self.fitness_class, pool).await
    }

    /// When the booking was made
    pub async fn created(&self) -> GqlDateTime {
        GqlDateTime(self.created)
    }
}

impl Booking {
    const COLUMNS: &'static str =
        "id, member, fitness_class, attended, cancelled, cancellation_reason, created";

    pub async fn with_id(id: i64, pool: &PgPool) -> Result<Self> {
        Self::with_id_opt(id, pool)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("No booking with id {}", id)).extend())
    }

    pub async fn with_id_opt(id: i64, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM booking WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn for_member_at_class(
        member: &str,
        class_id: i64,
        pool: &PgPool,
    ) -> Result<Self> {
        Self::for_member_at_class_opt(member, class_id, pool)
            .await?
            .ok_or_else(|| {
                BookingError::NotFound(format!(
                    "No booking for member {} at class with id {}",
                    member, class_id
                ))
                .extend()
            })
    }

    pub async fn for_member_at_class_opt(
        member: &str,
        class_id: i64,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM booking WHERE member = $1 AND fitness_class = $2",
            Self::COLUMNS
        ))
        .bind(member)
        .bind(class_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// The active bookings for a class, in booking order.
    pub async fn active_for_class(class_id: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {} FROM booking
             WHERE fitness_class = $1 AND NOT cancelled
             ORDER BY created",
            Self::COLUMNS
        ))
        .bind(class_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// How many active bookings count against the class's capacity.
    ///
    /// Always read from committed state, never cached, so the spot count
    /// reflects the latest bookings at call time.
    pub async fn active_count_for_class(class_id: i64, pool: &PgPool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM booking WHERE fitness_class = $1 AND NOT cancelled",
        )
        .bind(class_id)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// A member's active bookings for classes that haven't started yet.
    pub async fn upcoming_for_member(member: &str, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT b.id, b.member, b.fitness_class, b.attended, b.cancelled,
                    b.cancellation_reason, b.created
             FROM booking b
             JOIN fitness_class c ON b.fitness_class = c.id
             WHERE b.member = $1 AND NOT b.cancelled AND c.start_time >= $2
             ORDER BY c.start_time",
        )
        .bind(member)
        .bind(current_time())
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Books a spot in the given class for the member.
    ///
    /// A previously cancelled booking is reinstated under its existing ID
    /// instead of inserting a second row. The capacity check is repeated
    /// under a lock on the class row before the write commits, so of two
    /// racing requests for the last spot exactly one lands and the other
    /// fails with `ClassFull`.
    pub async fn create(member: &str, class: &FitnessClass, pool: &PgPool) -> Result<Self> {
        let existing = Self::for_member_at_class_opt(member, class.id, pool).await?;
        let active = Self::active_count_for_class(class.id, pool).await?;
        if let Some(issue) = class.booking_issue_for(existing.as_ref(), active, current_time()) {
            return Err(issue.extend());
        }

        if let Some(cancelled) = existing {
            return Self::reinstate(&cancelled, pool).await;
        }

        let mut tx = pool.begin().await?;
        if Self::remaining_with_lock(class.id, &mut tx).await? <= 0 {
            return Err(BookingError::ClassFull.extend());
        }

        let inserted = sqlx::query(
            "INSERT INTO booking (member, fitness_class) VALUES ($1, $2)
             ON CONFLICT (member, fitness_class) DO NOTHING",
        )
        .bind(member)
        .bind(class.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if inserted.rows_affected() == 0 {
            // a racing request created this member's row first
            return Err(BookingError::DuplicateBooking.extend());
        }

        Self::for_member_at_class(member, class.id, pool).await
    }

    async fn reinstate(booking: &Self, pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await?;
        if Self::remaining_with_lock(booking.fitness_class, &mut tx).await? <= 0 {
            return Err(BookingError::ClassFull.extend());
        }

        let reinstated = sqlx::query(
            "UPDATE booking
             SET cancelled = false, cancellation_reason = NULL, modified = now()
             WHERE id = $1 AND cancelled",
        )
        .bind(booking.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        if reinstated.rows_affected() == 0 {
            // a racing request already reinstated this booking
            return Err(BookingError::DuplicateBooking.extend());
        }

        Self::with_id(booking.id, pool).await
    }

    /// How many spots are open, counted while holding a lock on the class
    /// row. Concurrent bookings for the same class queue up on that lock,
    /// so each one counts the rows its predecessors committed. A plain
    /// count-in-the-insert is not enough: under read committed, two
    /// inserts racing for the last spot each snapshot the same count and
    /// both land.
    async fn remaining_with_lock(
        class_id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64> {
        let capacity = sqlx::query_scalar::<_, i64>(
            "SELECT capacity FROM fitness_class WHERE id = $1 FOR UPDATE",
        )
        .bind(class_id)
        .fetch_one(&mut *tx)
        .await?;
        let active = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM booking WHERE fitness_class = $1 AND NOT cancelled",
        )
        .bind(class_id)
        .fetch_one(&mut *tx)
        .await?;

        Ok(capacity - active)
    }

    /// Cancels the booking, recording the member's reason verbatim.
    ///
    /// Cancelling an already-cancelled booking is a no-op. Otherwise the
    /// 24-hour deadline applies and a late cancel changes nothing.
    pub async fn cancel(
        &self,
        reason: Option<String>,
        class: &FitnessClass,
        pool: &PgPool,
    ) -> Result<Self> {
        if self.cancelled {
            return Ok(self.clone());
        }

        if let Some(issue) = self.cancellation_issue(class, current_time()) {
            return Err(issue.extend());
        }

        sqlx::query(
            "UPDATE booking
             SET cancelled = true, cancellation_reason = $1, modified = now()
             WHERE id = $2",
        )
        .bind(&reason)
        .bind(self.id)
        .execute(pool)
        .await?;

        Self::with_id(self.id, pool).await
    }

    /// Why the booking cannot be cancelled right now, if anything.
    pub fn cancellation_issue(
        &self,
        class: &FitnessClass,
        now: OffsetDateTime,
    ) -> Option<BookingError> {
        if now > class.cancellation_deadline() {
            Some(BookingError::CancellationWindowClosed)
        } else {
            None
        }
    }

    /// Records who showed up to a class, for the instructor's roster screen.
    /// Updates are scoped to the class so a stray booking ID cannot touch
    /// another class's roster.
    pub async fn update_attendance(
        class_id: i64,
        updates: Vec<AttendanceUpdate>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        FitnessClass::with_id(class_id, pool).await?;

        // TODO: make batch query
        for update in updates {
            sqlx::query(
                "UPDATE booking SET attended = $1, modified = now()
                 WHERE id = $2 AND fitness_class = $3",
            )
            .bind(update.attended)
            .bind(update.booking)
            .bind(class_id)
            .execute(pool)
            .await?;
        }

        Self::active_for_class(class_id, pool).await
    }
}

#[derive(InputObject)]
pub struct AttendanceUpdate {
    /// The ID of the booking to mark
    pub booking: i64,
    /// Whether the member attended
    pub attended: bool,
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use crate::models::fitness_class::ClassCategory;

    use super::*;

    fn evening_hiit() -> FitnessClass {
        FitnessClass {
            id: 2,
            name: "Evening HIIT".to_owned(),
            description: "High intensity interval training".to_owned(),
            category: ClassCategory::Hiit,
            capacity: 15,
            price: 2000,
            location: "Studio 2".to_owned(),
            is_active: true,
            image: None,
            instructor: "mike@pulsefitness.studio".to_owned(),
            start_time: datetime!(2025-06-02 18:00:00 UTC),
            end_time: datetime!(2025-06-02 19:00:00 UTC),
            created: datetime!(2025-05-01 12:00:00 UTC),
        }
    }

    fn active_booking() -> Booking {
        Booking {
            id: 3,
            member: "member@example.com".to_owned(),
            fitness_class: 2,
            attended: false,
            cancelled: false,
            cancellation_reason: None,
            created: datetime!(2025-05-20 12:00:00 UTC),
        }
    }

    #[test]
    fn cancelling_well_before_the_deadline_is_allowed() {
        let class = evening_hiit();
        let booking = active_booking();
        let two_days_out = class.start_time - Duration::days(2);

        assert_eq!(booking.cancellation_issue(&class, two_days_out), None);
    }

    #[test]
    fn the_deadline_itself_is_the_last_permitted_instant() {
        let class = evening_hiit();
        let booking = active_booking();
        let deadline = class.cancellation_deadline();

        assert_eq!(booking.cancellation_issue(&class, deadline), None);
        assert_eq!(
            booking.cancellation_issue(&class, deadline + Duration::seconds(1)),
            Some(BookingError::CancellationWindowClosed)
        );
    }

    #[test]
    fn cancelling_inside_24_hours_is_rejected() {
        let class = evening_hiit();
        let booking = active_booking();
        let an_hour_before = class.start_time - Duration::hours(1);

        assert_eq!(
            booking.cancellation_issue(&class, an_hour_before),
            Some(BookingError::CancellationWindowClosed)
        );
    }

    // These need a migrated Postgres instance behind DATABASE_URL:
    // `sqlx migrate run`, then `cargo test -- --ignored`.
    mod live {
        use uuid::Uuid;

        use crate::util::connect_to_db;

        use super::*;

        async fn test_pool() -> PgPool {
            dotenv::dotenv().ok();
            connect_to_db().await.unwrap()
        }

        async fn seed_member(pool: &PgPool) -> String {
            let email = format!("{}@example.com", Uuid::new_v4());
            sqlx::query(
                "INSERT INTO member (email, first_name, last_name, pass_hash)
                 VALUES ($1, 'Test', 'Member', '')",
            )
            .bind(&email)
            .execute(pool)
            .await
            .unwrap();

            email
        }

        async fn seed_class(capacity: i64, pool: &PgPool) -> FitnessClass {
            let instructor = seed_member(pool).await;
            let id = sqlx::query_scalar::<_, i64>(
                "INSERT INTO fitness_class
                     (name, description, instructor, category, start_time,
                      end_time, capacity, location)
                 VALUES ('Test Class', 'test', $1, 'yoga',
                         now() + interval '3 days',
                         now() + interval '3 days 1 hour', $2, 'Studio 1')
                 RETURNING id",
            )
            .bind(&instructor)
            .bind(capacity)
            .fetch_one(pool)
            .await
            .unwrap();

            FitnessClass::with_id(id, pool).await.unwrap()
        }

        #[tokio::test]
        #[ignore]
        async fn the_last_spot_goes_to_exactly_one_of_two_racing_bookings() {
            let pool = test_pool().await;
            let class = seed_class(1, &pool).await;
            let first_member = seed_member(&pool).await;
            let second_member = seed_member(&pool).await;

            let (first, second) = tokio::join!(
                Booking::create(&first_member, &class, &pool),
                Booking::create(&second_member, &class, &pool),
            );

            let errors: Vec<_> = [first, second].into_iter().filter_map(Result::err).collect();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, BookingError::ClassFull.to_string());
            assert_eq!(
                Booking::active_count_for_class(class.id, &pool).await.unwrap(),
                1
            );
        }

        #[tokio::test]
        #[ignore]
        async fn rebooking_a_cancelled_booking_reinstates_the_same_row() {
            let pool = test_pool().await;
            let class = seed_class(5, &pool).await;
            let member = seed_member(&pool).await;

            let booking = Booking::create(&member, &class, &pool).await.unwrap();
            let cancelled = booking
                .cancel(Some("Conflict".to_owned()), &class, &pool)
                .await
                .unwrap();
            assert!(cancelled.cancelled);

            let reinstated = Booking::create(&member, &class, &pool).await.unwrap();
            assert_eq!(reinstated.id, booking.id);
            assert!(!reinstated.cancelled);
            assert_eq!(reinstated.cancellation_reason, None);
        }

        #[tokio::test]
        #[ignore]
        async fn a_cancelled_booking_frees_its_spot() {
            let pool = test_pool().await;
            let class = seed_class(1, &pool).await;
            let first_member = seed_member(&pool).await;
            let second_member = seed_member(&pool).await;

            let booking = Booking::create(&first_member, &class, &pool).await.unwrap();
            let full = Booking::create(&second_member, &class, &pool)
                .await
                .unwrap_err();
            assert_eq!(full.message, BookingError::ClassFull.to_string());

            booking.cancel(None, &class, &pool).await.unwrap();
            let taken = Booking::create(&second_member, &class, &pool)
                .await
                .unwrap();
            assert!(!taken.cancelled);
        }
    }
}
