//! # Booking Repository
//!
//! Persistence for bookings and the staff-side reservation details.
//!
//! Status and payment changes go through [`BookingRepository::transition`]
//! and [`BookingRepository::set_payment_status`], which apply the
//! `canchas-core` state machine and write back only if the row still has
//! the status that was read.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use tracing::{debug, info};

use canchas_core::{
    AdminReservation, Booking, BookingStatus, CoreError, NewBooking, PaymentMethod, PaymentStatus,
    ReservationDetails,
};

use super::begin_write;
use crate::error::{DbError, DbResult};

// =============================================================================
// Row Types
// =============================================================================

/// `bookings` row. Participants are stored as a JSON array.
#[derive(Debug, FromRow)]
struct BookingRow {
    id: String,
    court_id: String,
    establishment_id: String,
    facility_name: String,
    sport: String,
    user_id: String,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    duration_minutes: i64,
    price_cents: i64,
    status: BookingStatus,
    payment_status: PaymentStatus,
    participants: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = DbError;

    fn try_from(row: BookingRow) -> DbResult<Self> {
        let participants: Vec<String> = serde_json::from_str(&row.participants)
            .map_err(|e| DbError::Internal(format!("booking {} participants: {e}", row.id)))?;

        Ok(Booking {
            id: row.id,
            court_id: row.court_id,
            establishment_id: row.establishment_id,
            facility_name: row.facility_name,
            sport: row.sport,
            user_id: row.user_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            price_cents: row.price_cents,
            status: row.status,
            payment_status: row.payment_status,
            participants,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `bookings` joined with `admin_reservations`.
#[derive(Debug, FromRow)]
struct AdminReservationRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    deposit_cents: i64,
    deposit_paid: bool,
    fee_cents: i64,
    payment_provider: Option<PaymentMethod>,
    provider_reference: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    admin_notes: Option<String>,
}

impl TryFrom<AdminReservationRow> for AdminReservation {
    type Error = DbError;

    fn try_from(row: AdminReservationRow) -> DbResult<Self> {
        Ok(AdminReservation {
            booking: row.booking.try_into()?,
            deposit_cents: row.deposit_cents,
            deposit_paid: row.deposit_paid,
            fee_cents: row.fee_cents,
            payment_provider: row.payment_provider,
            provider_reference: row.provider_reference,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            admin_notes: row.admin_notes,
        })
    }
}

const ADMIN_SELECT: &str = r#"
    SELECT
        b.*,
        a.deposit_cents,
        a.deposit_paid,
        a.fee_cents,
        a.payment_provider,
        a.provider_reference,
        a.customer_name,
        a.customer_phone,
        a.admin_notes
    FROM bookings b
    JOIN admin_reservations a ON a.booking_id = b.id
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for booking database operations.
#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: SqlitePool,
}

impl BookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BookingRepository { pool }
    }

    /// Creates a pending, unpaid booking.
    pub async fn create(&self, req: NewBooking) -> DbResult<Booking> {
        let booking = Booking::new(req, Utc::now())?;
        insert_booking(&self.pool, &booking).await?;

        info!(
            booking_id = %booking.id,
            court_id = %booking.court_id,
            date = %booking.date,
            start = %booking.start_time,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Booking>> {
        fetch_booking(&self.pool, id).await
    }

    /// A player's bookings, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT * FROM bookings
            WHERE user_id = ?1
            ORDER BY date DESC, start_time DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    /// An establishment's bookings in schedule order, optionally for one day.
    pub async fn list_for_establishment(
        &self,
        establishment_id: &str,
        date: Option<NaiveDate>,
    ) -> DbResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT * FROM bookings
            WHERE establishment_id = ?1
              AND (?2 IS NULL OR date = ?2)
            ORDER BY date, start_time
            "#,
        )
        .bind(establishment_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Moves a booking to `to`.
    ///
    /// ## Errors
    /// - `Domain(BookingNotFound)`
    /// - `Domain(BookingTerminal)` when the booking is completed, cancelled or no-show
    /// - `Domain(InvalidBookingTransition)` for steps the state machine forbids
    pub async fn transition(&self, id: &str, to: BookingStatus) -> DbResult<Booking> {
        let mut tx = begin_write(&self.pool).await?;

        let mut booking = fetch_booking(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::BookingNotFound(id.to_string()))?;
        let from = booking.status;

        booking.transition(to, Utc::now())?;
        write_status(&mut *tx, &booking, from).await?;

        tx.commit().await?;

        info!(
            booking_id = %id,
            from = %from,
            to = %to,
            payment_status = %booking.payment_status,
            "Booking status changed"
        );
        Ok(booking)
    }

    pub async fn cancel(&self, id: &str) -> DbResult<Booking> {
        self.transition(id, BookingStatus::Cancelled).await
    }

    pub async fn complete(&self, id: &str) -> DbResult<Booking> {
        self.transition(id, BookingStatus::Completed).await
    }

    /// Applies a payment update reported by the backend or Mercado Pago.
    pub async fn set_payment_status(&self, id: &str, to: PaymentStatus) -> DbResult<Booking> {
        let mut tx = begin_write(&self.pool).await?;

        let mut booking = fetch_booking(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::BookingNotFound(id.to_string()))?;
        let from = booking.payment_status;

        booking.set_payment_status(to, Utc::now())?;
        if from != to {
            write_status(&mut *tx, &booking, booking.status).await?;
        }

        tx.commit().await?;

        debug!(booking_id = %id, from = %from, to = %to, "Payment status updated");
        Ok(booking)
    }

    // =========================================================================
    // Admin Reservations
    // =========================================================================

    /// Creates a staff-side reservation. It starts confirmed, since staff
    /// booking on a customer's behalf is the confirmation.
    pub async fn create_admin_reservation(
        &self,
        req: NewBooking,
        details: ReservationDetails,
    ) -> DbResult<AdminReservation> {
        let now = Utc::now();
        let mut booking = Booking::new(req, now)?;
        booking.confirm(now)?;
        let reservation = AdminReservation::new(booking, details)?;

        let mut tx = begin_write(&self.pool).await?;

        insert_booking(&mut *tx, &reservation.booking).await?;
        sqlx::query(
            r#"
            INSERT INTO admin_reservations (
                booking_id, deposit_cents, deposit_paid, fee_cents,
                payment_provider, provider_reference,
                customer_name, customer_phone, admin_notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&reservation.booking.id)
        .bind(reservation.deposit_cents)
        .bind(reservation.deposit_paid)
        .bind(reservation.fee_cents)
        .bind(reservation.payment_provider)
        .bind(&reservation.provider_reference)
        .bind(&reservation.customer_name)
        .bind(&reservation.customer_phone)
        .bind(&reservation.admin_notes)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            booking_id = %reservation.booking.id,
            deposit_cents = reservation.deposit_cents,
            "Admin reservation created"
        );
        Ok(reservation)
    }

    pub async fn get_admin_reservation(&self, booking_id: &str) -> DbResult<Option<AdminReservation>> {
        let sql = format!("{ADMIN_SELECT} WHERE b.id = ?1");
        let row = sqlx::query_as::<_, AdminReservationRow>(&sql)
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AdminReservation::try_from).transpose()
    }

    /// Staff-created reservations of an establishment, in schedule order.
    pub async fn list_admin_reservations(
        &self,
        establishment_id: &str,
        date: Option<NaiveDate>,
    ) -> DbResult<Vec<AdminReservation>> {
        let sql = format!(
            "{ADMIN_SELECT} WHERE b.establishment_id = ?1 AND (?2 IS NULL OR b.date = ?2) \
             ORDER BY b.date, b.start_time"
        );
        let rows = sqlx::query_as::<_, AdminReservationRow>(&sql)
            .bind(establishment_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AdminReservation::try_from).collect()
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

async fn fetch_booking<'e, E>(executor: E, id: &str) -> DbResult<Option<Booking>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = ?1")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.map(Booking::try_from).transpose()
}

async fn insert_booking<'e, E>(executor: E, b: &Booking) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let participants = serde_json::to_string(&b.participants)
        .map_err(|e| DbError::Internal(format!("booking {} participants: {e}", b.id)))?;

    sqlx::query(
        r#"
        INSERT INTO bookings (
            id, court_id, establishment_id, facility_name, sport, user_id,
            date, start_time, end_time, duration_minutes, price_cents,
            status, payment_status, participants, created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11,
            ?12, ?13, ?14, ?15, ?16
        )
        "#,
    )
    .bind(&b.id)
    .bind(&b.court_id)
    .bind(&b.establishment_id)
    .bind(&b.facility_name)
    .bind(&b.sport)
    .bind(&b.user_id)
    .bind(b.date)
    .bind(b.start_time)
    .bind(b.end_time)
    .bind(b.duration_minutes)
    .bind(b.price_cents)
    .bind(b.status)
    .bind(b.payment_status)
    .bind(participants)
    .bind(b.created_at)
    .bind(b.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Writes status, payment status and `updated_at`, guarded on the status
/// that was read.
async fn write_status<'e, E>(executor: E, b: &Booking, expected: BookingStatus) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE bookings SET
            status = ?2,
            payment_status = ?3,
            updated_at = ?4
        WHERE id = ?1 AND status = ?5
        "#,
    )
    .bind(&b.id)
    .bind(b.status)
    .bind(b.payment_status)
    .bind(b.updated_at)
    .bind(expected)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::stale("Booking", b.id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn repo() -> BookingRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().bookings()
    }

    fn request(day: u32, hour: u32) -> NewBooking {
        NewBooking {
            court_id: "court-1".into(),
            establishment_id: "est-1".into(),
            facility_name: "Club Atlético".into(),
            sport: "futbol5".into(),
            user_id: "player-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 7, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            price_cents: 2_000_000,
            participants: vec!["Ana".into(), "Bruno".into()],
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let repo = repo().await;
        let created = repo.create(request(1, 19)).await.unwrap();

        let stored = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored, created);
        assert_eq!(stored.participants, vec!["Ana".to_string(), "Bruno".to_string()]);
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lists() {
        let repo = repo().await;
        repo.create(request(1, 19)).await.unwrap();
        repo.create(request(3, 18)).await.unwrap();
        repo.create(request(1, 17)).await.unwrap();

        let mine = repo.list_for_user("player-1").await.unwrap();
        assert_eq!(mine.len(), 3);
        assert_eq!(mine[0].date.to_string(), "2026-07-03");

        let day = repo
            .list_for_establishment("est-1", NaiveDate::from_ymd_opt(2026, 7, 1))
            .await
            .unwrap();
        assert_eq!(day.len(), 2);
        assert!(day[0].start_time < day[1].start_time);

        assert_eq!(repo.list_for_establishment("est-1", None).await.unwrap().len(), 3);
        assert!(repo.list_for_user("player-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_persists() {
        let repo = repo().await;
        let b = repo.create(request(1, 19)).await.unwrap();

        repo.transition(&b.id, BookingStatus::Confirmed).await.unwrap();
        repo.set_payment_status(&b.id, PaymentStatus::Paid).await.unwrap();
        repo.transition(&b.id, BookingStatus::InProgress).await.unwrap();
        let done = repo.complete(&b.id).await.unwrap();

        let stored = repo.get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored, done);
        assert_eq!(stored.status, BookingStatus::Completed);
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_terminal_is_error() {
        let repo = repo().await;

        let b = repo.create(request(1, 19)).await.unwrap();
        repo.cancel(&b.id).await.unwrap();
        let err = repo.cancel(&b.id).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::BookingTerminal {
                status: BookingStatus::Cancelled,
                ..
            })
        ));

        let b = repo.create(request(2, 19)).await.unwrap();
        repo.transition(&b.id, BookingStatus::Confirmed).await.unwrap();
        repo.complete(&b.id).await.unwrap();
        let err = repo.cancel(&b.id).await.unwrap_err();
        assert!(err.is_conflict());
        let stored = repo.get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancel_paid_refunds() {
        let repo = repo().await;
        let b = repo.create(request(1, 19)).await.unwrap();
        repo.set_payment_status(&b.id, PaymentStatus::Paid).await.unwrap();

        let cancelled = repo.cancel(&b.id).await.unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        let stored = repo.get_by_id(&b.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_missing_booking() {
        let repo = repo().await;
        let err = repo.cancel("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::BookingNotFound(_))));
    }

    #[tokio::test]
    async fn test_admin_reservations() {
        let repo = repo().await;
        let details = ReservationDetails {
            deposit_cents: 500_000,
            deposit_paid: true,
            payment_provider: Some(PaymentMethod::MercadoPago),
            customer_name: Some("Carla".into()),
            customer_phone: Some("+54 11 5555-0000".into()),
            ..Default::default()
        };
        let created = repo
            .create_admin_reservation(request(5, 20), details)
            .await
            .unwrap();
        assert_eq!(created.booking.status, BookingStatus::Confirmed);

        let stored = repo
            .get_admin_reservation(&created.booking.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, created);

        // Player bookings are not admin reservations.
        let plain = repo.create(request(5, 18)).await.unwrap();
        assert!(repo.get_admin_reservation(&plain.id).await.unwrap().is_none());

        let listed = repo.list_admin_reservations("est-1", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].customer_name.as_deref(), Some("Carla"));
    }
}
