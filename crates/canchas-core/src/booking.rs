//! # Booking Lifecycle
//!
//! Status and payment-status transitions for court bookings.
//!
//! ## Status Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PENDING ──confirm──► CONFIRMED ──start──► IN_PROGRESS                 │
//! │      │                    │   │                  │                      │
//! │      │ cancel             │   │ complete         │ complete             │
//! │      ▼                    │   ▼                  ▼                      │
//! │   CANCELLED ◄──cancel─────┤  COMPLETED ◄─────────┘                      │
//! │                           │                                             │
//! │                           └──no-show──► NO_SHOW                         │
//! │                                                                         │
//! │   Terminal: COMPLETED, CANCELLED, NO_SHOW (booking becomes immutable)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payment Machine
//! ```text
//!   PENDING ──► PAID ──► REFUNDED
//!      │  ▲      ▲
//!      ▼  │      │
//!     FAILED ────┘
//! ```
//! Payment moves independently of status, but only while status is not
//! terminal. Cancelling a paid booking refunds it in the same step.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    AdminReservation, Booking, BookingStatus, NewBooking, PaymentStatus, ReservationDetails,
};
use crate::validation::{
    normalize_notes, validate_id, validate_notes, validate_participants, validate_price,
    validate_time_slot,
};

// =============================================================================
// Transition Tables
// =============================================================================

impl BookingStatus {
    /// Completed, cancelled and no-show bookings never change again.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// States reachable from `self` in one step.
    pub const fn allowed_next(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[InProgress, Completed, Cancelled, NoShow],
            InProgress => &[Completed],
            Completed | Cancelled | NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        self.allowed_next().contains(&to)
    }

    /// Whether a player (not staff) may cancel from this state.
    pub fn is_cancellable(&self) -> bool {
        self.can_transition_to(BookingStatus::Cancelled)
    }
}

impl PaymentStatus {
    pub const fn allowed_next(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Paid, Failed],
            Failed => &[Pending, Paid],
            Paid => &[Refunded],
            Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, to: PaymentStatus) -> bool {
        self.allowed_next().contains(&to)
    }
}

// =============================================================================
// Booking Operations
// =============================================================================

impl Booking {
    /// Builds a pending, unpaid booking from a reservation request.
    pub fn new(req: NewBooking, now: DateTime<Utc>) -> CoreResult<Self> {
        validate_id("courtId", &req.court_id)?;
        validate_id("establishmentId", &req.establishment_id)?;
        validate_id("userId", &req.user_id)?;
        validate_price(req.price_cents)?;
        validate_participants(&req.participants)?;
        let duration_minutes = validate_time_slot(req.start_time, req.end_time)?;

        Ok(Booking {
            id: Uuid::new_v4().to_string(),
            court_id: req.court_id,
            establishment_id: req.establishment_id,
            facility_name: req.facility_name,
            sport: req.sport,
            user_id: req.user_id,
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            duration_minutes,
            price_cents: req.price_cents,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            participants: req.participants,
            created_at: now,
            updated_at: now,
        })
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_mutable(&self) -> CoreResult<()> {
        if self.is_terminal() {
            return Err(CoreError::BookingTerminal {
                booking_id: self.id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    /// Moves the booking to `to`.
    ///
    /// ## Errors
    /// - `BookingTerminal` if the booking is already completed, cancelled or no-show
    /// - `InvalidBookingTransition` if the table does not allow the step
    pub fn transition(&mut self, to: BookingStatus, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_mutable()?;
        if !self.status.can_transition_to(to) {
            return Err(CoreError::InvalidBookingTransition {
                booking_id: self.id.clone(),
                from: self.status,
                to,
            });
        }

        if to == BookingStatus::Cancelled && self.payment_status == PaymentStatus::Paid {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BookingStatus::Confirmed, now)
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BookingStatus::InProgress, now)
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BookingStatus::Completed, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BookingStatus::Cancelled, now)
    }

    pub fn mark_no_show(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(BookingStatus::NoShow, now)
    }

    /// Updates the payment status.
    ///
    /// Setting the current status again is a no-op, so a redelivered
    /// provider notification does not fail.
    pub fn set_payment_status(&mut self, to: PaymentStatus, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_mutable()?;
        if self.payment_status == to {
            return Ok(());
        }
        if !self.payment_status.can_transition_to(to) {
            return Err(CoreError::InvalidPaymentTransition {
                booking_id: self.id.clone(),
                from: self.payment_status,
                to,
            });
        }
        self.payment_status = to;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Admin Reservations
// =============================================================================

impl AdminReservation {
    /// Wraps a booking with staff-side details.
    pub fn new(booking: Booking, details: ReservationDetails) -> CoreResult<Self> {
        if details.deposit_cents < 0 {
            return Err(ValidationError::Negative {
                field: "deposit".to_string(),
            }
            .into());
        }
        if details.fee_cents < 0 {
            return Err(ValidationError::Negative {
                field: "fee".to_string(),
            }
            .into());
        }
        if details.deposit_cents > booking.price_cents + details.fee_cents {
            return Err(ValidationError::OutOfRange {
                field: "deposit".to_string(),
                min: 0,
                max: booking.price_cents + details.fee_cents,
            }
            .into());
        }
        validate_notes(details.admin_notes.as_deref())?;

        Ok(AdminReservation {
            booking,
            deposit_cents: details.deposit_cents,
            deposit_paid: details.deposit_paid,
            fee_cents: details.fee_cents,
            payment_provider: details.payment_provider,
            provider_reference: details.provider_reference,
            customer_name: normalize_notes(details.customer_name.as_deref()),
            customer_phone: normalize_notes(details.customer_phone.as_deref()),
            admin_notes: normalize_notes(details.admin_notes.as_deref()),
        })
    }

    /// What the customer still owes at the court.
    pub fn balance_due(&self) -> Money {
        if self.booking.payment_status == PaymentStatus::Paid
            || self.booking.payment_status == PaymentStatus::Refunded
        {
            return Money::zero();
        }
        let total = Money::from_cents(self.booking.price_cents + self.fee_cents);
        if self.deposit_paid {
            total - Money::from_cents(self.deposit_cents)
        } else {
            total
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn new_booking() -> Booking {
        let req = NewBooking {
            court_id: "court-1".into(),
            establishment_id: "est-1".into(),
            facility_name: "Club Atlético".into(),
            sport: "futbol5".into(),
            user_id: "player-1".into(),
            date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
            start_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            price_cents: 3_000_000,
            participants: vec!["Juan".into(), "Pedro".into()],
        };
        Booking::new(req, Utc::now()).unwrap()
    }

    #[test]
    fn test_new_booking_is_pending() {
        let b = new_booking();
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.payment_status, PaymentStatus::Pending);
        assert_eq!(b.duration_minutes, 60);
    }

    #[test]
    fn test_happy_path() {
        let mut b = new_booking();
        let now = Utc::now();
        b.confirm(now).unwrap();
        b.set_payment_status(PaymentStatus::Paid, now).unwrap();
        b.start(now).unwrap();
        b.complete(now).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
        assert_eq!(b.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(!Pending.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(NoShow));
        assert!(Confirmed.can_transition_to(NoShow));
        assert!(!InProgress.can_transition_to(Cancelled));
        for terminal in [Completed, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            assert!(terminal.allowed_next().is_empty());
        }
    }

    #[test]
    fn test_cancel_terminal_is_error() {
        let now = Utc::now();

        let mut completed = new_booking();
        completed.confirm(now).unwrap();
        completed.complete(now).unwrap();
        let err = completed.cancel(now).unwrap_err();
        assert!(matches!(
            err,
            CoreError::BookingTerminal {
                status: BookingStatus::Completed,
                ..
            }
        ));
        assert_eq!(completed.status, BookingStatus::Completed);

        let mut cancelled = new_booking();
        cancelled.cancel(now).unwrap();
        let err = cancelled.cancel(now).unwrap_err();
        assert!(matches!(
            err,
            CoreError::BookingTerminal {
                status: BookingStatus::Cancelled,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_transition_leaves_booking_unchanged() {
        let mut b = new_booking();
        let before = b.clone();
        let err = b.start(Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidBookingTransition { .. }));
        assert_eq!(b, before);
    }

    #[test]
    fn test_cancel_paid_refunds() {
        let mut b = new_booking();
        let now = Utc::now();
        b.set_payment_status(PaymentStatus::Paid, now).unwrap();
        b.cancel(now).unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_payment_transitions() {
        let mut b = new_booking();
        let now = Utc::now();
        b.set_payment_status(PaymentStatus::Failed, now).unwrap();
        b.set_payment_status(PaymentStatus::Pending, now).unwrap();
        b.set_payment_status(PaymentStatus::Paid, now).unwrap();
        // Redelivered "paid" is fine.
        b.set_payment_status(PaymentStatus::Paid, now).unwrap();

        let err = b.set_payment_status(PaymentStatus::Failed, now).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPaymentTransition { .. }));
    }

    #[test]
    fn test_payment_frozen_after_terminal() {
        let mut b = new_booking();
        let now = Utc::now();
        b.confirm(now).unwrap();
        b.mark_no_show(now).unwrap();
        assert!(b.set_payment_status(PaymentStatus::Paid, now).is_err());
    }

    #[test]
    fn test_admin_reservation_balance() {
        let booking = new_booking();
        let details = ReservationDetails {
            deposit_cents: 1_000_000,
            deposit_paid: true,
            fee_cents: 50_000,
            customer_name: Some("  Martina ".into()),
            ..Default::default()
        };
        let res = AdminReservation::new(booking, details).unwrap();
        assert_eq!(res.customer_name.as_deref(), Some("Martina"));
        assert_eq!(res.balance_due().cents(), 3_000_000 + 50_000 - 1_000_000);
    }

    #[test]
    fn test_admin_reservation_rejects_oversized_deposit() {
        let booking = new_booking();
        let details = ReservationDetails {
            deposit_cents: 9_000_000,
            ..Default::default()
        };
        assert!(AdminReservation::new(booking, details).is_err());
    }
}
