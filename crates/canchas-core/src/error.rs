//! # Error Types
//!
//! Domain-specific error types for canchas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  canchas-core errors (this file)                                       │
//! │  ├── CoreError        - Lifecycle / business rule violations           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  canchas-db           └── DbError   (wraps CoreError as Domain)        │
//! │  canchas-sync         └── SyncError (wraps CoreError as Rule)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError / SyncError → toast       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::{BookingStatus, PaymentStatus, RegisterStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A register is already open for the establishment.
    ///
    /// ## When This Occurs
    /// - Second "Abrir caja" click while the first register is still open
    /// - Two staff members opening the till on different devices
    #[error("Establishment {establishment_id} already has an open cash register ({register_id})")]
    CashRegisterAlreadyOpen {
        establishment_id: String,
        register_id: String,
    },

    /// The operation needs an open register.
    #[error("Cash register {register_id} is {status}, expected open")]
    CashRegisterNotOpen {
        register_id: String,
        status: RegisterStatus,
    },

    /// Cash register cannot be found.
    #[error("Cash register not found: {0}")]
    CashRegisterNotFound(String),

    /// Booking cannot be found.
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// Booking is completed, cancelled or no-show and cannot change.
    ///
    /// ## User Workflow
    /// ```text
    /// Player clicks "Cancelar" on a completed booking
    ///      │
    ///      ▼
    /// BookingTerminal { status: Completed }
    ///      │
    ///      ▼
    /// UI shows: "Booking ... is already completed"
    /// ```
    #[error("Booking {booking_id} is already {status} and cannot change")]
    BookingTerminal {
        booking_id: String,
        status: BookingStatus,
    },

    /// Status change not allowed by the booking state machine.
    #[error("Booking {booking_id} cannot move from {from} to {to}")]
    InvalidBookingTransition {
        booking_id: String,
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Payment status change not allowed.
    #[error("Booking {booking_id} payment cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        booking_id: String,
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true if the error reports a conflict with current state
    /// (as opposed to bad input or a missing record).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::CashRegisterAlreadyOpen { .. }
                | CoreError::CashRegisterNotOpen { .. }
                | CoreError::BookingTerminal { .. }
                | CoreError::InvalidBookingTransition { .. }
                | CoreError::InvalidPaymentTransition { .. }
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, end before start).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
