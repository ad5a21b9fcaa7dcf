//! # Validation Module
//!
//! Input validation for cash register and booking operations.
//!
//! ## Where Validation Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Web form (Next.js)                                           │
//! │  └── Empty fields, number inputs                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: canchas-sync / canchas-db                                    │
//! │  └── THIS MODULE: amounts, notes, booking times                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                       │
//! │  ├── CHECK constraints on amounts                                      │
//! │  └── Partial UNIQUE index: one open register per establishment         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use canchas_core::validation::{validate_cash_amount, validate_notes};
//!
//! assert!(validate_cash_amount("initial cash", 0).is_ok());
//! assert!(validate_cash_amount("initial cash", -1).is_err());
//! assert!(validate_notes(Some("Turno mañana")).is_ok());
//! ```

use chrono::NaiveTime;

use crate::error::ValidationError;
use crate::{MAX_NOTES_LEN, MAX_PARTICIPANTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a counted cash amount (initial or closing). Zero is allowed.
pub fn validate_cash_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a movement amount. Must be strictly positive; the movement
/// kind carries the direction.
pub fn validate_movement_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Validates a booking price. Free slots (zero) are allowed.
pub fn validate_price(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates an identifier reference (establishment, court, user).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates optional free-text notes.
///
/// ## Rules
/// - `None` and empty strings are fine
/// - At most [`MAX_NOTES_LEN`] characters
pub fn validate_notes(notes: Option<&str>) -> ValidationResult<()> {
    if let Some(notes) = notes {
        if notes.chars().count() > MAX_NOTES_LEN {
            return Err(ValidationError::TooLong {
                field: "notes".to_string(),
                max: MAX_NOTES_LEN,
            });
        }
    }
    Ok(())
}

/// Trims notes and maps blank input to `None`.
pub fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Booking Validators
// =============================================================================

/// Validates a booking time slot and returns its duration in minutes.
///
/// ## Rules
/// - `end` must be after `start` (slots do not cross midnight)
///
/// ## Example
/// ```rust
/// use chrono::NaiveTime;
/// use canchas_core::validation::validate_time_slot;
///
/// let start = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
/// let end = NaiveTime::from_hms_opt(19, 30, 0).unwrap();
/// assert_eq!(validate_time_slot(start, end).unwrap(), 90);
/// assert!(validate_time_slot(end, start).is_err());
/// ```
pub fn validate_time_slot(start: NaiveTime, end: NaiveTime) -> ValidationResult<i64> {
    if end <= start {
        return Err(ValidationError::InvalidFormat {
            field: "endTime".to_string(),
            reason: "must be after startTime".to_string(),
        });
    }
    Ok((end - start).num_minutes())
}

pub fn validate_participants(participants: &[String]) -> ValidationResult<()> {
    if participants.len() > MAX_PARTICIPANTS {
        return Err(ValidationError::OutOfRange {
            field: "participants".to_string(),
            min: 0,
            max: MAX_PARTICIPANTS as i64,
        });
    }
    Ok(())
}
