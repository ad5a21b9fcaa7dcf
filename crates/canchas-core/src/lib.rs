//! # canchas-core: Pure Business Logic for Mis Canchas
//!
//! Every rule that touches money or a state transition lives here, as pure
//! functions over plain data. The store (`canchas-db`) and the REST client
//! (`canchas-sync`) both call into this crate instead of re-deriving rules.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Mis Canchas Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────┐        ┌──────────────────────────────┐  │
//! │  │  canchas-sync (client)   │  REST  │  canchas-db (store)          │  │
//! │  │  pollers, optimistic UI  │ ─────► │  SQLite, one open caja       │  │
//! │  └────────────┬─────────────┘        └──────────────┬───────────────┘  │
//! │               │                                     │                   │
//! │  ┌────────────▼─────────────────────────────────────▼───────────────┐  │
//! │  │               ★ canchas-core (THIS CRATE) ★                      │  │
//! │  │                                                                  │  │
//! │  │   ┌──────────┐ ┌──────────────┐ ┌───────────┐ ┌──────────────┐  │  │
//! │  │   │  money   │ │cash_register │ │  booking  │ │   listing    │  │  │
//! │  │   │  Money   │ │ open / close │ │ lifecycle │ │ filter/sort  │  │  │
//! │  │   └──────────┘ └──────────────┘ └───────────┘ └──────────────┘  │  │
//! │  │                                                                  │  │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CashRegister, Booking, AdminReservation, ...)
//! - [`money`] - Integer-cents money type
//! - [`cash_register`] - Caja state machine and reconciliation
//! - [`booking`] - Booking status / payment status transitions
//! - [`listing`] - Client-side filter and sort of booking lists
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use canchas_core::{CashRegister, Money};
//!
//! let now = Utc::now();
//! let mut caja = CashRegister::open("est-1", "user-1", Money::from_cents(10_000), None, now).unwrap();
//! let difference = caja.close(Money::from_cents(9_500), None, now).unwrap();
//!
//! assert_eq!(difference.cents(), -500);
//! assert_eq!(caja.cash_difference(), Some(difference));
//! ```

pub mod booking;
pub mod cash_register;
pub mod error;
pub mod listing;
pub mod money;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

/// Interval at which clients re-fetch an open cash register.
pub const CASH_REGISTER_POLL_INTERVAL_SECS: u64 = 30;

/// Maximum length of free-text notes on registers and reservations.
pub const MAX_NOTES_LEN: usize = 1000;

/// Maximum players listed on one booking.
pub const MAX_PARTICIPANTS: usize = 30;
