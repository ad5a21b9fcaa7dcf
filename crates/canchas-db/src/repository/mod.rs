//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Load → Rule → Write                                  │
//! │                                                                         │
//! │  db.cash_registers().close(id, actual, notes)                          │
//! │       │                                                                 │
//! │       ├── BEGIN IMMEDIATE                                              │
//! │       ├── SELECT row                 (load)                            │
//! │       ├── CashRegister::close(...)   (canchas-core rule)               │
//! │       ├── UPDATE ... WHERE status='open'  (guarded write)              │
//! │       └── COMMIT                                                       │
//! │                                                                         │
//! │  A rule violation returns DbError::Domain and the transaction is       │
//! │  dropped, which rolls it back.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`CashRegisterRepository`](cash_register::CashRegisterRepository) - cajas and their movements
//! - [`BookingRepository`](booking::BookingRepository) - bookings and admin reservations

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::DbResult;

pub mod booking;
pub mod cash_register;

/// Transaction holding SQLite's write lock from `BEGIN`. Concurrent writers
/// queue on `busy_timeout` and then read the winner's row, instead of
/// failing the read-to-write upgrade with `database is locked`.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
