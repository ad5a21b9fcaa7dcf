//! # canchas-db: Store Layer for Mis Canchas
//!
//! SQLite persistence for cash registers (cajas), their movements and
//! bookings. Every lifecycle change loads the row, applies the
//! `canchas-core` rule, and writes back inside one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mis Canchas Data Flow                            │
//! │                                                                         │
//! │  REST handler (POST /api/cash-registers)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   canchas-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │◄───│ CashRegisterRepo   │  │ (embedded) │  │   │
//! │  │   │  SqlitePool   │    │ BookingRepo        │  │ 001_*.sql  │  │   │
//! │  │   └───────────────┘    └─────────┬──────────┘  └────────────┘  │   │
//! │  │                                  │ rules                        │   │
//! │  │                                  ▼                              │   │
//! │  │                          canchas-core                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Cash register and booking repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use canchas_core::Money;
//! use canchas_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("canchas.db")).await?;
//! let caja = db
//!     .cash_registers()
//!     .open("est-1", "staff-1", Money::from_cents(20_000), None)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::booking::BookingRepository;
pub use repository::cash_register::CashRegisterRepository;
