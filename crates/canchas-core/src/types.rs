//! # Domain Types
//!
//! Data shapes shared by the store and the REST client.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │  CashRegister    │   │ RegisterMovement │   │ RegisterSummary  │    │
//! │  │  ──────────────  │◄──│  ──────────────  │   │  ──────────────  │    │
//! │  │  status          │   │  kind (sale/exp) │   │  per-method      │    │
//! │  │  expected_cash   │   │  method          │   │  net, difference │    │
//! │  │  per-method tot. │   │  amount_cents    │   └──────────────────┘    │
//! │  └──────────────────┘   └──────────────────┘                            │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐    │
//! │  │    Booking       │◄──│ AdminReservation │   │  Notification    │    │
//! │  │  ──────────────  │   │  ──────────────  │   │  Establishment   │    │
//! │  │  status          │   │  deposit, fee    │   └──────────────────┘    │
//! │  │  payment_status  │   │  provider        │                            │
//! │  └──────────────────┘   └──────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wire format is camelCase JSON (the web front end's convention); status
//! enums serialize in snake_case (`in_progress`, `no_show`).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Cash Register Enums
// =============================================================================

/// Lifecycle state of a cash register. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RegisterStatus {
    Open,
    Closed,
}

impl fmt::Display for RegisterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterStatus::Open => write!(f, "open"),
            RegisterStatus::Closed => write!(f, "closed"),
        }
    }
}

/// How a sale or expense was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash; the only method that moves expected cash in the till.
    Cash,
    Card,
    Transfer,
    Credit,
    Debit,
    /// Mercado Pago (QR, link or point device).
    MercadoPago,
    Other,
}

impl PaymentMethod {
    /// Every method, in the order register breakdowns are reported.
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::Transfer,
        PaymentMethod::Credit,
        PaymentMethod::Debit,
        PaymentMethod::MercadoPago,
        PaymentMethod::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::MercadoPago => "mercadopago",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a register movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Money in: court payment, kiosk sale, etc.
    Sale,
    /// Money out: supplies, cleaning, petty cash.
    Expense,
}

// =============================================================================
// Cash Register
// =============================================================================

/// A per-shift till reconciliation record (caja).
///
/// Per-method sale totals are kept as separate columns so the store can
/// update them in one statement and the front end can render them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CashRegister {
    pub id: String,
    pub establishment_id: String,
    /// Staff member who opened the register.
    pub user_id: String,
    pub status: RegisterStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,

    pub initial_cash_cents: i64,
    /// initial cash + cash sales − cash expenses.
    pub expected_cash_cents: i64,
    /// Counted at close.
    pub actual_cash_cents: Option<i64>,
    /// actual − expected, set only at close.
    pub cash_difference_cents: Option<i64>,

    pub cash_sales_cents: i64,
    pub card_sales_cents: i64,
    pub transfer_sales_cents: i64,
    pub credit_sales_cents: i64,
    pub debit_sales_cents: i64,
    pub mercadopago_sales_cents: i64,
    pub other_sales_cents: i64,

    pub total_sales_cents: i64,
    pub total_expenses_cents: i64,
    /// Number of sale movements.
    pub total_orders: i64,
    /// Number of movements of any kind.
    pub total_movements: i64,

    pub notes: Option<String>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashRegister {
    #[inline]
    pub fn initial_cash(&self) -> Money {
        Money::from_cents(self.initial_cash_cents)
    }

    #[inline]
    pub fn expected_cash(&self) -> Money {
        Money::from_cents(self.expected_cash_cents)
    }

    #[inline]
    pub fn actual_cash(&self) -> Option<Money> {
        self.actual_cash_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn cash_difference(&self) -> Option<Money> {
        self.cash_difference_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == RegisterStatus::Open
    }
}

/// A sale or expense recorded against an open register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMovement {
    pub id: String,
    pub cash_register_id: String,
    pub kind: MovementKind,
    pub method: PaymentMethod,
    /// Always positive; `kind` carries the direction.
    pub amount_cents: i64,
    pub description: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl RegisterMovement {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// Sales total for one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub amount_cents: i64,
}

/// Closing report for a register ("arqueo").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSummary {
    pub register_id: String,
    pub status: RegisterStatus,
    pub by_method: Vec<MethodTotal>,
    pub total_sales_cents: i64,
    pub total_expenses_cents: i64,
    /// Sales minus expenses, all methods.
    pub net_cents: i64,
    pub expected_cash_cents: i64,
    pub actual_cash_cents: Option<i64>,
    pub cash_difference_cents: Option<i64>,
}

// =============================================================================
// Booking Enums
// =============================================================================

/// Booking status. `Completed`, `Cancelled` and `NoShow` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl Default for BookingStatus {
    fn default() -> Self {
        BookingStatus::Pending
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        };
        f.write_str(s)
    }
}

/// Payment status of a booking, reported by the backend or Mercado Pago.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Booking
// =============================================================================

/// A court reservation by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub court_id: String,
    pub establishment_id: String,
    /// Establishment display name, denormalized for listing and sorting.
    pub facility_name: String,
    /// e.g. "futbol5", "padel", "tenis".
    pub sport: String,
    /// Player who made the reservation.
    pub user_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "String")]
    pub start_time: NaiveTime,
    #[ts(as = "String")]
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
    pub price_cents: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub participants: Vec<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Payload to create a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub court_id: String,
    pub establishment_id: String,
    pub facility_name: String,
    pub sport: String,
    pub user_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    #[ts(as = "String")]
    pub start_time: NaiveTime,
    #[ts(as = "String")]
    pub end_time: NaiveTime,
    pub price_cents: i64,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Staff-facing view of a booking with deposit and provider details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdminReservation {
    #[serde(flatten)]
    #[ts(flatten)]
    pub booking: Booking,
    /// Seña: amount taken upfront to hold the slot.
    pub deposit_cents: i64,
    pub deposit_paid: bool,
    /// Platform or service fee charged on top of the court price.
    pub fee_cents: i64,
    pub payment_provider: Option<PaymentMethod>,
    /// Provider-side reference (e.g. Mercado Pago payment id).
    pub provider_reference: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub admin_notes: Option<String>,
}

/// Extra fields staff supply when creating a reservation on behalf of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDetails {
    #[serde(default)]
    pub deposit_cents: i64,
    #[serde(default)]
    pub deposit_paid: bool,
    #[serde(default)]
    pub fee_cents: i64,
    pub payment_provider: Option<PaymentMethod>,
    pub provider_reference: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub admin_notes: Option<String>,
}

// =============================================================================
// REST Payloads
// =============================================================================

/// Body of `POST /api/cash-registers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OpenCashRegisterRequest {
    pub establishment_id: String,
    pub initial_cash_cents: i64,
    pub notes: Option<String>,
}

/// Body of `PUT /api/cash-registers/:id/close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CloseCashRegisterRequest {
    pub actual_cash_cents: i64,
    pub notes: Option<String>,
}

// =============================================================================
// Establishments & Notifications
// =============================================================================

/// Read-only summary of a sports establishment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Establishment {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    #[serde(default)]
    pub sports: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Booking,
    Payment,
    CashRegister,
    System,
}

/// An in-app notification for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    #[serde(default)]
    pub read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}
