//! # Cash Register (Caja) Rules
//!
//! The shift-reconciliation state machine: open with a counted float, record
//! sales and expenses while open, close with a counted total and report the
//! difference.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (none) ──open(initial)──► OPEN ──close(actual)──► CLOSED (terminal)  │
//! │                              │  ▲                                       │
//! │                              └──┘ record(movement)                      │
//! │                                                                         │
//! │   expected = initial + cash sales − cash expenses                       │
//! │   difference = actual − expected   (set once, at close)                 │
//! │                                                                         │
//! │   No reopening: a new shift opens a new register.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "One open register per establishment" is checked here with
//! [`CashRegister::ensure_can_open`]; the store also backs it with a partial
//! unique index.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{
    CashRegister, MethodTotal, MovementKind, PaymentMethod, RegisterMovement, RegisterStatus,
    RegisterSummary,
};
use crate::validation::{
    normalize_notes, validate_cash_amount, validate_id, validate_movement_amount, validate_notes,
};

impl CashRegister {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Rejects opening when `active` is an open register of the same
    /// establishment.
    pub fn ensure_can_open(
        establishment_id: &str,
        active: Option<&CashRegister>,
    ) -> CoreResult<()> {
        match active {
            Some(reg) if reg.is_open() && reg.establishment_id == establishment_id => {
                Err(CoreError::CashRegisterAlreadyOpen {
                    establishment_id: establishment_id.to_string(),
                    register_id: reg.id.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Creates a new open register with `expected_cash = initial_cash`.
    pub fn open(
        establishment_id: impl Into<String>,
        user_id: impl Into<String>,
        initial_cash: Money,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let establishment_id = establishment_id.into();
        let user_id = user_id.into();

        validate_id("establishmentId", &establishment_id)?;
        validate_id("userId", &user_id)?;
        validate_cash_amount("initial cash", initial_cash.cents())?;
        validate_notes(notes)?;

        Ok(CashRegister {
            id: Uuid::new_v4().to_string(),
            establishment_id,
            user_id,
            status: RegisterStatus::Open,
            opened_at: now,
            closed_at: None,
            initial_cash_cents: initial_cash.cents(),
            expected_cash_cents: initial_cash.cents(),
            actual_cash_cents: None,
            cash_difference_cents: None,
            cash_sales_cents: 0,
            card_sales_cents: 0,
            transfer_sales_cents: 0,
            credit_sales_cents: 0,
            debit_sales_cents: 0,
            mercadopago_sales_cents: 0,
            other_sales_cents: 0,
            total_sales_cents: 0,
            total_expenses_cents: 0,
            total_orders: 0,
            total_movements: 0,
            notes: normalize_notes(notes),
            updated_at: now,
        })
    }

    /// Closes the register and returns `actual − expected`.
    ///
    /// Close notes are appended to the opening notes on a new line.
    pub fn close(
        &mut self,
        actual_cash: Money,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Money> {
        self.ensure_open()?;
        validate_cash_amount("actual cash", actual_cash.cents())?;
        validate_notes(notes)?;

        let difference = actual_cash
            .checked_sub(self.expected_cash())
            .ok_or_else(|| overflow("actual cash"))?;

        self.status = RegisterStatus::Closed;
        self.closed_at = Some(now);
        self.actual_cash_cents = Some(actual_cash.cents());
        self.cash_difference_cents = Some(difference.cents());
        self.notes = merge_notes(self.notes.take(), normalize_notes(notes));
        self.updated_at = now;

        Ok(difference)
    }

    /// Applies a sale or expense to the running totals.
    pub fn record(&mut self, movement: &RegisterMovement, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_open()?;
        validate_movement_amount(movement.amount_cents)?;
        if movement.cash_register_id != self.id {
            return Err(ValidationError::InvalidFormat {
                field: "cashRegisterId".to_string(),
                reason: format!("movement belongs to register {}", movement.cash_register_id),
            }
            .into());
        }

        // All totals are computed before any is assigned, so an overflow
        // leaves the register untouched.
        let amount = movement.amount();
        let is_cash = movement.method == PaymentMethod::Cash;
        match movement.kind {
            MovementKind::Sale => {
                let method_total = checked(self.sales_for(movement.method).cents(), amount)?;
                let total_sales = checked(self.total_sales_cents, amount)?;
                let expected = if is_cash {
                    checked(self.expected_cash_cents, amount)?
                } else {
                    self.expected_cash_cents
                };

                *self.sales_slot_mut(movement.method) = method_total;
                self.total_sales_cents = total_sales;
                self.expected_cash_cents = expected;
                self.total_orders += 1;
            }
            MovementKind::Expense => {
                let total_expenses = checked(self.total_expenses_cents, amount)?;
                let expected = if is_cash {
                    checked(self.expected_cash_cents, -amount)?
                } else {
                    self.expected_cash_cents
                };

                self.total_expenses_cents = total_expenses;
                self.expected_cash_cents = expected;
            }
        }
        self.total_movements += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Fails with `CashRegisterNotOpen` unless the register is open.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::CashRegisterNotOpen {
                register_id: self.id.clone(),
                status: self.status,
            })
        }
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Sales recorded for one payment method.
    pub fn sales_for(&self, method: PaymentMethod) -> Money {
        let cents = match method {
            PaymentMethod::Cash => self.cash_sales_cents,
            PaymentMethod::Card => self.card_sales_cents,
            PaymentMethod::Transfer => self.transfer_sales_cents,
            PaymentMethod::Credit => self.credit_sales_cents,
            PaymentMethod::Debit => self.debit_sales_cents,
            PaymentMethod::MercadoPago => self.mercadopago_sales_cents,
            PaymentMethod::Other => self.other_sales_cents,
        };
        Money::from_cents(cents)
    }

    /// Closing report with the per-method breakdown.
    pub fn summary(&self) -> CoreResult<RegisterSummary> {
        let net = Money::from_cents(self.total_sales_cents)
            .checked_sub(Money::from_cents(self.total_expenses_cents))
            .ok_or_else(|| overflow("net"))?;

        let by_method = PaymentMethod::ALL
            .iter()
            .map(|&method| MethodTotal {
                method,
                amount_cents: self.sales_for(method).cents(),
            })
            .collect();

        Ok(RegisterSummary {
            register_id: self.id.clone(),
            status: self.status,
            by_method,
            total_sales_cents: self.total_sales_cents,
            total_expenses_cents: self.total_expenses_cents,
            net_cents: net.cents(),
            expected_cash_cents: self.expected_cash_cents,
            actual_cash_cents: self.actual_cash_cents,
            cash_difference_cents: self.cash_difference_cents,
        })
    }

    fn sales_slot_mut(&mut self, method: PaymentMethod) -> &mut i64 {
        match method {
            PaymentMethod::Cash => &mut self.cash_sales_cents,
            PaymentMethod::Card => &mut self.card_sales_cents,
            PaymentMethod::Transfer => &mut self.transfer_sales_cents,
            PaymentMethod::Credit => &mut self.credit_sales_cents,
            PaymentMethod::Debit => &mut self.debit_sales_cents,
            PaymentMethod::MercadoPago => &mut self.mercadopago_sales_cents,
            PaymentMethod::Other => &mut self.other_sales_cents,
        }
    }
}

impl RegisterMovement {
    /// Builds a validated movement for `cash_register_id`.
    pub fn new(
        cash_register_id: impl Into<String>,
        kind: MovementKind,
        method: PaymentMethod,
        amount: Money,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        validate_movement_amount(amount.cents())?;
        validate_notes(description)?;

        Ok(RegisterMovement {
            id: Uuid::new_v4().to_string(),
            cash_register_id: cash_register_id.into(),
            kind,
            method,
            amount_cents: amount.cents(),
            description: normalize_notes(description),
            created_at: now,
        })
    }
}

/// Whether a client should keep re-fetching this register.
pub fn should_poll(register: Option<&CashRegister>) -> bool {
    register.map_or(false, CashRegister::is_open)
}

fn checked(total: i64, delta: Money) -> CoreResult<i64> {
    Money::from_cents(total)
        .checked_add(delta)
        .map(|m| m.cents())
        .ok_or_else(|| overflow("amount"))
}

fn overflow(field: &str) -> CoreError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

fn merge_notes(opening: Option<String>, closing: Option<String>) -> Option<String> {
    match (opening, closing) {
        (Some(open), Some(close)) => Some(format!("{open}\n{close}")),
        (open, None) => open,
        (None, close) => close,
    }
}
