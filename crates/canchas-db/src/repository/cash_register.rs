//! # Cash Register Repository
//!
//! Persistence for cajas and their movements.
//!
//! ## Register Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── open() → checks no open register for the establishment,        │
//! │                  inserts { status: open, expected = initial }          │
//! │                                                                         │
//! │  2. MOVEMENTS (while open)                                             │
//! │     └── record_movement() → inserts movement + updates totals          │
//! │                             in one transaction                         │
//! │                                                                         │
//! │  3. CLOSE                                                              │
//! │     └── close() → { status: closed, actual, difference }               │
//! │                                                                         │
//! │  Backstop: idx_cash_registers_one_open (partial UNIQUE index)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::{debug, info, warn};

use canchas_core::{
    CashRegister, CoreError, Money, MovementKind, PaymentMethod, RegisterMovement,
    RegisterSummary,
};

use super::begin_write;
use crate::error::{DbError, DbResult};

/// Repository for cash register database operations.
#[derive(Debug, Clone)]
pub struct CashRegisterRepository {
    pool: SqlitePool,
}

impl CashRegisterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CashRegisterRepository { pool }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens a new register for `establishment_id`.
    ///
    /// ## Errors
    /// - `Domain(CashRegisterAlreadyOpen)` if one is already open
    /// - `Domain(Validation)` for negative initial cash or oversized notes
    pub async fn open(
        &self,
        establishment_id: &str,
        user_id: &str,
        initial_cash: Money,
        notes: Option<&str>,
    ) -> DbResult<CashRegister> {
        let register = CashRegister::open(establishment_id, user_id, initial_cash, notes, Utc::now())?;

        let mut tx = begin_write(&self.pool).await?;

        let active = fetch_active(&mut *tx, establishment_id).await?;
        CashRegister::ensure_can_open(establishment_id, active.as_ref())?;

        match insert_register(&mut *tx, &register).await {
            Ok(()) => {}
            // Lost a race with another open: the partial index caught it.
            Err(DbError::UniqueViolation { .. }) => {
                tx.rollback().await?;
                let register_id = self
                    .get_active(establishment_id)
                    .await?
                    .map(|r| r.id)
                    .unwrap_or_default();
                return Err(CoreError::CashRegisterAlreadyOpen {
                    establishment_id: establishment_id.to_string(),
                    register_id,
                }
                .into());
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;

        info!(
            register_id = %register.id,
            establishment_id = %establishment_id,
            user_id = %user_id,
            initial_cash = %initial_cash,
            "Cash register opened"
        );

        Ok(register)
    }

    /// Closes an open register and stores the counted cash and difference.
    pub async fn close(
        &self,
        id: &str,
        actual_cash: Money,
        notes: Option<&str>,
    ) -> DbResult<CashRegister> {
        let mut tx = begin_write(&self.pool).await?;

        let mut register = fetch_register(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::CashRegisterNotFound(id.to_string()))?;

        let difference = register.close(actual_cash, notes, Utc::now())?;

        let result = sqlx::query(
            r#"
            UPDATE cash_registers SET
                status = ?2,
                closed_at = ?3,
                actual_cash_cents = ?4,
                cash_difference_cents = ?5,
                notes = ?6,
                updated_at = ?7
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&register.id)
        .bind(register.status)
        .bind(register.closed_at)
        .bind(register.actual_cash_cents)
        .bind(register.cash_difference_cents)
        .bind(&register.notes)
        .bind(register.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Cash register", id));
        }

        tx.commit().await?;

        if difference.is_zero() {
            info!(register_id = %id, "Cash register closed, balanced");
        } else {
            warn!(
                register_id = %id,
                expected = %register.expected_cash(),
                actual = %actual_cash,
                difference = %difference,
                "Cash register closed with difference"
            );
        }

        Ok(register)
    }

    /// Records a sale or expense against an open register.
    pub async fn record_movement(
        &self,
        register_id: &str,
        kind: MovementKind,
        method: PaymentMethod,
        amount: Money,
        description: Option<&str>,
    ) -> DbResult<RegisterMovement> {
        let now = Utc::now();
        let movement = RegisterMovement::new(register_id, kind, method, amount, description, now)?;

        let mut tx = begin_write(&self.pool).await?;

        let mut register = fetch_register(&mut *tx, register_id)
            .await?
            .ok_or_else(|| CoreError::CashRegisterNotFound(register_id.to_string()))?;

        register.record(&movement, now)?;

        sqlx::query(
            r#"
            INSERT INTO register_movements (
                id, cash_register_id, kind, method, amount_cents, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.cash_register_id)
        .bind(movement.kind)
        .bind(movement.method)
        .bind(movement.amount_cents)
        .bind(&movement.description)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_registers SET
                expected_cash_cents = ?2,
                cash_sales_cents = ?3,
                card_sales_cents = ?4,
                transfer_sales_cents = ?5,
                credit_sales_cents = ?6,
                debit_sales_cents = ?7,
                mercadopago_sales_cents = ?8,
                other_sales_cents = ?9,
                total_sales_cents = ?10,
                total_expenses_cents = ?11,
                total_orders = ?12,
                total_movements = ?13,
                updated_at = ?14
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&register.id)
        .bind(register.expected_cash_cents)
        .bind(register.cash_sales_cents)
        .bind(register.card_sales_cents)
        .bind(register.transfer_sales_cents)
        .bind(register.credit_sales_cents)
        .bind(register.debit_sales_cents)
        .bind(register.mercadopago_sales_cents)
        .bind(register.other_sales_cents)
        .bind(register.total_sales_cents)
        .bind(register.total_expenses_cents)
        .bind(register.total_orders)
        .bind(register.total_movements)
        .bind(register.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::stale("Cash register", register_id));
        }

        tx.commit().await?;

        debug!(
            register_id = %register_id,
            kind = ?movement.kind,
            method = %movement.method,
            amount = %amount,
            "Movement recorded"
        );

        Ok(movement)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashRegister>> {
        fetch_register(&self.pool, id).await
    }

    /// The open register of an establishment, if any.
    pub async fn get_active(&self, establishment_id: &str) -> DbResult<Option<CashRegister>> {
        fetch_active(&self.pool, establishment_id).await
    }

    /// Most recent registers first.
    pub async fn list_by_establishment(
        &self,
        establishment_id: &str,
        limit: i64,
    ) -> DbResult<Vec<CashRegister>> {
        let registers = sqlx::query_as::<_, CashRegister>(
            r#"
            SELECT * FROM cash_registers
            WHERE establishment_id = ?1
            ORDER BY opened_at DESC
            LIMIT ?2
            "#,
        )
        .bind(establishment_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(registers)
    }

    /// Movements of a register in recording order.
    pub async fn movements(&self, register_id: &str) -> DbResult<Vec<RegisterMovement>> {
        let movements = sqlx::query_as::<_, RegisterMovement>(
            r#"
            SELECT * FROM register_movements
            WHERE cash_register_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(register_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    pub async fn summary(&self, register_id: &str) -> DbResult<RegisterSummary> {
        let register = self
            .get_by_id(register_id)
            .await?
            .ok_or_else(|| CoreError::CashRegisterNotFound(register_id.to_string()))?;
        Ok(register.summary()?)
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

async fn fetch_register<'e, E>(executor: E, id: &str) -> DbResult<Option<CashRegister>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let register = sqlx::query_as::<_, CashRegister>("SELECT * FROM cash_registers WHERE id = ?1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(register)
}

async fn fetch_active<'e, E>(executor: E, establishment_id: &str) -> DbResult<Option<CashRegister>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let register = sqlx::query_as::<_, CashRegister>(
        "SELECT * FROM cash_registers WHERE establishment_id = ?1 AND status = 'open'",
    )
    .bind(establishment_id)
    .fetch_optional(executor)
    .await?;
    Ok(register)
}

async fn insert_register<'e, E>(executor: E, r: &CashRegister) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO cash_registers (
            id, establishment_id, user_id, status, opened_at, closed_at,
            initial_cash_cents, expected_cash_cents, actual_cash_cents, cash_difference_cents,
            cash_sales_cents, card_sales_cents, transfer_sales_cents, credit_sales_cents,
            debit_sales_cents, mercadopago_sales_cents, other_sales_cents,
            total_sales_cents, total_expenses_cents, total_orders, total_movements,
            notes, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17,
            ?18, ?19, ?20, ?21,
            ?22, ?23
        )
        "#,
    )
    .bind(&r.id)
    .bind(&r.establishment_id)
    .bind(&r.user_id)
    .bind(r.status)
    .bind(r.opened_at)
    .bind(r.closed_at)
    .bind(r.initial_cash_cents)
    .bind(r.expected_cash_cents)
    .bind(r.actual_cash_cents)
    .bind(r.cash_difference_cents)
    .bind(r.cash_sales_cents)
    .bind(r.card_sales_cents)
    .bind(r.transfer_sales_cents)
    .bind(r.credit_sales_cents)
    .bind(r.debit_sales_cents)
    .bind(r.mercadopago_sales_cents)
    .bind(r.other_sales_cents)
    .bind(r.total_sales_cents)
    .bind(r.total_expenses_cents)
    .bind(r.total_orders)
    .bind(r.total_movements)
    .bind(&r.notes)
    .bind(r.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use canchas_core::{RegisterStatus, ValidationError};

    async fn repo() -> CashRegisterRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .cash_registers()
    }

    #[tokio::test]
    async fn test_open_and_get_active() {
        let repo = repo().await;
        let opened = repo
            .open("est-1", "staff-1", Money::from_cents(20_000), Some("Turno mañana"))
            .await
            .unwrap();

        let active = repo.get_active("est-1").await.unwrap().unwrap();
        assert_eq!(active, opened);
        assert_eq!(active.expected_cash_cents, 20_000);
        assert!(repo.get_active("est-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_open_rejected() {
        let repo = repo().await;
        let first = repo.open("est-1", "staff-1", Money::zero(), None).await.unwrap();

        let err = repo
            .open("est-1", "staff-2", Money::from_cents(500), None)
            .await
            .unwrap_err();
        match err {
            DbError::Domain(CoreError::CashRegisterAlreadyOpen { register_id, .. }) => {
                assert_eq!(register_id, first.id);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Closing frees the establishment for the next shift.
        repo.close(&first.id, Money::zero(), None).await.unwrap();
        let second = repo.open("est-1", "staff-2", Money::zero(), None).await.unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("canchas.db")).max_connections(8))
            .await
            .unwrap();
        let repo = db.cash_registers();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.open("est-1", &format!("staff-{i}"), Money::zero(), None)
                        .await
                })
            })
            .collect();

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(err) => {
                    assert!(err.is_conflict(), "unexpected error: {err}");
                    assert!(matches!(
                        err,
                        DbError::Domain(CoreError::CashRegisterAlreadyOpen { .. })
                    ));
                }
            }
        }
        assert_eq!(opened, 1);
        assert_eq!(repo.list_by_establishment("est-1", 10).await.unwrap().len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_unique_index_backstops_open() {
        let repo = repo().await;
        let first = repo.open("est-1", "staff-1", Money::zero(), None).await.unwrap();

        // Bypass the in-transaction check to hit the index directly.
        let rogue = CashRegister::open("est-1", "staff-2", Money::zero(), None, Utc::now()).unwrap();
        let err = insert_register(&repo.pool, &rogue).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.get_active("est-1").await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn test_movements_and_close() {
        let repo = repo().await;
        let reg = repo.open("est-1", "staff-1", Money::from_cents(10_000), None).await.unwrap();

        repo.record_movement(&reg.id, MovementKind::Sale, PaymentMethod::Cash, Money::from_cents(4_000), Some("Cancha 2"))
            .await
            .unwrap();
        repo.record_movement(&reg.id, MovementKind::Sale, PaymentMethod::Card, Money::from_cents(6_000), None)
            .await
            .unwrap();
        repo.record_movement(&reg.id, MovementKind::Expense, PaymentMethod::Cash, Money::from_cents(1_000), Some("Limpieza"))
            .await
            .unwrap();

        let stored = repo.get_by_id(&reg.id).await.unwrap().unwrap();
        assert_eq!(stored.expected_cash_cents, 13_000);
        assert_eq!(stored.card_sales_cents, 6_000);
        assert_eq!(stored.total_sales_cents, 10_000);
        assert_eq!(stored.total_expenses_cents, 1_000);
        assert_eq!(stored.total_orders, 2);
        assert_eq!(stored.total_movements, 3);

        let movements = repo.movements(&reg.id).await.unwrap();
        assert_eq!(movements.len(), 3);
        assert_eq!(movements[0].description.as_deref(), Some("Cancha 2"));

        let closed = repo.close(&reg.id, Money::from_cents(12_500), Some("Faltan $5")).await.unwrap();
        assert_eq!(closed.status, RegisterStatus::Closed);
        assert_eq!(closed.cash_difference_cents, Some(-500));

        let stored = repo.get_by_id(&reg.id).await.unwrap().unwrap();
        assert_eq!(stored, closed);

        let summary = repo.summary(&reg.id).await.unwrap();
        assert_eq!(summary.net_cents, 9_000);
        assert_eq!(summary.cash_difference_cents, Some(-500));
    }

    #[tokio::test]
    async fn test_closed_register_is_frozen() {
        let repo = repo().await;
        let reg = repo.open("est-1", "staff-1", Money::zero(), None).await.unwrap();
        repo.close(&reg.id, Money::zero(), None).await.unwrap();

        let err = repo.close(&reg.id, Money::zero(), None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CashRegisterNotOpen { .. })));

        let err = repo
            .record_movement(&reg.id, MovementKind::Sale, PaymentMethod::Cash, Money::from_cents(100), None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(repo.movements(&reg.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_errors_for_missing_and_invalid() {
        let repo = repo().await;

        let err = repo.close("nope", Money::zero(), None).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::CashRegisterNotFound(_))));

        let err = repo.open("est-1", "staff-1", Money::from_cents(-1), None).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Negative { .. }))
        ));
        assert!(repo.get_active("est-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_establishment() {
        let repo = repo().await;
        for _ in 0..3 {
            let reg = repo.open("est-1", "staff-1", Money::zero(), None).await.unwrap();
            repo.close(&reg.id, Money::zero(), None).await.unwrap();
        }
        repo.open("est-2", "staff-9", Money::zero(), None).await.unwrap();

        assert_eq!(repo.list_by_establishment("est-1", 10).await.unwrap().len(), 3);
        assert_eq!(repo.list_by_establishment("est-1", 2).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_establishment("est-2", 10).await.unwrap().len(), 1);
    }
}
