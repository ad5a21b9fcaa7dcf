//! # Cash Register Session
//!
//! Client-side view of the establishment's open register (caja).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     CashRegisterSession                                 │
//! │                                                                         │
//! │  refresh() ──► GET active ──► state ──┬── open?  ──► start poller       │
//! │                                       └── none/closed ──► stop poller   │
//! │                                                                         │
//! │  open(initial, notes)                                                   │
//! │     busy flag ─► validate ─► ensure_can_open ─► POST ─► state + poll    │
//! │                                                                         │
//! │  close(actual, notes)                                                   │
//! │     busy flag ─► validate ─► ensure_open ─► PUT close ─► stop poller    │
//! │                                                   └──► toast difference │
//! │                                                                         │
//! │  poller tick (every 30 s while open)                                   │
//! │     GET active ─► closed or gone? ─► Stop                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule checks run before any request, so a second open on an already open
//! caja never reaches the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use canchas_core::cash_register::should_poll;
use canchas_core::validation::{normalize_notes, validate_cash_amount, validate_notes};
use canchas_core::{CashRegister, CloseCashRegisterRequest, Money, OpenCashRegisterRequest};

use crate::api::CashRegisterApi;
use crate::error::{SyncError, SyncResult};
use crate::events::{SyncEventEmitter, Toast};
use crate::guard::BusyGuard;
use crate::poller::{PollOutcome, PollTarget, PollerHandle, SyncPoller};

/// State shared between the session and its poller.
struct Shared {
    api: Arc<dyn CashRegisterApi>,
    establishment_id: String,
    register: RwLock<Option<CashRegister>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl Shared {
    async fn set(&self, register: Option<CashRegister>) {
        self.emitter.cash_register_changed(register.as_ref());
        *self.register.write().await = register;
    }
}

pub struct CashRegisterSession {
    shared: Arc<Shared>,
    interval: Duration,
    busy: AtomicBool,
    poller: Mutex<Option<PollerHandle>>,
}

impl CashRegisterSession {
    pub fn new(
        api: Arc<dyn CashRegisterApi>,
        establishment_id: impl Into<String>,
        interval: Duration,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        CashRegisterSession {
            shared: Arc::new(Shared {
                api,
                establishment_id: establishment_id.into(),
                register: RwLock::new(None),
                emitter,
            }),
            interval,
            busy: AtomicBool::new(false),
            poller: Mutex::new(None),
        }
    }

    pub fn establishment_id(&self) -> &str {
        &self.shared.establishment_id
    }

    /// The register as last seen, open or just closed.
    pub async fn current(&self) -> Option<CashRegister> {
        self.shared.register.read().await.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.lock_poller()
            .as_ref()
            .map_or(false, PollerHandle::is_running)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Loads the active register and starts or stops polling to match.
    pub async fn refresh(&self) -> SyncResult<Option<CashRegister>> {
        let register = self
            .shared
            .api
            .active_cash_register(&self.shared.establishment_id)
            .await?;
        debug!(
            establishment_id = %self.shared.establishment_id,
            open = should_poll(register.as_ref()),
            "Cash register refreshed"
        );
        self.apply(register.clone()).await;
        Ok(register)
    }

    /// Opens a new register with `initial_cash` in the drawer.
    pub async fn open(&self, initial_cash: Money, notes: Option<&str>) -> SyncResult<CashRegister> {
        let result = self.try_open(initial_cash, notes).await;
        self.report(&result);
        result
    }

    async fn try_open(&self, initial_cash: Money, notes: Option<&str>) -> SyncResult<CashRegister> {
        let _busy = BusyGuard::acquire(&self.busy, "open")?;

        validate_cash_amount("initialCash", initial_cash.cents())?;
        validate_notes(notes)?;
        CashRegister::ensure_can_open(
            &self.shared.establishment_id,
            self.shared.register.read().await.as_ref(),
        )?;

        let req = OpenCashRegisterRequest {
            establishment_id: self.shared.establishment_id.clone(),
            initial_cash_cents: initial_cash.cents(),
            notes: normalize_notes(notes),
        };
        let register = self.shared.api.open_cash_register(&req).await?;

        info!(
            register_id = %register.id,
            establishment_id = %register.establishment_id,
            initial_cash = %initial_cash,
            "Cash register opened"
        );
        self.shared
            .emitter
            .toast(Toast::success("Caja abierta", format!("Efectivo inicial: {initial_cash}")));
        self.apply(Some(register.clone())).await;
        Ok(register)
    }

    /// Closes the loaded register with the counted `actual_cash` and returns
    /// the closed register. Polling stops as soon as the server confirms.
    pub async fn close(&self, actual_cash: Money, notes: Option<&str>) -> SyncResult<CashRegister> {
        let result = self.try_close(actual_cash, notes).await;
        self.report(&result);
        result
    }

    async fn try_close(&self, actual_cash: Money, notes: Option<&str>) -> SyncResult<CashRegister> {
        let _busy = BusyGuard::acquire(&self.busy, "close")?;

        validate_cash_amount("actualCash", actual_cash.cents())?;
        validate_notes(notes)?;
        let current = self
            .current()
            .await
            .ok_or(SyncError::NoActiveRegister)?;
        current.ensure_open()?;

        let req = CloseCashRegisterRequest {
            actual_cash_cents: actual_cash.cents(),
            notes: normalize_notes(notes),
        };
        let closed = self.shared.api.close_cash_register(&current.id, &req).await?;
        self.stop_polling();

        let difference = closed.cash_difference().unwrap_or_default();
        if difference.is_zero() {
            info!(register_id = %closed.id, "Cash register closed, no difference");
            self.shared
                .emitter
                .toast(Toast::success("Caja cerrada", "Sin diferencias"));
        } else {
            warn!(
                register_id = %closed.id,
                expected = %closed.expected_cash(),
                actual = %actual_cash,
                difference = %difference,
                "Cash register closed with difference"
            );
            let label = if difference.is_negative() { "Faltante" } else { "Sobrante" };
            self.shared.emitter.toast(Toast::warning(
                "Caja cerrada con diferencia",
                format!("{label}: {}", difference.abs()),
            ));
        }

        self.apply(Some(closed.clone())).await;
        Ok(closed)
    }

    /// Stops polling. Call when the view unmounts.
    pub fn shutdown(&self) {
        self.stop_polling();
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn apply(&self, register: Option<CashRegister>) {
        let poll = should_poll(register.as_ref());
        self.shared.set(register).await;
        if poll {
            self.start_polling();
        } else {
            self.stop_polling();
        }
    }

    fn start_polling(&self) {
        let mut poller = self.lock_poller();
        if poller.as_ref().map_or(false, PollerHandle::is_running) {
            return;
        }
        let target = RegisterPoll {
            shared: self.shared.clone(),
        };
        *poller = Some(SyncPoller::spawn(target, self.interval));
    }

    fn stop_polling(&self) {
        if let Some(handle) = self.lock_poller().take() {
            handle.stop();
        }
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<PollerHandle>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toasts a failed user action. 429s are already reported by the
    /// rate-limit notifier.
    fn report<T>(&self, result: &SyncResult<T>) {
        if let Err(err) = result {
            if !err.is_rate_limited() {
                self.shared
                    .emitter
                    .toast(Toast::error("Caja", err.user_message()));
            }
        }
    }
}

impl Drop for CashRegisterSession {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

// =============================================================================
// Poll Target
// =============================================================================

struct RegisterPoll {
    shared: Arc<Shared>,
}

#[async_trait]
impl PollTarget for RegisterPoll {
    fn name(&self) -> &'static str {
        "cash_register"
    }

    async fn poll(&self) -> SyncResult<PollOutcome> {
        let fetched = self
            .shared
            .api
            .active_cash_register(&self.shared.establishment_id)
            .await?;

        // Check and update under one write lock so a close() that lands
        // while the request was in flight is never overwritten.
        let mut current = self.shared.register.write().await;
        if !should_poll(current.as_ref()) {
            return Ok(PollOutcome::Stop);
        }

        let (next, outcome) = match fetched {
            Some(register) if register.is_open() => (Some(register), PollOutcome::Continue),
            Some(register) => {
                info!(register_id = %register.id, "Cash register closed on server");
                (Some(register), PollOutcome::Stop)
            }
            None => {
                // The active endpoint only returns open registers and carries
                // no closing figures, so the tracked register is simply gone.
                if let Some(reg) = current.as_ref() {
                    info!(register_id = %reg.id, "Cash register no longer active");
                }
                (None, PollOutcome::Stop)
            }
        };
        self.shared.emitter.cash_register_changed(next.as_ref());
        *current = next;
        Ok(outcome)
    }
}
