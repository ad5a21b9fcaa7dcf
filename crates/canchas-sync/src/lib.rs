//! # canchas-sync: Client-Side Sync for Mis Canchas
//!
//! Keeps a client's view of cash registers, bookings and notifications in
//! step with the REST backend, which is the single source of truth.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          CanchasClient                                  │
//! │                                                                         │
//! │  ClientConfig (defaults → client.toml → CANCHAS_* env)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ HttpApi (reqwest) ── 429 ──► RateLimitNotifier ──► toast         │  │
//! │  └───────┬───────────────────────┬─────────────────────┬────────────┘  │
//! │          ▼                       ▼                     ▼               │
//! │  ┌────────────────┐    ┌──────────────────┐   ┌──────────────────┐     │
//! │  │ CashRegister   │    │ BookingStore     │   │ NotificationFeed │     │
//! │  │ Session        │    │                  │   │                  │     │
//! │  │ open / close   │    │ optimistic       │   │ unread badge     │     │
//! │  │ 30 s poller    │    │ cancel, views    │   │ poller           │     │
//! │  └────────────────┘    └──────────────────┘   └──────────────────┘     │
//! │                                                                         │
//! │  EVENTS (SyncEventEmitter): toasts, register / bookings / notifications │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - Resource traits and the reqwest implementation
//! - [`bookings`] - Booking list with optimistic cancel
//! - [`cash_register`] - Open/close and polling of the active register
//! - [`config`] - Client configuration
//! - [`error`] - `ApiError` and `SyncError`
//! - [`events`] - Event emitter and toasts
//! - [`notifications`] - Notification feed
//! - [`poller`] - Generic periodic revalidation loop
//! - [`rate_limit`] - 429 escalation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use canchas_sync::{CanchasClient, ClientConfig, NoOpEmitter};
//! use canchas_core::Money;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::load(None)?;
//! let client = CanchasClient::new(config, Arc::new(NoOpEmitter))?;
//!
//! let caja = client.cash_register_session()?;
//! caja.refresh().await?;
//! caja.open(Money::from_cents(500_000), Some("Turno tarde")).await?;
//! // ... later
//! caja.close(Money::from_cents(1_250_000), None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod bookings;
pub mod cash_register;
pub mod config;
pub mod error;
pub mod events;
pub mod notifications;
pub mod poller;
pub mod rate_limit;

mod guard;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{ApiResult, BookingApi, CashRegisterApi, EstablishmentApi, HttpApi, NotificationApi};
pub use bookings::BookingStore;
pub use cash_register::CashRegisterSession;
pub use config::ClientConfig;
pub use error::{ApiError, SyncError, SyncResult};
pub use events::{NoOpEmitter, SyncEventEmitter, Toast, ToastLevel};
pub use notifications::NotificationFeed;
pub use poller::{PollOutcome, PollTarget, PollerHandle, SyncPoller};
pub use rate_limit::{RateLimitLevel, RateLimitNotifier};

use std::sync::Arc;

use canchas_core::Establishment;

// =============================================================================
// Client Facade
// =============================================================================

/// Wires one [`HttpApi`], one rate-limit notifier and one emitter into the
/// client stores.
pub struct CanchasClient {
    config: ClientConfig,
    api: Arc<HttpApi>,
    rate_limit: Arc<RateLimitNotifier>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl CanchasClient {
    pub fn new(config: ClientConfig, emitter: Arc<dyn SyncEventEmitter>) -> SyncResult<Self> {
        config.validate()?;

        let rate_limit = Arc::new(RateLimitNotifier::new(&config.rate_limit, emitter.clone()));
        let api = Arc::new(HttpApi::from_config(&config)?.with_rate_limit(rate_limit.clone()));

        Ok(CanchasClient {
            config,
            api,
            rate_limit,
            emitter,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rate_limit(&self) -> &RateLimitNotifier {
        &self.rate_limit
    }

    /// Session for the configured establishment.
    pub fn cash_register_session(&self) -> SyncResult<CashRegisterSession> {
        let establishment_id = self
            .config
            .establishment_id()
            .ok_or(SyncError::NoEstablishment)?;

        Ok(CashRegisterSession::new(
            self.api.clone(),
            establishment_id,
            self.config.cash_register_interval(),
            self.emitter.clone(),
        ))
    }

    pub fn booking_store(&self) -> BookingStore {
        BookingStore::new(self.api.clone(), self.emitter.clone())
    }

    pub fn notification_feed(&self) -> NotificationFeed {
        NotificationFeed::new(
            self.api.clone(),
            self.config.notifications_interval(),
            self.emitter.clone(),
        )
    }

    pub async fn establishments(&self) -> SyncResult<Vec<Establishment>> {
        Ok(self.api.list_establishments().await?)
    }

    pub async fn establishment(&self, establishment_id: &str) -> SyncResult<Establishment> {
        Ok(self.api.get_establishment(establishment_id).await?)
    }
}
