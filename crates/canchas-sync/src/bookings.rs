//! # Booking Store
//!
//! The signed-in user's bookings, with optimistic cancellation.
//!
//! ## Optimistic Cancel
//! ```text
//! cancel(id)
//!   │
//!   ├── id already in flight? ──────────────► Busy
//!   ├── booking.cancel(now) on a local copy
//!   │      └── terminal? ──────────────────► BookingTerminal (no request)
//!   ├── list[id] = cancelled copy            (UI updates immediately)
//!   ├── PUT /api/bookings/:id/cancel
//!   │      ├── Ok(server)  ─► list[id] = server version
//!   │      └── Err         ─► list[id] = previous, toast error
//!   └── release in-flight id
//! ```
//!
//! Listing views are derived on demand with [`BookingQuery`].

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use canchas_core::listing::BookingQuery;
use canchas_core::validation::{validate_id, validate_participants, validate_price, validate_time_slot};
use canchas_core::{Booking, CoreError, NewBooking};

use crate::api::BookingApi;
use crate::error::SyncResult;
use crate::events::{SyncEventEmitter, Toast};
use crate::guard::{BusyGuard, InFlightGuard};

pub struct BookingStore {
    api: Arc<dyn BookingApi>,
    bookings: RwLock<Vec<Booking>>,
    creating: AtomicBool,
    cancelling: Mutex<HashSet<String>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl BookingStore {
    pub fn new(api: Arc<dyn BookingApi>, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        BookingStore {
            api,
            bookings: RwLock::new(Vec::new()),
            creating: AtomicBool::new(false),
            cancelling: Mutex::new(HashSet::new()),
            emitter,
        }
    }

    /// Replaces the local list with the server's. Returns the new count.
    pub async fn load(&self) -> SyncResult<usize> {
        let bookings = self.api.list_bookings().await?;
        let count = bookings.len();
        *self.bookings.write().await = bookings;
        debug!(count, "Bookings loaded");
        self.emitter.bookings_changed(count);
        Ok(count)
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.bookings.read().await.clone()
    }

    pub async fn get(&self, booking_id: &str) -> Option<Booking> {
        self.bookings
            .read()
            .await
            .iter()
            .find(|b| b.id == booking_id)
            .cloned()
    }

    /// Re-fetches one booking (detail view) and upserts it into the list.
    pub async fn reload(&self, booking_id: &str) -> SyncResult<Booking> {
        let booking = self.api.get_booking(booking_id).await?;
        let count = {
            let mut list = self.bookings.write().await;
            match list.iter_mut().find(|b| b.id == booking.id) {
                Some(slot) => *slot = booking.clone(),
                None => list.push(booking.clone()),
            }
            list.len()
        };
        debug!(booking_id, status = %booking.status, "Booking reloaded");
        self.emitter.bookings_changed(count);
        Ok(booking)
    }

    /// Filtered and sorted view of the loaded bookings.
    pub async fn view(&self, query: &BookingQuery) -> Vec<Booking> {
        query.apply(&self.bookings.read().await)
    }

    pub async fn create(&self, req: NewBooking) -> SyncResult<Booking> {
        let result = self.try_create(req).await;
        if let Err(err) = &result {
            if !err.is_rate_limited() {
                self.emitter.toast(Toast::error("Reserva", err.user_message()));
            }
        }
        result
    }

    async fn try_create(&self, req: NewBooking) -> SyncResult<Booking> {
        let _busy = BusyGuard::acquire(&self.creating, "create")?;

        validate_id("courtId", &req.court_id)?;
        validate_id("establishmentId", &req.establishment_id)?;
        validate_price(req.price_cents)?;
        validate_participants(&req.participants)?;
        validate_time_slot(req.start_time, req.end_time)?;

        let booking = self.api.create_booking(&req).await?;
        info!(
            booking_id = %booking.id,
            court_id = %booking.court_id,
            date = %booking.date,
            "Booking created"
        );

        let count = {
            let mut list = self.bookings.write().await;
            list.push(booking.clone());
            list.len()
        };
        self.emitter.bookings_changed(count);
        self.emitter
            .toast(Toast::success("Reserva creada", booking.facility_name.clone()));
        Ok(booking)
    }

    /// Cancels optimistically and rolls back if the server refuses.
    pub async fn cancel(&self, booking_id: &str) -> SyncResult<Booking> {
        let result = self.try_cancel(booking_id).await;
        if let Err(err) = &result {
            if !err.is_rate_limited() {
                self.emitter
                    .toast(Toast::error("No se pudo cancelar", err.user_message()));
            }
        }
        result
    }

    async fn try_cancel(&self, booking_id: &str) -> SyncResult<Booking> {
        let _in_flight = InFlightGuard::acquire(&self.cancelling, booking_id, "cancel")?;

        let previous = self
            .get(booking_id)
            .await
            .ok_or_else(|| CoreError::BookingNotFound(booking_id.to_string()))?;
        let mut optimistic = previous.clone();
        optimistic.cancel(Utc::now())?;

        self.replace(optimistic).await;

        match self.api.cancel_booking(booking_id).await {
            Ok(confirmed) => {
                info!(booking_id, payment_status = %confirmed.payment_status, "Booking cancelled");
                self.replace(confirmed.clone()).await;
                self.emitter
                    .toast(Toast::success("Reserva cancelada", confirmed.facility_name.clone()));
                Ok(confirmed)
            }
            Err(err) => {
                warn!(booking_id, error = %err, "Cancel failed, restoring booking");
                self.replace(previous).await;
                Err(err.into())
            }
        }
    }

    /// Swaps the booking with the same id, if still present.
    async fn replace(&self, booking: Booking) {
        let count = {
            let mut list = self.bookings.write().await;
            if let Some(slot) = list.iter_mut().find(|b| b.id == booking.id) {
                *slot = booking;
            }
            list.len()
        };
        self.emitter.bookings_changed(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResult;
    use crate::error::{ApiError, SyncError};
    use crate::events::testing::RecordingEmitter;
    use async_trait::async_trait;
    use canchas_core::listing::BookingTab;
    use canchas_core::{BookingStatus, PaymentStatus};
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBookings {
        bookings: Mutex<Vec<Booking>>,
        fail_cancel: Mutex<Option<ApiError>>,
        cancel_calls: AtomicUsize,
    }

    #[async_trait]
    impl BookingApi for FakeBookings {
        async fn list_bookings(&self) -> ApiResult<Vec<Booking>> {
            Ok(self.bookings.lock().unwrap().clone())
        }

        async fn get_booking(&self, booking_id: &str) -> ApiResult<Booking> {
            self.bookings
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.id == booking_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(booking_id.to_string()))
        }

        async fn create_booking(&self, req: &NewBooking) -> ApiResult<Booking> {
            let booking = Booking::new(req.clone(), Utc::now())
                .map_err(|e| ApiError::Validation(e.to_string()))?;
            self.bookings.lock().unwrap().push(booking.clone());
            Ok(booking)
        }

        async fn cancel_booking(&self, booking_id: &str) -> ApiResult<Booking> {
            self.cancel_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_cancel.lock().unwrap().take() {
                return Err(err);
            }
            let mut list = self.bookings.lock().unwrap();
            let booking = list
                .iter_mut()
                .find(|b| b.id == booking_id)
                .ok_or_else(|| ApiError::NotFound(booking_id.to_string()))?;
            booking
                .cancel(Utc::now())
                .map_err(|e| ApiError::Conflict(e.to_string()))?;
            Ok(booking.clone())
        }
    }

    fn request(day: u32, hour: u32, price_cents: i64) -> NewBooking {
        NewBooking {
            court_id: "court-1".into(),
            establishment_id: "est-norte".into(),
            facility_name: "Complejo Norte".into(),
            sport: "padel".into(),
            user_id: "player-ana".into(),
            date: NaiveDate::from_ymd_opt(2030, 5, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            price_cents,
            participants: vec![],
        }
    }

    async fn store_with(
        seed: Vec<Booking>,
    ) -> (BookingStore, Arc<FakeBookings>, Arc<RecordingEmitter>) {
        let api = Arc::new(FakeBookings::default());
        *api.bookings.lock().unwrap() = seed;
        let emitter = Arc::new(RecordingEmitter::default());
        let store = BookingStore::new(api.clone(), emitter.clone());
        store.load().await.unwrap();
        (store, api, emitter)
    }

    #[tokio::test]
    async fn test_load_and_create() {
        let (store, _api, emitter) = store_with(vec![]).await;
        assert!(store.bookings().await.is_empty());

        let booking = store.create(request(10, 18, 2_000_000)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(store.get(&booking.id).await, Some(booking));
        assert_eq!(*emitter.booking_counts.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_slot_locally() {
        let (store, api, _emitter) = store_with(vec![]).await;
        let mut req = request(10, 18, 2_000_000);
        req.end_time = req.start_time;

        let err = store.create(req).await.unwrap_err();
        assert!(matches!(err, SyncError::Rule(CoreError::Validation(_))));
        assert!(api.bookings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_paid_booking_refunds() {
        let mut paid = Booking::new(request(10, 18, 2_000_000), Utc::now()).unwrap();
        paid.set_payment_status(PaymentStatus::Paid, Utc::now()).unwrap();
        let (store, _api, _emitter) = store_with(vec![paid.clone()]).await;

        let cancelled = store.cancel(&paid.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(store.get(&paid.id).await.unwrap().status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reload_picks_up_server_changes() {
        let booking = Booking::new(request(10, 18, 2_000_000), Utc::now()).unwrap();
        let (store, api, emitter) = store_with(vec![booking.clone()]).await;
        api.bookings.lock().unwrap()[0].confirm(Utc::now()).unwrap();

        let reloaded = store.reload(&booking.id).await.unwrap();
        assert_eq!(reloaded.status, BookingStatus::Confirmed);
        assert_eq!(store.get(&booking.id).await.unwrap().status, BookingStatus::Confirmed);
        assert_eq!(*emitter.booking_counts.lock().unwrap(), vec![1, 1]);

        let err = store.reload("missing").await.unwrap_err();
        assert!(matches!(err, SyncError::Api(ApiError::NotFound(_))));
        assert_eq!(store.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_cancel_rolls_back() {
        let booking = Booking::new(request(10, 18, 2_000_000), Utc::now()).unwrap();
        let (store, api, emitter) = store_with(vec![booking.clone()]).await;
        *api.fail_cancel.lock().unwrap() = Some(ApiError::Network("offline".into()));

        let err = store.cancel(&booking.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Api(ApiError::Network(_))));
        assert_eq!(store.get(&booking.id).await, Some(booking.clone()));

        // Rollback published: load, optimistic, restore.
        assert_eq!(emitter.booking_counts.lock().unwrap().len(), 3);
        assert_eq!(
            emitter.last_toast().unwrap().message,
            "No se pudo conectar con el servidor"
        );

        // The id is released, so a retry goes through.
        let cancelled = store.cancel(&booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_terminal_is_error_without_request() {
        let mut done = Booking::new(request(1, 18, 2_000_000), Utc::now()).unwrap();
        done.confirm(Utc::now()).unwrap();
        done.complete(Utc::now()).unwrap();
        let (store, api, _emitter) = store_with(vec![done.clone()]).await;

        let err = store.cancel(&done.id).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Rule(CoreError::BookingTerminal {
                status: BookingStatus::Completed,
                ..
            })
        ));
        assert_eq!(api.cancel_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.get(&done.id).await, Some(done));
    }

    #[tokio::test]
    async fn test_cancel_twice_is_error() {
        let booking = Booking::new(request(10, 18, 2_000_000), Utc::now()).unwrap();
        let (store, api, _emitter) = store_with(vec![booking.clone()]).await;

        store.cancel(&booking.id).await.unwrap();
        let err = store.cancel(&booking.id).await.unwrap_err();
        assert!(matches!(err, SyncError::Rule(CoreError::BookingTerminal { .. })));
        assert_eq!(api.cancel_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_booking() {
        let (store, _api, _emitter) = store_with(vec![]).await;
        let err = store.cancel("missing").await.unwrap_err();
        assert!(matches!(err, SyncError::Rule(CoreError::BookingNotFound(_))));
    }

    #[tokio::test]
    async fn test_view_splits_tabs() {
        let upcoming = Booking::new(request(12, 20, 1_000), Utc::now()).unwrap();
        let mut cancelled = Booking::new(request(11, 19, 2_000), Utc::now()).unwrap();
        cancelled.cancel(Utc::now()).unwrap();
        let (store, _api, _emitter) = store_with(vec![upcoming.clone(), cancelled.clone()]).await;

        let query = BookingQuery {
            tab: Some(BookingTab::Upcoming),
            ..Default::default()
        };
        assert_eq!(store.view(&query).await, vec![upcoming]);

        let query = BookingQuery {
            tab: Some(BookingTab::History),
            ..Default::default()
        };
        assert_eq!(store.view(&query).await, vec![cancelled]);
    }
}
