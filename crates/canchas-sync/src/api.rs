//! # REST API
//!
//! One trait per resource, so the stores can be driven by an in-process
//! fake in tests and by [`HttpApi`] in production.
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────────────────────────────────┐
//! │ CashRegisterApi  │      │ HttpApi                                      │
//! │ BookingApi       │ ◄─── │  reqwest::Client (timeout)                   │
//! │ EstablishmentApi │      │  Authorization: Bearer <token>               │
//! │ NotificationApi  │      │  non-2xx ──► ApiError::from_status           │
//! └──────────────────┘      │  429 ──────► RateLimitNotifier::record_hit   │
//!                           └──────────────────────────────────────────────┘
//! ```
//!
//! Bodies are the bare entities (no envelope), camelCase.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use canchas_core::{
    Booking, CashRegister, CloseCashRegisterRequest, Establishment, NewBooking, Notification,
    OpenCashRegisterRequest,
};

use crate::config::ClientConfig;
use crate::error::{ApiError, SyncError, SyncResult};
use crate::rate_limit::RateLimitNotifier;

pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Resource Traits
// =============================================================================

#[async_trait]
pub trait CashRegisterApi: Send + Sync {
    /// `GET /api/cash-registers/active?establishmentId=`. `None` when the
    /// establishment has no open register.
    async fn active_cash_register(&self, establishment_id: &str) -> ApiResult<Option<CashRegister>>;

    /// `POST /api/cash-registers`
    async fn open_cash_register(&self, req: &OpenCashRegisterRequest) -> ApiResult<CashRegister>;

    /// `PUT /api/cash-registers/:id/close`
    async fn close_cash_register(
        &self,
        register_id: &str,
        req: &CloseCashRegisterRequest,
    ) -> ApiResult<CashRegister>;
}

#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_bookings(&self) -> ApiResult<Vec<Booking>>;

    async fn get_booking(&self, booking_id: &str) -> ApiResult<Booking>;

    async fn create_booking(&self, req: &NewBooking) -> ApiResult<Booking>;

    /// `PUT /api/bookings/:id/cancel`. Returns the booking as the server left it.
    async fn cancel_booking(&self, booking_id: &str) -> ApiResult<Booking>;
}

#[async_trait]
pub trait EstablishmentApi: Send + Sync {
    async fn list_establishments(&self) -> ApiResult<Vec<Establishment>>;

    async fn get_establishment(&self, establishment_id: &str) -> ApiResult<Establishment>;
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list_notifications(&self) -> ApiResult<Vec<Notification>>;
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// reqwest-backed client for the Mis Canchas backend.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
    rate_limit: Option<Arc<RateLimitNotifier>>,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpApi {
            client,
            base_url,
            token: None,
            rate_limit: None,
        })
    }

    pub fn from_config(config: &ClientConfig) -> SyncResult<Self> {
        let api = Self::new(&config.api.base_url, config.request_timeout())?;
        Ok(match &config.api.token {
            Some(token) => api.with_token(token.clone()),
            None => api,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Routes every 429 to `notifier`.
    pub fn with_rate_limit(mut self, notifier: Arc<RateLimitNotifier>) -> Self {
        self.rate_limit = Some(notifier);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Base URL plus percent-encoded `segments`.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Network(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Sends and maps non-2xx statuses to [`ApiError`].
    async fn execute(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        trace!(status = status.as_u16(), url = %response.url(), "API response");

        if status.is_success() {
            return Ok(response);
        }

        // Headers must be read before the body consumes the response.
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status.as_u16(), &body, retry_after);

        if let (ApiError::RateLimited { retry_after }, Some(notifier)) = (&err, &self.rate_limit) {
            notifier.record_hit(*retry_after);
        }
        debug!(status = status.as_u16(), error = %err, "API request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.execute(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like [`send_json`](Self::send_json), but 404, an empty body and a
    /// literal `null` all mean `None`.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> ApiResult<Option<T>> {
        let response = match self.execute(request).await {
            Ok(response) => response,
            Err(ApiError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> ApiResult<T> {
        let url = self.endpoint(segments)?;
        self.send_json(self.request(Method::GET, url)).await
    }

    async fn send_body<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> ApiResult<T> {
        let url = self.endpoint(segments)?;
        self.send_json(self.request(method, url).json(body)).await
    }
}

#[async_trait]
impl CashRegisterApi for HttpApi {
    async fn active_cash_register(&self, establishment_id: &str) -> ApiResult<Option<CashRegister>> {
        let url = self.endpoint(&["api", "cash-registers", "active"])?;
        let request = self
            .request(Method::GET, url)
            .query(&[("establishmentId", establishment_id)]);
        self.send_optional(request).await
    }

    async fn open_cash_register(&self, req: &OpenCashRegisterRequest) -> ApiResult<CashRegister> {
        self.send_body(Method::POST, &["api", "cash-registers"], req)
            .await
    }

    async fn close_cash_register(
        &self,
        register_id: &str,
        req: &CloseCashRegisterRequest,
    ) -> ApiResult<CashRegister> {
        self.send_body(
            Method::PUT,
            &["api", "cash-registers", register_id, "close"],
            req,
        )
        .await
    }
}

#[async_trait]
impl BookingApi for HttpApi {
    async fn list_bookings(&self) -> ApiResult<Vec<Booking>> {
        self.get(&["api", "bookings"]).await
    }

    async fn get_booking(&self, booking_id: &str) -> ApiResult<Booking> {
        self.get(&["api", "bookings", booking_id]).await
    }

    async fn create_booking(&self, req: &NewBooking) -> ApiResult<Booking> {
        self.send_body(Method::POST, &["api", "bookings"], req).await
    }

    async fn cancel_booking(&self, booking_id: &str) -> ApiResult<Booking> {
        let url = self.endpoint(&["api", "bookings", booking_id, "cancel"])?;
        self.send_json(self.request(Method::PUT, url)).await
    }
}

#[async_trait]
impl EstablishmentApi for HttpApi {
    async fn list_establishments(&self) -> ApiResult<Vec<Establishment>> {
        self.get(&["api", "establishments"]).await
    }

    async fn get_establishment(&self, establishment_id: &str) -> ApiResult<Establishment> {
        self.get(&["api", "establishments", establishment_id]).await
    }
}

#[async_trait]
impl NotificationApi for HttpApi {
    async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
        self.get(&["api", "notifications"]).await
    }
}
