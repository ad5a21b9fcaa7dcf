//! # Sync Error Types
//!
//! Errors raised by the REST client and the client-side stores.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Api (HTTP)     │  │  Rule (core)    │  │  Client state           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Network        │  │  AlreadyOpen    │  │  Busy                   │ │
//! │  │  Unauthorized   │  │  BookingTerminal│  │  NoActiveRegister       │ │
//! │  │  RateLimited    │  │  Validation     │  │  NoEstablishment        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────┐                                                │
//! │  │  Configuration      │                                                │
//! │  │                     │                                                │
//! │  │  InvalidConfig      │                                                │
//! │  │  InvalidUrl         │                                                │
//! │  │  ConfigLoad/Save    │                                                │
//! │  └─────────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rule errors are raised locally before any request is sent, so a
//! `SyncError::Rule` never costs a round trip.

use std::time::Duration;

use canchas_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// API Error
// =============================================================================

/// A failed REST call, classified by HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Could not reach the server.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    /// 401
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 403
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 / 422
    #[error("Validation failed: {0}")]
    Validation(String),

    /// 409
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 429. `retry_after` comes from the `Retry-After` header when present.
    #[error("Too many requests")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success status.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Body could not be decoded into the expected type.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Maps a non-success status and its body to an error.
    ///
    /// The body is expected to be `{"message": "..."}` or `{"error": "..."}`;
    /// anything else is used verbatim.
    pub fn from_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = error_message(body, status);
        match status {
            400 | 422 => ApiError::Validation(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            429 => ApiError::RateLimited { retry_after },
            _ => ApiError::Server { status, message },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}

fn error_message(body: &str, status: u16) -> String {
    let body = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(err.to_string())
    }
}

// =============================================================================
// Sync Error
// =============================================================================

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Remote / Rule Errors
    // =========================================================================
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Rejected locally by a canchas-core rule.
    #[error(transparent)]
    Rule(#[from] CoreError),

    // =========================================================================
    // Client State Errors
    // =========================================================================
    /// Another open/close/create is still in flight.
    #[error("Operation already in progress: {0}")]
    Busy(&'static str),

    /// Close requested but no register is loaded.
    #[error("No open cash register")]
    NoActiveRegister,

    #[error("No establishment selected")]
    NoEstablishment,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for SyncError {
    fn from(err: ValidationError) -> Self {
        SyncError::Rule(CoreError::Validation(err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Api(err.into())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Transient failures a poller may retry on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Api(
                ApiError::Network(_)
                    | ApiError::Timeout
                    | ApiError::RateLimited { .. }
                    | ApiError::Server { .. }
            )
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::NoEstablishment
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::Api(api) if api.is_rate_limited())
    }

    /// Short message for a toast. Server-provided validation and conflict
    /// messages are passed through, since the backend already localizes them.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Api(api) => match api {
                ApiError::Network(_) => "No se pudo conectar con el servidor".into(),
                ApiError::Timeout => "El servidor tardó demasiado en responder".into(),
                ApiError::Unauthorized(_) => "Tu sesión expiró, volvé a iniciar sesión".into(),
                ApiError::Forbidden(_) => "No tenés permiso para esta acción".into(),
                ApiError::NotFound(_) => "No se encontró el recurso".into(),
                ApiError::Validation(msg) | ApiError::Conflict(msg) => msg.clone(),
                ApiError::RateLimited { .. } => "Demasiadas solicitudes, esperá un momento".into(),
                ApiError::Server { .. } | ApiError::InvalidResponse(_) => {
                    "Error del servidor, intentá de nuevo".into()
                }
            },
            SyncError::Rule(CoreError::CashRegisterAlreadyOpen { .. }) => {
                "Ya hay una caja abierta".into()
            }
            SyncError::Rule(CoreError::BookingTerminal { .. }) => {
                "La reserva ya no se puede modificar".into()
            }
            SyncError::Rule(err) => err.to_string(),
            SyncError::Busy(_) => "Operación en curso, esperá".into(),
            SyncError::NoActiveRegister => "No hay una caja abierta".into(),
            SyncError::NoEstablishment => "Seleccioná un establecimiento".into(),
            other => other.to_string(),
        }
    }
}
