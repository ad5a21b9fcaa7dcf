//! # Client Events
//!
//! The stores report state changes and user-facing messages through a
//! [`SyncEventEmitter`]. A front end bridges it to its own event system
//! (toasts, re-render); tests record what was emitted.

use canchas_core::CashRegister;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
}

impl Toast {
    pub fn new(level: ToastLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Toast {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Success, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ToastLevel::Error, title, message)
    }
}

/// Sink for client events.
pub trait SyncEventEmitter: Send + Sync {
    fn toast(&self, toast: Toast);

    /// The loaded register changed (opened, refreshed, closed or gone).
    fn cash_register_changed(&self, register: Option<&CashRegister>);

    /// The booking list changed; `count` is the new length.
    fn bookings_changed(&self, count: usize);

    fn notifications_changed(&self, unread: usize);
}

/// No-op event emitter for headless use.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn toast(&self, _toast: Toast) {}
    fn cash_register_changed(&self, _register: Option<&CashRegister>) {}
    fn bookings_changed(&self, _count: usize) {}
    fn notifications_changed(&self, _unread: usize) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every emitted event for assertions.
    #[derive(Default)]
    pub struct RecordingEmitter {
        pub toasts: Mutex<Vec<Toast>>,
        /// `Some(is_open)` per register event, `None` when the register went away.
        pub registers: Mutex<Vec<Option<bool>>>,
        pub booking_counts: Mutex<Vec<usize>>,
        pub unread_counts: Mutex<Vec<usize>>,
    }

    impl RecordingEmitter {
        pub fn toasts(&self) -> Vec<Toast> {
            self.toasts.lock().unwrap().clone()
        }

        pub fn last_toast(&self) -> Option<Toast> {
            self.toasts.lock().unwrap().last().cloned()
        }
    }

    impl SyncEventEmitter for RecordingEmitter {
        fn toast(&self, toast: Toast) {
            self.toasts.lock().unwrap().push(toast);
        }

        fn cash_register_changed(&self, register: Option<&CashRegister>) {
            self.registers
                .lock()
                .unwrap()
                .push(register.map(|r| r.is_open()));
        }

        fn bookings_changed(&self, count: usize) {
            self.booking_counts.lock().unwrap().push(count);
        }

        fn notifications_changed(&self, unread: usize) {
            self.unread_counts.lock().unwrap().push(unread);
        }
    }
}
