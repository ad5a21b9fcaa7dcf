//! # Rate-Limit Notifier
//!
//! Every 429 from the backend, polling included, is reported here. The
//! notifier counts hits inside a quiet window and escalates the message the
//! user sees:
//!
//! ```text
//!   hit 1            hit 2              hit 3+
//!  ┌────────┐      ┌─────────┐       ┌─────────┐
//!  │ Notice │ ───► │ Warning │ ────► │ Blocked │
//!  └────────┘      └─────────┘       └─────────┘
//!       ▲                                  │
//!       └──── no hit for `window_secs` ◄───┘
//! ```
//!
//! A toast is emitted only when the level rises, so a burst of polling 429s
//! produces at most three messages.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitSettings;
use crate::events::{SyncEventEmitter, Toast};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitLevel {
    Notice,
    Warning,
    Blocked,
}

#[derive(Debug, Default)]
struct HitState {
    hits: u32,
    last_hit: Option<Instant>,
    level: Option<RateLimitLevel>,
}

impl HitState {
    fn expire(&mut self, now: Instant, window: Duration) {
        if let Some(last) = self.last_hit {
            if now.duration_since(last) >= window {
                *self = HitState::default();
            }
        }
    }
}

pub struct RateLimitNotifier {
    window: Duration,
    warning_after: u32,
    blocked_after: u32,
    emitter: Arc<dyn SyncEventEmitter>,
    state: Mutex<HitState>,
}

impl RateLimitNotifier {
    pub fn new(settings: &RateLimitSettings, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        RateLimitNotifier {
            window: Duration::from_secs(settings.window_secs),
            warning_after: settings.warning_after,
            blocked_after: settings.blocked_after,
            emitter,
            state: Mutex::new(HitState::default()),
        }
    }

    /// Records a 429 and returns the level it put the client at.
    pub fn record_hit(&self, retry_after: Option<Duration>) -> RateLimitLevel {
        let now = Instant::now();
        let (level, escalated, hits) = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.expire(now, self.window);
            state.hits += 1;
            state.last_hit = Some(now);

            let level = self.level_for(state.hits);
            let escalated = state.level.map_or(true, |current| level > current);
            if escalated {
                state.level = Some(level);
            }
            (level, escalated, state.hits)
        };

        if escalated {
            warn!(hits, ?level, ?retry_after, "Rate limited by API");
            self.emitter.toast(self.toast_for(level, retry_after));
        } else {
            debug!(hits, ?level, "Rate limited again");
        }
        level
    }

    /// Current level, or `None` once the quiet window has passed.
    pub fn level(&self) -> Option<RateLimitLevel> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.expire(Instant::now(), self.window);
        state.level
    }

    pub fn is_blocked(&self) -> bool {
        self.level() == Some(RateLimitLevel::Blocked)
    }

    fn level_for(&self, hits: u32) -> RateLimitLevel {
        if hits >= self.blocked_after {
            RateLimitLevel::Blocked
        } else if hits >= self.warning_after {
            RateLimitLevel::Warning
        } else {
            RateLimitLevel::Notice
        }
    }

    fn toast_for(&self, level: RateLimitLevel, retry_after: Option<Duration>) -> Toast {
        let wait = match retry_after {
            Some(d) => format!("Reintentá en {} segundos.", d.as_secs().max(1)),
            None => "Reintentá en unos momentos.".to_string(),
        };
        match level {
            RateLimitLevel::Notice => Toast::info("Muchas solicitudes", wait),
            RateLimitLevel::Warning => Toast::warning(
                "Demasiadas solicitudes",
                format!("Bajá el ritmo. {wait}"),
            ),
            RateLimitLevel::Blocked => Toast::error(
                "Solicitudes bloqueadas",
                format!("El servidor está rechazando tus solicitudes. {wait}"),
            ),
        }
    }
}
