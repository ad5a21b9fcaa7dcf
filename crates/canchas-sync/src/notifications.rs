//! # Notification Feed
//!
//! Polls `GET /api/notifications` and keeps the latest list plus an unread
//! count for the header badge. Unlike the cash register poller this one
//! never stops on its own; the view stops it on unmount.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use canchas_core::Notification;

use crate::api::NotificationApi;
use crate::error::SyncResult;
use crate::events::SyncEventEmitter;
use crate::poller::{PollOutcome, PollTarget, PollerHandle, SyncPoller};

struct Feed {
    api: Arc<dyn NotificationApi>,
    notifications: RwLock<Vec<Notification>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl Feed {
    async fn refresh(&self) -> SyncResult<usize> {
        let notifications = self.api.list_notifications().await?;
        let unread = notifications.iter().filter(|n| !n.read).count();
        *self.notifications.write().await = notifications;
        debug!(unread, "Notifications refreshed");
        self.emitter.notifications_changed(unread);
        Ok(unread)
    }
}

pub struct NotificationFeed {
    feed: Arc<Feed>,
    interval: Duration,
    poller: Mutex<Option<PollerHandle>>,
}

impl NotificationFeed {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        interval: Duration,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        NotificationFeed {
            feed: Arc::new(Feed {
                api,
                notifications: RwLock::new(Vec::new()),
                emitter,
            }),
            interval,
            poller: Mutex::new(None),
        }
    }

    /// Fetches now and returns the unread count.
    pub async fn refresh(&self) -> SyncResult<usize> {
        self.feed.refresh().await
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.feed.notifications.read().await.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.feed
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| !n.read)
            .count()
    }

    pub fn start_polling(&self) {
        let mut poller = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if poller.as_ref().map_or(false, PollerHandle::is_running) {
            return;
        }
        let target = FeedPoll {
            feed: self.feed.clone(),
        };
        *poller = Some(SyncPoller::spawn(target, self.interval));
    }

    pub fn stop_polling(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(false, PollerHandle::is_running)
    }
}

struct FeedPoll {
    feed: Arc<Feed>,
}

#[async_trait]
impl PollTarget for FeedPoll {
    fn name(&self) -> &'static str {
        "notifications"
    }

    async fn poll(&self) -> SyncResult<PollOutcome> {
        self.feed.refresh().await?;
        Ok(PollOutcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResult;
    use crate::error::ApiError;
    use crate::events::testing::RecordingEmitter;
    use canchas_core::NotificationKind;
    use chrono::Utc;

    #[derive(Default)]
    struct FakeNotifications {
        items: Mutex<Vec<Notification>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl NotificationApi for FakeNotifications {
        async fn list_notifications(&self) -> ApiResult<Vec<Notification>> {
            if *self.fail.lock().unwrap() {
                return Err(ApiError::Timeout);
            }
            Ok(self.items.lock().unwrap().clone())
        }
    }

    fn notification(id: &str, read: bool) -> Notification {
        Notification {
            id: id.into(),
            title: "Reserva confirmada".into(),
            message: "Cancha 1, 19hs".into(),
            kind: NotificationKind::Booking,
            read,
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_counts_unread() {
        let api = Arc::new(FakeNotifications::default());
        *api.items.lock().unwrap() = vec![notification("n1", false), notification("n2", true)];
        let emitter = Arc::new(RecordingEmitter::default());
        let feed = NotificationFeed::new(api, Duration::from_secs(60), emitter.clone());

        assert_eq!(feed.refresh().await.unwrap(), 1);
        assert_eq!(feed.unread_count().await, 1);
        assert_eq!(feed.notifications().await.len(), 2);
        assert_eq!(*emitter.unread_counts.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_picks_up_new_notifications() {
        let api = Arc::new(FakeNotifications::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let feed = NotificationFeed::new(api.clone(), Duration::from_secs(60), emitter);
        feed.start_polling();

        api.items.lock().unwrap().push(notification("n1", false));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(feed.unread_count().await, 1);

        // Errors keep the last list and the loop alive.
        *api.fail.lock().unwrap() = true;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(feed.is_polling());
        assert_eq!(feed.unread_count().await, 1);

        feed.stop_polling();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!feed.is_polling());
    }
}
