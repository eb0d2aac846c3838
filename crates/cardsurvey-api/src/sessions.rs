use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use cardsurvey_types::events::SessionEvent;

const CHANNEL_CAPACITY: usize = 16;

/// A session event, optionally scoped to a single login session.
#[derive(Debug, Clone)]
pub struct SessionMessage {
    /// `None` reaches every session of the user (profile changes);
    /// `Some` only the named one (logout).
    pub session_id: Option<Uuid>,
    pub event: SessionEvent,
}

impl SessionMessage {
    pub fn is_for(&self, session_id: Uuid) -> bool {
        self.session_id.is_none_or(|sid| sid == session_id)
    }
}

/// Fans current-user changes out to every open subscription of that user.
#[derive(Clone, Default)]
pub struct SessionHub {
    inner: Arc<SessionHubInner>,
}

#[derive(Default)]
struct SessionHubInner {
    /// user_id -> broadcast sender shared by all of that user's subscribers
    channels: RwLock<HashMap<Uuid, broadcast::Sender<SessionMessage>>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<SessionMessage> {
        let mut channels = self.inner.channels.write().await;
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Emit to all of `user_id`'s subscribers. Channels nobody listens to
    /// any more are dropped.
    pub async fn notify(&self, user_id: Uuid, session_id: Option<Uuid>, event: SessionEvent) {
        let mut channels = self.inner.channels.write().await;
        let Some(tx) = channels.get(&user_id) else {
            return;
        };

        match tx.send(SessionMessage { session_id, event }) {
            Ok(n) => debug!("Session event for {} delivered to {} subscribers", user_id, n),
            Err(_) => {
                channels.remove(&user_id);
            }
        }
    }

    /// Drop a subscription, removing the user's channel once nobody
    /// else is listening.
    pub async fn unsubscribe(&self, user_id: Uuid, rx: broadcast::Receiver<SessionMessage>) {
        drop(rx);
        let mut channels = self.inner.channels.write().await;
        if channels.get(&user_id).is_some_and(|tx| tx.receiver_count() == 0) {
            channels.remove(&user_id);
        }
    }

    #[cfg(test)]
    async fn subscriber_count(&self, user_id: Uuid) -> usize {
        self.inner
            .channels
            .read()
            .await
            .get(&user_id)
            .map_or(0, |tx| tx.receiver_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsurvey_types::models::User;

    fn user(id: Uuid, name: &str) -> User {
        User {
            id,
            email: "u@example.com".into(),
            display_name: name.into(),
            photo_url: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn profile_change_reaches_every_subscriber() {
        let hub = SessionHub::new();
        let uid = Uuid::new_v4();
        let mut a = hub.subscribe(uid).await;
        let mut b = hub.subscribe(uid).await;
        assert_eq!(hub.subscriber_count(uid).await, 2);

        hub.notify(uid, None, SessionEvent::signed_in(user(uid, "New Name"))).await;

        for rx in [&mut a, &mut b] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.event.user.unwrap().display_name, "New Name");
        }
    }

    #[tokio::test]
    async fn logout_is_scoped_to_one_session() {
        let hub = SessionHub::new();
        let uid = Uuid::new_v4();
        let (mine, other) = (Uuid::new_v4(), Uuid::new_v4());
        let mut rx = hub.subscribe(uid).await;

        hub.notify(uid, Some(mine), SessionEvent::signed_out()).await;
        let msg = rx.recv().await.unwrap();
        assert!(msg.is_for(mine));
        assert!(!msg.is_for(other));
        assert!(msg.event.is_signed_out());
    }

    #[tokio::test]
    async fn abandoned_channels_are_dropped() {
        let hub = SessionHub::new();
        let uid = Uuid::new_v4();
        drop(hub.subscribe(uid).await);

        hub.notify(uid, None, SessionEvent::signed_out()).await;
        assert_eq!(hub.subscriber_count(uid).await, 0);
        assert!(hub.inner.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn last_unsubscribe_removes_the_channel() {
        let hub = SessionHub::new();
        let uid = Uuid::new_v4();
        let a = hub.subscribe(uid).await;
        let b = hub.subscribe(uid).await;

        hub.unsubscribe(uid, a).await;
        assert_eq!(hub.subscriber_count(uid).await, 1);

        hub.unsubscribe(uid, b).await;
        assert!(hub.inner.channels.read().await.is_empty());
    }

    #[tokio::test]
    async fn notify_without_subscribers_is_a_noop() {
        let hub = SessionHub::new();
        hub.notify(Uuid::new_v4(), None, SessionEvent::signed_out()).await;
    }
}
