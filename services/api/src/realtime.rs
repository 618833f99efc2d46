//! Per-user event rooms for WebSocket clients
//!
//! Each authenticated socket joins the room of its user id. Writes that
//! concern a user (messages, notifications) are pushed to that room;
//! presence and resource availability changes go to every socket.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::{
    message::Message, notification::Notification, resource::Resource, user_status::UserStatus,
};

/// Frames sent to clients: `{"event": <name>, "data": <payload>}`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message")]
    Message(Message),
    #[serde(rename = "notification")]
    Notification(Notification),
    #[serde(rename = "userStatus")]
    UserStatus(UserStatus),
    #[serde(rename = "resource-updated")]
    ResourceUpdated(Resource),
    #[serde(rename = "pong")]
    Pong,
}

type Room = HashMap<Uuid, mpsc::UnboundedSender<String>>;
type Rooms = Arc<RwLock<HashMap<Uuid, Room>>>;

/// Handle returned when a socket joins its room
#[derive(Debug, Clone, Copy)]
pub struct Membership {
    pub user_id: Uuid,
    pub connection_id: Uuid,
    /// This is the user's only open socket
    pub first: bool,
}

/// Registry of open sockets grouped by user
#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Rooms,
    /// Held across a first join or last leave and the presence write it triggers
    presence: Arc<Mutex<()>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket for `user_id`; frames for it arrive on the receiver
    pub async fn join(&self, user_id: Uuid) -> (Membership, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(user_id).or_default();
        room.insert(connection_id, tx);

        let membership = Membership {
            user_id,
            connection_id,
            first: room.len() == 1,
        };
        debug!("Socket {} joined room {}", connection_id, user_id);

        (membership, rx)
    }

    /// Remove a socket; returns true when it was the user's last one
    pub async fn leave(&self, membership: &Membership) -> bool {
        let mut rooms = self.rooms.write().await;

        let Some(room) = rooms.get_mut(&membership.user_id) else {
            return false;
        };

        room.remove(&membership.connection_id);
        if room.is_empty() {
            rooms.remove(&membership.user_id);
            true
        } else {
            false
        }
    }

    /// Join and, for the user's first socket, run `on_first` before any
    /// other socket of any user can join or leave
    pub async fn connect<F, Fut>(
        &self,
        user_id: Uuid,
        on_first: F,
    ) -> (Membership, mpsc::UnboundedReceiver<String>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let _presence = self.presence.lock().await;
        let (membership, rx) = self.join(user_id).await;
        if membership.first {
            on_first().await;
        }
        (membership, rx)
    }

    /// Leave and, when it was the user's last socket, run `on_last` under
    /// the same ordering as [`RealtimeHub::connect`]
    pub async fn disconnect<F, Fut>(&self, membership: &Membership, on_last: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let _presence = self.presence.lock().await;
        let last = self.leave(membership).await;
        if last {
            on_last().await;
        }
        last
    }

    /// Push an event to every socket of one user; returns sockets reached
    pub async fn emit_to_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let rooms = self.rooms.read().await;
        rooms
            .get(&user_id)
            .map(|room| deliver(room.values(), &frame))
            .unwrap_or(0)
    }

    /// Push an event to a single socket
    pub async fn emit_to_connection(&self, membership: &Membership, event: &ServerEvent) -> bool {
        let Some(frame) = encode(event) else {
            return false;
        };

        let rooms = self.rooms.read().await;
        rooms
            .get(&membership.user_id)
            .and_then(|room| room.get(&membership.connection_id))
            .is_some_and(|tx| tx.send(frame).is_ok())
    }

    /// Push an event to every open socket
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let rooms = self.rooms.read().await;
        rooms
            .values()
            .map(|room| deliver(room.values(), &frame))
            .sum()
    }

    /// Users with at least one open socket
    pub async fn online_users(&self) -> Vec<Uuid> {
        self.rooms.read().await.keys().copied().collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.rooms.read().await.values().map(HashMap::len).sum()
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    serde_json::to_string(event)
        .map_err(|e| error!("Failed to encode socket event: {}", e))
        .ok()
}

fn deliver<'a>(senders: impl Iterator<Item = &'a mpsc::UnboundedSender<String>>, frame: &str) -> usize {
    senders
        .filter(|tx| tx.send(frame.to_string()).is_ok())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn status(user_id: Uuid, is_online: bool) -> ServerEvent {
        ServerEvent::UserStatus(UserStatus {
            user_id,
            is_online,
            last_seen: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_first_and_last_connection() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();

        let (first, _rx1) = hub.join(user).await;
        let (second, _rx2) = hub.join(user).await;
        assert!(first.first);
        assert!(!second.first);
        assert_eq!(hub.connection_count().await, 2);

        assert!(!hub.leave(&first).await);
        assert_eq!(hub.online_users().await, vec![user]);
        assert!(hub.leave(&second).await);
        assert!(hub.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_emit_reaches_only_the_users_room() {
        let hub = RealtimeHub::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (_a, mut alice_rx) = hub.join(alice).await;
        let (_b, mut bob_rx) = hub.join(bob).await;

        let reached = hub.emit_to_user(alice, &status(alice, true)).await;
        assert_eq!(reached, 1);

        let frame = alice_rx.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["event"], "userStatus");
        assert_eq!(json["data"]["is_online"], true);
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone() {
        let hub = RealtimeHub::new();
        let (_a, mut rx1) = hub.join(Uuid::new_v4()).await;
        let (_b, mut rx2) = hub.join(Uuid::new_v4()).await;

        assert_eq!(hub.broadcast(&status(Uuid::new_v4(), false)).await, 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_pong_goes_to_one_socket() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let (first, mut rx1) = hub.join(user).await;
        let (_second, mut rx2) = hub.join(user).await;

        assert!(hub.emit_to_connection(&first, &ServerEvent::Pong).await);
        assert_eq!(rx1.recv().await.unwrap(), r#"{"event":"pong"}"#);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_receivers_are_not_counted() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let (_m, rx) = hub.join(user).await;
        drop(rx);

        assert_eq!(hub.emit_to_user(user, &ServerEvent::Pong).await, 0);
        assert_eq!(hub.emit_to_user(Uuid::new_v4(), &ServerEvent::Pong).await, 0);
    }

    #[tokio::test]
    async fn test_reconnect_waits_for_offline_write() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let writes = Arc::new(Mutex::new(Vec::new()));

        let (old, _rx) = hub.join(user).await;

        let leaving = {
            let hub = hub.clone();
            let writes = writes.clone();
            tokio::spawn(async move {
                hub.disconnect(&old, || async {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    writes.lock().await.push(false);
                })
                .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let (new, _rx) = hub
            .connect(user, || async {
                writes.lock().await.push(true);
            })
            .await;

        assert!(leaving.await.unwrap());
        assert!(new.first);
        assert_eq!(*writes.lock().await, vec![false, true]);
        assert_eq!(hub.online_users().await, vec![user]);
    }
}
