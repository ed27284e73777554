//! The broadcast seam: publishing events to room and player topics.

use std::collections::HashMap;
use std::future::Future;

use kutob_protocol::{GameEvent, RoomCode, Topic, Username};
use tokio::sync::{Mutex, broadcast};

/// Publish/subscribe fan-out for game events.
///
/// Publishing is fire-and-forget: a topic nobody listens to just drops
/// the event. Delivery order per topic must match publish order.
pub trait Broadcaster: Send + Sync + 'static {
    fn publish(&self, topic: &Topic, event: GameEvent) -> impl Future<Output = ()> + Send;
}

/// In-process [`Broadcaster`] backed by one `tokio::sync::broadcast`
/// channel per topic.
///
/// Transports call [`BroadcastHub::subscribe`] when a client connects and
/// forward whatever arrives on the receiver.
#[derive(Debug)]
pub struct BroadcastHub {
    channels: Mutex<HashMap<Topic, broadcast::Sender<GameEvent>>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Events buffered per topic before slow receivers start lagging.
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to `topic`, creating its channel on first use.
    pub async fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<GameEvent> {
        let mut channels = self.channels.lock().await;
        channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Drops every channel belonging to `code`. Receivers see `Closed`.
    pub async fn close_room(&self, code: &RoomCode) {
        let mut channels = self.channels.lock().await;
        channels.retain(|topic, _| match topic {
            Topic::Room(room) => room != code,
            Topic::Player { room, .. } => room != code,
        });
    }

    pub async fn topic_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster for BroadcastHub {
    async fn publish(&self, topic: &Topic, event: GameEvent) {
        let channels = self.channels.lock().await;
        match channels.get(topic) {
            // An error only means every receiver is gone.
            Some(sender) => {
                let _ = sender.send(event);
            }
            None => tracing::trace!(%topic, "no subscribers, event dropped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Events produced while handling one command or timer, in publish order.
///
/// The controller only flushes an outbox after the state it describes has
/// been saved, so a rejected or failed request publishes nothing.
#[derive(Debug)]
pub struct Outbox {
    code: RoomCode,
    events: Vec<(Topic, GameEvent)>,
}

impl Outbox {
    pub fn new(code: &RoomCode) -> Self {
        Self {
            code: code.clone(),
            events: Vec::new(),
        }
    }

    /// Queues an event for every member of the room.
    pub fn room(&mut self, event: GameEvent) {
        self.events.push((Topic::room(&self.code), event));
    }

    /// Queues an event for one member.
    pub fn player(&mut self, username: &Username, event: GameEvent) {
        self.events.push((Topic::player(username, &self.code), event));
    }

    pub fn events(&self) -> &[(Topic, GameEvent)] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub async fn flush<B: Broadcaster>(self, broadcaster: &B) {
        for (topic, event) in self.events {
            broadcaster.publish(&topic, event).await;
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::new("ROOM01")
    }

    #[tokio::test]
    async fn test_publish_reaches_topic_subscribers_only() {
        let hub = BroadcastHub::new();
        let ana = Username::new("ana");
        let mut room_rx = hub.subscribe(&Topic::room(&code())).await;
        let mut ana_rx = hub.subscribe(&Topic::player(&ana, &code())).await;

        hub.publish(&Topic::room(&code()), GameEvent::NightCount { count: 1 })
            .await;

        assert_eq!(room_rx.try_recv().unwrap(), GameEvent::NightCount { count: 1 });
        assert!(ana_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let hub = BroadcastHub::new();
        hub.publish(&Topic::room(&code()), GameEvent::DayCount { count: 1 })
            .await;
        assert_eq!(hub.topic_count().await, 0);
    }

    #[tokio::test]
    async fn test_outbox_flush_preserves_order() {
        let hub = BroadcastHub::new();
        let mut rx = hub.subscribe(&Topic::room(&code())).await;

        let mut out = Outbox::new(&code());
        out.room(GameEvent::DayCount { count: 1 });
        out.room(GameEvent::Countdown { countdown: 5 });
        assert_eq!(out.len(), 2);
        out.flush(&hub).await;

        assert_eq!(rx.try_recv().unwrap(), GameEvent::DayCount { count: 1 });
        assert_eq!(rx.try_recv().unwrap(), GameEvent::Countdown { countdown: 5 });
    }

    #[tokio::test]
    async fn test_close_room_drops_its_topics() {
        let hub = BroadcastHub::new();
        let other = RoomCode::new("OTHER");
        let _a = hub.subscribe(&Topic::room(&code())).await;
        let _b = hub.subscribe(&Topic::player(&Username::new("x"), &code())).await;
        let _c = hub.subscribe(&Topic::room(&other)).await;

        hub.close_room(&code()).await;
        assert_eq!(hub.topic_count().await, 1);
    }
}
