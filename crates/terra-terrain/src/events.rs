//! Fire-and-forget notifications broadcast to subscribed channels.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::coord::TileCoord;
use crate::lod::LodLevel;

/// Notifications produced by the tile streamer.
#[derive(Clone, Debug, PartialEq)]
pub enum TerrainEvent {
    /// A tile was created and its heights and LOD 0 mesh built.
    TileCreated(TileCoord),
    /// A hidden tile was shown again.
    TileShown(TileCoord),
    /// A loaded tile left the streaming radius and was hidden.
    TileHidden(TileCoord),
    /// A tile's mesh was rebuilt for a new LOD.
    MeshRebuilt { coord: TileCoord, lod: LodLevel },
    /// One more tile of the bulk job was processed.
    GenerationProgress { processed: usize, total: usize },
    /// The bulk job finished.
    GenerationComplete,
}

/// Broadcasts each event to every live subscriber.
///
/// Subscribers whose receiver has been dropped are pruned on the next emit.
/// With no subscribers, events are discarded.
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Vec<Sender<E>>,
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Registers a new subscriber that receives every later event.
    pub fn subscribe(&mut self) -> Receiver<E> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn emit(&mut self, event: E) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<E: Clone> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_every_event() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit(TerrainEvent::TileCreated(TileCoord::new(1, 2)));
        bus.emit(TerrainEvent::GenerationComplete);

        for rx in [a, b] {
            let events: Vec<_> = rx.try_iter().collect();
            assert_eq!(
                events,
                vec![
                    TerrainEvent::TileCreated(TileCoord::new(1, 2)),
                    TerrainEvent::GenerationComplete
                ]
            );
        }
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(TerrainEvent::GenerationComplete);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv(), Ok(TerrainEvent::GenerationComplete));
    }

    #[test]
    fn test_late_subscriber_misses_earlier_events() {
        let mut bus = EventBus::new();
        bus.emit(TerrainEvent::GenerationComplete);
        let rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }
}
