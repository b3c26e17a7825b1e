// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Manages a generic, thread-safe event channel.
///
/// The bus is generic over the event type `T`, which keeps `vellum-core`
/// decoupled from the events defined by higher-level crates.
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + Sync + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Creates a new EventBus with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Creates a new EventBus holding at most `capacity` undrained events.
    /// When it is full, publishing drops the oldest queued event.
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = flume::bounded(capacity.max(1));
        log::debug!("EventBus initialized with capacity {}.", capacity.max(1));
        Self { sender, receiver }
    }

    /// Sends an event, logging an error if the receiver is disconnected.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");

        let mut event = event;
        loop {
            match self.sender.try_send(event) {
                Ok(()) => return,
                Err(flume::TrySendError::Full(rejected)) => {
                    if self.receiver.try_recv().is_ok() {
                        log::debug!("EventBus full; dropped the oldest event.");
                    }
                    event = rejected;
                }
                Err(e @ flume::TrySendError::Disconnected(_)) => {
                    log::error!("Failed to send event: {e}. Receiver likely disconnected.");
                    return;
                }
            }
        }
    }

    /// Returns a clone of the sender end of the channel. On a bounded bus,
    /// `send` on this handle blocks while the bus is full.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns a reference to the receiver end of the channel.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Takes every event currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SnapshotEvent;
    use flume::{SendError, TryRecvError};
    use std::{thread, time::Duration};

    fn saved(name: &str) -> SnapshotEvent {
        SnapshotEvent::GameSaved {
            name: name.to_string(),
        }
    }

    #[test]
    fn event_bus_creation() {
        let bus = EventBus::<SnapshotEvent>::new();
        let _sender = bus.sender();
        assert!(bus.receiver().is_empty());
    }

    #[test]
    fn try_receive_empty() {
        let bus = EventBus::<SnapshotEvent>::new();

        match bus.receiver().try_recv() {
            Err(TryRecvError::Empty) => { /* This is the expected outcome */ }
            Ok(event) => panic!("Received unexpected event: {event:?}"),
            Err(e) => panic!("Received unexpected error: {e:?}"),
        }
    }

    #[test]
    fn drain_preserves_publish_order() {
        let bus = EventBus::<SnapshotEvent>::new();

        bus.publish(SnapshotEvent::SuspendingSerialization);
        bus.publish(saved("slot"));
        bus.publish(SnapshotEvent::ResumingSerialization);

        assert_eq!(
            bus.drain(),
            vec![
                SnapshotEvent::SuspendingSerialization,
                saved("slot"),
                SnapshotEvent::ResumingSerialization,
            ]
        );
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn bounded_bus_keeps_the_newest_events() {
        let bus = EventBus::<SnapshotEvent>::bounded(2);

        bus.publish(saved("one"));
        bus.publish(saved("two"));
        bus.publish(saved("three"));

        assert_eq!(bus.drain(), vec![saved("two"), saved("three")]);
    }

    #[test]
    fn send_from_thread() {
        let bus = EventBus::<SnapshotEvent>::new();
        let sender_clone = bus.sender();

        let handle = thread::spawn(move || {
            sender_clone
                .send(SnapshotEvent::Deserialized)
                .expect("Send from thread failed");
        });

        match bus.receiver().recv_timeout(Duration::from_secs(1)) {
            Ok(received_event) => assert_eq!(received_event, SnapshotEvent::Deserialized),
            Err(e) => panic!("Failed to receive event from thread: {e:?}"),
        }

        handle.join().expect("Thread join failed");
    }

    #[test]
    fn send_error_on_receiver_drop() {
        let bus = EventBus::<SnapshotEvent>::new();
        let sender = bus.sender();

        drop(bus);

        match sender.send(saved("late")) {
            Err(SendError(_)) => { /* This is the expected outcome */ }
            Ok(()) => panic!("Send unexpectedly succeeded after receiver drop"),
        }
    }
}
