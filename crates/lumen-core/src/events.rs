//! Push notifications to listeners over crossbeam channels

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Notifications emitted by [`crate::TimelineData`]
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    /// Human-readable description of the edit just applied (or declined)
    Edit(String),
    /// Total number of selected keyframes after the edit
    Selected(usize),
    /// Serialized channel data to persist
    Autosave(String),
}

/// Fan-out of events to any number of subscribers
#[derive(Debug)]
pub struct Emitter<E> {
    subscribers: Vec<Sender<E>>,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E: Clone> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<E> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are forgotten
    pub fn emit(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
