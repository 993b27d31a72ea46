//! Keyframe and track representations

use serde::{Deserialize, Serialize};

/// Unique identifier for keyframes within one timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyframeId(pub u64);

/// A single timed event on a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    pub id: KeyframeId,
    /// Position in seconds
    pub timestamp: f64,
    /// Output state (0.0 = off, 1.0 = on)
    pub value: f64,
}

impl Keyframe {
    pub fn new(id: KeyframeId, timestamp: f64, value: f64) -> Self {
        Self { id, timestamp, value }
    }

    pub fn is_on(&self) -> bool {
        self.value > 0.0
    }

    /// The opposite of the current state: 0 becomes 1, anything else becomes 0
    pub fn inverted_value(&self) -> f64 {
        if self.value == 0.0 { 1.0 } else { 0.0 }
    }
}

/// One channel of keyframes (e.g. a single light fixture)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub name: String,
    /// Keyframes sorted by timestamp
    pub keyframes: Vec<Keyframe>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keyframes: Vec::new(),
        }
    }

    /// Stable sort by timestamp; equal timestamps keep insertion order
    pub fn sort(&mut self) {
        self.keyframes
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }

    pub fn is_sorted(&self) -> bool {
        self.keyframes
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    /// Add a keyframe, keeping keyframes sorted
    pub fn insert(&mut self, keyframe: Keyframe) {
        self.keyframes.push(keyframe);
        self.sort();
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }
}
