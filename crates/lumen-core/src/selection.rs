//! Transient keyframe selection, kept apart from the keyframe records

use std::collections::HashSet;

use crate::keyframe::KeyframeId;

/// Set of selected keyframes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<KeyframeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: KeyframeId) -> bool {
        self.ids.contains(&id)
    }

    /// Returns true if the keyframe was not already selected
    pub fn insert(&mut self, id: KeyframeId) -> bool {
        self.ids.insert(id)
    }

    /// Returns true if the keyframe was selected
    pub fn remove(&mut self, id: KeyframeId) -> bool {
        self.ids.remove(&id)
    }

    /// Flip selection state, returning the new state
    pub fn toggle(&mut self, id: KeyframeId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Set selection state, returning true if it changed
    pub fn set(&mut self, id: KeyframeId, selected: bool) -> bool {
        if selected {
            self.ids.insert(id)
        } else {
            self.ids.remove(&id)
        }
    }

    /// Deselect everything, returning true if anything was selected
    pub fn clear(&mut self) -> bool {
        let had_any = !self.ids.is_empty();
        self.ids.clear();
        had_any
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
