//! State-based linear undo history

/// Fixed-size ring buffer of states plus a redo stack.
///
/// The base state passed to [`UndoHistory::new`] can never be undone. Once
/// the buffer wraps, the oldest states are overwritten, so at most
/// `capacity - 1` undos are possible.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    buffer: Vec<Option<T>>,
    position: usize,
    redo_stack: Vec<T>,
}

impl<T> UndoHistory<T> {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, base: T) -> Self {
        assert!(capacity > 0, "undo history capacity must be greater than 0");

        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || None);
        buffer[0] = Some(base);

        Self {
            buffer,
            position: 0,
            redo_stack: Vec::new(),
        }
    }

    fn next_position(&self) -> usize {
        (self.position + 1) % self.buffer.len()
    }

    fn prev_position(&self) -> usize {
        match self.position {
            0 => self.buffer.len() - 1,
            n => n - 1,
        }
    }

    /// Write a state at the next slot without touching the redo stack
    fn advance(&mut self, state: T) {
        self.position = self.next_position();
        self.buffer[self.position] = Some(state);
    }

    /// Record a new state. Anything that could have been redone is discarded.
    pub fn push(&mut self, state: T) {
        self.advance(state);
        self.redo_stack.clear();
    }

    /// Revert the most recently pushed state.
    ///
    /// Returns the state that was undone (not the new head; use
    /// [`UndoHistory::head`] for that), or `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }

        let old_head = self.buffer[self.position].take()?;
        self.position = self.prev_position();
        self.redo_stack.push(old_head);

        self.redo_stack.last()
    }

    /// Reapply the most recently undone state
    pub fn redo(&mut self) -> Option<&T> {
        let state = self.redo_stack.pop()?;
        self.advance(state);
        self.head()
    }

    /// The current state
    pub fn head(&self) -> Option<&T> {
        self.buffer[self.position].as_ref()
    }

    pub fn can_undo(&self) -> bool {
        let prev = self.prev_position();
        prev != self.position
            && self.buffer[self.position].is_some()
            && self.buffer[prev].is_some()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of states that can be redone
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Number of states currently held in the ring, including the base
    pub fn depth(&self) -> usize {
        self.buffer.iter().filter(|slot| slot.is_some()).count()
    }
}
