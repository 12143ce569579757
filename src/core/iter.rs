//! Purpose: Non-destructive traversal over a private copy of an engine's allocator state.
//! Exports: `SnapshotIter`.
//! Role: Reads records by releasing them from a cloned `CircularSpace` through its own store handle.
//! Invariants: The live engine is never touched; any committed mutation invalidates the iterator.
//! Invariants: After an error the iterator is fused and yields nothing further.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::engine::read_record;
use crate::core::error::{Error, ErrorKind};
use crate::core::frame::{End, Framing};
use crate::core::span::CircularSpace;
use crate::core::store::Store;

pub struct SnapshotIter {
    space: CircularSpace,
    store: Box<dyn Store>,
    framing: Framing,
    end: End,
    mutations: Arc<AtomicU64>,
    expected: u64,
    remaining: u64,
    done: bool,
}

impl SnapshotIter {
    pub(crate) fn new(
        space: CircularSpace,
        store: Box<dyn Store>,
        framing: Framing,
        end: End,
        mutations: Arc<AtomicU64>,
    ) -> Self {
        let expected = mutations.load(Ordering::Acquire);
        let remaining = space.size() / framing.pieces_per_record();
        Self {
            space,
            store,
            framing,
            end,
            mutations,
            expected,
            remaining,
            done: false,
        }
    }

    /// Records not yet yielded.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn has_next(&self) -> bool {
        !self.done && !self.is_stale() && !self.space.is_empty()
    }

    /// Reads the next record; `Empty` once exhausted, `ConcurrentMutation` if the engine changed.
    pub fn next_record(&mut self) -> Result<Vec<u8>, Error> {
        if self.is_stale() {
            self.done = true;
            return Err(Error::new(ErrorKind::ConcurrentMutation)
                .with_message("buffer changed since the iterator was created"));
        }
        if self.done || self.space.is_empty() {
            return Err(Error::new(ErrorKind::Empty).with_message("iterator exhausted"));
        }
        match read_record(&mut self.space, self.store.as_mut(), self.framing, self.end) {
            Ok(payload) => {
                self.remaining = self.remaining.saturating_sub(1);
                Ok(payload)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    /// Drops the private store handle.
    pub fn close(self) {
        tracing::debug!(remaining = self.remaining, "closed snapshot iterator");
    }

    fn is_stale(&self) -> bool {
        self.mutations.load(Ordering::Acquire) != self.expected
    }
}

impl Iterator for SnapshotIter {
    type Item = Result<Vec<u8>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.is_stale() && self.space.is_empty() {
            self.done = true;
            return None;
        }
        Some(self.next_record())
    }
}
