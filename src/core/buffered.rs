//! Purpose: Stack that keeps its newest entries in memory and spills the oldest to an engine.
//! Exports: `BufferedStack`.
//! Invariants: After a push, memory holds at most `max_memory` payload bytes, or only the new entry when it alone exceeds the budget.
//! Invariants: A push is refused unless the engine could absorb all of memory plus the new entry.
use std::collections::VecDeque;

use crate::core::engine::Engine;
use crate::core::error::{Error, ErrorKind};

pub struct BufferedStack {
    engine: Engine,
    // Front is the newest entry.
    memory: VecDeque<Vec<u8>>,
    max_memory: u64,
    header_size: u64,
    byte_length: u64,
    storage_length: u64,
}

impl BufferedStack {
    pub fn new(engine: Engine, max_memory: u64) -> Self {
        let header_size = engine.header_size();
        Self {
            engine,
            memory: VecDeque::new(),
            max_memory,
            header_size,
            byte_length: 0,
            storage_length: 0,
        }
    }

    pub fn push(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.engine.framing().check_payload(payload)?;
        let required = payload.len() as u64 + self.header_size;
        let needed = self.storage_length + required;
        if self.engine.available_space() < needed {
            return Err(Error::new(ErrorKind::OutOfSpace).with_message(format!(
                "disk cannot absorb {needed} buffered bytes, {} available",
                self.engine.available_space()
            )));
        }

        self.spill_until(self.max_memory.saturating_sub(payload.len() as u64))?;
        self.memory.push_front(payload.to_vec());
        self.byte_length += payload.len() as u64;
        self.storage_length += required;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Vec<u8>, Error> {
        if let Some(payload) = self.memory.pop_front() {
            self.forget(&payload);
            return Ok(payload);
        }
        self.engine.pop_front()
    }

    pub fn peek(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if let Some(payload) = self.memory.front() {
            return Ok(Some(payload.clone()));
        }
        self.engine.peek_front()
    }

    pub fn size(&self) -> u64 {
        self.engine.size() + self.memory.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn byte_length(&self) -> u64 {
        self.engine.byte_length() + self.byte_length
    }

    /// Bytes the combined contents will occupy once everything is on disk.
    pub fn storage_length(&self) -> u64 {
        self.engine.storage_length() + self.storage_length
    }

    /// Disk space left after reserving room for every in-memory entry.
    pub fn available_space(&self) -> u64 {
        self.engine
            .available_space()
            .saturating_sub(self.storage_length)
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Moves every in-memory entry to disk, oldest first, then closes the engine.
    pub fn close(mut self) -> Result<(), Error> {
        let spilled = self.memory.len();
        self.spill_until(0)?;
        tracing::debug!(spilled, "flushed buffered stack");
        self.engine.close()
    }

    fn spill_until(&mut self, limit: u64) -> Result<(), Error> {
        while self.byte_length > limit {
            let Some(oldest) = self.memory.pop_back() else {
                break;
            };
            if let Err(err) = self.engine.push_front(&oldest) {
                self.memory.push_back(oldest);
                return Err(err);
            }
            self.forget(&oldest);
        }
        Ok(())
    }

    fn forget(&mut self, payload: &[u8]) {
        self.byte_length -= payload.len() as u64;
        self.storage_length -= payload.len() as u64 + self.header_size;
    }
}
