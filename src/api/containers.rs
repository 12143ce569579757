//! Purpose: Stack, queue, and deque views over the engine and the buffered stack.
//! Exports: `RecordBuffer`, `Stack`, `Queue`, `Deque`.
//! Invariants: Every method maps onto exactly one engine operation.

use crate::core::buffered::BufferedStack;
use crate::core::engine::Engine;
use crate::core::error::Error;

/// Size accounting shared by every container.
pub trait RecordBuffer {
    /// Number of stored records.
    fn size(&self) -> u64;
    /// Payload bytes, excluding headers.
    fn byte_length(&self) -> u64;
    /// Bytes occupied once headers are counted.
    fn storage_length(&self) -> u64;
    fn available_space(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Last in, first out.
pub trait Stack: RecordBuffer {
    fn push(&mut self, payload: &[u8]) -> Result<(), Error>;
    fn pop(&mut self) -> Result<Vec<u8>, Error>;
    fn peek(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

/// First in, first out.
pub trait Queue: RecordBuffer {
    fn enqueue(&mut self, payload: &[u8]) -> Result<(), Error>;
    fn dequeue(&mut self) -> Result<Vec<u8>, Error>;
    fn front(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

pub trait Deque: RecordBuffer {
    fn push_front(&mut self, payload: &[u8]) -> Result<(), Error>;
    fn push_back(&mut self, payload: &[u8]) -> Result<(), Error>;
    fn pop_front(&mut self) -> Result<Vec<u8>, Error>;
    fn pop_back(&mut self) -> Result<Vec<u8>, Error>;
    fn peek_front(&mut self) -> Result<Option<Vec<u8>>, Error>;
    fn peek_back(&mut self) -> Result<Option<Vec<u8>>, Error>;
}

impl RecordBuffer for Engine {
    fn size(&self) -> u64 {
        Engine::size(self)
    }

    fn byte_length(&self) -> u64 {
        Engine::byte_length(self)
    }

    fn storage_length(&self) -> u64 {
        Engine::storage_length(self)
    }

    fn available_space(&self) -> u64 {
        Engine::available_space(self)
    }
}

impl Stack for Engine {
    fn push(&mut self, payload: &[u8]) -> Result<(), Error> {
        Engine::push_front(self, payload)
    }

    fn pop(&mut self) -> Result<Vec<u8>, Error> {
        Engine::pop_front(self)
    }

    fn peek(&mut self) -> Result<Option<Vec<u8>>, Error> {
        Engine::peek_front(self)
    }
}

impl Queue for Engine {
    fn enqueue(&mut self, payload: &[u8]) -> Result<(), Error> {
        Engine::push_back(self, payload)
    }

    fn dequeue(&mut self) -> Result<Vec<u8>, Error> {
        Engine::pop_front(self)
    }

    fn front(&mut self) -> Result<Option<Vec<u8>>, Error> {
        Engine::peek_front(self)
    }
}

impl Deque for Engine {
    fn push_front(&mut self, payload: &[u8]) -> Result<(), Error> {
        Engine::push_front(self, payload)
    }

    fn push_back(&mut self, payload: &[u8]) -> Result<(), Error> {
        Engine::push_back(self, payload)
    }

    fn pop_front(&mut self) -> Result<Vec<u8>, Error> {
        Engine::pop_front(self)
    }

    fn pop_back(&mut self) -> Result<Vec<u8>, Error> {
        Engine::pop_back(self)
    }

    fn peek_front(&mut self) -> Result<Option<Vec<u8>>, Error> {
        Engine::peek_front(self)
    }

    fn peek_back(&mut self) -> Result<Option<Vec<u8>>, Error> {
        Engine::peek_back(self)
    }
}

impl RecordBuffer for BufferedStack {
    fn size(&self) -> u64 {
        BufferedStack::size(self)
    }

    fn byte_length(&self) -> u64 {
        BufferedStack::byte_length(self)
    }

    fn storage_length(&self) -> u64 {
        BufferedStack::storage_length(self)
    }

    fn available_space(&self) -> u64 {
        BufferedStack::available_space(self)
    }
}

impl Stack for BufferedStack {
    fn push(&mut self, payload: &[u8]) -> Result<(), Error> {
        BufferedStack::push(self, payload)
    }

    fn pop(&mut self) -> Result<Vec<u8>, Error> {
        BufferedStack::pop(self)
    }

    fn peek(&mut self) -> Result<Option<Vec<u8>>, Error> {
        BufferedStack::peek(self)
    }
}
