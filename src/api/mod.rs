//! Purpose: Define the public Rust API boundary for ringstash.
//! Exports: Engine types, storage factories, errors, and the container traits.
//! Role: Additive-only surface over `core`.
//! Invariants: Container traits are thin views; all state lives in the engine.

mod containers;

pub use crate::core::buffered::BufferedStack;
pub use crate::core::engine::{Durability, Engine, EngineInfo, EngineOptions};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::frame::Framing;
pub use crate::core::iter::SnapshotIter;
pub use crate::core::span::Direction;
pub use crate::core::store::{
    FileStoreFactory, MemoryStoreFactory, MmapStoreFactory, Store, StoreFactory,
};
pub use containers::{Deque, Queue, RecordBuffer, Stack};
