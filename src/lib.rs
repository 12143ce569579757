//! Purpose: Disk-backed circular stack, queue, and deque over one fixed-size file.
//! Exports: `core` (allocator, framing, storage, engine) and `api` (public surface).
//! Role: Library crate; callers should reach storage primitives through `api`.
//! Invariants: One engine owns one data file; a lock marker keeps other engines out.
//! Invariants: Every mutation either commits data, ledger, and counters or rolls back.
pub mod api;
pub mod core;
