// Core modules: span allocation, record framing, storage, and the engine built on them.
pub mod buffered;
pub mod engine;
pub mod error;
pub mod frame;
pub mod iter;
pub mod layout;
pub mod ledger;
pub mod lock;
pub mod paths;
pub mod span;
pub mod store;
