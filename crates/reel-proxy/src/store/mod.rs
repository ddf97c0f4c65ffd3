//! Tape persistence.

mod manager;
mod tape_store;

pub use manager::TapeStoreManager;
pub use tape_store::TapeStore;
