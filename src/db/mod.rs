//! Account state models and the snapshot persistence boundary.

pub mod models;
pub mod store;

pub use store::{AnyStore, JsonFileStore, NoopStore, SnapshotStore};
