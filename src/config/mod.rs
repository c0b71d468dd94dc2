#[allow(clippy::module_inception)]
mod config;

pub use config::{AccountSettings, ChainSettings, PersistenceSettings, Settings, SyncSettings};
