pub mod explorer;
pub mod loader;
pub mod navigator;
pub mod observer;
pub mod persistence;
pub mod projector;
pub mod search;
pub mod store;
pub mod viewport;

pub use explorer::Explorer;
pub use observer::{TelemetryObserver, TreeObserver};
