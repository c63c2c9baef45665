pub mod client;
#[cfg(test)]
pub mod fake;
pub mod sse;
pub mod types;

pub use client::ApiClient;
