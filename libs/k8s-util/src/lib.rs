pub mod client;
pub mod events;
pub mod metrics;
pub mod types;
mod url;
