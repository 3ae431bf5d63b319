pub mod client;
pub mod config;
pub mod errors;
pub mod keystore;
pub mod logging;
pub mod proxy;
pub mod security;

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
