//! Web frontend for the testwire bridge.
//!
//! Serves the static client page, upgrades `/ws` connections into bridge
//! sessions, and optionally opens the local browser at startup.

pub mod browser;
pub mod config;
pub mod server;

pub use config::WebConfig;
pub use server::WebServer;
