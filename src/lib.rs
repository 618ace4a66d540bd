pub mod cache;
pub mod db;
pub mod types;

// HTTP surface and daemon (only compiled with server feature)
#[cfg(feature = "server")]
pub mod server;
