//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like the conversion service over
//! HTTP and the config file on disk.

pub mod config;
pub mod http;
pub mod packets;

// Re-export adapters
pub use config::XdgConfigStore;
pub use http::ReqwestTransport;
pub use packets::{load_packet_files, PacketFileError};
