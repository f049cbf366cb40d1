//! Application layer - Use cases and port interfaces
//!
//! Contains the capture registry, the conversion client and the
//! trait definitions for external system interactions.

pub mod cancel;
pub mod capture;
pub mod conversion;
pub mod converter;
pub mod ports;

// Re-export use cases
pub use cancel::CancellationToken;
pub use capture::{CaptureRegistry, SharedRegistry};
pub use conversion::{
    ConversionClient, ConvertError, PacketSource, AUTH_ATTEMPTS, AUTH_RETRY_DELAY,
};
pub use converter::{ConvertRequest, RecordingConverter};
