//! Domain layer - Core business logic
//!
//! Contains the voice ring buffer, the multipart encoder, the conversion
//! token lifecycle and configuration values.
//! This layer has no dependencies on external systems.

pub mod capture;
pub mod config;
pub mod conversion;
pub mod error;
pub mod multipart;

// Re-export common types
pub use capture::{SpeakerId, VoicePacket, VoiceRingBuffer};
pub use config::{AppConfig, Credentials};
pub use conversion::{AuthState, ConversionSession, ConvertResult};
pub use error::*;
pub use multipart::{Boundary, MultipartBody, MultipartSection, MultipartSelection};
