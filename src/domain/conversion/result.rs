//! Conversion outcome

use std::fmt;

/// Outcome of one conversion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertResult {
    /// The service accepted the packets and streamed back the audio
    Success,
    /// The service rejected the body (HTTP 400)
    InvalidFormat,
    /// The service could not be reached
    ConnectionError,
    /// Credentials were rejected
    Unauthorized,
    /// Any other response
    UnknownError,
    /// Nothing was selected for conversion
    NoData,
    /// The client has no usable configuration
    Disabled,
}

impl ConvertResult {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::InvalidFormat => "invalid format",
            Self::ConnectionError => "connection error",
            Self::Unauthorized => "unauthorized",
            Self::UnknownError => "unknown error",
            Self::NoData => "no data",
            Self::Disabled => "disabled",
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ConvertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
