//! Speaker identity value object

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error when a speaker ID cannot be parsed
#[derive(Debug, Clone, Error)]
#[error("Invalid speaker ID: \"{input}\". Expected an unsigned integer")]
pub struct InvalidSpeakerIdError {
    pub input: String,
}

/// Identity of a connected speaker (one ring buffer per speaker)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerId(u64);

impl SpeakerId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SpeakerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SpeakerId {
    type Err = InvalidSpeakerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| InvalidSpeakerIdError {
                input: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_id() {
        let id: SpeakerId = "76561198000000000".parse().unwrap();
        assert_eq!(id.value(), 76561198000000000);
        assert_eq!(id.to_string(), "76561198000000000");
    }

    #[test]
    fn parse_invalid_id() {
        let err = "player-one".parse::<SpeakerId>().unwrap_err();
        assert_eq!(err.input, "player-one");
    }
}
