//! Voice capture domain

mod ring_buffer;
mod speaker;

pub use ring_buffer::{VoicePacket, VoiceRingBuffer, MAX_PACKETS};
pub use speaker::{InvalidSpeakerIdError, SpeakerId};
