//! Per-speaker capture registry
//!
//! Receives voice packets from the host's voice relay and keeps one ring
//! buffer per connected speaker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::capture::{SpeakerId, VoiceRingBuffer};
use crate::domain::multipart::{Boundary, MultipartBody, MultipartSelection};

/// Registry shared between the ingress thread and conversion requests.
///
/// The lock is only held for synchronous work; never across an `.await`.
pub type SharedRegistry = Arc<Mutex<CaptureRegistry>>;

/// Voice ring buffers keyed by speaker
#[derive(Debug)]
pub struct CaptureRegistry {
    buffer_size: usize,
    buffers: HashMap<SpeakerId, VoiceRingBuffer>,
}

impl CaptureRegistry {
    /// Create an empty registry whose buffers hold at least `buffer_size` bytes
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            buffers: HashMap::new(),
        }
    }

    /// Create an empty registry ready to be shared
    pub fn shared(buffer_size: usize) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(buffer_size)))
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Record a voice packet for `speaker`, creating its buffer on first use.
    ///
    /// Empty packets carry no audio and are ignored.
    pub fn push_packet(&mut self, speaker: SpeakerId, bytes: &[u8], timestamp: f64) {
        if bytes.is_empty() {
            return;
        }
        let buffer_size = self.buffer_size;
        self.buffers
            .entry(speaker)
            .or_insert_with(|| {
                debug!(%speaker, buffer_size, "creating voice buffer");
                VoiceRingBuffer::new(buffer_size)
            })
            .append(bytes, timestamp);
    }

    /// Drop the packets of one speaker, keeping its storage.
    ///
    /// Returns false when the speaker has no buffer.
    pub fn reset(&mut self, speaker: SpeakerId) -> bool {
        match self.buffers.get_mut(&speaker) {
            Some(buffer) => {
                buffer.reset();
                true
            }
            None => false,
        }
    }

    /// Drop every speaker's packets (round start)
    pub fn reset_all(&mut self) {
        self.buffers.values_mut().for_each(VoiceRingBuffer::reset);
    }

    /// Destroy a speaker's buffer (disconnect)
    pub fn remove(&mut self, speaker: SpeakerId) -> Option<VoiceRingBuffer> {
        let removed = self.buffers.remove(&speaker);
        if removed.is_some() {
            debug!(%speaker, "removed voice buffer");
        }
        removed
    }

    pub fn buffer(&self, speaker: SpeakerId) -> Option<&VoiceRingBuffer> {
        self.buffers.get(&speaker)
    }

    /// Speakers with a buffer, in ascending order
    pub fn speakers(&self) -> Vec<SpeakerId> {
        let mut speakers: Vec<_> = self.buffers.keys().copied().collect();
        speakers.sort_unstable();
        speakers
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Select the packets of `speakers` in the given order.
    ///
    /// Unknown and repeated speakers are skipped. With `since`, only packets
    /// that arrived at or after that timestamp are selected.
    pub fn selection(&self, speakers: &[SpeakerId], since: Option<f64>) -> MultipartSelection<'_> {
        let mut selection = MultipartSelection::new();
        for (i, speaker) in speakers.iter().enumerate() {
            if speakers[..i].contains(speaker) {
                continue;
            }
            if let Some(buffer) = self.buffers.get(speaker) {
                let start = since.map_or(0, |t| buffer.first_packet_since(t));
                selection.push(buffer, start);
            }
        }
        selection
    }

    /// Number of packets [`select`](Self::select) would encode
    pub fn selected_packet_count(&self, speakers: &[SpeakerId], since: Option<f64>) -> usize {
        self.selection(speakers, since).total_packets()
    }

    /// Copy the selected packets into a multipart body
    pub fn select(&self, speakers: &[SpeakerId], since: Option<f64>, boundary: Boundary) -> MultipartBody {
        self.selection(speakers, since).encode(boundary)
    }
}
