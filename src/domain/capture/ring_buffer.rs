//! Circular voice packet store
//!
//! Holds the raw bytes of recently received voice packets for one speaker.
//! Packets are opaque frames; only their boundaries and arrival times are
//! tracked. A packet's length is never stored: it is the distance from its
//! start offset to the next packet's start offset (or to the write head for
//! the newest packet).

use std::collections::VecDeque;

/// Maximum number of buffered packets. Packet indices are sent as 16-bit values.
pub const MAX_PACKETS: usize = u16::MAX as usize;

/// Metadata for one buffered packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicePacket {
    /// Monotonic arrival time
    pub timestamp: f64,
    /// Offset of the first byte inside the backing storage
    pub start_offset: usize,
}

/// Fixed-capacity circular byte store of voice packets, oldest first.
///
/// Storage is allocated lazily on the first [`append`](Self::append) and
/// survives [`reset`](Self::reset). Appending never fails: old packets are
/// evicted in arrival order until the new one fits. The storage is
/// reallocated, dropping every packet, when it is empty, too small for the
/// incoming packet, or already holds [`MAX_PACKETS`] packets.
#[derive(Debug, Clone)]
pub struct VoiceRingBuffer {
    /// Backing bytes; empty until the first append. `capacity == storage.len()`.
    storage: Vec<u8>,
    min_capacity: usize,
    start_index: usize,
    byte_count: usize,
    packets: VecDeque<VoicePacket>,
}

impl VoiceRingBuffer {
    /// Create an unallocated buffer that will hold at least `min_capacity` bytes
    pub fn new(min_capacity: usize) -> Self {
        Self {
            storage: Vec::new(),
            min_capacity,
            start_index: 0,
            byte_count: 0,
            packets: VecDeque::new(),
        }
    }

    /// Append one packet, evicting the oldest packets as needed.
    ///
    /// Empty packets are ignored.
    pub fn append(&mut self, packet: &[u8], timestamp: f64) {
        if packet.is_empty() {
            return;
        }

        while !self.has_room_for(packet.len()) {
            if self.packets.is_empty()
                || packet.len() > self.capacity()
                || self.packets.len() >= MAX_PACKETS
            {
                self.reallocate(packet.len());
                break;
            }
            self.evict_oldest();
        }

        let capacity = self.capacity();
        let head = self.write_head();
        let first = packet.len().min(capacity - head);
        self.storage[head..head + first].copy_from_slice(&packet[..first]);
        self.storage[..packet.len() - first].copy_from_slice(&packet[first..]);

        self.packets.push_back(VoicePacket {
            timestamp,
            start_offset: head,
        });
        self.byte_count += packet.len();
    }

    /// Drop every packet but keep the storage for reuse
    pub fn reset(&mut self) {
        self.byte_count = 0;
        self.start_index = 0;
        self.packets.clear();
    }

    /// Number of buffered packets
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Number of live bytes
    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    /// Current size of the backing storage (0 before the first append)
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Minimum capacity used when (re)allocating
    pub fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Offset where the next packet will be written
    pub fn write_head(&self) -> usize {
        match self.capacity() {
            0 => 0,
            capacity => (self.start_index + self.byte_count) % capacity,
        }
    }

    /// Packet metadata in arrival order
    pub fn packets(&self) -> impl ExactSizeIterator<Item = &VoicePacket> + '_ {
        self.packets.iter()
    }

    /// Metadata of the packet at `index`, oldest first
    pub fn packet(&self, index: usize) -> Option<&VoicePacket> {
        self.packets.get(index)
    }

    /// Length in bytes of the packet at `index`.
    ///
    /// # Panics
    /// If `index >= packet_count()`.
    pub fn packet_len(&self, index: usize) -> usize {
        let packet = self.packets[index];
        match self.packets.get(index + 1) {
            Some(next) => self.distance(packet.start_offset, next.start_offset),
            // Measured from the live byte count so a packet filling the
            // whole storage still has a non-zero length.
            None => self.byte_count - self.distance(self.start_index, packet.start_offset),
        }
    }

    /// Bytes of the packet at `index` as one or two slices.
    ///
    /// The second slice is non-empty only when the packet wraps past the
    /// end of the storage.
    ///
    /// # Panics
    /// If `index >= packet_count()`.
    pub fn packet_bytes(&self, index: usize) -> (&[u8], &[u8]) {
        let offset = self.packets[index].start_offset;
        self.split_range(offset, self.packet_len(index))
    }

    /// The one or two contiguous slices holding every live byte, oldest first
    pub fn live_ranges(&self) -> (&[u8], &[u8]) {
        if self.byte_count == 0 {
            return (&[], &[]);
        }
        self.split_range(self.start_index, self.byte_count)
    }

    /// Index of the first packet that arrived at or after `timestamp`.
    ///
    /// Returns `packet_count()` when every packet is older.
    pub fn first_packet_since(&self, timestamp: f64) -> usize {
        self.packets.partition_point(|p| p.timestamp < timestamp)
    }

    fn has_room_for(&self, len: usize) -> bool {
        self.byte_count + len < self.capacity() && self.packets.len() < MAX_PACKETS
    }

    fn reallocate(&mut self, len: usize) {
        let capacity = self.min_capacity.max(len);
        if capacity != self.storage.len() {
            self.storage = vec![0; capacity];
        }
        self.reset();
    }

    fn evict_oldest(&mut self) {
        let evicted = self.packet_len(0);
        self.packets.pop_front();
        self.start_index = (self.start_index + evicted) % self.capacity();
        self.byte_count -= evicted;
    }

    fn distance(&self, from: usize, to: usize) -> usize {
        let capacity = self.capacity();
        (to + capacity - from) % capacity
    }

    fn split_range(&self, offset: usize, len: usize) -> (&[u8], &[u8]) {
        let end = offset + len;
        let capacity = self.capacity();
        if end <= capacity {
            (&self.storage[offset..end], &[])
        } else {
            (&self.storage[offset..], &self.storage[..end - capacity])
        }
    }
}
