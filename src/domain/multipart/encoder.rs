//! Multipart body encoder
//!
//! Serializes an ordered run of packets, possibly spread over several
//! speakers' ring buffers, into one `multipart/form-data` body. Part `i` is
//! named `packet_{i}` with filename `{i}.bin`; the body is sized exactly up
//! front and filled without reallocating.

use std::fmt;

use crate::domain::capture::VoiceRingBuffer;

use super::Boundary;

/// Maps the global packet indices starting at `global_start_index` to the
/// buffer that owns them. The section runs until the next section's start
/// (or the selection's total for the last one).
#[derive(Debug, Clone, Copy)]
pub struct MultipartSection<'a> {
    /// First global packet index covered by this section
    pub global_start_index: usize,
    /// Buffer owning the packets
    pub source: &'a VoiceRingBuffer,
    /// Local index of the section's first packet inside `source`
    pub local_start: usize,
}

/// Encoded multipart body together with the boundary that delimits it
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: Boundary,
    bytes: Vec<u8>,
    packet_count: usize,
}

impl MultipartBody {
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of packets encoded as parts
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no packet was selected; the body is then zero bytes
    pub fn is_empty(&self) -> bool {
        self.packet_count == 0
    }
}

/// Builder collecting sections from several buffers in request order
#[derive(Debug, Clone, Default)]
pub struct MultipartSelection<'a> {
    sections: Vec<MultipartSection<'a>>,
    total_packets: usize,
}

impl<'a> MultipartSelection<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the packets of `source` from local index `local_start` onwards.
    ///
    /// Buffers contributing no packets are skipped.
    pub fn push(&mut self, source: &'a VoiceRingBuffer, local_start: usize) -> &mut Self {
        let count = source.packet_count().saturating_sub(local_start);
        if count > 0 {
            self.sections.push(MultipartSection {
                global_start_index: self.total_packets,
                source,
                local_start,
            });
            self.total_packets += count;
        }
        self
    }

    pub fn sections(&self) -> &[MultipartSection<'a>] {
        &self.sections
    }

    pub fn total_packets(&self) -> usize {
        self.total_packets
    }

    pub fn is_empty(&self) -> bool {
        self.total_packets == 0
    }

    /// Copy every selected packet into a new multipart body
    pub fn encode(&self, boundary: Boundary) -> MultipartBody {
        let bytes = encode(&self.sections, self.total_packets, &boundary);
        MultipartBody {
            boundary,
            bytes,
            packet_count: self.total_packets,
        }
    }
}

/// Encode `total_packets` packets drawn from `sections` into one body.
///
/// Returns an empty vector when there is nothing to encode. Sections must be
/// sorted by `global_start_index`, start at 0 and cover `[0, total_packets)`;
/// violations are caught by debug assertions and yield a body that skips the
/// missing packets in release builds.
pub fn encode(sections: &[MultipartSection<'_>], total_packets: usize, boundary: &Boundary) -> Vec<u8> {
    if sections.is_empty() || total_packets == 0 {
        return Vec::new();
    }
    debug_assert_covering(sections, total_packets);

    let size = encoded_len(sections, total_packets, boundary);
    let mut out = Vec::with_capacity(size);

    for (index, source, local) in packets(sections, total_packets) {
        let (primary, wrap) = source.packet_bytes(local);
        let _ = write_part_header(&mut VecWriter(&mut out), boundary, index, primary.len() + wrap.len());
        out.extend_from_slice(primary);
        out.extend_from_slice(wrap);
    }
    let _ = write_closing(&mut VecWriter(&mut out), boundary);

    debug_assert_eq!(out.len(), size);
    out
}

/// Exact size in bytes of the body [`encode`] produces for the same input
pub fn encoded_len(sections: &[MultipartSection<'_>], total_packets: usize, boundary: &Boundary) -> usize {
    if sections.is_empty() || total_packets == 0 {
        return 0;
    }

    let mut counter = ByteCounter(0);
    for (index, source, local) in packets(sections, total_packets) {
        let len = source.packet_len(local);
        let _ = write_part_header(&mut counter, boundary, index, len);
        counter.0 += len;
    }
    let _ = write_closing(&mut counter, boundary);
    counter.0
}

/// Walk global indices in order, resolving each to its buffer and local index.
/// Indices that do not resolve to a buffered packet are skipped.
fn packets<'s, 'a>(
    sections: &'s [MultipartSection<'a>],
    total_packets: usize,
) -> impl Iterator<Item = (usize, &'a VoiceRingBuffer, usize)> + 's {
    let mut current = 0;
    (0..total_packets).filter_map(move |index| {
        while current + 1 < sections.len() && sections[current + 1].global_start_index <= index {
            current += 1;
        }
        let section = &sections[current];
        let local = section.local_start + index.checked_sub(section.global_start_index)?;
        (local < section.source.packet_count()).then_some((index, section.source, local))
    })
}

fn write_part_header<W: fmt::Write>(w: &mut W, boundary: &Boundary, index: usize, len: usize) -> fmt::Result {
    write!(
        w,
        "\r\n--{boundary}\r\n\
         Content-Disposition: form-data; name=\"packet_{index}\"; filename=\"{index}.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\
         Content-Length: {len}\r\n\
         \r\n"
    )
}

fn write_closing<W: fmt::Write>(w: &mut W, boundary: &Boundary) -> fmt::Result {
    write!(w, "\r\n--{boundary}--")
}

fn debug_assert_covering(sections: &[MultipartSection<'_>], total_packets: usize) {
    debug_assert_eq!(sections[0].global_start_index, 0, "first section must start at 0");
    for (i, section) in sections.iter().enumerate() {
        let end = sections
            .get(i + 1)
            .map_or(total_packets, |next| next.global_start_index);
        debug_assert!(section.global_start_index < end, "sections must be strictly ascending");
        debug_assert!(
            section.local_start + (end - section.global_start_index) <= section.source.packet_count(),
            "section {} covers more packets than its buffer holds",
            i
        );
    }
}

/// Counts formatted bytes without storing them
struct ByteCounter(usize);

impl fmt::Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Appends formatted text to a byte vector; never fails
struct VecWriter<'a>(&'a mut Vec<u8>);

impl fmt::Write for VecWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}
