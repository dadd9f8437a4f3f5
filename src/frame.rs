//! Opaque frame handle.
//!
//! A `Frame` is what a head hands back from one successful bounded wait. The
//! pixel buffer is owned by the frame and only exposed as a borrowed slice;
//! decoding the buffer is the device layer's business, not the coordinator's.

use crate::timestamp::CaptureTimestamp;

/// One frame received from a head. Deliberately not `Clone`.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Per-channel sequence number, starting at 1.
    pub sequence: u64,

    /// Capture time as reported by the head.
    pub timestamp: CaptureTimestamp,
}

impl Frame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        timestamp: CaptureTimestamp,
    ) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            timestamp,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel payloads are large; print the shape only.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .finish()
    }
}
