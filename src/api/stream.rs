//! Streaming cooperators: resumable work done one unit per tick.
//!
//! [`StreamCursor`] walks the entity list for listing and initial-state
//! pushes. [`CameraStream`] reads an image out in chunks sized to the
//! socket's current send space. Both advance only after a successful send,
//! so a failed send retries the same unit on the next tick.

use crate::app::ports::ImageSource;

/// Space reserved for the frame header and the chunk's own fields.
pub const CHUNK_OVERHEAD: usize = 24;

/// Smallest chunk worth sending.
pub const MIN_CHUNK: usize = 64;

// ── Entity cursor ────────────────────────────────────────────

/// Position in an entity enumeration. `None` when idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamCursor {
    position: Option<usize>,
}

impl StreamCursor {
    pub fn new() -> Self {
        Self { position: None }
    }

    /// Start (or restart) from the first entity.
    pub fn begin(&mut self) {
        self.position = Some(0);
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn is_active(&self) -> bool {
        self.position.is_some()
    }

    /// Move to the next entity.
    pub fn advance(&mut self) {
        if let Some(p) = self.position.as_mut() {
            *p += 1;
        }
    }

    pub fn finish(&mut self) {
        self.position = None;
    }
}

// ── Camera chunking ──────────────────────────────────────────

/// Size of the next chunk and whether it ends the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub len: usize,
    pub last: bool,
}

/// Plan a chunk for `space` bytes of socket room and `available` image
/// bytes. `None` means too little room this tick.
pub fn plan_chunk(space: usize, available: usize) -> Option<ChunkPlan> {
    if space < CHUNK_OVERHEAD + MIN_CHUNK {
        return None;
    }
    let len = (space - CHUNK_OVERHEAD).min(available);
    Some(ChunkPlan {
        len,
        last: len == available,
    })
}

/// An image being delivered to one connection.
pub struct CameraStream {
    key: u32,
    source: Box<dyn ImageSource>,
    chunks_sent: u32,
}

impl CameraStream {
    pub fn new(key: u32, source: Box<dyn ImageSource>) -> Self {
        Self {
            key,
            source,
            chunks_sent: 0,
        }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn plan(&self, space: usize) -> Option<ChunkPlan> {
        plan_chunk(space, self.source.available())
    }

    pub fn chunk(&self, plan: ChunkPlan) -> &[u8] {
        self.source.peek(plan.len)
    }

    /// Record a successfully sent chunk. Returns `true` when the image is
    /// complete and its source has been released.
    pub fn commit(&mut self, plan: ChunkPlan) -> bool {
        self.source.consume(plan.len);
        self.chunks_sent += 1;
        if plan.last {
            self.source.release();
        }
        plan.last
    }

    pub fn chunks_sent(&self) -> u32 {
        self.chunks_sent
    }

    /// Give the source back without finishing (connection torn down).
    pub fn abandon(mut self) {
        self.source.release();
    }
}

impl core::fmt::Debug for CameraStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CameraStream")
            .field("key", &self.key)
            .field("remaining", &self.source.available())
            .field("chunks_sent", &self.chunks_sent)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────
