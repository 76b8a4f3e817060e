//! In-memory image of a memory card, assembled frame by frame

use std::collections::BTreeMap;

use super::protocol::commands::geometry::{FRAMES_PER_BLOCK, FRAME_COUNT, FRAME_DATA_SIZE};

/// Sparse card image
///
/// Frames are keyed by frame number. Frames that were never read (or never
/// read successfully) are zero-filled when the image is flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardImage {
    frame_count: u32,
    frames: BTreeMap<u16, [u8; FRAME_DATA_SIZE]>,
}

impl CardImage {
    /// Largest card a 16-bit frame address can reach
    pub const MAX_FRAME_COUNT: u32 = 1 << 16;

    /// Empty image of a standard 1024-frame card
    pub fn new() -> Self {
        Self::with_frame_count(u32::from(FRAME_COUNT))
    }

    /// Empty image of a card with `frame_count` frames, capped at
    /// [`Self::MAX_FRAME_COUNT`]
    pub fn with_frame_count(frame_count: u32) -> Self {
        Self {
            frame_count: frame_count.min(Self::MAX_FRAME_COUNT),
            frames: BTreeMap::new(),
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Frame numbers of this card in order
    pub fn indices(&self) -> impl Iterator<Item = u16> + use<> {
        (0..=u16::MAX).take(self.frame_count as usize)
    }

    /// Store a frame, returns false if `index` is outside the card
    pub fn insert(&mut self, index: u16, data: [u8; FRAME_DATA_SIZE]) -> bool {
        if u32::from(index) >= self.frame_count {
            return false;
        }
        self.frames.insert(index, data);
        true
    }

    pub fn contains(&self, index: u16) -> bool {
        self.frames.contains_key(&index)
    }

    pub fn frame(&self, index: u16) -> Option<&[u8; FRAME_DATA_SIZE]> {
        self.frames.get(&index)
    }

    /// Lowest frame number not read yet
    pub fn next_missing(&self) -> Option<u16> {
        self.indices().find(|index| !self.frames.contains_key(index))
    }

    /// Number of frames read so far
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.next_missing().is_none()
    }

    /// Frames of block `block` in order, `None` for missing ones
    pub fn block(&self, block: u16) -> impl Iterator<Item = Option<&[u8; FRAME_DATA_SIZE]>> + '_ {
        self.indices()
            .skip(usize::from(block) * usize::from(FRAMES_PER_BLOCK))
            .take(usize::from(FRAMES_PER_BLOCK))
            .map(move |index| self.frames.get(&index))
    }

    /// Raw card contents, missing frames zero-filled
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.frame_count as usize * FRAME_DATA_SIZE);
        for index in self.indices() {
            match self.frames.get(&index) {
                Some(data) => bytes.extend_from_slice(data),
                None => bytes.extend_from_slice(&[0u8; FRAME_DATA_SIZE]),
            }
        }
        bytes
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl Default for CardImage {
    fn default() -> Self {
        Self::new()
    }
}
