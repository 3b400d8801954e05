//! ECM partial-page buffer (§3 "ECM partial-page buffer", §4.6 "ECM
//! bookkeeping"): up to 256 frames per block, a 32-byte presence bitmap,
//! and the PPR retransmission count.

pub const FRAMES_PER_BLOCK: usize = 256;
pub const BITMAP_BYTES: usize = 32;
pub const MAX_FRAME_OCTETS: usize = 260;
/// PPR received this many times on the same block without progress
/// triggers a CTC/EOR decision (§4.6 "Retries").
pub const MAX_PPR_WITHOUT_PROGRESS: u32 = 4;

#[derive(Debug, Clone)]
struct EcmFrame {
    data: Vec<u8>,
}

/// One 256-frame ECM block: frames and their presence bitmap are kept
/// consistent by construction — `set`/`clear` are the only mutators.
#[derive(Debug, Clone)]
pub struct PartialPageBuffer {
    frames: Vec<Option<EcmFrame>>,
    bitmap: [u8; BITMAP_BYTES],
    block: u32,
    ppr_count: u32,
}

impl Default for PartialPageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialPageBuffer {
    pub fn new() -> Self {
        Self { frames: vec![None; FRAMES_PER_BLOCK], bitmap: [0u8; BITMAP_BYTES], block: 0, ppr_count: 0 }
    }

    pub fn block(&self) -> u32 {
        self.block
    }

    pub fn ppr_count(&self) -> u32 {
        self.ppr_count
    }

    /// Reset for a new block (on each PPS indication, §3).
    pub fn reset_for_block(&mut self, block: u32) {
        self.frames = vec![None; FRAMES_PER_BLOCK];
        self.bitmap = [0u8; BITMAP_BYTES];
        self.block = block;
        self.ppr_count = 0;
    }

    fn bit_index(frame_no: usize) -> (usize, u8) {
        (frame_no / 8, 0x80 >> (frame_no % 8))
    }

    /// Store a correctly-received frame, setting its bitmap bit.
    pub fn store(&mut self, frame_no: usize, data: Vec<u8>) {
        assert!(frame_no < FRAMES_PER_BLOCK);
        assert!(data.len() <= MAX_FRAME_OCTETS);
        self.frames[frame_no] = Some(EcmFrame { data });
        let (byte, bit) = Self::bit_index(frame_no);
        self.bitmap[byte] |= bit;
    }

    pub fn has_frame(&self, frame_no: usize) -> bool {
        let (byte, bit) = Self::bit_index(frame_no);
        self.bitmap[byte] & bit != 0
    }

    pub fn frame(&self, frame_no: usize) -> Option<&[u8]> {
        self.frames[frame_no].as_ref().map(|f| f.data.as_slice())
    }

    /// True once every frame up to `frame_count` (the sender's declared
    /// block size) is present.
    pub fn is_complete(&self, frame_count: usize) -> bool {
        (0..frame_count).all(|i| self.has_frame(i))
    }

    /// Build the 32-byte PPR bitmap: 1 = frame still needed (inverse of
    /// the presence bitmap, per §4.6 "PPR carries the 32-byte bitmap of
    /// frames needing retransmission").
    pub fn ppr_bitmap(&self) -> [u8; BITMAP_BYTES] {
        let mut out = [0u8; BITMAP_BYTES];
        for (i, b) in out.iter_mut().enumerate() {
            *b = !self.bitmap[i];
        }
        out
    }

    /// Indices of frames the receiver still wants, given the sender's
    /// declared frame count for this block.
    pub fn missing_frames(&self, frame_count: usize) -> Vec<usize> {
        (0..frame_count).filter(|&i| !self.has_frame(i)).collect()
    }

    /// Record a PPR indicating no progress on this block (the bitmap's
    /// missing-frame set did not shrink since the last PPR). Returns
    /// `true` once the retry count has reached [`MAX_PPR_WITHOUT_PROGRESS`].
    pub fn record_ppr_without_progress(&mut self) -> bool {
        self.ppr_count += 1;
        self.ppr_count >= MAX_PPR_WITHOUT_PROGRESS
    }

    pub fn record_progress(&mut self) {
        self.ppr_count = 0;
    }

    /// Flush the block's frames in order to the image decoder, once
    /// [`is_complete`] is true.
    pub fn drain(&self, frame_count: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 0..frame_count {
            if let Some(frame) = &self.frames[i] {
                out.extend_from_slice(&frame.data);
            }
        }
        out
    }
}
