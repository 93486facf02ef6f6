// crc.rs — level checksums
//
// The checksum keys every visibility result to the level it was computed
// for, so a late response from a previous level is never merged.

use crc::{Crc, CRC_32_ISO_HDLC};

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 over several chunks, equal to the checksum of their
/// concatenation.
pub struct ChecksumWriter {
    digest: crc::Digest<'static, u32>,
}

impl ChecksumWriter {
    pub fn new() -> Self {
        Self {
            digest: CRC32.digest(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn update_f32(&mut self, v: f32) {
        self.digest.update(&v.to_le_bytes());
    }

    pub fn update_u32(&mut self, v: u32) {
        self.digest.update(&v.to_le_bytes());
    }

    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for ChecksumWriter {
    fn default() -> Self {
        Self::new()
    }
}
