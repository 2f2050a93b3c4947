use crate::error::NetError;

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Magic number stored in the low byte of every frame checksum.
pub const PACKET_MAGIC_NUM: u8 = 0x86;

/// Largest payload a single frame may carry (64 MiB).
pub const MESSAGE_MAX_SIZE: usize = 64 * 1024 * 1024;

/// Header prepended to every packet: CRC32C checksum (magic in the low byte)
/// followed by the payload length, both little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub checksum: u32,
    pub size: u32,
}

impl FrameHeader {
    pub fn for_payload(payload: &[u8]) -> Result<Self, NetError> {
        if payload.len() > MESSAGE_MAX_SIZE {
            return Err(NetError::MessageTooLarge {
                size: payload.len(),
                max: MESSAGE_MAX_SIZE,
            });
        }
        Ok(Self {
            checksum: packet_checksum(payload),
            size: payload.len() as u32,
        })
    }

    pub fn from_bytes(data: &[u8; FRAME_HEADER_SIZE]) -> Self {
        let checksum = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Self { checksum, size }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.checksum.to_le_bytes());
        buf[4..8].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    /// Checks done before the payload is read, so a corrupt length never
    /// drives a huge allocation.
    pub fn check(&self) -> Result<(), NetError> {
        let magic = (self.checksum & 0xFF) as u8;
        if magic != PACKET_MAGIC_NUM {
            return Err(NetError::InvalidMagic(magic));
        }
        let size = self.size as usize;
        if size > MESSAGE_MAX_SIZE {
            return Err(NetError::MessageTooLarge {
                size,
                max: MESSAGE_MAX_SIZE,
            });
        }
        Ok(())
    }

    pub fn validate(&self, payload: &[u8]) -> Result<(), NetError> {
        self.check()?;
        let expected = packet_checksum(payload);
        if self.checksum != expected {
            return Err(NetError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            });
        }
        Ok(())
    }
}

/// CRC32C of `data` with the low byte replaced by [`PACKET_MAGIC_NUM`].
pub fn packet_checksum(data: &[u8]) -> u32 {
    let crc = crc32c::crc32c(data);
    (crc & !0xff) | PACKET_MAGIC_NUM as u32
}
