use crc::{Algorithm, Crc, Digest};

/// Generator polynomial, normal notation (x^8 + x^6 + x^4 + x^3 + x + 1).
pub const CRC_POLY: u8 = 0x5b;

/// CRC-8 over `id`, `length` and the payload of a frame.
pub const CRC_8_PACKET: Algorithm<u8> = Algorithm {
    width: 8,
    poly: CRC_POLY,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0x75,
    residue: 0x00,
};

pub static PACKET_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_PACKET);

/// One-shot checksum of the logical (unstuffed) bytes of a frame.
pub fn checksum(id: u8, payload: &[u8]) -> u8 {
    let mut crc = PacketCrc::new();
    crc.write_u8(id);
    crc.write_u8(payload.len() as u8);
    payload.iter().for_each(|&b| crc.write_u8(b));
    crc.finish()
}

/// Running checksum, fed one byte at a time.
pub struct PacketCrc {
    digest: Digest<'static, u8>,
}
impl PacketCrc {
    pub fn new() -> Self {
        Self {
            digest: PACKET_CRC.digest(),
        }
    }
    pub fn reset(&mut self) {
        self.digest = PACKET_CRC.digest();
    }
    pub fn write_u8(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }
    /// Returns the checksum of everything written so far and starts over.
    pub fn finish(&mut self) -> u8 {
        core::mem::replace(&mut self.digest, PACKET_CRC.digest()).finalize()
    }
}
impl Default for PacketCrc {
    fn default() -> Self {
        Self::new()
    }
}
impl core::fmt::Debug for PacketCrc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PacketCrc").finish_non_exhaustive()
    }
}
