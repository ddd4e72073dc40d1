//! CRC16-XMODEM as used by the bootloader frame trailer.

/// Generator polynomial.
const POLY: u16 = 0x1021;

/// Compute CRC16-XMODEM over `buf[offset..offset + len]`.
///
/// Polynomial `0x1021`, initial value `0`, MSB first, no reflection and no
/// final XOR.
pub fn crc16(buf: &[u8], offset: usize, len: usize) -> u16 {
    crc16_xmodem(&buf[offset..offset + len])
}

/// Compute CRC16-XMODEM over a whole slice.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }

    crc
}
