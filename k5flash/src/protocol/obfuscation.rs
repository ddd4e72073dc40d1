//! XOR obfuscation applied to the message and CRC region of every frame.
//!
//! The same transform scrambles outgoing frames and unscrambles incoming
//! ones: applying it twice over the same range restores the input.

/// Key table, cycled from the first obfuscated byte.
pub const KEY: [u8; 16] = [
    0x16, 0x6C, 0x14, 0xE6, 0x2E, 0x91, 0x0D, 0x40, 0x21, 0x35, 0xD5, 0x40, 0x13, 0x03, 0xE9, 0x80,
];

/// XOR `buf[offset..offset + len]` in place with the key table.
pub fn apply(buf: &mut [u8], offset: usize, len: usize) {
    for (byte, key) in buf[offset..offset + len]
        .iter_mut()
        .zip(KEY.iter().cycle())
    {
        *byte ^= key;
    }
}
