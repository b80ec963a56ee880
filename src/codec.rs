// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Little-endian pack/unpack helpers for the fixed PTP/IP packet layouts.
//!
//! All multi-byte integers on the wire are little-endian regardless of
//! host byte order; every read/write in this crate funnels through here
//! so no call site has to spell out the endianness itself.

use byteorder::{ByteOrder, LittleEndian};

/// Reads a 16-bit little-endian integer at `offset`.
///
/// # Panics
/// Panics if `offset + 2` is out of bounds for `buf`.
pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&buf[offset..offset + 2])
}

/// Reads a 32-bit little-endian integer at `offset`.
///
/// # Panics
/// Panics if `offset + 4` is out of bounds for `buf`.
pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&buf[offset..offset + 4])
}

/// Writes `value` as a 16-bit little-endian integer at `offset`.
pub fn write_u16_le(buf: &mut [u8], offset: usize, value: u16) {
    LittleEndian::write_u16(&mut buf[offset..offset + 2], value);
}

/// Writes `value` as a 32-bit little-endian integer at `offset`.
pub fn write_u32_le(buf: &mut [u8], offset: usize, value: u32) {
    LittleEndian::write_u32(&mut buf[offset..offset + 4], value);
}

/// Appends `value` to `buf` as a 16-bit little-endian integer.
pub fn push_u16_le(buf: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    LittleEndian::write_u16(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

/// Appends `value` to `buf` as a 32-bit little-endian integer.
pub fn push_u32_le(buf: &mut Vec<u8>, value: u32) {
    let mut tmp = [0u8; 4];
    LittleEndian::write_u32(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_u16() {
        let mut buf = [0u8; 4];
        write_u16_le(&mut buf, 1, 0xBEEF);
        assert_eq!(read_u16_le(&buf, 1), 0xBEEF);
    }

    #[test]
    fn roundtrip_u32() {
        let mut buf = [0u8; 8];
        write_u32_le(&mut buf, 2, 0xDEAD_BEEF);
        assert_eq!(read_u32_le(&buf, 2), 0xDEAD_BEEF);
    }

    #[test]
    fn push_helpers_match_offset_writes() {
        let mut pushed = Vec::new();
        push_u16_le(&mut pushed, 0x1234);
        push_u32_le(&mut pushed, 0x0102_0304);

        let mut fixed = [0u8; 6];
        write_u16_le(&mut fixed, 0, 0x1234);
        write_u32_le(&mut fixed, 2, 0x0102_0304);

        assert_eq!(pushed.as_slice(), &fixed[..]);
    }
}
