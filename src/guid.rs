// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! 16-byte GUIDs, rendered on the wire as 32 lowercase hex ASCII characters.

use std::fmt;

use crate::error::Error;

/// A device or host identifier. Always exactly 16 bytes; the pairing
/// protocol's headers carry it as 32 hex ASCII characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid([u8; 16]);

impl Guid {
    /// The all-zero GUID, acceptable to this device as the host's own
    /// identity in `INIT_COMMAND_REQUEST`.
    pub const ZERO: Guid = Guid([0u8; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses a 32-character hex ASCII GUID as sent in `device-id:` and
    /// `host-id:` pairing headers.
    pub fn parse_hex(s: &str) -> Result<Self, Error> {
        if s.len() != 32 {
            return Err(Error::InvalidGuid(s.to_string(), "expected 32 hex characters"));
        }
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            let byte_str = &s[i * 2..i * 2 + 2];
            *b = u8::from_str_radix(byte_str, 16)
                .map_err(|_| Error::InvalidGuid(s.to_string(), "non-hex digit"))?;
        }
        Ok(Guid(bytes))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_hex() {
        let guid = Guid::from_bytes([0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let s = guid.to_string();
        assert_eq!(s.len(), 32);
        let parsed = Guid::parse_hex(&s).unwrap();
        assert_eq!(guid, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(Guid::parse_hex("deadbeef").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "zz".repeat(16);
        assert!(Guid::parse_hex(&bad).is_err());
    }

    #[test]
    fn zero_guid_renders_as_zeroes() {
        assert_eq!(Guid::ZERO.to_string(), "0".repeat(32));
    }
}
