// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Data model shared across the framing, session, transport, and pairing
//! components.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::guid::Guid;

/// A PTP operation request, response, or event: `{Code, Transaction_ID,
/// Nparam, Param1..Param5}`. Used for `CMD_REQUEST`, `CMD_RESPONSE`, and
/// `EVENT` alike; `EVENT` just never fills more than 3 of the 5 params.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PtpContainer {
    pub code: u16,
    pub transaction_id: u32,
    pub nparam: u8,
    pub params: [u32; 5],
}

impl PtpContainer {
    pub fn new(code: u16, transaction_id: u32, params: &[u32]) -> Self {
        debug_assert!(params.len() <= 5);
        let mut p = [0u32; 5];
        p[..params.len()].copy_from_slice(params);
        PtpContainer {
            code,
            transaction_id,
            nparam: params.len() as u8,
            params: p,
        }
    }

    pub fn params(&self) -> &[u32] {
        &self.params[..self.nparam as usize]
    }
}

/// Input to the broadcast responder: identifies this host in its `SRCH`
/// reply and in the pairing handshake's `host-id`/`host-type`/`host-name`.
#[derive(Debug, Clone)]
pub struct HostDescription {
    pub guid: Guid,
    pub device_type: String,
    pub name: String,
    pub port: u16,
    pub mtp_protocol_version: u32,
    pub wireless_protocol_version: u32,
}

/// Parsed from a `SHOWPIN`/`REGISTER` header block. Owns its strings rather
/// than aliasing substrings of the read buffer (see DESIGN.md REDESIGN
/// FLAGS).
#[derive(Debug, Clone, Default)]
pub struct WirelessDeviceInfo {
    pub device_id: String,
    pub device_type: String,
    pub mac_address: String,
    pub device_name: String,
}

/// Created on a successful pairing; owned by the session until release.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub guid: Guid,
    pub addr: SocketAddrV4,
    pub data_port: u16,
    pub registered: bool,
}

impl DeviceRecord {
    /// Sentinel returned by the pairing listener when its timeout elapses
    /// with no device reaching `STANDBY` (mirrors the C source's
    /// `sin_addr == 0` convention, without exposing a raw zero address to
    /// callers).
    pub fn is_none(&self) -> bool {
        self.addr.ip() == &Ipv4Addr::UNSPECIFIED
    }
}

impl Default for DeviceRecord {
    fn default() -> Self {
        DeviceRecord {
            guid: Guid::ZERO,
            addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0),
            data_port: 0,
            registered: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_truncates_params_to_nparam() {
        let c = PtpContainer::new(0x1001, 7, &[1, 2, 3]);
        assert_eq!(c.params(), &[1, 2, 3]);
        assert_eq!(c.nparam, 3);
    }

    #[test]
    fn default_device_record_is_none() {
        assert!(DeviceRecord::default().is_none());
    }
}
