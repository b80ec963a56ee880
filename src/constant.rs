// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Wire protocol constants for PTP/IP framing and the pairing handshake.

/// Size of the 8-byte `{length, type}` prefix common to every PTP/IP packet.
pub const HEADER_SIZE: usize = 8;

// Packet kind discriminants, as carried in the PTP/IP header's `type` field.
pub const INIT_COMMAND_REQUEST: u32 = 1;
pub const INIT_COMMAND_ACK: u32 = 2;
pub const INIT_EVENT_REQUEST: u32 = 3;
pub const INIT_EVENT_ACK: u32 = 4;
pub const CMD_REQUEST: u32 = 6;
pub const CMD_RESPONSE: u32 = 7;
pub const EVENT: u32 = 8;
pub const START_DATA_PACKET: u32 = 9;
pub const DATA_PACKET: u32 = 10;
pub const CANCEL_TRANSACTION: u32 = 11;
pub const END_DATA_PACKET: u32 = 12;
pub const PING: u32 = 13;
pub const PONG: u32 = 14;

/// `dataphase` is always 1 in `CMD_REQUEST`; the field exists on the wire
/// but no implementation is known to vary it.
pub const DATAPHASE_FIXED: u32 = 1;

/// Maximum payload bytes per intermediate `DATA_PACKET`; the final, possibly
/// smaller, chunk is always sent as `END_DATA_PACKET` instead.
pub const WRITE_BLOCKSIZE: usize = 32756;

/// Maximum number of parameters a PTP container may carry.
pub const MAX_PARAMS: usize = 5;

/// `OpenSession`'s PTP operation code, issued once per PTP/IP connect.
pub const PTP_OC_OPEN_SESSION: u16 = 0x1002;

/// Generic PTP "operation succeeded" response code.
pub const PTP_RC_OK: u16 = 0x2001;

/// `CloseSession`'s PTP operation code, issued once on session teardown.
pub const PTP_OC_CLOSE_SESSION: u16 = 0x1003;

/// Session ID used for the single MTP session this crate opens per connect.
pub const SESSION_ID: u32 = 1;
