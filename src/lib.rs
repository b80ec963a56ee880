// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Wireless PTP/IP discovery, pairing, and transport core for a host peer.
//!
//! A host advertises itself over UDP ([`broadcast`]), waits for a device to
//! pair over a vendor-specific TCP handshake ([`pairing`]), then opens the
//! binary PTP/IP session ([`session`]) that an external MTP layer drives
//! through [`transport`] to exchange operations.
//!
//! This crate carries opaque PTP containers and byte payloads only; it does
//! not interpret MTP opcodes or object formats, transcode strings, persist
//! "known device" records, or install a logging subscriber. See the
//! top-level design notes in the repository for the full scope.
//!
//! # Example
//! ```no_run
//! # use ptpip_core::{device, pairing::PairingCallbacks, guid::Guid};
//! # use std::net::{Ipv4Addr, SocketAddrV4};
//! # use std::time::Duration;
//! # fn main() -> Result<(), ptpip_core::error::Error> {
//! let callbacks = PairingCallbacks {
//!     is_registered: Box::new(|_guid| false),
//!     create_register_pin: Box::new(|_info| Ok(12345678)),
//! };
//! let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 9309);
//! let session = device::get_first_wireless_device(
//!     bind_addr,
//!     callbacks,
//!     Guid::ZERO,
//!     Duration::from_secs(30),
//! )?;
//! # let _ = session;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod codec;
pub mod constant;
pub mod container;
pub mod device;
pub mod error;
pub mod framing;
pub mod guid;
pub mod ioutil;
pub mod pairing;
pub mod session;
pub mod transport;
