// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

use thiserror::Error as ThisError;

/// Errors produced by the discovery, pairing, and PTP/IP transport core.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Malformed framing, a packet kind out of place, or a parameter count
    /// that exceeds the protocol's maximum of 5.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A read/write failed, or the stream ended in the middle of a frame.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// `INIT_COMMAND_ACK`/`INIT_EVENT_ACK` carried the wrong packet type, or
    /// `OpenSession` failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The device is not in the registry, the PIN did not match, or the
    /// GUID in `REGISTER` did not match the GUID from `SHOWPIN`.
    #[error("pairing rejected: {0}")]
    PairingRejected(String),

    /// The pairing listener's overall timeout elapsed before `STANDBY`.
    #[error("timed out waiting for a device")]
    Timeout,

    /// `BroadcastHandle::stop` was called on a broadcast that already
    /// stopped, or `start_broadcast` failed to build its wakeup channel.
    #[error("no broadcast in progress")]
    NotBroadcasting,

    /// A hex GUID string was the wrong length or contained non-hex digits.
    #[error("invalid guid {0:?}: {1}")]
    InvalidGuid(String, &'static str),
}

impl Error {
    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub(crate) fn handshake(msg: impl Into<String>) -> Self {
        Error::Handshake(msg.into())
    }
}
