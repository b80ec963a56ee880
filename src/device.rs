// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Top-level facade tying the pairing listener, the PTP/IP session, and the
//! operation transport together.

use std::net::SocketAddrV4;
use std::time::Duration;

use tracing::info;

use crate::error::Error;
use crate::guid::Guid;
use crate::pairing::{PairingCallbacks, PairingConfig, PairingListener};
use crate::session::PtpIpSession;

/// Runs the pairing listener to completion and, on a successful STANDBY,
/// opens the PTP/IP session against the registered device: one call that
/// goes from configuration to a ready-to-use session handle.
///
/// The caller is expected to already have started the broadcast responder
/// on its own thread before calling this, and to stop it once this
/// returns.
pub fn get_first_wireless_device(
    pairing_bind_addr: SocketAddrV4,
    callbacks: PairingCallbacks,
    host_guid: Guid,
    timeout: Duration,
) -> Result<Option<PtpIpSession>, Error> {
    let config = PairingConfig::new(pairing_bind_addr);
    let mut listener = PairingListener::bind(config, callbacks)?;

    let record = listener.get_wireless_device(timeout)?;
    if record.is_none() {
        info!("no device paired within the timeout");
        return Ok(None);
    }

    info!(guid = %record.guid, data_port = record.data_port, "device paired, opening PTP/IP session");
    let session = PtpIpSession::connect(*record.addr.ip(), record.data_port, host_guid)?;
    Ok(Some(session))
}
