// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! PTP/IP session establishment: the two-socket connect and INIT_COMMAND/
//! INIT_EVENT handshake that binds them into one session.

use std::net::{Ipv4Addr, SocketAddrV4, TcpStream};

use tracing::{debug, info, warn};

use crate::constant::{INIT_COMMAND_ACK, INIT_EVENT_ACK, PTP_OC_CLOSE_SESSION, SESSION_ID};
use crate::container::PtpContainer;
use crate::error::Error;
use crate::framing::{read_frame, Packet};
use crate::guid::Guid;
use crate::ioutil::send_all;
use crate::transport::OperationTransport;

/// A live PTP/IP session: two connected sockets plus the event pipe id the
/// device chose during the handshake. `OpenSession` has already succeeded
/// by the time a caller receives one.
pub struct PtpIpSession {
    transport: OperationTransport,
    eventpipe_id: u32,
    closed: bool,
}

impl PtpIpSession {
    /// Opens both sockets to `(addr, data_port)` and runs the INIT_COMMAND/
    /// INIT_EVENT handshake plus `OpenSession`. Both connections must
    /// succeed before any handshake byte is sent; a failure at any step
    /// closes whatever is open and returns an error.
    pub fn connect(addr: Ipv4Addr, data_port: u16, host_guid: Guid) -> Result<Self, Error> {
        let target = SocketAddrV4::new(addr, data_port);
        debug!(%target, "opening PTP/IP command and event sockets");

        let mut cmd_sock = TcpStream::connect(target)?;
        let mut evt_sock = TcpStream::connect(target)?;

        match Self::handshake(&mut cmd_sock, &mut evt_sock, host_guid) {
            Ok(eventpipe_id) => {
                let mut transport = OperationTransport::new(cmd_sock, evt_sock)?;
                if let Err(e) = transport.open_session(SESSION_ID) {
                    warn!(error = %e, "OpenSession failed, aborting connect");
                    return Err(e);
                }
                info!(eventpipe_id, "PTP/IP session established");
                Ok(PtpIpSession { transport, eventpipe_id, closed: false })
            }
            Err(e) => {
                warn!(error = %e, "handshake failed, sockets dropped");
                Err(e)
            }
        }
    }

    fn handshake(
        cmd_sock: &mut TcpStream,
        evt_sock: &mut TcpStream,
        host_guid: Guid,
    ) -> Result<u32, Error> {
        let request = Packet::InitCommandRequest { guid: host_guid, name_utf16le: Vec::new() };
        send_all(cmd_sock, &request.encode())?;

        let eventpipe_id = match read_frame(cmd_sock)? {
            Packet::InitCommandAck { eventpipe_id, .. } => eventpipe_id,
            other => {
                return Err(Error::handshake(format!(
                    "expected INIT_COMMAND_ACK (type {INIT_COMMAND_ACK}), got {other:?}"
                )))
            }
        };

        let request = Packet::InitEventRequest { eventpipe_id };
        send_all(evt_sock, &request.encode())?;

        match read_frame(evt_sock)? {
            Packet::InitEventAck => Ok(eventpipe_id),
            other => Err(Error::handshake(format!(
                "expected INIT_EVENT_ACK (type {INIT_EVENT_ACK}), got {other:?}"
            ))),
        }
    }

    /// The event-pipe identifier the device chose during the handshake.
    pub fn eventpipe_id(&self) -> u32 {
        self.eventpipe_id
    }

    /// The operation transport (component E) bound to this session's two
    /// sockets.
    pub fn transport(&mut self) -> &mut OperationTransport {
        &mut self.transport
    }

    /// Closes the session: attempts `CloseSession`, logging but never
    /// propagating a failure, then lets both sockets drop. Calling this
    /// explicitly is optional; `Drop` does the same thing on scope exit.
    pub fn close(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let container = PtpContainer::new(PTP_OC_CLOSE_SESSION, 0, &[SESSION_ID]);
        if let Err(e) = self.transport.sendreq(&container) {
            warn!(error = %e, "ptp_closesession failed during close");
        }
    }
}

impl Drop for PtpIpSession {
    fn drop(&mut self) {
        self.close_inner();
    }
}
