// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Operation transport: send requests, stream data in and out, read
//! responses, and poll events over an established PTP/IP session's two
//! sockets.
//!
//! There is only ever one concrete transport shape (two TCP sockets), so
//! `OperationTransport` exposes its operations as inherent methods instead
//! of a trait.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Interest, Poll, Token};
use tracing::{trace, warn};

use crate::constant::{PTP_OC_OPEN_SESSION, PTP_RC_OK, WRITE_BLOCKSIZE};
use crate::container::PtpContainer;
use crate::error::Error;
use crate::framing::{read_frame, Packet};
use crate::ioutil::send_all;

const EVENT_TOKEN: Token = Token(0);

/// Pull callback for `senddata`: asked to fill up to `want` bytes of `buf`,
/// returns how many it actually produced. Ownership of `buf` is per-call;
/// nothing is retained past the call.
pub type DataSource<'a> = dyn FnMut(&mut [u8]) -> Result<usize, Error> + 'a;

/// Push callback for `getdata`: handed one chunk of payload at a time.
pub type DataSink<'a> = dyn FnMut(&[u8]) -> Result<(), Error> + 'a;

/// The two sockets bound into one PTP/IP session, plus the poller used for
/// `event_check`'s 1-microsecond non-blocking poll.
pub struct OperationTransport {
    cmd_sock: TcpStream,
    evt_sock: TcpStream,
    poll: Poll,
}

impl OperationTransport {
    /// Wraps two already-connected sockets (command, event) into a
    /// transport. `session::PtpIpSession::connect` is the usual way to get
    /// one; this is exposed directly for callers that manage the PTP/IP
    /// handshake themselves.
    pub fn new(cmd_sock: TcpStream, evt_sock: TcpStream) -> Result<Self, Error> {
        evt_sock.set_nonblocking(true)?;
        let poll = Poll::new()?;
        let mut mio_evt = MioTcpStream::from_std(evt_sock.try_clone()?);
        poll.registry().register(&mut mio_evt, EVENT_TOKEN, Interest::READABLE)?;
        // mio_evt only exists to register interest; the registration survives
        // on the duplicated fd's epoll/kqueue entry, so it can be dropped.
        Ok(OperationTransport { cmd_sock, evt_sock, poll })
    }

    pub(crate) fn open_session(&mut self, session_id: u32) -> Result<(), Error> {
        let container = PtpContainer::new(PTP_OC_OPEN_SESSION, 0, &[session_id]);
        self.sendreq(&container)?;
        let resp = self.getresp(&container)?;
        if resp.code != PTP_RC_OK {
            return Err(Error::handshake(format!(
                "OpenSession failed with response code {:#06x}",
                resp.code
            )));
        }
        Ok(())
    }

    /// Emits CMD_REQUEST with the container's parameters. Per the source's
    /// documented (if questionable) behavior, a short write on the command
    /// socket is NOT silently swallowed here: `send_all` surfaces it as an
    /// `Error::Io`, reversing the source's "returns OK on short write" bug
    /// rather than preserving it (see DESIGN.md open-item decision).
    pub fn sendreq(&mut self, container: &PtpContainer) -> Result<(), Error> {
        let packet = Packet::CmdRequest {
            opcode: container.code,
            transaction_id: container.transaction_id,
            params: container.params().to_vec(),
        };
        trace!(code = container.code, transaction_id = container.transaction_id, "sendreq");
        send_all(&mut self.cmd_sock, &packet.encode())
    }

    /// Streams `size` bytes pulled from `source` as one START_DATA_PACKET
    /// followed by DATA_PACKET chunks of up to `WRITE_BLOCKSIZE` bytes, the
    /// final (possibly shorter, possibly zero-length) chunk as an
    /// END_DATA_PACKET. Does not seek or retry `source`.
    pub fn senddata(
        &mut self,
        container: &PtpContainer,
        size: u64,
        source: &mut DataSource<'_>,
    ) -> Result<(), Error> {
        if size > u32::MAX as u64 {
            return Err(Error::protocol(format!(
                "data phase of {size} bytes exceeds the 32-bit total-length field"
            )));
        }
        let transaction_id = container.transaction_id;
        let start = Packet::StartDataPacket { transaction_id, total_len: size as u32 };
        send_all(&mut self.cmd_sock, &start.encode())?;

        let mut remaining = size;
        let mut chunk = vec![0u8; WRITE_BLOCKSIZE];
        loop {
            let want = remaining.min(WRITE_BLOCKSIZE as u64) as usize;
            let n = source(&mut chunk[..want])?;
            remaining -= n as u64;
            let is_last = remaining == 0;
            let payload = chunk[..n].to_vec();
            let packet = if is_last {
                Packet::EndDataPacket { transaction_id, payload }
            } else {
                Packet::DataPacket { transaction_id, payload }
            };
            send_all(&mut self.cmd_sock, &packet.encode())?;
            if is_last {
                return Ok(());
            }
        }
    }

    /// Reads one START_DATA_PACKET, then DATA_PACKET/END_DATA_PACKET frames,
    /// forwarding each payload to `sink`, until either END_DATA_PACKET
    /// arrives or the declared total is reached. A CMD_RESPONSE arriving
    /// before the data phase completes is a device-side error.
    pub fn getdata(&mut self, container: &PtpContainer, sink: &mut DataSink<'_>) -> Result<(), Error> {
        let total_len = match read_frame(&mut self.cmd_sock)? {
            Packet::StartDataPacket { transaction_id, total_len } => {
                if transaction_id != container.transaction_id {
                    return Err(Error::protocol(format!(
                        "START_DATA_PACKET transaction {transaction_id} does not match expected {}",
                        container.transaction_id
                    )));
                }
                total_len as u64
            }
            Packet::CmdResponse { .. } => {
                return Err(Error::protocol(
                    "device returned CMD_RESPONSE before the data phase started".to_string(),
                ))
            }
            other => {
                return Err(Error::protocol(format!(
                    "expected START_DATA_PACKET, got {other:?}"
                )))
            }
        };

        let mut received = 0u64;
        loop {
            match read_frame(&mut self.cmd_sock)? {
                Packet::DataPacket { payload, .. } => {
                    received += payload.len() as u64;
                    if received > total_len {
                        return Err(Error::protocol(format!(
                            "data phase exceeded declared total of {total_len} bytes"
                        )));
                    }
                    sink(&payload)?;
                }
                Packet::EndDataPacket { payload, .. } => {
                    received += payload.len() as u64;
                    if received > total_len {
                        return Err(Error::protocol(format!(
                            "data phase exceeded declared total of {total_len} bytes"
                        )));
                    }
                    sink(&payload)?;
                    return Ok(());
                }
                other => {
                    return Err(Error::protocol(format!(
                        "expected DATA_PACKET or END_DATA_PACKET, got {other:?}"
                    )))
                }
            }
        }
    }

    /// Reads one CMD_RESPONSE, returning its parsed operation code,
    /// transaction id, and parameters as a fresh container.
    pub fn getresp(&mut self, expected: &PtpContainer) -> Result<PtpContainer, Error> {
        match read_frame(&mut self.cmd_sock)? {
            Packet::CmdResponse { resp_code, transaction_id, params } => {
                if transaction_id != expected.transaction_id {
                    warn!(
                        got = transaction_id,
                        want = expected.transaction_id,
                        "CMD_RESPONSE transaction id mismatch"
                    );
                }
                Ok(PtpContainer::new(resp_code, transaction_id, &params))
            }
            other => Err(Error::protocol(format!("expected CMD_RESPONSE, got {other:?}"))),
        }
    }

    /// Non-blocking poll of the event socket with a 1-microsecond timeout.
    /// No pending event is success with an empty container (`code == 0`).
    /// PING is answered with PONG and skipped; PONG and CANCEL_TRANSACTION
    /// are logged and skipped; any other unrecognized frame is logged and
    /// skipped. Keeps reading until an EVENT arrives or the timeout elapses.
    pub fn event_check(&mut self) -> Result<PtpContainer, Error> {
        self.poll_event(Some(Duration::from_micros(1)))
    }

    /// Blocking variant of [`Self::event_check`]: waits indefinitely for the
    /// next EVENT.
    pub fn event_wait(&mut self) -> Result<PtpContainer, Error> {
        self.poll_event(None)
    }

    fn poll_event(&mut self, timeout: Option<Duration>) -> Result<PtpContainer, Error> {
        let mut events = Events::with_capacity(4);
        loop {
            match self.poll.poll(&mut events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
            if events.iter().next().is_none() {
                return Ok(PtpContainer::default());
            }
            match read_frame(&mut self.evt_sock) {
                Ok(Packet::Event { evt_code, transaction_id, params }) => {
                    return Ok(PtpContainer::new(evt_code, transaction_id, &params))
                }
                Ok(Packet::Ping) => {
                    trace!("PING received, replying PONG");
                    send_all(&mut self.evt_sock, &Packet::Pong.encode())?;
                }
                Ok(Packet::Pong) => {
                    trace!("PONG received");
                }
                Ok(Packet::CancelTransaction { transaction_id }) => {
                    warn!(transaction_id, "transaction cancelled by device");
                }
                Ok(other) => {
                    warn!(?other, "unrecognized event-socket packet, continuing");
                }
                Err(Error::Io(e)) if e.kind() == ErrorKind::WouldBlock => {
                    return Ok(PtpContainer::default())
                }
                Err(e) => return Err(e),
            }
            if timeout.is_some() {
                // a single 1-microsecond poll is the contract for event_check;
                // having drained one readable frame, report no-event rather
                // than looping again and risking a longer block.
                return Ok(PtpContainer::default());
            }
        }
    }
}
