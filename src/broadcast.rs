// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! UDP broadcast responder: answers `SRCH` probes with a host-description
//! reply, on its own thread, stoppable without relying on process-wide
//! state (see DESIGN.md REDESIGN FLAGS).

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use mio::net::UdpSocket as MioUdpSocket;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use crate::container::HostDescription;
use crate::error::Error;

const BROADCAST_TOKEN: Token = Token(0);
const STOP_TOKEN: Token = Token(1);

/// Probe the device sends to find advertising hosts.
const SRCH_PROBE: &str = "SRCH * HTTP/1.1\r\n";

/// Owned by the caller; stopping the broadcaster wakes its poll loop and
/// joins the thread. Replaces the source's process-wide stop-channel
/// socketpair with a per-instance `mio::Waker`.
pub struct BroadcastHandle {
    stop: Arc<AtomicBool>,
    waker: Waker,
    join: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl BroadcastHandle {
    /// The address the responder's UDP socket is actually bound to (useful
    /// when `bind_addr`'s port was 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the broadcaster to exit its select loop and waits for its
    /// thread to finish. Calling this twice, or after the thread already
    /// exited on its own, is a no-op beyond the first call.
    pub fn stop(mut self) -> Result<(), Error> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<(), Error> {
        if self.stop.swap(true, Ordering::SeqCst) {
            return Err(Error::NotBroadcasting);
        }
        self.waker.wake().map_err(Error::Io)?;
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
        Ok(())
    }
}

impl Drop for BroadcastHandle {
    fn drop(&mut self) {
        if !self.stop.load(Ordering::SeqCst) {
            let _ = self.stop_and_join();
        }
    }
}

/// Binds a UDP socket at `config.bind_addr` and spawns a thread answering
/// `SRCH` probes with `config.desc`'s host-description block until
/// [`BroadcastHandle::stop`] is called.
pub fn start_broadcast(config: BroadcastConfig) -> std::io::Result<BroadcastHandle> {
    let BroadcastConfig { desc, bind_addr, poll_timeout } = config;
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_nonblocking(true)?;
    let local_addr = socket.local_addr()?;
    info!(%local_addr, "broadcast responder starting");

    let poll = Poll::new()?;
    let mut mio_socket = MioUdpSocket::from_std(socket.try_clone()?);
    poll.registry().register(&mut mio_socket, BROADCAST_TOKEN, Interest::READABLE)?;
    let waker = Waker::new(poll.registry(), STOP_TOKEN)?;

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);

    let join = thread::spawn(move || run_loop(poll, socket, desc, thread_stop, poll_timeout));

    Ok(BroadcastHandle { stop, waker, join: Some(join), local_addr })
}

fn run_loop(
    mut poll: Poll,
    socket: UdpSocket,
    desc: HostDescription,
    stop: Arc<AtomicBool>,
    poll_timeout: Duration,
) {
    let mut events = Events::with_capacity(4);
    loop {
        if let Err(e) = poll.poll(&mut events, Some(poll_timeout)) {
            warn!(error = %e, "broadcast poll failed, exiting");
            return;
        }
        if stop.load(Ordering::SeqCst) {
            debug!("broadcast responder stopping");
            return;
        }
        for event in events.iter() {
            if event.token() == BROADCAST_TOKEN {
                handle_datagram(&socket, &desc);
            }
        }
    }
}

fn handle_datagram(socket: &UdpSocket, desc: &HostDescription) {
    let (data, from) = match crate::ioutil::drain_udp(socket) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to drain broadcast socket");
            return;
        }
    };
    let Some(from) = from else { return };

    if !is_srch_probe(&data) {
        debug!(bytes = data.len(), "discarding non-SRCH datagram");
        return;
    }

    let reply = build_reply(desc);
    if let Err(e) = crate::ioutil::send_to_all(socket, &reply, from) {
        warn!(error = %e, %from, "failed to send broadcast reply");
    }
}

fn is_srch_probe(data: &[u8]) -> bool {
    data.starts_with(SRCH_PROBE.as_bytes()) && data.get(SRCH_PROBE.len()) == Some(&0)
}

fn build_reply(desc: &HostDescription) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\n\
         host-id:{guid}\r\n\
         host-type:{device_type}\r\n\
         host-name:{name}\r\n\
         host-mtp-protocol-version:{mtp:08}\r\n\
         host-request-port:{port}\r\n\
         host-wireless-protocol-version:{wireless:08}\r\n",
        guid = desc.guid,
        device_type = desc.device_type,
        name = desc.name,
        mtp = desc.mtp_protocol_version,
        port = desc.port,
        wireless = desc.wireless_protocol_version,
    )
    .into_bytes();
    out.push(0);
    out
}

/// Config for [`start_broadcast`], required fields via `new`:
/// required fields via `new`, optional tuning via public fields afterward.
pub struct BroadcastConfig {
    pub desc: HostDescription,
    pub bind_addr: SocketAddr,
    pub poll_timeout: Duration,
}

impl BroadcastConfig {
    pub fn new(desc: HostDescription, bind_addr: SocketAddr) -> Self {
        BroadcastConfig { desc, bind_addr, poll_timeout: Duration::from_millis(200) }
    }
}
