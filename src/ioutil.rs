// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Raw socket I/O helpers.
//!
//! This is the only module that loops over `read`/`write`/`recv_from`/
//! `send_to` directly; every other component goes through here so a short
//! read or a short write is handled in exactly one place.

use std::io::{Read, Write};
use std::net::{SocketAddr, UdpSocket};

use crate::error::Error;

/// Reads until `buf` is completely filled, or fails if the stream ends first.
pub fn read_exact(stream: &mut impl Read, buf: &mut [u8]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "end of stream before the requested bytes were read",
            )));
        }
        filled += n;
    }
    Ok(())
}

/// Writes the entire buffer, looping over short writes.
pub fn send_all(stream: &mut impl Write, buf: &[u8]) -> Result<(), Error> {
    let mut sent = 0;
    while sent < buf.len() {
        let n = stream.write(&buf[sent..])?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write returned zero bytes",
            )));
        }
        sent += n;
    }
    Ok(())
}

/// Sends the entire buffer to `addr` over a (possibly unconnected) UDP socket.
pub fn send_to_all(sock: &UdpSocket, buf: &[u8], addr: SocketAddr) -> Result<(), Error> {
    let mut sent = 0;
    while sent < buf.len() {
        let n = sock.send_to(&buf[sent..], addr)?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "send_to returned zero bytes",
            )));
        }
        sent += n;
    }
    Ok(())
}

/// Drains a non-blocking UDP socket into a single growing buffer.
///
/// Repeatedly calls `recv_from` until it returns `WouldBlock`, concatenating
/// every datagram received meanwhile. Returns the sender of the last
/// datagram seen (callers only care about this when exactly one datagram
/// arrived, which is the only case the pairing/broadcast protocol uses).
pub fn drain_udp(sock: &UdpSocket) -> Result<(Vec<u8>, Option<SocketAddr>), Error> {
    let mut data = Vec::new();
    let mut from = None;
    let mut chunk = [0u8; 2048];

    loop {
        match sock.recv_from(&mut chunk) {
            Ok((n, addr)) => {
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
                from = Some(addr);
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(Error::Io(e)),
        }
    }

    Ok((data, from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_exact_fills_buffer() {
        let mut src = Cursor::new(vec![1u8, 2, 3, 4]);
        let mut buf = [0u8; 4];
        read_exact(&mut src, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn read_exact_fails_on_early_eof() {
        let mut src = Cursor::new(vec![1u8, 2]);
        let mut buf = [0u8; 4];
        assert!(read_exact(&mut src, &mut buf).is_err());
    }

    #[test]
    fn send_all_writes_everything() {
        let mut out = Vec::new();
        send_all(&mut out, &[1, 2, 3]).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn drain_udp_collects_one_datagram() {
        let recv = UdpSocket::bind("127.0.0.1:0").unwrap();
        recv.set_nonblocking(true).unwrap();
        let send = UdpSocket::bind("127.0.0.1:0").unwrap();
        let recv_addr = recv.local_addr().unwrap();
        send.send_to(b"hello", recv_addr).unwrap();

        // Give the datagram a moment to land in the socket buffer.
        std::thread::sleep(std::time::Duration::from_millis(20));

        let (data, from) = drain_udp(&recv).unwrap();
        assert_eq!(data, b"hello");
        assert!(from.is_some());
    }
}
