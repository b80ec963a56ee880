// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! TCP pairing listener: drives the CONNECT/SHOWPIN/REGISTER/STANDBY state
//! machine against one device connection at a time, on the caller's thread.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::container::{DeviceRecord, WirelessDeviceInfo};
use crate::error::Error;
use crate::guid::Guid;

/// The two host-provided callbacks the pairing listener consults.
pub struct PairingCallbacks {
    pub is_registered: Box<dyn Fn(&Guid) -> bool + Send>,
    pub create_register_pin: Box<dyn FnMut(&WirelessDeviceInfo) -> Result<u32, i32> + Send>,
}

/// Config for [`PairingListener::bind`]: required fields via `new`,
/// optional tuning afterward.
pub struct PairingConfig {
    pub bind_addr: SocketAddrV4,
    pub accept_timeout: Duration,
}

impl PairingConfig {
    pub fn new(bind_addr: SocketAddrV4) -> Self {
        PairingConfig { bind_addr, accept_timeout: Duration::from_millis(20) }
    }
}

pub struct PairingListener {
    listener: TcpListener,
    callbacks: PairingCallbacks,
    accept_poll_interval: Duration,
}

#[derive(Default)]
struct ConnectionState {
    guid: Option<Guid>,
    data_port: Option<u16>,
    registered: bool,
    pending_pin: Option<u32>,
}

impl PairingListener {
    pub fn bind(config: PairingConfig, callbacks: PairingCallbacks) -> Result<Self, Error> {
        let listener = TcpListener::bind(config.bind_addr)?;
        listener.set_nonblocking(true)?;
        Ok(PairingListener { listener, callbacks, accept_poll_interval: config.accept_timeout })
    }

    /// The address this listener is actually bound to (useful when
    /// `bind_addr`'s port was 0).
    pub fn local_addr(&self) -> Result<SocketAddrV4, Error> {
        match self.listener.local_addr()? {
            std::net::SocketAddr::V4(v4) => Ok(v4),
            std::net::SocketAddr::V6(_) => unreachable!("bound with a V4 address"),
        }
    }

    /// Accepts connections, running the pairing state machine on each,
    /// until a device reaches STANDBY or `timeout` elapses (a zero timeout
    /// waits indefinitely). Returns a device record with a zero address if
    /// no device connected within the timeout.
    pub fn get_wireless_device(&mut self, timeout: Duration) -> Result<DeviceRecord, Error> {
        let deadline = if timeout.is_zero() { None } else { Some(Instant::now() + timeout) };

        loop {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(DeviceRecord::default());
                }
            }

            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "pairing connection accepted");
                    if let Some(record) = self.drive_connection(stream, peer)? {
                        return Ok(record);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(self.accept_poll_interval);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Runs the state machine for one accepted connection. Returns
    /// `Ok(Some(record))` on STANDBY, `Ok(None)` if the peer disconnected
    /// before STANDBY (the listener keeps accepting), and an error only for
    /// an unexpected method name (source behavior: this escapes the loop).
    fn drive_connection(
        &mut self,
        stream: TcpStream,
        peer: std::net::SocketAddr,
    ) -> Result<Option<DeviceRecord>, Error> {
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;
        let mut state = ConnectionState::default();

        loop {
            let request = match read_request(&mut reader)? {
                Some(r) => r,
                None => {
                    debug!(%peer, "peer closed before STANDBY");
                    return Ok(None);
                }
            };

            match request.method.as_str() {
                "CONNECT" => self.handle_connect(&request, &mut state, &mut writer)?,
                "SHOWPIN" => self.handle_showpin(&request, &mut state, &mut writer)?,
                "REGISTER" => self.handle_register(&request, &mut state, &mut writer)?,
                "STANDBY" => {
                    let record = self.handle_standby(&state, peer)?;
                    return Ok(Some(record));
                }
                "REGISTERRESULT" | "REGISTERCANCEL" => {
                    info!(method = %request.method, "pairing notification received");
                }
                other => {
                    warn!(method = other, "unexpected pairing method, aborting connection");
                    return Err(Error::protocol(format!("unexpected pairing method {other}")));
                }
            }
        }
    }

    fn handle_connect(
        &self,
        request: &PairingRequest,
        state: &mut ConnectionState,
        writer: &mut impl Write,
    ) -> Result<(), Error> {
        let guid = Guid::parse_hex(request.header("device-id").unwrap_or(""))?;
        let data_port: u16 = request
            .header("device-port")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::protocol("CONNECT missing device-port".to_string()))?;

        state.guid = Some(guid);
        state.data_port = Some(data_port);

        if state.registered || (self.callbacks.is_registered)(&guid) {
            write_status_line(writer, "210 OK")
        } else {
            write_status_line(writer, "605 NG")
        }
    }

    fn handle_showpin(
        &mut self,
        request: &PairingRequest,
        state: &mut ConnectionState,
        writer: &mut impl Write,
    ) -> Result<(), Error> {
        let info = WirelessDeviceInfo {
            device_id: request.header("device-id").unwrap_or_default().to_string(),
            device_type: request.header("device-type").unwrap_or_default().to_string(),
            mac_address: request.header("mac-addr").unwrap_or_default().to_string(),
            device_name: request.header("device-name").unwrap_or_default().to_string(),
        };

        if let Some(guid) = request.header("device-id").and_then(|s| Guid::parse_hex(s).ok()) {
            state.guid = Some(guid);
        }

        write_status_line(writer, "200 OK")?;

        match (self.callbacks.create_register_pin)(&info) {
            Ok(pin) => {
                state.pending_pin = Some(pin);
            }
            Err(err_code) => {
                state.pending_pin = None;
                write!(writer, "REGISTERCANCEL * HTTP/1.1\r\nerrorcode:{err_code}\r\n")?;
            }
        }
        Ok(())
    }

    fn handle_register(
        &self,
        request: &PairingRequest,
        state: &mut ConnectionState,
        writer: &mut impl Write,
    ) -> Result<(), Error> {
        let given_guid = request.header("device-id").and_then(|s| Guid::parse_hex(s).ok());
        let pin: Option<u32> = request.header("pin-code").and_then(|v| v.parse().ok());

        let guid_matches = match (given_guid, state.guid) {
            (Some(a), Some(b)) => a == b,
            (None, _) => true,
            _ => false,
        };

        let matched = guid_matches && pin.is_some() && pin == state.pending_pin;
        if matched {
            state.registered = true;
            write_status_line(writer, "200 OK")
        } else {
            write_status_line(writer, "610 NG")
        }
    }

    fn handle_standby(
        &self,
        state: &ConnectionState,
        peer: std::net::SocketAddr,
    ) -> Result<DeviceRecord, Error> {
        let guid = state
            .guid
            .ok_or_else(|| Error::protocol("STANDBY before CONNECT".to_string()))?;
        let data_port = state
            .data_port
            .ok_or_else(|| Error::protocol("STANDBY before CONNECT".to_string()))?;
        let ip = match peer {
            std::net::SocketAddr::V4(v4) => *v4.ip(),
            std::net::SocketAddr::V6(_) => {
                return Err(Error::protocol("IPv6 peer not supported by this transport".to_string()))
            }
        };
        Ok(DeviceRecord {
            guid,
            addr: SocketAddrV4::new(ip, 0),
            data_port,
            registered: state.registered,
        })
    }
}

struct PairingRequest {
    method: String,
    headers: Vec<(String, String)>,
}

impl PairingRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

/// Reads one `<METHOD> * HTTP/1.1\r\n<header>\r\n...\r\n` request, copying
/// each header field into an owned `(name, value)` pair rather than the
/// source's destructive tokenization in place on the read buffer.
fn read_request(reader: &mut BufReader<TcpStream>) -> Result<Option<PairingRequest>, Error> {
    let mut line = String::new();
    let n = reader.read_line(&mut line)?;
    if n == 0 {
        return Ok(None);
    }
    let line = line.trim_end_matches(['\r', '\n']);
    let method = line
        .split(' ')
        .next()
        .ok_or_else(|| Error::protocol("empty request line".to_string()))?
        .to_string();

    let mut headers = Vec::new();
    loop {
        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line)?;
        if n == 0 {
            break;
        }
        let header_line = header_line.trim_end_matches(['\r', '\n']);
        if header_line.is_empty() {
            break;
        }
        if let Some((name, value)) = header_line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(Some(PairingRequest { method, headers }))
}

fn write_status_line(writer: &mut impl Write, status: &str) -> Result<(), Error> {
    write!(writer, "HTTP/1.1 {status}\r\n")?;
    Ok(())
}
