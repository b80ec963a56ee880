// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

//! Encode/decode the PTP/IP packet types and carry their opaque payloads.
//!
//! Every packet on the wire starts with an 8-byte header: a little-endian
//! `length` counting the entire frame (header included) and a
//! little-endian `type` identifying the packet kind from [`constant`]. The
//! number of trailing 4-byte parameters in requests, responses, and events
//! is inferred from what's left of `length` once the fixed part of the
//! payload is accounted for: a length-driven replacement for the source's
//! fallthrough `switch` packing (see DESIGN.md).
//!
//! Character-set conversion of the UTF-16LE friendly name is out of scope;
//! it is carried as raw bytes.

use crate::codec::{push_u16_le, push_u32_le, read_u16_le, read_u32_le, write_u32_le};
use crate::constant::*;
use crate::container::PtpContainer;
use crate::error::Error;
use crate::guid::Guid;

/// The 8-byte prefix common to every PTP/IP packet.
#[derive(Debug, Clone, Copy)]
pub struct PtpIpHeader {
    pub length: u32,
    pub packet_type: u32,
}

impl PtpIpHeader {
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self, Error> {
        let length = read_u32_le(buf, 0);
        let packet_type = read_u32_le(buf, 4);
        if (length as usize) < HEADER_SIZE {
            return Err(Error::protocol(format!(
                "frame length {} is shorter than the header",
                length
            )));
        }
        Ok(PtpIpHeader { length, packet_type })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        write_u32_le(&mut buf, 0, self.length);
        write_u32_le(&mut buf, 4, self.packet_type);
        buf
    }

    /// Number of bytes in the body that follow this header.
    pub fn body_len(&self) -> usize {
        self.length as usize - HEADER_SIZE
    }
}

/// A decoded PTP/IP packet, carrying its own payload.
#[derive(Debug, Clone)]
pub enum Packet {
    InitCommandRequest { guid: Guid, name_utf16le: Vec<u8> },
    InitCommandAck { eventpipe_id: u32, guid: Guid, name_utf16le: Vec<u8> },
    InitEventRequest { eventpipe_id: u32 },
    InitEventAck,
    CmdRequest { opcode: u16, transaction_id: u32, params: Vec<u32> },
    CmdResponse { resp_code: u16, transaction_id: u32, params: Vec<u32> },
    StartDataPacket { transaction_id: u32, total_len: u32 },
    DataPacket { transaction_id: u32, payload: Vec<u8> },
    EndDataPacket { transaction_id: u32, payload: Vec<u8> },
    Event { evt_code: u16, transaction_id: u32, params: Vec<u32> },
    /// Acknowledged but never emitted by the source; recognized here so
    /// `event_check`/`event_wait` can answer PING with PONG instead of
    /// treating it as an unknown frame (see DESIGN.md open items).
    Ping,
    Pong,
    /// Cancels an in-flight transaction; carries the transaction id being
    /// cancelled same as every other transaction-tagged frame.
    CancelTransaction { transaction_id: u32 },
}

impl Packet {
    /// Encodes this packet including its 8-byte header.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::InitCommandRequest { guid, name_utf16le } => {
                let mut body = Vec::with_capacity(16 + name_utf16le.len());
                body.extend_from_slice(guid.as_bytes());
                body.extend_from_slice(name_utf16le);
                frame(INIT_COMMAND_REQUEST, &body)
            }
            Packet::InitCommandAck { eventpipe_id, guid, name_utf16le } => {
                let mut body = Vec::with_capacity(4 + 16 + name_utf16le.len());
                push_u32_le(&mut body, *eventpipe_id);
                body.extend_from_slice(guid.as_bytes());
                body.extend_from_slice(name_utf16le);
                frame(INIT_COMMAND_ACK, &body)
            }
            Packet::InitEventRequest { eventpipe_id } => {
                let mut body = Vec::with_capacity(4);
                push_u32_le(&mut body, *eventpipe_id);
                frame(INIT_EVENT_REQUEST, &body)
            }
            Packet::InitEventAck => frame(INIT_EVENT_ACK, &[]),
            Packet::CmdRequest { opcode, transaction_id, params } => {
                let mut body = Vec::with_capacity(10 + params.len() * 4);
                push_u32_le(&mut body, DATAPHASE_FIXED);
                push_u16_le(&mut body, *opcode);
                push_u32_le(&mut body, *transaction_id);
                for p in params {
                    push_u32_le(&mut body, *p);
                }
                frame(CMD_REQUEST, &body)
            }
            Packet::CmdResponse { resp_code, transaction_id, params } => {
                let mut body = Vec::with_capacity(6 + params.len() * 4);
                push_u16_le(&mut body, *resp_code);
                push_u32_le(&mut body, *transaction_id);
                for p in params {
                    push_u32_le(&mut body, *p);
                }
                frame(CMD_RESPONSE, &body)
            }
            Packet::StartDataPacket { transaction_id, total_len } => {
                let mut body = Vec::with_capacity(12);
                push_u32_le(&mut body, *transaction_id);
                push_u32_le(&mut body, *total_len);
                push_u32_le(&mut body, 0);
                frame(START_DATA_PACKET, &body)
            }
            Packet::DataPacket { transaction_id, payload } => {
                let mut body = Vec::with_capacity(4 + payload.len());
                push_u32_le(&mut body, *transaction_id);
                body.extend_from_slice(payload);
                frame(DATA_PACKET, &body)
            }
            Packet::EndDataPacket { transaction_id, payload } => {
                let mut body = Vec::with_capacity(4 + payload.len());
                push_u32_le(&mut body, *transaction_id);
                body.extend_from_slice(payload);
                frame(END_DATA_PACKET, &body)
            }
            Packet::Event { evt_code, transaction_id, params } => {
                let mut body = Vec::with_capacity(6 + params.len() * 4);
                push_u16_le(&mut body, *evt_code);
                push_u32_le(&mut body, *transaction_id);
                for p in params {
                    push_u32_le(&mut body, *p);
                }
                frame(EVENT, &body)
            }
            Packet::Ping => frame(PING, &[]),
            Packet::Pong => frame(PONG, &[]),
            Packet::CancelTransaction { transaction_id } => {
                let mut body = Vec::with_capacity(4);
                push_u32_le(&mut body, *transaction_id);
                frame(CANCEL_TRANSACTION, &body)
            }
        }
    }

    /// Decodes a packet body given the header's declared `packet_type`.
    pub fn decode(header: &PtpIpHeader, body: &[u8]) -> Result<Self, Error> {
        match header.packet_type {
            INIT_COMMAND_REQUEST => {
                require_len(body, 16, "INIT_COMMAND_REQUEST")?;
                let guid = Guid::from_bytes(body[0..16].try_into().unwrap());
                Ok(Packet::InitCommandRequest { guid, name_utf16le: body[16..].to_vec() })
            }
            INIT_COMMAND_ACK => {
                require_len(body, 20, "INIT_COMMAND_ACK")?;
                let eventpipe_id = read_u32_le(body, 0);
                let guid = Guid::from_bytes(body[4..20].try_into().unwrap());
                Ok(Packet::InitCommandAck { eventpipe_id, guid, name_utf16le: body[20..].to_vec() })
            }
            INIT_EVENT_REQUEST => {
                require_len(body, 4, "INIT_EVENT_REQUEST")?;
                Ok(Packet::InitEventRequest { eventpipe_id: read_u32_le(body, 0) })
            }
            INIT_EVENT_ACK => Ok(Packet::InitEventAck),
            CMD_REQUEST => {
                require_len(body, 10, "CMD_REQUEST")?;
                let opcode = read_u16_le(body, 4);
                let transaction_id = read_u32_le(body, 6);
                let params = read_params(body, 10, MAX_PARAMS)?;
                Ok(Packet::CmdRequest { opcode, transaction_id, params })
            }
            CMD_RESPONSE => {
                require_len(body, 6, "CMD_RESPONSE")?;
                let resp_code = read_u16_le(body, 0);
                let transaction_id = read_u32_le(body, 2);
                let params = read_params(body, 6, MAX_PARAMS)?;
                Ok(Packet::CmdResponse { resp_code, transaction_id, params })
            }
            START_DATA_PACKET => {
                require_len(body, 8, "START_DATA_PACKET")?;
                let transaction_id = read_u32_le(body, 0);
                let total_len = read_u32_le(body, 4);
                Ok(Packet::StartDataPacket { transaction_id, total_len })
            }
            DATA_PACKET => {
                require_len(body, 4, "DATA_PACKET")?;
                Ok(Packet::DataPacket {
                    transaction_id: read_u32_le(body, 0),
                    payload: body[4..].to_vec(),
                })
            }
            END_DATA_PACKET => {
                require_len(body, 4, "END_DATA_PACKET")?;
                Ok(Packet::EndDataPacket {
                    transaction_id: read_u32_le(body, 0),
                    payload: body[4..].to_vec(),
                })
            }
            EVENT => {
                require_len(body, 6, "EVENT")?;
                let evt_code = read_u16_le(body, 0);
                let transaction_id = read_u32_le(body, 2);
                let params = read_params(body, 6, 3)?;
                Ok(Packet::Event { evt_code, transaction_id, params })
            }
            PING => Ok(Packet::Ping),
            PONG => Ok(Packet::Pong),
            CANCEL_TRANSACTION => {
                require_len(body, 4, "CANCEL_TRANSACTION")?;
                Ok(Packet::CancelTransaction { transaction_id: read_u32_le(body, 0) })
            }
            other => Err(Error::protocol(format!("unknown PTP/IP packet type {other}"))),
        }
    }
}

fn frame(packet_type: u32, body: &[u8]) -> Vec<u8> {
    let header = PtpIpHeader {
        length: (HEADER_SIZE + body.len()) as u32,
        packet_type,
    };
    let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(body);
    out
}

fn require_len(body: &[u8], min: usize, kind: &str) -> Result<(), Error> {
    if body.len() < min {
        return Err(Error::protocol(format!(
            "{kind} body too short: got {} bytes, need at least {min}",
            body.len()
        )));
    }
    Ok(())
}

/// Infers the parameter count from the residual body length past `offset`
/// and reads that many 4-byte parameters, capped at `max`.
fn read_params(body: &[u8], offset: usize, max: usize) -> Result<Vec<u32>, Error> {
    let residual = body.len() - offset;
    if residual % 4 != 0 {
        return Err(Error::protocol(format!(
            "parameter block is {residual} bytes, not a multiple of 4"
        )));
    }
    let n = residual / 4;
    if n > max {
        return Err(Error::protocol(format!(
            "{n} parameters exceeds the maximum of {max}"
        )));
    }
    let mut params = Vec::with_capacity(n);
    for i in 0..n {
        params.push(read_u32_le(body, offset + i * 4));
    }
    Ok(params)
}

/// Reads one full frame off `stream`: the 8-byte header, then its declared
/// body. Used by every component that reads PTP/IP packets off a socket.
pub fn read_frame(stream: &mut impl std::io::Read) -> Result<Packet, Error> {
    let mut header_buf = [0u8; HEADER_SIZE];
    crate::ioutil::read_exact(stream, &mut header_buf)?;
    let header = PtpIpHeader::decode(&header_buf)?;
    let mut body = vec![0u8; header.body_len()];
    crate::ioutil::read_exact(stream, &mut body)?;
    Packet::decode(&header, &body)
}
