// Copyright 2024 ptpip-core contributors. All rights reserved.
// This software may be modified and distributed under the terms
// of the BSD license. See the LICENSE file for details.

use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream, UdpSocket};
use std::time::Duration;

use ptpip_core::broadcast::{start_broadcast, BroadcastConfig};
use ptpip_core::container::HostDescription;
use ptpip_core::guid::Guid;
use ptpip_core::pairing::{PairingCallbacks, PairingConfig, PairingListener};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Scenario 1: broadcast answer.
#[test]
fn broadcast_answer_matches_host_description() {
    init_tracing();
    let desc = HostDescription {
        guid: Guid::parse_hex(&"0011223344556677".repeat(2)).unwrap(),
        device_type: "win".to_string(),
        name: "MyPC".to_string(),
        port: 9309,
        mtp_protocol_version: 0x0123_0010,
        wireless_protocol_version: 0x0130_0010,
    };
    let bind_addr = (Ipv4Addr::LOCALHOST, 0).into();
    let handle = start_broadcast(BroadcastConfig::new(desc, bind_addr)).unwrap();
    let responder_addr = handle.local_addr();

    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let mut probe = b"SRCH * HTTP/1.1\r\n".to_vec();
    probe.push(0);
    client.send_to(&probe, responder_addr).unwrap();

    let mut buf = [0u8; 512];
    let (n, _) = client.recv_from(&mut buf).unwrap();
    let reply = String::from_utf8(buf[..n].to_vec()).unwrap();

    assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(reply.contains(&format!("host-id:{}\r\n", "0011223344556677".repeat(2))));
    assert!(reply.contains("host-type:win\r\n"));
    assert!(reply.contains("host-name:MyPC\r\n"));
    assert!(reply.contains("host-mtp-protocol-version:01230010\r\n"));
    assert!(reply.contains("host-request-port:9309\r\n"));
    assert!(reply.contains("host-wireless-protocol-version:01300010\r\n"));
    assert_eq!(*buf[..n].last().unwrap(), 0);

    handle.stop().unwrap();
}

/// Scenario 6: broadcaster stop frees the socket within one wakeup.
#[test]
fn broadcaster_stop_releases_the_socket() {
    init_tracing();
    let desc = HostDescription {
        guid: Guid::ZERO,
        device_type: "win".to_string(),
        name: "MyPC".to_string(),
        port: 9309,
        mtp_protocol_version: 1,
        wireless_protocol_version: 1,
    };
    let bind_addr = (Ipv4Addr::LOCALHOST, 0).into();
    let handle = start_broadcast(BroadcastConfig::new(desc, bind_addr)).unwrap();
    let addr = handle.local_addr();
    handle.stop().unwrap();

    UdpSocket::bind(addr).expect("port must be free immediately after stop");
}

fn free_pairing_listener(registered: bool) -> (PairingListener, SocketAddrV4) {
    let bind_addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0);
    let callbacks = PairingCallbacks {
        is_registered: Box::new(move |_guid| registered),
        create_register_pin: Box::new(|_info| Ok(12345678)),
    };
    let listener = PairingListener::bind(PairingConfig::new(bind_addr), callbacks).unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Scenarios 2 and 3: an unknown device is rejected, then successfully
/// paired on a second connection with the correct PIN.
#[test]
fn unknown_device_rejected_then_paired() {
    init_tracing();
    let (mut listener, addr) = free_pairing_listener(false);
    let guid_hex = "DEADBEEF".repeat(4);

    let rejected = {
        let guid_hex = guid_hex.clone();
        std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            write!(
                stream,
                "CONNECT * HTTP/1.1\r\ndevice-id:{guid_hex}\r\ndevice-port:9310\r\n\r\n"
            )
            .unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            line
        })
    };
    let first = listener.get_wireless_device(Duration::from_millis(500)).unwrap();
    assert!(first.is_none());
    assert!(rejected.join().unwrap().starts_with("HTTP/1.1 605 NG"));

    let pairing = {
        let guid_hex = guid_hex.clone();
        std::thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            write!(
                stream,
                "CONNECT * HTTP/1.1\r\ndevice-id:{guid_hex}\r\ndevice-port:9310\r\n\r\n"
            )
            .unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();

            write!(
                stream,
                "SHOWPIN * HTTP/1.1\r\ndevice-id:{guid_hex}\r\ndevice-name:Phone\r\n\r\n"
            )
            .unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.starts_with("HTTP/1.1 200 OK"));

            write!(stream, "REGISTER * HTTP/1.1\r\npin-code:12345678\r\n\r\n").unwrap();
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.starts_with("HTTP/1.1 200 OK"));

            write!(stream, "STANDBY * HTTP/1.1\r\n\r\n").unwrap();
        })
    };
    let second = listener.get_wireless_device(Duration::from_secs(2)).unwrap();
    pairing.join().unwrap();

    assert!(!second.is_none());
    assert!(second.registered);
    assert_eq!(second.guid, Guid::parse_hex(&guid_hex).unwrap());
    assert_eq!(second.data_port, 9310);
}

/// Scenario 4: the PTP/IP INIT_COMMAND/INIT_EVENT handshake over a raw
/// loopback listener standing in for the device.
#[test]
fn ptpip_handshake_against_loopback_device() {
    init_tracing();
    use ptpip_core::framing::{read_frame, Packet};

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = match listener.local_addr().unwrap() {
        std::net::SocketAddr::V4(v4) => v4,
        _ => unreachable!(),
    };

    let device = std::thread::spawn(move || {
        let (mut cmd_sock, _) = listener.accept().unwrap();
        match read_frame(&mut cmd_sock).unwrap() {
            Packet::InitCommandRequest { guid, .. } => assert_eq!(guid, Guid::ZERO),
            other => panic!("unexpected {other:?}"),
        }
        let ack = Packet::InitCommandAck {
            eventpipe_id: 1,
            guid: Guid::ZERO,
            name_utf16le: vec![],
        };
        cmd_sock.write_all(&ack.encode()).unwrap();

        let (mut evt_sock, _) = listener.accept().unwrap();
        match read_frame(&mut evt_sock).unwrap() {
            Packet::InitEventRequest { eventpipe_id } => assert_eq!(eventpipe_id, 1),
            other => panic!("unexpected {other:?}"),
        }
        let ack = Packet::InitEventAck;
        evt_sock.write_all(&ack.encode()).unwrap();

        // Stand in for OpenSession's CMD_REQUEST/CMD_RESPONSE pair.
        match read_frame(&mut cmd_sock).unwrap() {
            Packet::CmdRequest { transaction_id, .. } => {
                let resp = Packet::CmdResponse { resp_code: 0x2001, transaction_id, params: vec![] };
                cmd_sock.write_all(&resp.encode()).unwrap();
            }
            other => panic!("unexpected {other:?}"),
        }
    });

    let session = ptpip_core::session::PtpIpSession::connect(*addr.ip(), addr.port(), Guid::ZERO);
    device.join().unwrap();
    let session = session.unwrap();
    assert_eq!(session.eventpipe_id(), 1);
}

/// Scenario 5: a 65,536-byte data phase fragments as CMD_REQUEST,
/// START_DATA_PACKET, one full DATA_PACKET chunk, then END_DATA_PACKET.
#[test]
fn data_phase_round_trip_through_loopback() {
    init_tracing();
    use ptpip_core::framing::{read_frame, Packet};
    use ptpip_core::transport::OperationTransport;

    let cmd_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let cmd_addr = cmd_listener.local_addr().unwrap();
    let evt_listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let evt_addr = evt_listener.local_addr().unwrap();

    let device = std::thread::spawn(move || {
        let (mut cmd_sock, _) = cmd_listener.accept().unwrap();

        match read_frame(&mut cmd_sock).unwrap() {
            Packet::CmdRequest { transaction_id, .. } => {
                let total = 65_536u32;
                let start = Packet::StartDataPacket { transaction_id, total_len: total };
                cmd_sock.write_all(&start.encode()).unwrap();

                let chunk = vec![0xABu8; 32756];
                let data = Packet::DataPacket { transaction_id, payload: chunk };
                cmd_sock.write_all(&data.encode()).unwrap();

                let tail = vec![0xCDu8; 65_536 - 32756];
                let end = Packet::EndDataPacket { transaction_id, payload: tail };
                cmd_sock.write_all(&end.encode()).unwrap();

                let resp = Packet::CmdResponse { resp_code: 0x2001, transaction_id, params: vec![] };
                cmd_sock.write_all(&resp.encode()).unwrap();
            }
            other => panic!("unexpected {other:?}"),
        }
    });

    let cmd_sock = TcpStream::connect(cmd_addr).unwrap();
    // The device side only ever accepts the command socket in this test; an
    // event socket is still required to build a transport.
    let evt_client = TcpStream::connect(evt_addr).unwrap();
    let (_evt_sock, _) = evt_listener.accept().unwrap();

    let container = ptpip_core::container::PtpContainer::new(0x1009, 7, &[]);
    let mut transport = OperationTransport::new(cmd_sock, evt_client).unwrap();
    transport.sendreq(&container).unwrap();

    let mut received = Vec::new();
    transport
        .getdata(&container, &mut |chunk: &[u8]| {
            received.extend_from_slice(chunk);
            Ok(())
        })
        .unwrap();

    device.join().unwrap();
    transport.getresp(&container).unwrap();

    assert_eq!(received.len(), 65_536);
    assert!(received[..32756].iter().all(|&b| b == 0xAB));
    assert!(received[32756..].iter().all(|&b| b == 0xCD));
}
