mod common;

use common::{ak_frame, ScriptedChannel};
use pretty_assertions::assert_eq;
use std::thread;
use std::time::{Duration, Instant};

use stationlink_core::protocol::ak::{decode_response, encode_request, AkRequest};
use stationlink_core::protocol::{AkAssembler, ConnectionState, ProtocolError};

#[test]
fn test_echo_fixtures_recover_command_and_arguments() {
    let cases = [("ASTS", "0", ""), ("STAM", "0", "11"), ("ATSP", "2", "7")];
    for (command, channel, data) in cases {
        let frame = decode_response(&encode_request(command, channel, data)).unwrap();
        assert_eq!(frame.command(), command);
        assert_eq!(frame.tokens()[1], format!("K{channel}"));
        if !data.is_empty() {
            assert_eq!(frame.tokens()[2], data);
        }
    }
}

#[test]
fn test_framing_failures_never_yield_tokens() {
    let cases: [&[u8]; 4] = [b"ASTS 0 2", b"\x02 ASTS 0 2", b"ASTS 0 2\x03", b"\x03 ASTS\x02"];
    for raw in cases {
        assert!(matches!(decode_response(raw), Err(ProtocolError::Framing(_))));
    }
}

#[test]
fn test_exchange_reassembles_split_reply() {
    let channel = ScriptedChannel::new().with_chunk_size(3);
    channel.reply_ak(" ASTS 0 2");
    let mut connection = channel.connection(500);

    let raw = connection
        .exchange(&AkRequest::new("ASTS").to_bytes(), &mut AkAssembler::default())
        .unwrap();

    assert_eq!(raw, ak_frame(" ASTS 0 2"));
    assert_eq!(channel.written(), vec![b"\x02 ASTS K0 \x03".to_vec()]);
    let (tx_bytes, rx_bytes, tx_frames, rx_frames) = connection.get_counters();
    assert_eq!((tx_frames, rx_frames), (1, 1));
    assert_eq!(tx_bytes, 11);
    assert_eq!(rx_bytes, raw.len() as u64);
}

#[test]
fn test_exchange_times_out_without_retry() {
    let channel = ScriptedChannel::new();
    channel.silence();
    let mut connection = channel.connection(50);

    let start = Instant::now();
    let result = connection.exchange(b"\x02 ASTS K0 \x03", &mut AkAssembler::default());

    assert!(matches!(result, Err(ProtocolError::ResponseTimeout)));
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(channel.written().len(), 1);
    assert_eq!(connection.state(), ConnectionState::Connected);
}

#[test]
fn test_closer_cancels_in_flight_exchange() {
    let channel = ScriptedChannel::new();
    channel.silence();
    let mut connection = channel.connection(10_000);
    let closer = connection.closer().unwrap();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        closer.close();
    });

    let start = Instant::now();
    let result = connection.exchange(b"\x02 ACON K0 \x03", &mut AkAssembler::default());
    canceller.join().unwrap();

    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(connection.state(), ConnectionState::Closed);

    // Closed connections stay closed
    assert!(matches!(connection.send(b"x"), Err(ProtocolError::ConnectionClosed)));
}

#[test]
fn test_peer_hang_up_is_connection_closed() {
    let channel = ScriptedChannel::new();
    channel.silence();
    let mut connection = channel.connection(1000);
    let peer = channel.clone();

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        peer.hang_up();
    });

    assert!(matches!(
        connection.exchange(b"\x02 ASTS K0 \x03", &mut AkAssembler::default()),
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[test]
fn test_stale_bytes_do_not_leak_into_next_exchange() {
    let channel = ScriptedChannel::new();
    channel.feed(&ak_frame(" AERR 0"));
    channel.reply_ak(" ASTS 0 5");
    let mut connection = channel.connection(500);

    let raw = connection
        .exchange(b"\x02 ASTS K0 \x03", &mut AkAssembler::default())
        .unwrap();
    let frame = decode_response(&raw).unwrap();
    frame.expect_command("ASTS").unwrap();
}
