mod common;

use common::ScriptedChannel;
use pretty_assertions::assert_eq;

use stationlink_core::device::Sjh5Client;
use stationlink_core::protocol::packet::{checksum, encode_request, ACK, DEFAULT_ADDRESS, NAK};
use stationlink_core::protocol::{ChecksumPolicy, ProtocolError};
use stationlink_core::sink::{FieldValue, VecSink, SJH5_KIND};

fn ack(data: &[u8]) -> Vec<u8> {
    let mut frame = vec![ACK, data.len() as u8];
    frame.extend_from_slice(data);
    frame.push(checksum(&frame));
    frame
}

fn client(channel: &ScriptedChannel, policy: ChecksumPolicy) -> Sjh5Client<VecSink> {
    Sjh5Client::new(channel.connection(300), DEFAULT_ADDRESS, policy, VecSink::new())
}

#[test]
fn test_check_measurement_request_bytes() {
    assert_eq!(encode_request(0x11, 0x01), vec![0x11, 0x01, 0x01, 0xED]);
}

#[test]
fn test_every_request_sums_to_zero() {
    for address in [0x00u8, 0x11, 0xFE] {
        for command in 0..=0xFFu8 {
            let frame = encode_request(address, command);
            let sum = frame.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            assert_eq!(sum, 0);
        }
    }
}

#[test]
fn test_concentration_is_published() {
    let channel = ScriptedChannel::new().with_chunk_size(2);
    channel.reply(&ack(&[0x01, 0x01, 0x90, 0x21]));
    let mut sjh5 = client(&channel, ChecksumPolicy::Strict);

    let reading = sjh5.read_concentration().unwrap();

    assert_eq!(reading.concentration, 4.0);
    assert!(reading.status.warming_up);
    assert!(reading.status.high_humidity);
    assert_eq!(channel.written(), vec![vec![0x11, 0x01, 0x01, 0xED]]);

    let published: Vec<_> = sjh5.sink().of_kind(SJH5_KIND).collect();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].get("methane"), Some(&FieldValue::Float(4.0)));
    assert_eq!(published[0].get("warmUpStatus"), Some(&FieldValue::Bool(true)));
    assert_eq!(published[0].get("malFunctionStatus"), Some(&FieldValue::Bool(false)));
}

#[test]
fn test_nak_carries_device_code_and_publishes_nothing() {
    let channel = ScriptedChannel::new();
    let mut nak = vec![NAK, 0x02, 0x01, 0x03];
    nak.push(checksum(&nak));
    channel.reply(&nak);
    let mut sjh5 = client(&channel, ChecksumPolicy::Warn);

    assert!(matches!(
        sjh5.read_concentration(),
        Err(ProtocolError::DeviceNak { code: 0x03 })
    ));
    assert!(sjh5.sink().readings.is_empty());
}

#[test]
fn test_echo_mismatch_is_rejected() {
    let channel = ScriptedChannel::new();
    channel.reply(&ack(&[0x1E, b'V', b'1']));
    let mut sjh5 = client(&channel, ChecksumPolicy::Warn);

    assert!(matches!(
        sjh5.read_instrument_number(),
        Err(ProtocolError::UnexpectedCommand { .. })
    ));
}

#[test]
fn test_corrupt_checksum_depends_on_policy() {
    let mut corrupt = ack(&[0x01, 0x00, 0x64, 0x00]);
    *corrupt.last_mut().unwrap() ^= 0x5A;

    let lenient = ScriptedChannel::new();
    lenient.reply(&corrupt);
    let reading = client(&lenient, ChecksumPolicy::Warn).read_concentration().unwrap();
    assert_eq!(reading.concentration, 1.0);

    let strict = ScriptedChannel::new();
    strict.reply(&corrupt);
    assert!(matches!(
        client(&strict, ChecksumPolicy::Strict).read_concentration(),
        Err(ProtocolError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_identify() {
    let channel = ScriptedChannel::new();
    channel
        .reply(&ack(&[0x1F, 0, 12, 34, 56, 78]))
        .reply(&ack(&[0x1E, b'V', b'2', b'.', b'1']))
        .reply(&ack(&[0x0D, 0x00, 0x64, 0x00, 0x00, 0x01]));
    let mut sjh5 = client(&channel, ChecksumPolicy::Strict);

    let identity = sjh5.identify().unwrap();

    assert_eq!(identity.instrument_number, "00000012003400560078");
    assert_eq!(identity.software_version, "V2.1");
    assert_eq!(identity.property.range, 100.0);
    assert_eq!(identity.property.unit, "%");
    assert_eq!(identity.property.gas_type, "CH4/C3H8/CBrH3");
}

#[test]
fn test_leading_noise_is_skipped() {
    let channel = ScriptedChannel::new();
    let mut reply = vec![0xFF, 0x00];
    reply.extend(ack(&[0x01, 0x00, 0xC8, 0x00]));
    channel.reply(&reply);

    let reading = client(&channel, ChecksumPolicy::Strict).read_concentration().unwrap();
    assert_eq!(reading.concentration, 2.0);
}
