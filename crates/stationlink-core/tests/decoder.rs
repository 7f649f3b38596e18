mod common;

use common::{acon_body, ak_frame, ScriptedChannel};
use pretty_assertions::assert_eq;

use stationlink_core::config::{GaseraSettings, ProcedureTiming};
use stationlink_core::decode::gasera::{parse_system_parameter, ParameterValue};
use stationlink_core::decode::{
    decode_frame, gas_for_cas, GaseraResponse, SelfTestResult, TaskListOutcome, UNKNOWN_CAS_NUMBER,
};
use stationlink_core::device::GaseraClient;
use stationlink_core::protocol::ak::{decode_response, AkRequest};
use stationlink_core::protocol::{AkCommand, ProtocolError};
use stationlink_core::sink::{FieldValue, VecSink};

fn settings() -> GaseraSettings {
    GaseraSettings {
        command_spacing_ms: 0,
        timing: ProcedureTiming::immediate(),
        ..GaseraSettings::default()
    }
}

fn client(channel: &ScriptedChannel) -> GaseraClient<VecSink> {
    GaseraClient::new(channel.connection(300), settings(), VecSink::new())
}

fn decode(command: AkCommand, body: &str) -> Result<GaseraResponse, ProtocolError> {
    decode_frame(command, &decode_response(&ak_frame(body))?)
}

#[test]
fn test_status_idle_end_to_end() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ASTS 0 2 ");
    let mut gasera = client(&channel);

    let status = gasera.request_status().unwrap();

    assert_eq!(status.code, 2);
    assert_eq!(status.label, "Device idle state");
    assert_eq!(gasera.session().last_device_status, Some(2));
    assert_eq!(channel.written(), vec![b"\x02 ASTS K0 \x03".to_vec()]);

    let published: Vec<_> = gasera.sink().of_kind("GSR001ASTS").collect();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].get("errorStatus"), Some(&FieldValue::Int(0)));
    assert_eq!(published[0].get("deviceStatus"), Some(&FieldValue::Int(2)));
}

#[test]
fn test_status_malfunction() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ASTS 0 4");
    let status = client(&channel).request_status().unwrap();
    assert_eq!(status.label, "Malfunction");
}

#[test]
fn test_unmapped_status_is_sentinel_not_error() {
    let response = decode(AkCommand::DeviceStatus, " ASTS 0 42").unwrap();
    match response {
        GaseraResponse::DeviceStatus(status) => assert_eq!(status.label, "Unknown status"),
        other => panic!("unexpected response {other:?}"),
    }
}

#[test]
fn test_echo_of_another_command_is_rejected() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" AERR 0 0");
    let mut gasera = client(&channel);

    assert!(matches!(
        gasera.request_status(),
        Err(ProtocolError::UnexpectedCommand { .. })
    ));
    assert!(gasera.sink().readings.is_empty());
}

#[test]
fn test_measurement_token_count_is_exact() {
    let valid = acon_body(1_700_000_000);
    assert!(decode(AkCommand::LastMeasurementResults, &valid).is_ok());

    let short = valid.rsplit_once(' ').map(|(head, _)| head.to_string()).unwrap();
    assert!(matches!(
        decode(AkCommand::LastMeasurementResults, &short),
        Err(ProtocolError::MalformedMeasurement { expected: 17, actual: 16 })
    ));

    let long = format!("{valid} 12");
    assert!(matches!(
        decode(AkCommand::LastMeasurementResults, &long),
        Err(ProtocolError::MalformedMeasurement { expected: 17, actual: 18 })
    ));
}

#[test]
fn test_measurement_gases_are_named_by_cas() {
    let response = decode(AkCommand::LastMeasurementResults, &acon_body(1_700_000_000)).unwrap();
    let GaseraResponse::LastMeasurementResults(results) = &response else {
        panic!("unexpected response {response:?}");
    };

    assert_eq!(results.timestamp(), 1_700_000_000);
    let gases: Vec<_> = results.concentrations.iter().map(|c| c.gas).collect();
    assert_eq!(gases, vec!["methane", "carbonDioxide", "nitrousOxide", "oxygen", "water"]);
    assert_eq!(results.concentrations[0].concentration_ppm, 1.92);

    let fields = response.fields();
    assert_eq!(fields[1], ("methane".to_string(), FieldValue::Float(1.92)));
}

#[test]
fn test_cas_lookup() {
    assert_eq!(gas_for_cas("74-82-8"), "methane");
    assert_eq!(gas_for_cas("7440-59-7"), UNKNOWN_CAS_NUMBER);
    assert_eq!(UNKNOWN_CAS_NUMBER, "unknownCASNumber");
}

#[test]
fn test_self_test_codes() {
    let expected = [
        (-2, SelfTestResult::NotStarted),
        (-1, SelfTestResult::InProgress),
        (0, SelfTestResult::Failed),
        (1, SelfTestResult::Succeeded),
    ];
    for (code, result) in expected {
        assert_eq!(SelfTestResult::from_code(code).unwrap(), result);
        assert_eq!(result.code(), code);
    }
    assert!(matches!(SelfTestResult::from_code(7), Err(ProtocolError::UnknownResult(7))));
    assert!(matches!(
        decode(AkCommand::SelfTestResult, " ASTR 0 3"),
        Err(ProtocolError::UnknownResult(3))
    ));
}

#[test]
fn test_system_parameter_values() {
    assert_eq!(
        parse_system_parameter("TargetPressure,850").unwrap(),
        Some(("TargetPressure".to_string(), ParameterValue::Int(850)))
    );
    assert_eq!(
        parse_system_parameter("PumpRate,6.5").unwrap(),
        Some(("PumpRate".to_string(), ParameterValue::Float(6.5)))
    );
    assert_eq!(parse_system_parameter("NULL").unwrap(), None);
    assert_eq!(parse_system_parameter("Offset,NULL").unwrap(), None);
    assert!(matches!(
        parse_system_parameter("PumpRate,fast"),
        Err(ProtocolError::InvalidNumber { .. })
    ));
}

#[test]
fn test_system_parameters_published_by_key() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ASYP 0 TargetPressure,850 PumpRate,6.5 NULL Offset,NULL");
    let mut gasera = client(&channel);

    let parameters = gasera.request_system_parameters().unwrap();
    assert_eq!(parameters.parameters.len(), 2);

    let reading = gasera.sink().of_kind("GSR001ASYP").next().unwrap();
    assert_eq!(reading.get("TargetPressure"), Some(&FieldValue::Int(850)));
    assert_eq!(reading.get("PumpRate"), Some(&FieldValue::Float(6.5)));
    assert_eq!(reading.get("Offset"), None);
}

#[test]
fn test_task_list_failure_is_an_outcome() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ATSK 1");
    let mut gasera = client(&channel);

    assert_eq!(
        gasera.request_task_list().unwrap(),
        TaskListOutcome::UnableToRetrieveTaskList { error_status: 1 }
    );
    let reading = gasera.sink().of_kind("GSR001ATSK").next().unwrap();
    assert_eq!(reading.get("errorStatus"), Some(&FieldValue::Int(1)));
    assert_eq!(reading.get("taskID0"), None);
}

#[test]
fn test_task_list_slots_padded() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ATSK 0 11 \"Calibration task\" 12 Flux");
    let mut gasera = client(&channel);

    gasera.request_task_list().unwrap();

    let reading = gasera.sink().of_kind("GSR001ATSK").next().unwrap();
    assert_eq!(reading.get("taskName0"), Some(&FieldValue::from("Calibration task")));
    assert_eq!(reading.get("taskID1"), Some(&FieldValue::from("12")));
    assert_eq!(reading.get("taskID4"), Some(&FieldValue::from("-1")));
    assert_eq!(reading.get("taskName4"), Some(&FieldValue::from("NT")));
}

#[test]
fn test_task_parameters_carry_task_id() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ATSP 0 74-82-8,124-38-9 850 10 20 3");
    let mut gasera = client(&channel);

    gasera.request_task_parameters().unwrap();

    assert_eq!(channel.written(), vec![b"\x02 ATSP K0 11\x03".to_vec()]);
    let reading = gasera.sink().of_kind("GSR001ATSP").next().unwrap();
    assert_eq!(reading.fields[1], ("taskID".to_string(), FieldValue::Int(11)));
    assert_eq!(reading.get("casNumbers"), Some(&FieldValue::from("74-82-8_124-38-9")));
    assert_eq!(reading.get("cellFlushCycles"), Some(&FieldValue::Int(3)));
}

#[test]
fn test_explicit_request_targets_other_task_and_channel() {
    let channel = ScriptedChannel::new();
    channel.reply_ak(" ATSP 0 74-82-8 850 10 20 3");
    let mut gasera = client(&channel);

    let request = AkRequest::new("ATSP").channel("1").data("7");
    gasera.execute_with(AkCommand::TaskParameters, &request).unwrap();

    assert_eq!(channel.written(), vec![b"\x02 ATSP K1 7\x03".to_vec()]);
    let reading = gasera.sink().of_kind("GSR001ATSP").next().unwrap();
    assert_eq!(reading.fields[1], ("taskID".to_string(), FieldValue::Int(7)));
}

#[test]
fn test_explicit_request_must_match_command() {
    let channel = ScriptedChannel::new();
    let mut gasera = client(&channel);

    let request = AkRequest::new("AERR");
    assert!(matches!(
        gasera.query_with(AkCommand::DeviceStatus, &request),
        Err(ProtocolError::UnexpectedCommand { .. })
    ));
    assert!(channel.written().is_empty());
}
