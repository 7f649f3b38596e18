//! Gasera One response decoding
//!
//! Each AK mnemonic maps to one entry in a dispatch table: a field-count
//! policy plus a decode function working on a [`TokenCursor`] positioned just
//! after the echoed command. Commands are deliberately inconsistent about
//! strictness: most tolerate short frames with per-field defaults, while the
//! last-measurement frame must have an exact token count.

use crate::protocol::ak::{unquote, AkFrame};
use crate::protocol::{AkCommand, ProtocolError};
use crate::sink::FieldValue;

use super::cursor::{parse_f64, parse_i64, TokenCursor};
use super::tables::{device_status_label, gas_for_cas, measurement_status_label};

/// Number of task and sampler slots surfaced as individual fields
pub const SLOT_COUNT: usize = 5;

/// Exact token count of a last-measurement frame: command, error status and
/// five (timestamp, CAS number, concentration) triples
pub const MEASUREMENT_TOKEN_COUNT: usize = 17;

/// Whether a command tolerates frames of any length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Missing optional fields take documented defaults
    Loose,
    /// Frame must have exactly this many tokens, command included
    Exact(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub error_status: i64,
    pub code: i64,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveErrors {
    pub error_status: i64,
    /// Every reported error code
    pub codes: Vec<i64>,
}

impl ActiveErrors {
    /// Error code in slot `index`, 0 when not reported
    pub fn slot(&self, index: usize) -> i64 {
        self.codes.get(index).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementTask {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub error_status: i64,
    pub tasks: Vec<MeasurementTask>,
}

impl TaskList {
    /// Task id and name in slot `index`, `("-1", "NT")` when empty
    pub fn slot(&self, index: usize) -> (&str, &str) {
        self.tasks
            .get(index)
            .map(|t| (t.id.as_str(), t.name.as_str()))
            .unwrap_or(("-1", "NT"))
    }
}

/// Task list answer: the device either lists its tasks or reports it could not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListOutcome {
    Tasks(TaskList),
    UnableToRetrieveTaskList { error_status: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementStatus {
    pub error_status: i64,
    pub code: i64,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceName {
    pub error_status: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationNumber {
    pub error_status: i64,
    pub iteration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub error_status: i64,
    pub use_dhcp: i64,
    pub ip_address: String,
    pub netmask: String,
    pub gateway: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDateTime {
    pub error_status: i64,
    pub date_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerParameters {
    pub error_status: i64,
    pub parameters: Vec<String>,
}

impl SamplerParameters {
    /// Parameter in slot `index`, "NP" when not present
    pub fn slot(&self, index: usize) -> &str {
        self.parameters.get(index).map(String::as_str).unwrap_or("NP")
    }
}

/// A system parameter value: integer when it parses as one, float otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl From<ParameterValue> for FieldValue {
    fn from(v: ParameterValue) -> Self {
        match v {
            ParameterValue::Int(i) => FieldValue::Int(i),
            ParameterValue::Float(f) => FieldValue::Float(f),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemParameters {
    pub error_status: i64,
    pub parameters: Vec<(String, ParameterValue)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskParameters {
    pub error_status: i64,
    pub cas_numbers: Vec<String>,
    pub target_pressure: i64,
    pub flush_time_bypass: i64,
    pub flush_time_cell: i64,
    pub cell_flush_cycles: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub error_status: i64,
    pub manufacturer: String,
    pub serial_number: String,
    pub device_name: String,
    pub firmware_version: String,
}

/// Bare acknowledgement of an action command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandAck {
    pub error_status: i64,
}

impl CommandAck {
    pub fn is_success(&self) -> bool {
        self.error_status == 0
    }
}

/// Outcome of the device self-test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestResult {
    NotStarted,
    InProgress,
    Failed,
    Succeeded,
}

impl SelfTestResult {
    pub fn from_code(code: i64) -> Result<Self, ProtocolError> {
        match code {
            -2 => Ok(SelfTestResult::NotStarted),
            -1 => Ok(SelfTestResult::InProgress),
            0 => Ok(SelfTestResult::Failed),
            1 => Ok(SelfTestResult::Succeeded),
            other => Err(ProtocolError::UnknownResult(other)),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            SelfTestResult::NotStarted => -2,
            SelfTestResult::InProgress => -1,
            SelfTestResult::Failed => 0,
            SelfTestResult::Succeeded => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SelfTestResult::NotStarted => "Self-test not started",
            SelfTestResult::InProgress => "Self-test in progress",
            SelfTestResult::Failed => "Self-test failed",
            SelfTestResult::Succeeded => "Self-test completed successfully",
        }
    }

    /// Whether polling should stop
    pub fn is_final(&self) -> bool {
        matches!(self, SelfTestResult::Failed | SelfTestResult::Succeeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    pub error_status: i64,
    pub result: SelfTestResult,
}

/// One gas concentration from the last measurement
#[derive(Debug, Clone, PartialEq)]
pub struct GasConcentration {
    /// Device timestamp, seconds since the Unix epoch
    pub timestamp: i64,
    pub cas_number: String,
    pub gas: &'static str,
    pub concentration_ppm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementResults {
    pub error_status: i64,
    pub concentrations: Vec<GasConcentration>,
}

impl MeasurementResults {
    /// Timestamp of the measurement (that of its first triple)
    pub fn timestamp(&self) -> i64 {
        self.concentrations.first().map(|c| c.timestamp).unwrap_or_default()
    }
}

/// A typed Gasera One response
#[derive(Debug, Clone, PartialEq)]
pub enum GaseraResponse {
    DeviceStatus(DeviceStatus),
    ActiveErrors(ActiveErrors),
    TaskList(TaskListOutcome),
    MeasurementStatus(MeasurementStatus),
    DeviceName(DeviceName),
    IterationNumber(IterationNumber),
    NetworkSettings(NetworkSettings),
    DeviceDateTime(DeviceDateTime),
    SamplerParameters(SamplerParameters),
    SystemParameters(SystemParameters),
    TaskParameters(TaskParameters),
    DeviceInfo(DeviceInfo),
    SelfTestStarted(CommandAck),
    SelfTestResult(SelfTestReport),
    MeasurementStopped(CommandAck),
    MeasurementStarted(CommandAck),
    LastMeasurementResults(MeasurementResults),
}

impl GaseraResponse {
    /// The command this response answers
    pub fn command(&self) -> AkCommand {
        match self {
            GaseraResponse::DeviceStatus(_) => AkCommand::DeviceStatus,
            GaseraResponse::ActiveErrors(_) => AkCommand::ActiveErrors,
            GaseraResponse::TaskList(_) => AkCommand::TaskList,
            GaseraResponse::MeasurementStatus(_) => AkCommand::MeasurementStatus,
            GaseraResponse::DeviceName(_) => AkCommand::DeviceName,
            GaseraResponse::IterationNumber(_) => AkCommand::IterationNumber,
            GaseraResponse::NetworkSettings(_) => AkCommand::NetworkSettings,
            GaseraResponse::DeviceDateTime(_) => AkCommand::DeviceDateTime,
            GaseraResponse::SamplerParameters(_) => AkCommand::SamplerParameters,
            GaseraResponse::SystemParameters(_) => AkCommand::SystemParameters,
            GaseraResponse::TaskParameters(_) => AkCommand::TaskParameters,
            GaseraResponse::DeviceInfo(_) => AkCommand::DeviceInfo,
            GaseraResponse::SelfTestStarted(_) => AkCommand::StartSelfTest,
            GaseraResponse::SelfTestResult(_) => AkCommand::SelfTestResult,
            GaseraResponse::MeasurementStopped(_) => AkCommand::StopMeasurement,
            GaseraResponse::MeasurementStarted(_) => AkCommand::StartMeasurement,
            GaseraResponse::LastMeasurementResults(_) => AkCommand::LastMeasurementResults,
        }
    }

    /// Error status token reported by the device ("0" = success)
    pub fn error_status(&self) -> i64 {
        match self {
            GaseraResponse::DeviceStatus(r) => r.error_status,
            GaseraResponse::ActiveErrors(r) => r.error_status,
            GaseraResponse::TaskList(TaskListOutcome::Tasks(r)) => r.error_status,
            GaseraResponse::TaskList(TaskListOutcome::UnableToRetrieveTaskList { error_status }) => {
                *error_status
            }
            GaseraResponse::MeasurementStatus(r) => r.error_status,
            GaseraResponse::DeviceName(r) => r.error_status,
            GaseraResponse::IterationNumber(r) => r.error_status,
            GaseraResponse::NetworkSettings(r) => r.error_status,
            GaseraResponse::DeviceDateTime(r) => r.error_status,
            GaseraResponse::SamplerParameters(r) => r.error_status,
            GaseraResponse::SystemParameters(r) => r.error_status,
            GaseraResponse::TaskParameters(r) => r.error_status,
            GaseraResponse::DeviceInfo(r) => r.error_status,
            GaseraResponse::SelfTestStarted(r)
            | GaseraResponse::MeasurementStopped(r)
            | GaseraResponse::MeasurementStarted(r) => r.error_status,
            GaseraResponse::SelfTestResult(r) => r.error_status,
            GaseraResponse::LastMeasurementResults(r) => r.error_status,
        }
    }

    /// Publishable fields, in record order, starting with the error status
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = vec![field("errorStatus", self.error_status())];

        match self {
            GaseraResponse::DeviceStatus(r) => fields.push(field("deviceStatus", r.code)),
            GaseraResponse::ActiveErrors(r) => {
                for i in 0..SLOT_COUNT {
                    fields.push(field(&format!("activeError{i}"), r.slot(i)));
                }
            }
            GaseraResponse::TaskList(TaskListOutcome::Tasks(r)) => {
                for i in 0..SLOT_COUNT {
                    let (id, name) = r.slot(i);
                    fields.push(field(&format!("taskID{i}"), id));
                    fields.push(field(&format!("taskName{i}"), name));
                }
            }
            GaseraResponse::TaskList(TaskListOutcome::UnableToRetrieveTaskList { .. }) => {}
            GaseraResponse::MeasurementStatus(r) => {
                fields.push(field("measurementStatusCode", r.code))
            }
            GaseraResponse::DeviceName(r) => fields.push(field("gaseraName", r.name.as_str())),
            GaseraResponse::IterationNumber(r) => fields.push(field("iterationNumber", r.iteration)),
            GaseraResponse::NetworkSettings(r) => {
                fields.push(field("useDHCP", r.use_dhcp));
                fields.push(field("ip", r.ip_address.as_str()));
                fields.push(field("netmask", r.netmask.as_str()));
                fields.push(field("gateway", r.gateway.as_str()));
            }
            GaseraResponse::DeviceDateTime(r) => {
                fields.push(field("gaseraDateTime", r.date_time.as_str()))
            }
            GaseraResponse::SamplerParameters(r) => {
                for i in 0..SLOT_COUNT {
                    fields.push(field(&format!("parameter{i}"), r.slot(i)));
                }
            }
            GaseraResponse::SystemParameters(r) => {
                fields.extend(r.parameters.iter().map(|(k, v)| (k.clone(), FieldValue::from(*v))));
            }
            GaseraResponse::TaskParameters(r) => {
                fields.push(field("casNumbers", r.cas_numbers.join("_")));
                fields.push(field("targetPressure", r.target_pressure));
                fields.push(field("flushTimeBypass", r.flush_time_bypass));
                fields.push(field("flushTimeCell", r.flush_time_cell));
                fields.push(field("cellFlushCycles", r.cell_flush_cycles));
            }
            GaseraResponse::DeviceInfo(r) => {
                fields.push(field("manufacturer", r.manufacturer.as_str()));
                fields.push(field("serialNumber", r.serial_number.as_str()));
                fields.push(field("deviceName", r.device_name.as_str()));
                fields.push(field("firmwareVersion", r.firmware_version.as_str()));
            }
            GaseraResponse::SelfTestStarted(_)
            | GaseraResponse::MeasurementStopped(_)
            | GaseraResponse::MeasurementStarted(_) => {}
            GaseraResponse::SelfTestResult(r) => fields.push(field("selfTestResult", r.result.code())),
            GaseraResponse::LastMeasurementResults(r) => {
                fields.extend(
                    r.concentrations
                        .iter()
                        .map(|c| (c.gas.to_string(), FieldValue::Float(c.concentration_ppm))),
                );
            }
        }

        fields
    }
}

fn field(name: &str, value: impl Into<FieldValue>) -> (String, FieldValue) {
    (name.to_string(), value.into())
}

type DecodeFn = fn(&mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError>;

struct DecodeEntry {
    command: AkCommand,
    policy: FieldPolicy,
    decode: DecodeFn,
}

static DECODE_TABLE: [DecodeEntry; 17] = [
    DecodeEntry {
        command: AkCommand::DeviceStatus,
        policy: FieldPolicy::Loose,
        decode: decode_device_status,
    },
    DecodeEntry {
        command: AkCommand::ActiveErrors,
        policy: FieldPolicy::Loose,
        decode: decode_active_errors,
    },
    DecodeEntry {
        command: AkCommand::TaskList,
        policy: FieldPolicy::Loose,
        decode: decode_task_list,
    },
    DecodeEntry {
        command: AkCommand::MeasurementStatus,
        policy: FieldPolicy::Loose,
        decode: decode_measurement_status,
    },
    DecodeEntry {
        command: AkCommand::DeviceName,
        policy: FieldPolicy::Loose,
        decode: decode_device_name,
    },
    DecodeEntry {
        command: AkCommand::IterationNumber,
        policy: FieldPolicy::Loose,
        decode: decode_iteration_number,
    },
    DecodeEntry {
        command: AkCommand::NetworkSettings,
        policy: FieldPolicy::Loose,
        decode: decode_network_settings,
    },
    DecodeEntry {
        command: AkCommand::DeviceDateTime,
        policy: FieldPolicy::Loose,
        decode: decode_date_time,
    },
    DecodeEntry {
        command: AkCommand::SamplerParameters,
        policy: FieldPolicy::Loose,
        decode: decode_sampler_parameters,
    },
    DecodeEntry {
        command: AkCommand::SystemParameters,
        policy: FieldPolicy::Loose,
        decode: decode_system_parameters,
    },
    DecodeEntry {
        command: AkCommand::TaskParameters,
        policy: FieldPolicy::Loose,
        decode: decode_task_parameters,
    },
    DecodeEntry {
        command: AkCommand::DeviceInfo,
        policy: FieldPolicy::Loose,
        decode: decode_device_info,
    },
    DecodeEntry {
        command: AkCommand::StartSelfTest,
        policy: FieldPolicy::Loose,
        decode: decode_self_test_started,
    },
    DecodeEntry {
        command: AkCommand::SelfTestResult,
        policy: FieldPolicy::Loose,
        decode: decode_self_test_result,
    },
    DecodeEntry {
        command: AkCommand::StopMeasurement,
        policy: FieldPolicy::Loose,
        decode: decode_measurement_stopped,
    },
    DecodeEntry {
        command: AkCommand::StartMeasurement,
        policy: FieldPolicy::Loose,
        decode: decode_measurement_started,
    },
    DecodeEntry {
        command: AkCommand::LastMeasurementResults,
        policy: FieldPolicy::Exact(MEASUREMENT_TOKEN_COUNT),
        decode: decode_measurement_results,
    },
];

/// Field-count policy applied to a command's responses
pub fn field_policy(command: AkCommand) -> FieldPolicy {
    entry_for(command).policy
}

fn entry_for(command: AkCommand) -> &'static DecodeEntry {
    // Table is in catalog order, so every command has an entry
    DECODE_TABLE
        .iter()
        .find(|e| e.command == command)
        .unwrap_or(&DECODE_TABLE[0])
}

/// Decode a tokenized frame answering `expected`.
///
/// Fails with `UnexpectedCommand` if the echoed mnemonic differs, and with
/// `MalformedMeasurement` if an exact-length command has the wrong token count.
pub fn decode_frame(expected: AkCommand, frame: &AkFrame) -> Result<GaseraResponse, ProtocolError> {
    frame.expect_command(expected.mnemonic())?;

    let entry = entry_for(expected);
    if let FieldPolicy::Exact(count) = entry.policy {
        if frame.len() != count {
            return Err(ProtocolError::MalformedMeasurement {
                expected: count,
                actual: frame.len(),
            });
        }
    }

    let mut cursor = TokenCursor::new(&frame.tokens()[1..]);
    (entry.decode)(&mut cursor)
}

fn decode_device_status(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let code = c.next_i64_or("deviceStatus", -1)?;
    Ok(GaseraResponse::DeviceStatus(DeviceStatus {
        error_status,
        code,
        label: device_status_label(code),
    }))
}

fn decode_active_errors(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let codes = c
        .rest()
        .iter()
        .map(|t| parse_i64("activeError", t))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GaseraResponse::ActiveErrors(ActiveErrors { error_status, codes }))
}

fn decode_task_list(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    if error_status != 0 {
        return Ok(GaseraResponse::TaskList(TaskListOutcome::UnableToRetrieveTaskList {
            error_status,
        }));
    }

    let mut tasks = Vec::new();
    while !c.is_exhausted() {
        let id = c.next("taskID")?.to_string();
        let name = unquote(c.next("taskName")?).to_string();
        tasks.push(MeasurementTask { id, name });
    }
    Ok(GaseraResponse::TaskList(TaskListOutcome::Tasks(TaskList {
        error_status,
        tasks,
    })))
}

fn decode_measurement_status(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let code = c.next_i64_or("measurementStatus", -1)?;
    Ok(GaseraResponse::MeasurementStatus(MeasurementStatus {
        error_status,
        code,
        label: measurement_status_label(code),
    }))
}

fn decode_device_name(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let name = unquote(c.next_or("")).to_string();
    Ok(GaseraResponse::DeviceName(DeviceName { error_status, name }))
}

fn decode_iteration_number(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let iteration = c.next_i64_or("iterationNumber", -1)?;
    Ok(GaseraResponse::IterationNumber(IterationNumber {
        error_status,
        iteration,
    }))
}

fn decode_network_settings(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    Ok(GaseraResponse::NetworkSettings(NetworkSettings {
        error_status: c.next_i64("errorStatus")?,
        use_dhcp: c.next_i64("useDHCP")?,
        ip_address: c.next("ip")?.to_string(),
        netmask: c.next("netmask")?.to_string(),
        gateway: c.next("gateway")?.to_string(),
    }))
}

fn decode_date_time(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let date_time = c.next_or("Unknown").to_string();
    Ok(GaseraResponse::DeviceDateTime(DeviceDateTime {
        error_status,
        date_time,
    }))
}

fn decode_sampler_parameters(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let parameters = c.rest().to_vec();
    Ok(GaseraResponse::SamplerParameters(SamplerParameters {
        error_status,
        parameters,
    }))
}

/// Parse one `Key,Value` system parameter; `None` for NULL placeholders
pub fn parse_system_parameter(token: &str) -> Result<Option<(String, ParameterValue)>, ProtocolError> {
    let token = unquote(token);
    if token == "NULL" {
        return Ok(None);
    }

    let Some((key, value)) = token.split_once(',') else {
        tracing::debug!("Ignoring system parameter without value: {}", token);
        return Ok(None);
    };
    if value == "NULL" || value.is_empty() {
        return Ok(None);
    }

    let value = match parse_i64("systemParameter", value) {
        Ok(i) => ParameterValue::Int(i),
        Err(_) => ParameterValue::Float(parse_f64("systemParameter", value)?),
    };
    Ok(Some((key.to_string(), value)))
}

fn decode_system_parameters(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let mut parameters = Vec::new();
    for token in c.rest() {
        if let Some(parameter) = parse_system_parameter(token)? {
            parameters.push(parameter);
        }
    }
    Ok(GaseraResponse::SystemParameters(SystemParameters {
        error_status,
        parameters,
    }))
}

fn decode_task_parameters(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let cas_numbers = unquote(c.next("casNumbers")?)
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok(GaseraResponse::TaskParameters(TaskParameters {
        error_status,
        cas_numbers,
        target_pressure: c.next_i64("targetPressure")?,
        flush_time_bypass: c.next_i64("flushTimeBypass")?,
        flush_time_cell: c.next_i64("flushTimeCell")?,
        cell_flush_cycles: c.next_i64("cellFlushCycles")?,
    }))
}

fn decode_device_info(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    Ok(GaseraResponse::DeviceInfo(DeviceInfo {
        error_status: c.next_i64("errorStatus")?,
        manufacturer: unquote(c.next("manufacturer")?).to_string(),
        serial_number: unquote(c.next("serialNumber")?).to_string(),
        device_name: unquote(c.next("deviceName")?).to_string(),
        firmware_version: unquote(c.next("firmwareVersion")?).to_string(),
    }))
}

fn decode_ack(c: &mut TokenCursor<'_>) -> Result<CommandAck, ProtocolError> {
    Ok(CommandAck {
        error_status: c.next_i64("errorStatus")?,
    })
}

fn decode_self_test_started(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    Ok(GaseraResponse::SelfTestStarted(decode_ack(c)?))
}

fn decode_measurement_stopped(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    Ok(GaseraResponse::MeasurementStopped(decode_ack(c)?))
}

fn decode_measurement_started(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    Ok(GaseraResponse::MeasurementStarted(decode_ack(c)?))
}

fn decode_self_test_result(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let result = SelfTestResult::from_code(c.next_i64("selfTestResult")?)?;
    Ok(GaseraResponse::SelfTestResult(SelfTestReport {
        error_status,
        result,
    }))
}

fn decode_measurement_results(c: &mut TokenCursor<'_>) -> Result<GaseraResponse, ProtocolError> {
    let error_status = c.next_i64("errorStatus")?;
    let mut concentrations = Vec::new();
    while !c.is_exhausted() {
        let timestamp = c.next_i64("timestamp")?;
        let cas_number = c.next("casNumber")?.to_string();
        let concentration_ppm = c.next_f64("concentration")?;
        concentrations.push(GasConcentration {
            timestamp,
            gas: gas_for_cas(&cas_number),
            cas_number,
            concentration_ppm,
        });
    }
    Ok(GaseraResponse::LastMeasurementResults(MeasurementResults {
        error_status,
        concentrations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ak::decode_response;

    fn frame(body: &str) -> AkFrame {
        let mut raw = vec![0x02];
        raw.extend_from_slice(body.as_bytes());
        raw.push(0x03);
        decode_response(&raw).unwrap()
    }

    #[test]
    fn test_table_covers_every_command() {
        for command in AkCommand::ALL {
            assert_eq!(entry_for(command).command, command);
        }
    }

    #[test]
    fn test_device_status_missing_code_is_unknown() {
        let response = decode_frame(AkCommand::DeviceStatus, &frame(" ASTS 0")).unwrap();
        match response {
            GaseraResponse::DeviceStatus(s) => {
                assert_eq!(s.code, -1);
                assert_eq!(s.label, "Unknown status");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_active_error_slots_default_to_zero() {
        let response = decode_frame(AkCommand::ActiveErrors, &frame(" AERR 0 8001 8002")).unwrap();
        let fields = response.fields();
        assert_eq!(fields[1], ("activeError0".to_string(), FieldValue::Int(8001)));
        assert_eq!(fields[3], ("activeError2".to_string(), FieldValue::Int(0)));
        assert_eq!(fields.len(), 1 + SLOT_COUNT);
    }

    #[test]
    fn test_task_list_pairs() {
        let response =
            decode_frame(AkCommand::TaskList, &frame(" ATSK 0 7 \"Calibration task\" 11 \"Methane\"")).unwrap();
        let GaseraResponse::TaskList(TaskListOutcome::Tasks(list)) = response else {
            panic!("expected tasks");
        };
        assert_eq!(list.tasks.len(), 2);
        assert_eq!(list.slot(0), ("7", "Calibration task"));
        assert_eq!(list.slot(4), ("-1", "NT"));
    }

    #[test]
    fn test_task_list_dangling_id_is_structural() {
        assert!(matches!(
            decode_frame(AkCommand::TaskList, &frame(" ATSK 0 7")),
            Err(ProtocolError::MissingField { field: "taskName", .. })
        ));
    }

    #[test]
    fn test_network_settings_are_mandatory() {
        assert!(matches!(
            decode_frame(AkCommand::NetworkSettings, &frame(" ANET 0 1 10.0.0.2")),
            Err(ProtocolError::MissingField { field: "netmask", .. })
        ));
    }

    #[test]
    fn test_defaults_for_name_iteration_and_clock() {
        let name = decode_frame(AkCommand::DeviceName, &frame(" ANAM 0")).unwrap();
        assert_eq!(name.fields()[1].1, FieldValue::Text(String::new()));

        let iteration = decode_frame(AkCommand::IterationNumber, &frame(" AITR 0")).unwrap();
        assert_eq!(iteration.fields()[1].1, FieldValue::Int(-1));

        let clock = decode_frame(AkCommand::DeviceDateTime, &frame(" ACLK 0")).unwrap();
        assert_eq!(clock.fields()[1].1, FieldValue::Text("Unknown".into()));
    }

    #[test]
    fn test_sampler_slots_default_to_np() {
        let response = decode_frame(AkCommand::SamplerParameters, &frame(" AMPS 0 1 2")).unwrap();
        let GaseraResponse::SamplerParameters(p) = response else {
            panic!("expected sampler parameters");
        };
        assert_eq!(p.slot(1), "2");
        assert_eq!(p.slot(2), "NP");
    }

    #[test]
    fn test_task_parameters() {
        let response =
            decode_frame(AkCommand::TaskParameters, &frame(" ATSP 0 74-82-8,124-38-9 1000 10 20 3")).unwrap();
        let GaseraResponse::TaskParameters(p) = response else {
            panic!("expected task parameters");
        };
        assert_eq!(p.cas_numbers, vec!["74-82-8", "124-38-9"]);
        assert_eq!(p.target_pressure, 1000);
        assert_eq!(p.cell_flush_cycles, 3);
        assert_eq!(response_field(&GaseraResponse::TaskParameters(p), "casNumbers"), "74-82-8_124-38-9");
    }

    fn response_field(response: &GaseraResponse, name: &str) -> String {
        response
            .fields()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.to_string())
            .unwrap_or_default()
    }

    #[test]
    fn test_device_info_strips_quotes() {
        let response = decode_frame(
            AkCommand::DeviceInfo,
            &frame(" ADEV 0 \"Gasera Ltd\" \"030109\" \"GASERA ONE\" \"1114\""),
        )
        .unwrap();
        let GaseraResponse::DeviceInfo(info) = response else {
            panic!("expected device info");
        };
        assert_eq!(info.manufacturer, "Gasera Ltd");
        assert_eq!(info.serial_number, "030109");
        assert_eq!(info.device_name, "GASERA ONE");
        assert_eq!(info.firmware_version, "1114");
    }

    #[test]
    fn test_self_test_codes() {
        assert_eq!(SelfTestResult::from_code(1).unwrap(), SelfTestResult::Succeeded);
        assert_eq!(SelfTestResult::from_code(-2).unwrap(), SelfTestResult::NotStarted);
        assert!(matches!(SelfTestResult::from_code(2), Err(ProtocolError::UnknownResult(2))));
        assert!(matches!(
            decode_frame(AkCommand::SelfTestResult, &frame(" ASTR 0 7")),
            Err(ProtocolError::UnknownResult(7))
        ));
    }

    #[test]
    fn test_ack_commands() {
        let response = decode_frame(AkCommand::StartMeasurement, &frame(" STAM 1")).unwrap();
        assert_eq!(response, GaseraResponse::MeasurementStarted(CommandAck { error_status: 1 }));
        assert_eq!(response.command(), AkCommand::StartMeasurement);
    }

    #[test]
    fn test_measurement_policy_is_exact() {
        assert_eq!(field_policy(AkCommand::LastMeasurementResults), FieldPolicy::Exact(17));
        assert_eq!(field_policy(AkCommand::DeviceStatus), FieldPolicy::Loose);
    }
}
