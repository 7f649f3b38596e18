//! Gasera One client
//!
//! Runs AK exchanges against the analyzer, keeps the [`DeviceSession`] up to
//! date and publishes every decoded response. Also sequences the bring-up,
//! periodic and daily procedures; when to run the latter two is up to the
//! caller, using the session's elapsed-time helpers.

use chrono::{DateTime, Utc};
use std::thread;
use std::time::Duration;

use crate::config::{GaseraSettings, ProcedureTiming};
use crate::decode::gasera::{
    ActiveErrors, CommandAck, DeviceDateTime, DeviceInfo, DeviceName, DeviceStatus, IterationNumber,
    MeasurementResults, MeasurementStatus, NetworkSettings, SamplerParameters, SelfTestReport,
    SystemParameters, TaskParameters,
};
use crate::decode::{decode_frame, GaseraResponse, SelfTestResult, TaskListOutcome};
use crate::protocol::ak::{self, AkRequest};
use crate::protocol::{
    connect_tcp, AkAssembler, AkCommand, Connection, ConnectionConfig, ProtocolError,
};
use crate::sink::{Reading, ReadingSink, CONNECTION_STATUS_KIND, GASERA_KIND_PREFIX};

use super::session::DeviceSession;

/// Connection status published when the analyzer socket is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected = 0,
    TimedOut = 1,
    Failed = 2,
}

/// Result of polling the last measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoll {
    pub results: MeasurementResults,
    /// False when the device had nothing newer than the last publication
    pub published: bool,
}

/// Client for one Gasera One analyzer
pub struct GaseraClient<S: ReadingSink> {
    session: DeviceSession,
    settings: GaseraSettings,
    assembler: AkAssembler,
    sink: S,
}

impl<S: ReadingSink> GaseraClient<S> {
    /// Open the analyzer socket described by `settings`.
    ///
    /// Publishes a connection status record whatever the outcome.
    pub fn connect(settings: GaseraSettings, mut sink: S) -> Result<Self, ProtocolError> {
        let opened = connect_tcp(&settings.host, settings.port, settings.connect_timeout()).and_then(|channel| {
            Connection::new(
                channel,
                ConnectionConfig::with_timeout_ms(settings.response_timeout_ms),
            )
        });

        let status = match &opened {
            Ok(_) => ConnectionStatus::Connected,
            Err(ProtocolError::ResponseTimeout) => ConnectionStatus::TimedOut,
            Err(_) => ConnectionStatus::Failed,
        };
        sink.publish(
            &Reading::new(Utc::now(), CONNECTION_STATUS_KIND)
                .field("hostIP", settings.host.as_str())
                .field("ConnectionStatus", status as i64),
        );

        match opened {
            Ok(connection) => Ok(Self::new(connection, settings, sink)),
            Err(e) => {
                tracing::warn!("Could not connect to Gasera One at {}:{}: {}", settings.host, settings.port, e);
                Err(e)
            }
        }
    }

    /// Wrap an already open connection
    pub fn new(connection: Connection, settings: GaseraSettings, sink: S) -> Self {
        Self {
            session: DeviceSession::new(connection),
            settings,
            assembler: AkAssembler::default(),
            sink,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn settings(&self) -> &GaseraSettings {
        &self.settings
    }

    /// Close the socket and hand back the sink
    pub fn disconnect(mut self) -> S {
        self.session.close();
        tracing::info!("Disconnected from Gasera One");
        self.sink
    }

    /// The request sent for `command`: default channel, plus the configured
    /// task id for commands that take one
    pub fn default_request(&self, command: AkCommand) -> AkRequest {
        let request = AkRequest::new(command.mnemonic());
        if command.takes_task_id() {
            request.data(self.settings.task_id.as_str())
        } else {
            request
        }
    }

    /// One request/response exchange, decoded but not published
    pub fn query(&mut self, command: AkCommand) -> Result<GaseraResponse, ProtocolError> {
        let request = self.default_request(command);
        self.query_with(command, &request)
    }

    /// Like [`query`](Self::query), with an explicit channel and data
    pub fn query_with(&mut self, command: AkCommand, request: &AkRequest) -> Result<GaseraResponse, ProtocolError> {
        if request.command() != command.mnemonic() {
            return Err(ProtocolError::UnexpectedCommand {
                expected: command.mnemonic().to_string(),
                actual: request.command().to_string(),
            });
        }

        if self.settings.command_spacing_ms > 0 {
            thread::sleep(Duration::from_millis(self.settings.command_spacing_ms));
        }

        let raw = self
            .session
            .connection()
            .exchange(&request.to_bytes(), &mut self.assembler)?;
        let frame = ak::decode_response(&raw)?;
        let response = decode_frame(command, &frame)?;

        self.record(&response);
        tracing::debug!("{} answered with error status {}", command, response.error_status());
        Ok(response)
    }

    /// Query and publish the response
    pub fn execute(&mut self, command: AkCommand) -> Result<GaseraResponse, ProtocolError> {
        let request = self.default_request(command);
        self.execute_with(command, &request)
    }

    /// Like [`execute`](Self::execute), with an explicit channel and data
    pub fn execute_with(&mut self, command: AkCommand, request: &AkRequest) -> Result<GaseraResponse, ProtocolError> {
        let response = self.query_with(command, request)?;
        if command != AkCommand::LastMeasurementResults {
            self.publish(Utc::now(), &response, request.argument());
        }
        Ok(response)
    }

    fn record(&mut self, response: &GaseraResponse) {
        match response {
            GaseraResponse::DeviceStatus(r) => self.session.last_device_status = Some(r.code),
            GaseraResponse::MeasurementStatus(r) => self.session.last_measurement_status = Some(r.code),
            GaseraResponse::IterationNumber(r) => self.session.iteration_number = r.iteration,
            GaseraResponse::SelfTestResult(r) => self.session.last_self_test = Some(r.result),
            _ => {}
        }
    }

    fn publish(&mut self, timestamp: DateTime<Utc>, response: &GaseraResponse, task_id: &str) {
        let kind = format!("{}{}", GASERA_KIND_PREFIX, response.command().mnemonic());
        let mut reading = Reading::new(timestamp, kind).with_fields(response.fields());

        if let GaseraResponse::TaskParameters(_) = response {
            let task_id = task_id.parse::<i64>().unwrap_or(-1);
            reading.fields.insert(1, ("taskID".to_string(), task_id.into()));
        }

        self.sink.publish(&reading);
    }

    pub fn request_status(&mut self) -> Result<DeviceStatus, ProtocolError> {
        match self.execute(AkCommand::DeviceStatus)? {
            GaseraResponse::DeviceStatus(r) => Ok(r),
            other => Err(mismatch(AkCommand::DeviceStatus, &other)),
        }
    }

    pub fn request_active_errors(&mut self) -> Result<ActiveErrors, ProtocolError> {
        match self.execute(AkCommand::ActiveErrors)? {
            GaseraResponse::ActiveErrors(r) => Ok(r),
            other => Err(mismatch(AkCommand::ActiveErrors, &other)),
        }
    }

    pub fn request_task_list(&mut self) -> Result<TaskListOutcome, ProtocolError> {
        match self.execute(AkCommand::TaskList)? {
            GaseraResponse::TaskList(r) => Ok(r),
            other => Err(mismatch(AkCommand::TaskList, &other)),
        }
    }

    pub fn request_measurement_status(&mut self) -> Result<MeasurementStatus, ProtocolError> {
        match self.execute(AkCommand::MeasurementStatus)? {
            GaseraResponse::MeasurementStatus(r) => Ok(r),
            other => Err(mismatch(AkCommand::MeasurementStatus, &other)),
        }
    }

    pub fn request_name(&mut self) -> Result<DeviceName, ProtocolError> {
        match self.execute(AkCommand::DeviceName)? {
            GaseraResponse::DeviceName(r) => Ok(r),
            other => Err(mismatch(AkCommand::DeviceName, &other)),
        }
    }

    pub fn request_iteration_number(&mut self) -> Result<IterationNumber, ProtocolError> {
        match self.execute(AkCommand::IterationNumber)? {
            GaseraResponse::IterationNumber(r) => Ok(r),
            other => Err(mismatch(AkCommand::IterationNumber, &other)),
        }
    }

    pub fn request_network_settings(&mut self) -> Result<NetworkSettings, ProtocolError> {
        match self.execute(AkCommand::NetworkSettings)? {
            GaseraResponse::NetworkSettings(r) => Ok(r),
            other => Err(mismatch(AkCommand::NetworkSettings, &other)),
        }
    }

    pub fn request_datetime(&mut self) -> Result<DeviceDateTime, ProtocolError> {
        match self.execute(AkCommand::DeviceDateTime)? {
            GaseraResponse::DeviceDateTime(r) => Ok(r),
            other => Err(mismatch(AkCommand::DeviceDateTime, &other)),
        }
    }

    pub fn request_sampler_parameters(&mut self) -> Result<SamplerParameters, ProtocolError> {
        match self.execute(AkCommand::SamplerParameters)? {
            GaseraResponse::SamplerParameters(r) => Ok(r),
            other => Err(mismatch(AkCommand::SamplerParameters, &other)),
        }
    }

    pub fn request_system_parameters(&mut self) -> Result<SystemParameters, ProtocolError> {
        match self.execute(AkCommand::SystemParameters)? {
            GaseraResponse::SystemParameters(r) => Ok(r),
            other => Err(mismatch(AkCommand::SystemParameters, &other)),
        }
    }

    pub fn request_task_parameters(&mut self) -> Result<TaskParameters, ProtocolError> {
        match self.execute(AkCommand::TaskParameters)? {
            GaseraResponse::TaskParameters(r) => Ok(r),
            other => Err(mismatch(AkCommand::TaskParameters, &other)),
        }
    }

    pub fn request_device_info(&mut self) -> Result<DeviceInfo, ProtocolError> {
        match self.execute(AkCommand::DeviceInfo)? {
            GaseraResponse::DeviceInfo(r) => Ok(r),
            other => Err(mismatch(AkCommand::DeviceInfo, &other)),
        }
    }

    pub fn start_self_test(&mut self) -> Result<CommandAck, ProtocolError> {
        match self.execute(AkCommand::StartSelfTest)? {
            GaseraResponse::SelfTestStarted(r) => Ok(r),
            other => Err(mismatch(AkCommand::StartSelfTest, &other)),
        }
    }

    pub fn request_self_test_result(&mut self) -> Result<SelfTestReport, ProtocolError> {
        match self.execute(AkCommand::SelfTestResult)? {
            GaseraResponse::SelfTestResult(r) => Ok(r),
            other => Err(mismatch(AkCommand::SelfTestResult, &other)),
        }
    }

    pub fn stop_measurement(&mut self) -> Result<CommandAck, ProtocolError> {
        match self.execute(AkCommand::StopMeasurement)? {
            GaseraResponse::MeasurementStopped(r) => Ok(r),
            other => Err(mismatch(AkCommand::StopMeasurement, &other)),
        }
    }

    pub fn start_measurement(&mut self) -> Result<CommandAck, ProtocolError> {
        match self.execute(AkCommand::StartMeasurement)? {
            GaseraResponse::MeasurementStarted(r) => Ok(r),
            other => Err(mismatch(AkCommand::StartMeasurement, &other)),
        }
    }

    /// Fetch the last measurement, publishing it only if it is newer than
    /// the previous publication. Refreshes the iteration number first.
    pub fn request_last_measurement_results(&mut self) -> Result<MeasurementPoll, ProtocolError> {
        self.request_iteration_number()?;

        let results = match self.query(AkCommand::LastMeasurementResults)? {
            GaseraResponse::LastMeasurementResults(r) => r,
            other => return Err(mismatch(AkCommand::LastMeasurementResults, &other)),
        };

        let timestamp = DateTime::from_timestamp(results.timestamp(), 0).unwrap_or_else(Utc::now);
        let published = self.session.advance_published(timestamp);
        if published {
            let response = GaseraResponse::LastMeasurementResults(results.clone());
            let kind = format!("{}{}", GASERA_KIND_PREFIX, AkCommand::LastMeasurementResults.mnemonic());
            let reading = Reading::new(timestamp, kind)
                .with_fields(response.fields())
                .field("iterationNumber", self.session.iteration_number)
                .field("elapsedTime", self.session.elapsed_since_start().as_secs() as i64)
                .field(
                    "elapsedTimeSinceDailyCheck",
                    self.session.elapsed_since_daily_check().as_secs() as i64,
                )
                .field(
                    "elapsedTimePeriodicCheck",
                    self.session.elapsed_since_periodic_check().as_secs() as i64,
                );
            self.sink.publish(&reading);
            tracing::info!("New measurement from Gasera One at {}", timestamp);
        } else {
            tracing::debug!("No new measurement from Gasera One");
        }

        Ok(MeasurementPoll { results, published })
    }

    fn timing(&self) -> &ProcedureTiming {
        &self.settings.timing
    }

    fn settle(&self, secs: u64, step: &str) {
        if secs > 0 {
            tracing::debug!("Waiting {}s {}", secs, step);
            thread::sleep(Duration::from_secs(secs));
        }
    }

    /// Start the self-test and poll its result until it completes or the
    /// poll budget runs out
    pub fn run_self_test(&mut self) -> Result<SelfTestResult, ProtocolError> {
        let ack = self.start_self_test()?;
        if !ack.is_success() {
            tracing::warn!("Self-test start rejected with error status {}", ack.error_status);
        }
        self.settle(self.timing().self_test_secs, "for the self-test");

        let max_polls = self.timing().self_test_max_polls.max(1);
        let mut result = SelfTestResult::NotStarted;
        for poll in 1..=max_polls {
            result = self.request_self_test_result()?.result;
            if result.is_final() {
                break;
            }
            tracing::debug!("Self-test poll {}/{}: {}", poll, max_polls, result.label());
            if poll < max_polls {
                self.settle(self.timing().self_test_poll_secs, "before polling the self-test again");
            }
        }

        tracing::info!("{}", result.label());
        Ok(result)
    }

    /// Bring the analyzer from any state to a running measurement: stop,
    /// full query sweep, self-test, start.
    pub fn bring_up(&mut self) -> Result<SelfTestResult, ProtocolError> {
        tracing::info!("Running Gasera One start-up sequence");
        self.settle(self.timing().initial_settle_secs, "before start-up");
        self.stop_measurement()?;
        self.settle(self.timing().after_stop_secs, "after stopping the measurement");

        self.request_status()?;
        self.request_active_errors()?;
        if let TaskListOutcome::UnableToRetrieveTaskList { error_status } = self.request_task_list()? {
            tracing::warn!("Unable to retrieve task list (error status {})", error_status);
        }
        self.request_measurement_status()?;
        self.request_name()?;
        self.request_iteration_number()?;
        self.request_network_settings()?;
        self.request_datetime()?;
        self.request_sampler_parameters()?;
        self.request_system_parameters()?;
        self.request_task_parameters()?;
        self.request_device_info()?;

        let result = self.run_self_test()?;
        self.settle(self.timing().after_self_test_secs, "after the self-test");

        self.start_measurement()?;
        self.settle(self.timing().after_start_secs, "after starting the measurement");
        tracing::info!("Gasera One start-up sequence complete");
        Ok(result)
    }

    /// Light health check: measurement status, network settings, clock
    pub fn periodic_check(&mut self) -> Result<(), ProtocolError> {
        self.session.mark_periodic_check();
        tracing::info!("Running Gasera One periodic check");
        self.request_measurement_status()?;
        self.request_network_settings()?;
        self.request_datetime()?;
        Ok(())
    }

    /// Daily self-check: stop, self-test, restart the measurement
    pub fn daily_check(&mut self) -> Result<SelfTestResult, ProtocolError> {
        self.session.mark_daily_check();
        tracing::info!("Running Gasera One daily check");
        self.settle(self.timing().daily_pre_stop_secs, "before stopping the measurement");
        self.stop_measurement()?;
        self.settle(self.timing().daily_post_stop_secs, "after stopping the measurement");

        let result = self.run_self_test()?;
        self.settle(self.timing().after_self_test_secs, "after the self-test");
        self.start_measurement()?;
        self.settle(self.timing().after_start_secs, "after starting the measurement");
        Ok(result)
    }
}

fn mismatch(expected: AkCommand, actual: &GaseraResponse) -> ProtocolError {
    ProtocolError::UnexpectedCommand {
        expected: expected.mnemonic().to_string(),
        actual: actual.command().mnemonic().to_string(),
    }
}
