use crate::commands::Command;
use crate::error::CommandError;
use crate::status::{decode, Reading};
use log::{debug, warn};
use sr7270_types::{ReferenceSource, Sensitivity, TimeConstant, XyChannel};
use std::str::FromStr;
use std::thread::sleep;
use std::time::Duration;
use strum::EnumCount;

// This is the transport half of a lock-in session, anything that can push a command string out
// and pull a raw response back can be driven by the LockInCommands below.
pub trait ExecutableLockIn {
    fn send(&mut self, command: &str) -> Result<(), CommandError>;
    fn read_raw(&mut self) -> Result<String, CommandError>;

    fn pause(&mut self, duration: Duration) {
        sleep(duration);
    }

    fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        debug!("Sending '{}'", command);
        self.send(&command.to_string())
    }

    fn read_and_decode(&mut self) -> Result<Reading, CommandError> {
        let response = self.read_raw()?;
        decode(&response)
    }
}

// These are commands that can be executed, but send and read_raw must be implemented..
pub trait LockInCommands: ExecutableLockIn {
    fn query(&mut self, command: Command) -> Result<Reading, CommandError> {
        self.execute(command)?;
        self.read_and_decode()
    }

    fn query_all(&mut self, command: Command) -> Result<Vec<f64>, CommandError> {
        self.query(command)?
            .into_values()
            .ok_or_else(|| CommandError::MissingValue(command.to_string()))
    }

    fn query_first(&mut self, command: Command) -> Result<f64, CommandError> {
        self.query_all(command)?
            .first()
            .copied()
            .ok_or_else(|| CommandError::MissingValue(command.to_string()))
    }

    // Setters are acknowledged with a response we have no use for, it still has to be read
    // off the data endpoint so it doesn't get mistaken for the next answer.
    fn write_setting(&mut self, command: Command) -> Result<(), CommandError> {
        self.execute(command)?;
        let acknowledgement = self.read_raw()?;
        debug!("Discarding acknowledgement {:?}", acknowledgement);
        Ok(())
    }

    fn read_status(&mut self) -> Result<Reading, CommandError> {
        self.query(Command::Status)
    }

    /// Millivolts
    fn read_applied_voltage(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadAppliedVoltage)
    }

    fn change_applied_voltage(&mut self, millivolts: f64) -> Result<(), CommandError> {
        self.write_setting(Command::SetAppliedVoltage(millivolts))
    }

    fn read_oscillator_frequency(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadOscillatorFrequency)
    }

    fn change_oscillator_frequency(&mut self, hertz: f64) -> Result<(), CommandError> {
        self.write_setting(Command::SetOscillatorFrequency(hertz))
    }

    fn read_oscillator_amplitude(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadOscillatorAmplitude)
    }

    fn change_oscillator_amplitude(&mut self, millivolts: f64) -> Result<(), CommandError> {
        self.write_setting(Command::SetOscillatorAmplitude(millivolts))
    }

    /// Seconds. Used on the bottom unit of a stacked pair.
    fn read_tc(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadTimeConstant)
    }

    /// Seconds. Used on the top unit of a stacked pair.
    fn read_tc1(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadTimeConstant1)
    }

    /// Snaps `seconds` to the closest supported time constant and returns what was applied.
    fn change_tc(&mut self, seconds: f64) -> Result<TimeConstant, CommandError> {
        let time_constant = TimeConstant::nearest(seconds);
        self.write_setting(Command::SetTimeConstant(time_constant))?;
        Ok(time_constant)
    }

    fn change_tc1(&mut self, seconds: f64) -> Result<TimeConstant, CommandError> {
        let time_constant = TimeConstant::nearest(seconds);
        self.write_setting(Command::SetTimeConstant1(time_constant))?;
        Ok(time_constant)
    }

    /// Full scale, in volts.
    fn read_sensitivity(&mut self) -> Result<f64, CommandError> {
        self.query_first(Command::ReadSensitivity)
    }

    /// Snaps `volts` to the closest supported full scale range and returns what was applied.
    fn change_sensitivity(&mut self, volts: f64) -> Result<Sensitivity, CommandError> {
        let sensitivity = Sensitivity::nearest(volts);
        self.write_setting(Command::SetSensitivity(sensitivity))?;
        Ok(sensitivity)
    }

    /// Magnitude and phase.
    fn read_r_theta(&mut self) -> Result<Vec<f64>, CommandError> {
        self.query_all(Command::ReadMagnitudePhase)
    }

    fn change_reference_source(&mut self, source: ReferenceSource) -> Result<(), CommandError> {
        self.write_setting(Command::SetReferenceSource(source))
    }

    fn change_reference_source_named(&mut self, name: &str) -> Result<(), CommandError> {
        let source = ReferenceSource::from_str(name).map_err(|_| {
            CommandError::InvalidParameter(format!(
                "Reference source must be one of 'internal', 'external - rear panel' or \
                 'external - front panel', got '{}'",
                name
            ))
        })?;
        self.change_reference_source(source)
    }

    fn auto_phase(&mut self) -> Result<(), CommandError> {
        self.write_setting(Command::AutoPhase)
    }

    /// Steps the sensitivity down the table until the output overload clears, waiting three
    /// time constants after each change for the output to settle.
    fn auto_sensitivity(&mut self) -> Result<(), CommandError> {
        for steps in 0..Sensitivity::COUNT {
            if !self.read_status()?.is_overloaded() {
                return Ok(());
            }

            let current = Sensitivity::nearest(self.read_sensitivity()?);
            let Some(next) = current.coarser() else {
                warn!("Lock-in is overloaded at {}, unable to go any higher", current);
                return Err(CommandError::AdaptationExhausted { steps });
            };

            warn!("Auto adjusting sensitivity from {} to {}", current, next);
            self.change_sensitivity(next.volts())?;
            self.read_status()?;

            let settle = 3.0 * self.read_tc()?;
            self.pause(Duration::try_from_secs_f64(settle).unwrap_or_default());
        }

        if self.read_status()?.is_overloaded() {
            return Err(CommandError::AdaptationExhausted {
                steps: Sensitivity::COUNT,
            });
        }
        Ok(())
    }

    // An overloaded reading is retried once, after the sensitivity has been adjusted.
    fn read_xy_channel(&mut self, channel: XyChannel) -> Result<Vec<f64>, CommandError> {
        let command = Command::ReadXy(channel);
        let mut reading = self.query(command)?;
        if reading.is_overloaded() {
            self.auto_sensitivity()?;
            reading = self.query(command)?;
        }

        reading
            .into_values()
            .ok_or_else(|| CommandError::MissingValue(command.to_string()))
    }

    fn read_xy(&mut self) -> Result<Vec<f64>, CommandError> {
        self.read_xy_channel(XyChannel::Single)
    }

    fn read_xy1(&mut self) -> Result<Vec<f64>, CommandError> {
        self.read_xy_channel(XyChannel::First)
    }

    fn read_xy2(&mut self) -> Result<Vec<f64>, CommandError> {
        self.read_xy_channel(XyChannel::Second)
    }
}

// We primarily need the bus number, and address for comparison..
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockInDevice {
    pub(crate) bus_number: u8,
    pub(crate) address: u8,
}

impl LockInDevice {
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }
    pub fn address(&self) -> u8 {
        self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sr7270_types::StatusCondition;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedLockIn {
        sent: Vec<String>,
        responses: VecDeque<String>,
        paused: Vec<Duration>,
    }

    impl ScriptedLockIn {
        fn new(responses: &[String]) -> Self {
            Self {
                responses: responses.iter().cloned().collect(),
                ..Default::default()
            }
        }
    }

    impl ExecutableLockIn for ScriptedLockIn {
        fn send(&mut self, command: &str) -> Result<(), CommandError> {
            self.sent.push(command.to_string());
            Ok(())
        }

        fn read_raw(&mut self) -> Result<String, CommandError> {
            self.responses.pop_front().ok_or(CommandError::IoTimeout)
        }

        fn pause(&mut self, duration: Duration) {
            self.paused.push(duration);
        }
    }

    impl LockInCommands for ScriptedLockIn {}

    fn ok(payload: &str) -> String {
        format!("{}\0\u{1}\0", payload)
    }

    fn overloaded(payload: &str) -> String {
        format!("{}\0\u{11}\u{1}", payload)
    }

    fn ack() -> String {
        "\0\0\0".to_string()
    }

    #[test]
    fn accessors_send_their_query_and_return_the_first_value() {
        let mut lockin = ScriptedLockIn::new(&[ok("250.0"), ok("0.1"), ok("1.2,45.0")]);
        assert_eq!(lockin.read_applied_voltage().unwrap(), 250.0);
        assert_eq!(lockin.read_tc().unwrap(), 0.1);
        assert_eq!(lockin.read_r_theta().unwrap(), vec![1.2, 45.0]);
        assert_eq!(lockin.sent, vec!["dac. 3", "tc.", "mp."]);
    }

    #[test]
    fn an_empty_payload_is_a_missing_value() {
        let mut lockin = ScriptedLockIn::new(&[ok("")]);
        assert!(matches!(
            lockin.read_sensitivity(),
            Err(CommandError::MissingValue(command)) if command == "sen."
        ));
    }

    #[test]
    fn setters_snap_and_drain_the_acknowledgement() {
        let mut lockin = ScriptedLockIn::new(&[ack(), ack(), ack(), ok("0.002")]);
        assert_eq!(lockin.change_tc(3.6).unwrap(), TimeConstant::S5);
        assert_eq!(lockin.change_tc1(1.5).unwrap(), TimeConstant::S1);
        assert_eq!(lockin.change_sensitivity(0.003).unwrap(), Sensitivity::Mv2);

        // The next query must see its own response, not a stale acknowledgement.
        assert_eq!(lockin.read_sensitivity().unwrap(), 0.002);
        assert_eq!(lockin.sent, vec!["tc 17", "tc1 15", "sen 19", "sen."]);
        assert!(lockin.responses.is_empty());
    }

    #[test]
    fn unknown_reference_source_is_rejected_before_sending() {
        let mut lockin = ScriptedLockIn::new(&[ack()]);
        assert!(matches!(
            lockin.change_reference_source_named("sideways"),
            Err(CommandError::InvalidParameter(_))
        ));
        assert!(lockin.sent.is_empty());

        lockin
            .change_reference_source_named("external - front panel")
            .unwrap();
        assert_eq!(lockin.sent, vec!["ie 2"]);
    }

    #[test]
    fn auto_sensitivity_steps_up_and_waits_for_the_output_to_settle() {
        let mut lockin = ScriptedLockIn::new(&[
            overloaded(""),
            ok("0.001"),
            ack(),
            ok(""),
            ok("0.1"),
            ok(""),
        ]);
        lockin.auto_sensitivity().unwrap();

        assert_eq!(lockin.sent, vec!["st", "sen.", "sen 19", "st", "tc.", "st"]);
        assert_eq!(lockin.paused.len(), 1);
        assert!((lockin.paused[0].as_secs_f64() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn auto_sensitivity_fails_at_the_top_of_the_table() {
        let mut lockin = ScriptedLockIn::new(&[overloaded(""), ok("1.0")]);
        assert!(matches!(
            lockin.auto_sensitivity(),
            Err(CommandError::AdaptationExhausted { steps: 0 })
        ));
        assert_eq!(lockin.sent, vec!["st", "sen."]);
    }

    #[test]
    fn auto_sensitivity_is_bounded_by_the_table() {
        // Start at the bottom and never clear, every step of the table gets tried once.
        let mut responses = vec![];
        let mut volts = Sensitivity::Nv2.volts();
        let mut sensitivity = Sensitivity::Nv2;
        while let Some(next) = sensitivity.coarser() {
            responses.extend([overloaded(""), ok(&volts.to_string()), ack(), ok(""), ok("0")]);
            sensitivity = next;
            volts = next.volts();
        }
        responses.extend([overloaded(""), ok(&volts.to_string())]);

        let mut lockin = ScriptedLockIn::new(&responses);
        match lockin.auto_sensitivity() {
            Err(CommandError::AdaptationExhausted { steps }) => {
                assert_eq!(steps, Sensitivity::COUNT - 1)
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(lockin.sent.last().map(String::as_str), Some("sen."));
        assert!(lockin.sent.contains(&"sen 27".to_string()));
    }

    #[test]
    fn read_xy_retries_once_after_an_overload() {
        let mut lockin = ScriptedLockIn::new(&[
            overloaded("9.9,9.9"),
            overloaded(""),
            ok("0.001"),
            ack(),
            ok(""),
            ok("0.01"),
            ok(""),
            overloaded("1.0,2.0"),
        ]);

        // The retried value is returned even if it is still overloaded.
        assert_eq!(lockin.read_xy1().unwrap(), vec![1.0, 2.0]);
        assert_eq!(lockin.sent.first().map(String::as_str), Some("xy1."));
        assert_eq!(lockin.sent.last().map(String::as_str), Some("xy1."));
        assert_eq!(lockin.sent.iter().filter(|c| *c == "xy1.").count(), 2);
    }

    #[test]
    fn read_xy_without_overload_is_a_single_query() {
        let mut lockin = ScriptedLockIn::new(&[ok("1.5e-6,-3.0e-7")]);
        assert_eq!(lockin.read_xy().unwrap(), vec![1.5e-6, -3.0e-7]);
        assert_eq!(lockin.sent, vec!["xy."]);
    }

    #[test]
    fn fatal_status_aborts_the_read() {
        let mut lockin = ScriptedLockIn::new(&[format!("1.0,2.0\0{}\0", 0b0000_1000u8 as char)]);
        assert!(matches!(
            lockin.read_xy2(),
            Err(CommandError::Protocol(StatusCondition::ReferenceUnlock))
        ));
    }

    #[test]
    fn timeouts_propagate() {
        let mut lockin = ScriptedLockIn::new(&[]);
        assert!(matches!(
            lockin.read_oscillator_frequency(),
            Err(CommandError::IoTimeout)
        ));
    }
}
