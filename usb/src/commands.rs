use sr7270_types::{ReferenceSource, Sensitivity, TimeConstant, XyChannel};
use std::fmt::{Display, Formatter};

// The lock-in's output DAC used for the applied bias.
const BIAS_DAC: u8 = 3;

/// Every command understood by the lock-in, rendered as the ASCII text sent on the
/// command endpoint. A trailing `.` selects the floating point form of a query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    Status,
    ReadSensitivity,
    SetSensitivity(Sensitivity),
    ReadAppliedVoltage,
    /// Millivolts
    SetAppliedVoltage(f64),
    ReadOscillatorFrequency,
    /// Hertz
    SetOscillatorFrequency(f64),
    ReadOscillatorAmplitude,
    /// Millivolts
    SetOscillatorAmplitude(f64),
    ReadXy(XyChannel),
    ReadTimeConstant,
    ReadTimeConstant1,
    SetTimeConstant(TimeConstant),
    SetTimeConstant1(TimeConstant),
    ReadMagnitudePhase,
    SetReferenceSource(ReferenceSource),
    AutoPhase,
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Status => write!(f, "st"),
            Command::ReadSensitivity => write!(f, "sen."),
            Command::SetSensitivity(sensitivity) => write!(f, "sen {}", sensitivity.code()),
            Command::ReadAppliedVoltage => write!(f, "dac. {}", BIAS_DAC),
            Command::SetAppliedVoltage(millivolts) => {
                write!(f, "dac {} {}", BIAS_DAC, millivolts / 10.0)
            }
            Command::ReadOscillatorFrequency => write!(f, "of."),
            Command::SetOscillatorFrequency(hertz) => write!(f, "of. {}", hertz),
            Command::ReadOscillatorAmplitude => write!(f, "oa."),
            Command::SetOscillatorAmplitude(millivolts) => write!(f, "oa {}", millivolts * 100.0),
            Command::ReadXy(channel) => match channel {
                XyChannel::Single => write!(f, "xy."),
                XyChannel::First => write!(f, "xy1."),
                XyChannel::Second => write!(f, "xy2."),
            },
            Command::ReadTimeConstant => write!(f, "tc."),
            Command::ReadTimeConstant1 => write!(f, "tc1."),
            Command::SetTimeConstant(tc) => write!(f, "tc {}", tc.code()),
            Command::SetTimeConstant1(tc) => write!(f, "tc1 {}", tc.code()),
            Command::ReadMagnitudePhase => write!(f, "mp."),
            Command::SetReferenceSource(source) => write!(f, "ie {}", source.code()),
            Command::AutoPhase => write!(f, "AQN"),
        }
    }
}
