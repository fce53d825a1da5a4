use enumset::EnumSetType;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator};

/// How the decoder treats a set bit in the status byte.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum Severity {
    Benign,
    Overload,
    Fatal,
}

// One variant per bit of the status byte, least significant bit first.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
pub enum StatusCondition {
    #[strum(to_string = "command complete")]
    CommandComplete,
    #[strum(to_string = "invalid command")]
    InvalidCommand,
    #[strum(to_string = "invalid command parameter")]
    InvalidParameter,
    #[strum(to_string = "reference unlock")]
    ReferenceUnlock,
    #[strum(to_string = "output overload")]
    OutputOverload,
    #[strum(to_string = "new ADC after trigger")]
    NewAdcAfterTrigger,
    #[strum(to_string = "input overload")]
    InputOverload,
    #[strum(to_string = "data available")]
    DataAvailable,
}

impl StatusCondition {
    pub fn from_bit(bit: u8) -> Option<Self> {
        match bit {
            0 => Some(StatusCondition::CommandComplete),
            1 => Some(StatusCondition::InvalidCommand),
            2 => Some(StatusCondition::InvalidParameter),
            3 => Some(StatusCondition::ReferenceUnlock),
            4 => Some(StatusCondition::OutputOverload),
            5 => Some(StatusCondition::NewAdcAfterTrigger),
            6 => Some(StatusCondition::InputOverload),
            7 => Some(StatusCondition::DataAvailable),
            _ => None,
        }
    }

    pub fn bit(&self) -> u8 {
        *self as u8
    }

    pub fn severity(&self) -> Severity {
        match self {
            StatusCondition::InvalidCommand
            | StatusCondition::InvalidParameter
            | StatusCondition::ReferenceUnlock
            | StatusCondition::InputOverload => Severity::Fatal,
            StatusCondition::OutputOverload => Severity::Overload,
            _ => Severity::Benign,
        }
    }

    /// The message carried by the error raised for a fatal condition.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            StatusCondition::InvalidCommand => Some("Invalid lock in command"),
            StatusCondition::InvalidParameter => Some("Invalid lock in command parameter"),
            StatusCondition::ReferenceUnlock => Some("Lock in reference unlocked"),
            StatusCondition::InputOverload => Some("Lock in input overload"),
            _ => None,
        }
    }
}

// One variant per bit of the secondary overload byte.
#[derive(Debug, Display, EnumIter, EnumCount, EnumSetType)]
pub enum OverloadChannel {
    X1,
    Y1,
    X2,
    Y2,
    #[strum(to_string = "CH1")]
    Ch1,
    #[strum(to_string = "CH2")]
    Ch2,
    #[strum(to_string = "CH3")]
    Ch3,
    #[strum(to_string = "CH4")]
    Ch4,
}

impl OverloadChannel {
    pub fn from_bit(bit: u8) -> Option<Self> {
        OverloadChannel::iter().nth(bit as usize)
    }
}

/// Full scale input range. The discriminant is the device code sent with `sen`.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
pub enum Sensitivity {
    #[strum(to_string = "2 nV")]
    Nv2 = 1,
    #[strum(to_string = "5 nV")]
    Nv5 = 2,
    #[strum(to_string = "10 nV")]
    Nv10 = 3,
    #[strum(to_string = "20 nV")]
    Nv20 = 4,
    #[strum(to_string = "50 nV")]
    Nv50 = 5,
    #[strum(to_string = "100 nV")]
    Nv100 = 6,
    #[strum(to_string = "200 nV")]
    Nv200 = 7,
    #[strum(to_string = "500 nV")]
    Nv500 = 8,
    #[strum(to_string = "1 uV")]
    Uv1 = 9,
    #[strum(to_string = "2 uV")]
    Uv2 = 10,
    #[strum(to_string = "5 uV")]
    Uv5 = 11,
    #[strum(to_string = "10 uV")]
    Uv10 = 12,
    #[strum(to_string = "20 uV")]
    Uv20 = 13,
    #[strum(to_string = "50 uV")]
    Uv50 = 14,
    #[strum(to_string = "100 uV")]
    Uv100 = 15,
    #[strum(to_string = "200 uV")]
    Uv200 = 16,
    #[strum(to_string = "500 uV")]
    Uv500 = 17,
    #[strum(to_string = "1 mV")]
    Mv1 = 18,
    #[strum(to_string = "2 mV")]
    Mv2 = 19,
    #[strum(to_string = "5 mV")]
    Mv5 = 20,
    #[strum(to_string = "10 mV")]
    Mv10 = 21,
    #[strum(to_string = "20 mV")]
    Mv20 = 22,
    #[strum(to_string = "50 mV")]
    Mv50 = 23,
    #[strum(to_string = "100 mV")]
    Mv100 = 24,
    #[strum(to_string = "200 mV")]
    Mv200 = 25,
    #[strum(to_string = "500 mV")]
    Mv500 = 26,
    #[strum(to_string = "1 V")]
    V1 = 27,
}

impl Sensitivity {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn volts(&self) -> f64 {
        match self {
            Sensitivity::Nv2 => 2e-9,
            Sensitivity::Nv5 => 5e-9,
            Sensitivity::Nv10 => 1e-8,
            Sensitivity::Nv20 => 2e-8,
            Sensitivity::Nv50 => 5e-8,
            Sensitivity::Nv100 => 1e-7,
            Sensitivity::Nv200 => 2e-7,
            Sensitivity::Nv500 => 5e-7,
            Sensitivity::Uv1 => 1e-6,
            Sensitivity::Uv2 => 2e-6,
            Sensitivity::Uv5 => 5e-6,
            Sensitivity::Uv10 => 1e-5,
            Sensitivity::Uv20 => 2e-5,
            Sensitivity::Uv50 => 5e-5,
            Sensitivity::Uv100 => 1e-4,
            Sensitivity::Uv200 => 2e-4,
            Sensitivity::Uv500 => 5e-4,
            Sensitivity::Mv1 => 1e-3,
            Sensitivity::Mv2 => 2e-3,
            Sensitivity::Mv5 => 5e-3,
            Sensitivity::Mv10 => 1e-2,
            Sensitivity::Mv20 => 2e-2,
            Sensitivity::Mv50 => 5e-2,
            Sensitivity::Mv100 => 0.1,
            Sensitivity::Mv200 => 0.2,
            Sensitivity::Mv500 => 0.5,
            Sensitivity::V1 => 1.0,
        }
    }

    /// Snaps an arbitrary full scale value (in volts) onto the table.
    pub fn nearest(volts: f64) -> Self {
        nearest_by(Sensitivity::iter(), volts, |s| s.volts()).unwrap_or(Sensitivity::V1)
    }

    /// The next less sensitive range, `None` at the top of the table.
    pub fn coarser(&self) -> Option<Self> {
        // Codes start at 1, so the code is also the index of the next entry.
        Sensitivity::iter().nth(self.code() as usize)
    }
}

/// Output filter time constant. The discriminant is the device code sent with `tc`.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
pub enum TimeConstant {
    #[strum(to_string = "10 us")]
    Us10 = 0,
    #[strum(to_string = "20 us")]
    Us20 = 1,
    #[strum(to_string = "50 us")]
    Us50 = 2,
    #[strum(to_string = "100 us")]
    Us100 = 3,
    #[strum(to_string = "200 us")]
    Us200 = 4,
    #[strum(to_string = "500 us")]
    Us500 = 5,
    #[strum(to_string = "1 ms")]
    Ms1 = 6,
    #[strum(to_string = "2 ms")]
    Ms2 = 7,
    #[strum(to_string = "5 ms")]
    Ms5 = 8,
    #[strum(to_string = "10 ms")]
    Ms10 = 9,
    #[strum(to_string = "20 ms")]
    Ms20 = 10,
    #[strum(to_string = "50 ms")]
    Ms50 = 11,
    #[strum(to_string = "100 ms")]
    Ms100 = 12,
    #[strum(to_string = "200 ms")]
    Ms200 = 13,
    #[strum(to_string = "500 ms")]
    Ms500 = 14,
    #[strum(to_string = "1 s")]
    S1 = 15,
    #[strum(to_string = "2 s")]
    S2 = 16,
    #[strum(to_string = "5 s")]
    S5 = 17,
    #[strum(to_string = "10 s")]
    S10 = 18,
    #[strum(to_string = "20 s")]
    S20 = 19,
    #[strum(to_string = "50 s")]
    S50 = 20,
    #[strum(to_string = "100 s")]
    S100 = 21,
    #[strum(to_string = "200 s")]
    S200 = 22,
    #[strum(to_string = "500 s")]
    S500 = 23,
    #[strum(to_string = "1 ks")]
    Ks1 = 24,
    #[strum(to_string = "2 ks")]
    Ks2 = 25,
    #[strum(to_string = "5 ks")]
    Ks5 = 26,
    #[strum(to_string = "10 ks")]
    Ks10 = 27,
    #[strum(to_string = "20 ks")]
    Ks20 = 28,
    #[strum(to_string = "50 ks")]
    Ks50 = 29,
    #[strum(to_string = "100 ks")]
    Ks100 = 30,
}

impl TimeConstant {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn seconds(&self) -> f64 {
        match self {
            TimeConstant::Us10 => 1e-5,
            TimeConstant::Us20 => 2e-5,
            TimeConstant::Us50 => 5e-5,
            TimeConstant::Us100 => 1e-4,
            TimeConstant::Us200 => 2e-4,
            TimeConstant::Us500 => 5e-4,
            TimeConstant::Ms1 => 1e-3,
            TimeConstant::Ms2 => 2e-3,
            TimeConstant::Ms5 => 5e-3,
            TimeConstant::Ms10 => 1e-2,
            TimeConstant::Ms20 => 2e-2,
            TimeConstant::Ms50 => 5e-2,
            TimeConstant::Ms100 => 0.1,
            TimeConstant::Ms200 => 0.2,
            TimeConstant::Ms500 => 0.5,
            TimeConstant::S1 => 1.0,
            TimeConstant::S2 => 2.0,
            TimeConstant::S5 => 5.0,
            TimeConstant::S10 => 10.0,
            TimeConstant::S20 => 20.0,
            TimeConstant::S50 => 50.0,
            TimeConstant::S100 => 100.0,
            TimeConstant::S200 => 200.0,
            TimeConstant::S500 => 500.0,
            TimeConstant::Ks1 => 1e3,
            TimeConstant::Ks2 => 2e3,
            TimeConstant::Ks5 => 5e3,
            TimeConstant::Ks10 => 1e4,
            TimeConstant::Ks20 => 2e4,
            TimeConstant::Ks50 => 5e4,
            TimeConstant::Ks100 => 1e5,
        }
    }

    pub fn nearest(seconds: f64) -> Self {
        nearest_by(TimeConstant::iter(), seconds, |t| t.seconds()).unwrap_or(TimeConstant::Ks100)
    }
}

// Closest entry by absolute difference. Strict comparison keeps the earlier entry on a tie.
fn nearest_by<T: Copy>(
    entries: impl Iterator<Item = T>,
    target: f64,
    value: impl Fn(&T) -> f64,
) -> Option<T> {
    entries.fold(None, |best: Option<T>, entry| match best {
        Some(best) if (value(&best) - target).abs() <= (value(&entry) - target).abs() => {
            Some(best)
        }
        _ => Some(entry),
    })
}

#[derive(Copy, Clone, Debug, Display, EnumString, EnumIter, EnumCount, PartialEq, Eq)]
pub enum ReferenceSource {
    #[strum(serialize = "internal")]
    Internal,
    #[strum(serialize = "external - rear panel")]
    ExternalRearPanel,
    #[strum(serialize = "external - front panel")]
    ExternalFrontPanel,
}

impl ReferenceSource {
    pub fn code(&self) -> u8 {
        match self {
            ReferenceSource::Internal => 0,
            ReferenceSource::ExternalRearPanel => 1,
            ReferenceSource::ExternalFrontPanel => 2,
        }
    }
}

/// Which demodulator output pair an XY query reads.
#[derive(Copy, Clone, Debug, Display, EnumIter, EnumCount, PartialEq, Eq)]
pub enum XyChannel {
    Single,
    First,
    Second,
}
