// Responses end in a three character block: [terminator][status byte][overload byte].
// Everything in front of that block is the comma separated numeric payload.
use crate::error::CommandError;
use enumset::EnumSet;
use log::{error, warn};
use sr7270_types::{OverloadChannel, Severity, StatusCondition};

const TRAILER_LENGTH: usize = 3;

/// A status byte of `!` marks a response that is nothing but payload.
pub const PAYLOAD_ONLY: char = '!';

#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    Value(Option<Vec<f64>>),
    Overloaded {
        channels: EnumSet<OverloadChannel>,
        values: Option<Vec<f64>>,
    },
}

impl Reading {
    pub fn is_overloaded(&self) -> bool {
        matches!(self, Reading::Overloaded { .. })
    }

    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Reading::Value(values) | Reading::Overloaded { values, .. } => values.as_deref(),
        }
    }

    pub fn into_values(self) -> Option<Vec<f64>> {
        match self {
            Reading::Value(values) | Reading::Overloaded { values, .. } => values,
        }
    }
}

pub fn decode(response: &str) -> Result<Reading, CommandError> {
    let chars: Vec<char> = response.chars().collect();
    if chars.len() < 2 {
        return Err(CommandError::MalformedResponse(response.to_string()));
    }

    let status = chars[chars.len() - 2];
    let overload = chars[chars.len() - 1];
    let payload: String = chars[..chars.len().saturating_sub(TRAILER_LENGTH)]
        .iter()
        .filter(|&&c| c != '\n')
        .collect();

    if status == PAYLOAD_ONLY {
        return Ok(Reading::Value(parse_payload(&payload)?));
    }

    let status = status as u8;
    let mut channels = EnumSet::empty();
    for bit in 0..8 {
        if status & (1 << bit) == 0 {
            continue;
        }
        let Some(condition) = StatusCondition::from_bit(bit) else {
            continue;
        };

        match condition.severity() {
            Severity::Benign => {}
            Severity::Overload => channels |= overloaded_channels(overload as u8),
            Severity::Fatal => {
                error!("Lock-in reported {} ({:#010b})", condition, status);
                return Err(CommandError::Protocol(condition));
            }
        }
    }

    let values = parse_payload(&payload)?;
    if channels.is_empty() {
        Ok(Reading::Value(values))
    } else {
        Ok(Reading::Overloaded { channels, values })
    }
}

pub fn overloaded_channels(overload: u8) -> EnumSet<OverloadChannel> {
    let mut channels = EnumSet::empty();
    for channel in EnumSet::<OverloadChannel>::all() {
        if overload & (1 << channel as u8) != 0 {
            warn!("{} output overload", channel);
            channels.insert(channel);
        }
    }
    channels
}

pub fn parse_payload(payload: &str) -> Result<Option<Vec<f64>>, CommandError> {
    if payload.is_empty() {
        return Ok(None);
    }

    payload
        .split(',')
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| CommandError::InvalidPayload(payload.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
