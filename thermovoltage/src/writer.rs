use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

pub const COLUMNS: [&str; 5] = ["time", "x_raw", "y_raw", "x_v", "y_v"];

/// Settings read back from the lock-in before sampling, recorded at the top of the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockInState {
    pub applied_voltage: f64,
    pub oscillator_amplitude: f64,
    pub oscillator_frequency: f64,
    pub time_constant: f64,
}

#[derive(Debug, Clone)]
pub struct Header {
    pub lockin_state: Option<LockInState>,
    pub gain: f64,
    pub notes: String,
    pub device: String,
    pub scan: u32,
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed: f64,
    pub x_raw: f64,
    pub y_raw: f64,
    pub x_volts: f64,
    pub y_volts: f64,
}

/// The CSV data file. Metadata rows are `[key, value]` pairs, so the writer is flexible about
/// record length.
pub struct Recorder<W: Write> {
    writer: csv::Writer<W>,
}

impl Recorder<File> {
    /// Creates a new data file. Fails rather than truncating if `path` already exists.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .context(format!(
                "Could not create data file at {}",
                path.to_string_lossy()
            ))?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> Recorder<W> {
    pub fn from_writer(writer: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        Self { writer }
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        if let Some(state) = header.lockin_state {
            self.write_pair("applied voltage (V):", state.applied_voltage)?;
            self.write_pair("osc amplitude (V):", state.oscillator_amplitude)?;
            self.write_pair("osc frequency:", state.oscillator_frequency)?;
            self.write_pair("time constant:", state.time_constant)?;
        }

        self.write_pair("gain:", header.gain)?;
        self.write_pair("notes:", &header.notes)?;
        self.write_pair("device:", &header.device)?;
        self.write_pair("scan:", header.scan)?;
        match header.rate {
            Some(rate) => self.write_pair("rate:", rate)?,
            None => self.write_pair("rate:", "3 x time constant")?,
        }

        self.writer
            .write_record(["end:", "end of header"])
            .context("Failed to write end of header")?;
        self.writer
            .write_record(COLUMNS)
            .context("Failed to write column names")?;
        Ok(())
    }

    pub fn write_sample(&mut self, sample: &Sample) -> Result<()> {
        self.writer
            .write_record(&[
                sample.elapsed.to_string(),
                sample.x_raw.to_string(),
                sample.y_raw.to_string(),
                sample.x_volts.to_string(),
                sample.y_volts.to_string(),
            ])
            .context("Failed to write sample")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush data file")
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|error| anyhow::anyhow!("Failed to flush data file: {}", error.error()))
    }

    fn write_pair(&mut self, key: &str, value: impl ToString) -> Result<()> {
        self.writer
            .write_record(&[key.to_string(), value.to_string()])
            .context(format!("Failed to write header row '{}'", key))?;
        Ok(())
    }
}
