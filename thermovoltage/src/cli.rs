use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use std::path::PathBuf;

// Rates above this outrun the lock-in's conversion bandwidth.
pub const MAX_RECOMMENDED_RATE: f64 = 50.0;

#[derive(Parser, Debug)]
#[clap(
    about = "Records thermovoltage against time. Press CTRL+C to stop early, the plot is still saved.",
    version,
    author
)]
pub struct Cli {
    /// Path of the data folder, defaults to the one in the settings file
    #[clap(short = 'f', long = "filepath")]
    pub filepath: Option<PathBuf>,

    /// Samples per second (do not exceed 50). Defaults to one sample every three time constants
    #[clap(long, value_parser = parse_positive)]
    pub rate: Option<f64>,

    /// Maximum measurement time in seconds
    #[clap(long, default_value = "600", value_parser = parse_positive)]
    pub max: f64,

    /// Gain of the preamplifier
    #[clap(long, default_value = "1000", value_parser = parse_positive)]
    pub gain: f64,

    /// Device name, used as the file name prefix
    #[clap(long)]
    pub device: String,

    /// First scan number to try when naming the output files
    #[clap(long, default_value = "0")]
    pub scan: u32,

    /// Free text stored in the file header
    #[clap(long, default_value = "no notes")]
    pub notes: String,

    /// Record the lock-in's applied voltage, oscillator and time constant in the header
    #[clap(long)]
    pub lockin_state: bool,

    /// Rewrite the plot image after every sample
    #[clap(long)]
    pub live: bool,

    /// USB vendor id of the lock-in (decimal, or hex with a 0x prefix)
    #[clap(long, value_parser = parse_usb_id)]
    pub vendor_id: Option<u16>,

    /// USB product id of the lock-in (decimal, or hex with a 0x prefix)
    #[clap(long, value_parser = parse_usb_id)]
    pub product_id: Option<u16>,

    /// Location of the configuration file on disk
    #[clap(long, default_value_os_t = default_config_location())]
    pub config: PathBuf,

    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// Also write the log to this file
    #[clap(long)]
    pub log_file: Option<PathBuf>,
}

fn default_config_location() -> PathBuf {
    match ProjectDirs::from("org", "SR7270", "Thermovoltage") {
        Some(proj_dirs) => proj_dirs.config_dir().join("settings.json"),
        None => PathBuf::from("settings.json"),
    }
}

fn parse_positive(value: &str) -> Result<f64, String> {
    let number: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if number.is_finite() && number > 0.0 {
        Ok(number)
    } else {
        Err(format!("{} must be greater than zero", value))
    }
}

fn parse_usb_id(value: &str) -> Result<u16, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|_| format!("'{}' is not a valid USB id", value))
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl From<LevelFilter> for log::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        }
    }
}
