use crate::clock::Clock;
use crate::conversions::raw_code_to_physical;
use crate::files::{next_free, OutputFiles};
use crate::plot::Plot;
use crate::writer::{Header, LockInState, Recorder, Sample};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use sr7270_usb::LockInCommands;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Measurement {
    pub data_dir: PathBuf,
    pub device: String,
    pub scan: u32,
    pub notes: String,
    pub gain: f64,
    /// Samples per second. When unset the loop waits three time constants between samples.
    pub rate: Option<f64>,
    /// Seconds
    pub max: f64,
    pub record_lockin_state: bool,
    pub live_plot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Time,
    Interrupt,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub files: OutputFiles,
    pub samples: usize,
    pub termination: Termination,
}

/// Records X/Y against time until `max` seconds have passed (at most `ceil(max / interval)`
/// samples) or `interrupted` is set. Either way the data file is flushed and the plot saved
/// before returning.
pub fn run<L, C>(
    lockin: &mut L,
    clock: &mut C,
    measurement: &Measurement,
    interrupted: &AtomicBool,
) -> Result<Summary>
where
    L: LockInCommands,
    C: Clock,
{
    // Everything that talks to the lock-in before sampling happens first, so a failure here
    // doesn't leave an empty data file claiming a scan index.
    let lockin_state = if measurement.record_lockin_state {
        Some(read_lockin_state(lockin)?)
    } else {
        None
    };
    let interval_secs = sample_interval(lockin, measurement.rate)?;
    let interval = Duration::try_from_secs_f64(interval_secs)
        .map_err(|_| anyhow!("Invalid sample interval of {} seconds", interval_secs))?;
    let max = Duration::try_from_secs_f64(measurement.max)
        .map_err(|_| anyhow!("Invalid maximum time of {} seconds", measurement.max))?;
    let planned = planned_samples(measurement.max, interval_secs);
    debug!(
        "Sampling every {:?} for up to {:?} ({} samples)",
        interval, max, planned
    );

    let files = next_free(&measurement.data_dir, &measurement.device, measurement.scan)?;
    info!("Recording to {}", files.csv.to_string_lossy());
    let mut recorder = Recorder::create(&files.csv)?;
    recorder.write_header(&Header {
        lockin_state,
        gain: measurement.gain,
        notes: measurement.notes.clone(),
        device: measurement.device.clone(),
        scan: files.index,
        rate: measurement.rate,
    })?;

    let mut plot = Plot::new();
    let mut samples = 0;
    let start = clock.now();
    let mut termination = Termination::Time;

    // Durations are whole nanoseconds, so the clock alone can let one extra sample in when the
    // interval doesn't divide the maximum. The planned count caps it.
    while samples < planned && clock.now().saturating_sub(start) < max {
        if interrupted.load(Ordering::Relaxed) {
            termination = Termination::Interrupt;
            break;
        }

        let values = lockin.read_xy().context("Failed to read X/Y")?;
        let (x_raw, y_raw) = match values.as_slice() {
            [x, y, ..] => (*x, *y),
            _ => bail!("Expected an X and Y value from the lock-in, got {:?}", values),
        };
        let x_volts = raw_code_to_physical(x_raw, measurement.gain);
        let y_volts = raw_code_to_physical(y_raw, measurement.gain);

        clock.sleep(interval, interrupted);
        if interrupted.load(Ordering::Relaxed) {
            termination = Termination::Interrupt;
            break;
        }

        let elapsed = clock.now().saturating_sub(start).as_secs_f64();
        recorder.write_sample(&Sample {
            elapsed,
            x_raw,
            y_raw,
            x_volts,
            y_volts,
        })?;
        plot.push(elapsed, x_volts, y_volts);
        samples += 1;

        if measurement.live_plot {
            plot.save(&files.image)?;
        }
    }

    if termination == Termination::Interrupt {
        warn!("Interrupted after {} samples, saving what we have", samples);
    }

    recorder.flush()?;
    plot.save(&files.image)?;
    info!(
        "Recorded {} samples to {}, plot saved to {}",
        samples,
        files.csv.to_string_lossy(),
        files.image.to_string_lossy()
    );

    Ok(Summary {
        files,
        samples,
        termination,
    })
}

/// Seconds between samples, `1 / rate` or three time constants.
pub fn sample_interval<L: LockInCommands>(lockin: &mut L, rate: Option<f64>) -> Result<f64> {
    let seconds = match rate {
        Some(rate) => 1.0 / rate,
        None => 3.0 * lockin.read_tc().context("Failed to read the time constant")?,
    };
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds)
    } else {
        bail!("Invalid sample interval of {} seconds", seconds)
    }
}

/// `ceil(max / interval)`, ignoring the last few ulps so an exact multiple isn't rounded up.
pub fn planned_samples(max: f64, interval: f64) -> usize {
    let ratio = max / interval;
    (ratio - ratio.abs() * 1e-9).ceil().max(0.0) as usize
}

fn read_lockin_state<L: LockInCommands>(lockin: &mut L) -> Result<LockInState> {
    Ok(LockInState {
        applied_voltage: lockin.read_applied_voltage()?,
        oscillator_amplitude: lockin.read_oscillator_amplitude()?,
        oscillator_frequency: lockin.read_oscillator_frequency()?,
        time_constant: lockin.read_tc()?,
    })
}
