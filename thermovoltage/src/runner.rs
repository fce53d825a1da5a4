use crate::cli::{Cli, MAX_RECOMMENDED_RATE};
use crate::clock::SystemClock;
use crate::sampler::{self, Measurement, Summary};
use crate::settings::Settings;
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub fn measurement_from(cli: &Cli, settings: &Settings) -> Measurement {
    Measurement {
        data_dir: cli
            .filepath
            .clone()
            .unwrap_or_else(|| settings.data_dir.clone()),
        device: cli.device.clone(),
        scan: cli.scan,
        notes: cli.notes.clone(),
        gain: cli.gain,
        rate: cli.rate,
        max: cli.max,
        record_lockin_state: cli.lockin_state,
        live_plot: cli.live,
    }
}

/// Opens the lock-in and runs one measurement on the calling thread. The session is released
/// when this returns, whether or not the measurement succeeded.
pub fn run(cli: Cli, interrupted: Arc<AtomicBool>) -> Result<Summary> {
    let settings = Settings::load(&cli.config)?;
    let vendor_id = cli.vendor_id.unwrap_or(settings.vendor_id);
    let product_id = cli.product_id.unwrap_or(settings.product_id);

    if let Some(rate) = cli.rate {
        if rate > MAX_RECOMMENDED_RATE {
            warn!(
                "A rate of {} samples/second is above the recommended {}",
                rate, MAX_RECOMMENDED_RATE
            );
        }
    }

    let measurement = measurement_from(&cli, &settings);
    let mut lockin = sr7270_usb::open(vendor_id, product_id).context(format!(
        "Could not open the lock-in ({:04x}:{:04x})",
        vendor_id, product_id
    ))?;
    info!("Lock-in opened at {:?}", lockin.location());

    let mut clock = SystemClock::new();
    sampler::run(&mut lockin, &mut clock, &measurement, &interrupted)
}
