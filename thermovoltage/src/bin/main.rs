use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thermovoltage::cli::Cli;
use thermovoltage::runner;
use thermovoltage::sampler::Termination;
use tokio::{signal, task};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args: Cli = Cli::parse();
    let level: log::LevelFilter = args.log_level.into();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &args.log_file {
        let file = File::create(path).context(format!(
            "Could not create log file at {}",
            path.to_string_lossy()
        ))?;
        loggers.push(WriteLogger::new(level, Config::default(), file));
    }
    CombinedLogger::init(loggers).context("Could not configure the logger")?;

    info!("Starting Thermovoltage vs Time v{}", VERSION);

    // The sampling loop is blocking, it watches this flag rather than the signal itself.
    let interrupted = Arc::new(AtomicBool::new(false));
    tokio::spawn(await_ctrl_c(interrupted.clone()));

    let result = task::spawn_blocking(move || runner::run(args, interrupted))
        .await
        .context("Sampling task failed to complete")?;

    match result {
        Ok(summary) => {
            if summary.termination == Termination::Interrupt {
                info!("Stopped early, {} samples kept", summary.samples);
            }
            Ok(())
        }
        Err(e) => {
            error!("Measurement failed: {:#}", e);
            Err(e)
        }
    }
}

async fn await_ctrl_c(interrupted: Arc<AtomicBool>) {
    if signal::ctrl_c().await.is_ok() {
        info!("Interrupt received, finishing up..");
        interrupted.store(true, Ordering::Relaxed);
    }
}
