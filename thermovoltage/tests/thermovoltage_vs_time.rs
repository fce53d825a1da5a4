use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sr7270_usb::error::CommandError;
use sr7270_usb::{ExecutableLockIn, LockInCommands};
use thermovoltage::clock::{Clock, ManualClock};
use thermovoltage::sampler::{run, Measurement, Termination};

const HEADER_ROWS: usize = 7;

// Answers every query with a fixed value, like a lock-in sat on a steady signal.
#[derive(Default)]
struct SteadyLockIn {
    sent: Vec<String>,
    last: String,
    // Times out instead of answering this command.
    silent_on: Option<&'static str>,
}

impl ExecutableLockIn for SteadyLockIn {
    fn send(&mut self, command: &str) -> Result<(), CommandError> {
        self.sent.push(command.to_string());
        self.last = command.to_string();
        Ok(())
    }

    fn read_raw(&mut self) -> Result<String, CommandError> {
        if self.silent_on == Some(self.last.as_str()) {
            return Err(CommandError::IoTimeout);
        }
        let payload = match self.last.as_str() {
            "xy." => "2.0e-3,-1.0e-3",
            "tc." => "0.1",
            "dac. 3" => "250.0",
            "oa." => "0.002",
            "of." => "1250.0",
            _ => "",
        };
        Ok(format!("{}\0\u{1}\0", payload))
    }
}

impl LockInCommands for SteadyLockIn {}

// Flips the interrupt flag while sleeping through the given sample.
struct InterruptingClock {
    inner: ManualClock,
    sleeps: usize,
    interrupt_on: usize,
}

impl Clock for InterruptingClock {
    fn now(&self) -> Duration {
        self.inner.now()
    }

    fn sleep(&mut self, duration: Duration, interrupted: &AtomicBool) {
        self.sleeps += 1;
        if self.sleeps == self.interrupt_on {
            self.inner.advance(duration / 2);
            interrupted.store(true, Ordering::Relaxed);
            return;
        }
        self.inner.advance(duration);
    }
}

fn measurement(data_dir: &Path, rate: Option<f64>, max: f64) -> Measurement {
    Measurement {
        data_dir: data_dir.to_path_buf(),
        device: "dev".to_string(),
        scan: 0,
        notes: "no notes".to_string(),
        gain: 1000.0,
        rate,
        max,
        record_lockin_state: false,
        live_plot: false,
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn data_rows(lines: &[String]) -> &[String] {
    let columns = lines
        .iter()
        .position(|line| line == "time,x_raw,y_raw,x_v,y_v")
        .unwrap();
    &lines[columns + 1..]
}

#[test]
fn fixed_rate_run_writes_one_row_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    let mut lockin = SteadyLockIn::default();
    let mut clock = ManualClock::new();
    let interrupted = AtomicBool::new(false);

    let summary = run(
        &mut lockin,
        &mut clock,
        &measurement(dir.path(), Some(4.0), 2.5),
        &interrupted,
    )
    .unwrap();

    // ceil(2.5 / 0.25)
    assert_eq!(summary.samples, 10);
    assert_eq!(summary.termination, Termination::Time);
    assert_eq!(summary.files.csv, dir.path().join("dev_0.csv"));
    assert!(summary.files.image.exists());

    let lines = read_lines(&summary.files.csv);
    assert_eq!(lines.len(), HEADER_ROWS + 10);
    assert_eq!(lines[0], "gain:,1000");
    assert_eq!(lines[4], "rate:,4");

    let rows = data_rows(&lines);
    let first: Vec<f64> = rows[0].split(',').map(|v| v.parse().unwrap()).collect();
    assert_eq!(&first[..3], &[0.25, 0.002, -0.001]);
    assert!((first[3] - 2e-6).abs() < 1e-15);
    assert!((first[4] + 1e-6).abs() < 1e-15);
    assert!(rows[9].starts_with("2.5,"));
    assert!(lockin.sent.iter().all(|command| command == "xy."));
}

#[test]
fn uneven_intervals_do_not_gain_an_extra_row() {
    // 1/3 s is not a whole number of nanoseconds.
    for (max, expected) in [(1.0, 3), (2.0, 6)] {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(
            &mut SteadyLockIn::default(),
            &mut ManualClock::new(),
            &measurement(dir.path(), Some(3.0), max),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(summary.samples, expected, "max {}", max);
        assert_eq!(data_rows(&read_lines(&summary.files.csv)).len(), expected);
    }

    let dir = tempfile::tempdir().unwrap();
    let summary = run(
        &mut SteadyLockIn::default(),
        &mut ManualClock::new(),
        &measurement(dir.path(), Some(7.0), 1.0),
        &AtomicBool::new(false),
    )
    .unwrap();
    assert_eq!(summary.samples, 7);
}

#[test]
fn a_failed_state_read_leaves_no_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut lockin = SteadyLockIn {
        silent_on: Some("oa."),
        ..Default::default()
    };
    let mut settings = measurement(dir.path(), Some(2.0), 1.0);
    settings.record_lockin_state = true;

    let result = run(
        &mut lockin,
        &mut ManualClock::new(),
        &settings,
        &AtomicBool::new(false),
    );
    assert!(result.is_err());
    assert!(!dir.path().join("dev_0.csv").exists());
    assert!(!dir.path().join("dev_0.png").exists());
}

#[test]
fn without_a_rate_the_interval_is_three_time_constants() {
    let dir = tempfile::tempdir().unwrap();
    let mut lockin = SteadyLockIn::default();
    let mut clock = ManualClock::new();
    let interrupted = AtomicBool::new(false);

    let summary = run(
        &mut lockin,
        &mut clock,
        &measurement(dir.path(), None, 1.0),
        &interrupted,
    )
    .unwrap();

    // 0.3 s between samples, ceil(1.0 / 0.3)
    assert_eq!(summary.samples, 4);
    assert_eq!(lockin.sent[0], "tc.");
    assert_eq!(data_rows(&read_lines(&summary.files.csv)).len(), 4);
}

#[test]
fn existing_files_are_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("dev_0.csv"), "first").unwrap();
    fs::write(dir.path().join("dev_1.csv"), "second").unwrap();

    let summary = run(
        &mut SteadyLockIn::default(),
        &mut ManualClock::new(),
        &measurement(dir.path(), Some(10.0), 0.5),
        &AtomicBool::new(false),
    )
    .unwrap();

    assert_eq!(summary.files.csv, dir.path().join("dev_2.csv"));
    assert_eq!(summary.files.image, dir.path().join("dev_2.png"));
    assert_eq!(fs::read_to_string(dir.path().join("dev_0.csv")).unwrap(), "first");
    assert_eq!(fs::read_to_string(dir.path().join("dev_1.csv")).unwrap(), "second");
}

#[test]
fn interrupt_keeps_the_data_and_the_plot() {
    let dir = tempfile::tempdir().unwrap();
    let mut clock = InterruptingClock {
        inner: ManualClock::new(),
        sleeps: 0,
        interrupt_on: 3,
    };
    let interrupted = AtomicBool::new(false);

    let summary = run(
        &mut SteadyLockIn::default(),
        &mut clock,
        &measurement(dir.path(), Some(1.0), 600.0),
        &interrupted,
    )
    .unwrap();

    // The sample being paced when the interrupt lands is dropped.
    assert_eq!(summary.termination, Termination::Interrupt);
    assert_eq!(summary.samples, 2);
    assert_eq!(data_rows(&read_lines(&summary.files.csv)).len(), 2);
    assert!(summary.files.image.exists());
}

#[test]
fn an_interrupt_before_the_first_sample_still_saves_a_plot() {
    let dir = tempfile::tempdir().unwrap();
    let mut lockin = SteadyLockIn::default();

    let summary = run(
        &mut lockin,
        &mut ManualClock::new(),
        &measurement(dir.path(), Some(1.0), 600.0),
        &AtomicBool::new(true),
    )
    .unwrap();

    assert_eq!(summary.samples, 0);
    assert_eq!(summary.termination, Termination::Interrupt);
    assert!(lockin.sent.is_empty());
    assert_eq!(read_lines(&summary.files.csv).len(), HEADER_ROWS);
    assert!(summary.files.image.exists());
}

#[test]
fn lockin_state_is_recorded_ahead_of_the_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let mut lockin = SteadyLockIn::default();
    let mut settings = measurement(dir.path(), Some(2.0), 1.0);
    settings.record_lockin_state = true;

    let summary = run(
        &mut lockin,
        &mut ManualClock::new(),
        &settings,
        &AtomicBool::new(false),
    )
    .unwrap();

    let lines = read_lines(&summary.files.csv);
    assert_eq!(
        &lines[..5],
        &[
            "applied voltage (V):,250",
            "osc amplitude (V):,0.002",
            "osc frequency:,1250",
            "time constant:,0.1",
            "gain:,1000",
        ]
    );
    assert_eq!(&lockin.sent[..4], &["dac. 3", "oa.", "of.", "tc."]);
    assert_eq!(data_rows(&lines).len(), 2);
}
