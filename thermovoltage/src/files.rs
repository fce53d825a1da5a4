use anyhow::{Context, Result};
use log::debug;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

/// The data file and plot image for one run, sharing a `<device>_<index>` stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub index: u32,
    pub csv: PathBuf,
    pub image: PathBuf,
}

impl OutputFiles {
    fn at(directory: &Path, device: &str, index: u32) -> Self {
        let stem = format!("{}_{}", device, index);
        Self {
            index,
            csv: directory.join(format!("{}.csv", stem)),
            image: directory.join(format!("{}.png", stem)),
        }
    }
}

/// Finds the first index, counting up from `scan`, whose CSV file doesn't exist yet. The
/// directory is created if needed. Existing data is never overwritten.
pub fn next_free(directory: &Path, device: &str, scan: u32) -> Result<OutputFiles> {
    create_dir_all(directory).context(format!(
        "Could not create data directory at {}",
        directory.to_string_lossy()
    ))?;

    let mut index = scan;
    let mut files = OutputFiles::at(directory, device, index);
    while files.csv.exists() {
        debug!("{} already exists, skipping", files.csv.to_string_lossy());
        index = index
            .checked_add(1)
            .context("Ran out of file indexes for this device")?;
        files = OutputFiles::at(directory, device, index);
    }

    Ok(files)
}
