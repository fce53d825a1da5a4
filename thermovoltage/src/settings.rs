use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::error;
use serde::{Deserialize, Serialize};
use sr7270_usb::{PID_SR7270, VID_SR7270};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub vendor_id: u16,
    pub product_id: u16,
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vendor_id: VID_SR7270,
            product_id: PID_SR7270,
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    match ProjectDirs::from("org", "SR7270", "Thermovoltage") {
        Some(proj_dirs) => proj_dirs.data_dir().to_path_buf(),
        None => PathBuf::from("data"),
    }
}

impl Settings {
    /// Reads the settings, and writes them back so a fresh install ends up with a file to edit.
    pub fn load(path: &Path) -> Result<Settings> {
        let settings = Settings::read(path)?;
        if let Err(e) = settings.write(path) {
            error!(
                "Couldn't save settings to {}: {}",
                path.to_string_lossy(),
                e
            );
        }
        Ok(settings)
    }

    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ))?;
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_gives_defaults_and_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.vendor_id, VID_SR7270);
        assert_eq!(settings.product_id, PID_SR7270);
        assert!(path.exists());
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "product_id": 42, "data_dir": "/data/thermo" }"#).unwrap();

        let settings = Settings::read(&path).unwrap();
        assert_eq!(settings.vendor_id, VID_SR7270);
        assert_eq!(settings.product_id, 42);
        assert_eq!(settings.data_dir, PathBuf::from("/data/thermo"));
    }

    #[test]
    fn malformed_files_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        let error = Settings::read(&path).unwrap_err();
        assert!(error.to_string().contains("Could not parse settings file"));
    }
}
