//! Application configuration loaded from `~/.config/railbook/config.toml`.
//!
//! Values resolve from built-in defaults, then the config file, then
//! `RAILBOOK_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Directory under the platform config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "railbook";

const DEFAULT_CONFIG: &str = r#"# railbook configuration

# Directory holding trains.csv, bookings.csv and users.csv.
data_dir = "."

trains_file = "trains.csv"
bookings_file = "bookings.csv"
users_file = "users.csv"

# Booking limits.
max_passengers = 6
booking_window_days = 7
pnr_prefix = "PNR"

# How long to wait for another process holding a store lock.
lock_timeout_ms = 2000

# Catalog editor credentials.
admin_username = "admin"
admin_password = "admin"

# Set to false to always use the line-based station prompt.
rich_input = true
"#;

/// Runtime settings for the booking console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory resolving relative store file names.
    pub data_dir: PathBuf,
    /// Train catalog file.
    pub trains_file: PathBuf,
    /// Booking ledger file.
    pub bookings_file: PathBuf,
    /// Registered users file.
    pub users_file: PathBuf,
    /// Most passengers per booking.
    pub max_passengers: u32,
    /// Days offered in the travel date menu, starting today.
    pub booking_window_days: u32,
    /// Prefix for generated PNRs.
    pub pnr_prefix: String,
    /// Store lock wait in milliseconds.
    pub lock_timeout_ms: u64,
    /// Catalog editor login.
    pub admin_username: String,
    /// Catalog editor password.
    pub admin_password: String,
    /// Allow the raw-mode station picker when the terminal supports it.
    pub rich_input: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            trains_file: PathBuf::from("trains.csv"),
            bookings_file: PathBuf::from("bookings.csv"),
            users_file: PathBuf::from("users.csv"),
            max_passengers: 6,
            booking_window_days: 7,
            pnr_prefix: "PNR".to_string(),
            lock_timeout_ms: 2000,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            rich_input: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file and environment.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load configuration from `path` (optional) layered over defaults and environment.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let defaults = Config::try_from(&AppConfig::default())
            .context("failed to serialise default configuration")?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("RAILBOOK"))
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to parse configuration")
    }

    /// Catalog path resolved against `data_dir`.
    pub fn trains_path(&self) -> PathBuf {
        self.resolve(&self.trains_file)
    }

    /// Booking ledger path resolved against `data_dir`.
    pub fn bookings_path(&self) -> PathBuf {
        self.resolve(&self.bookings_file)
    }

    /// User store path resolved against `data_dir`.
    pub fn users_path(&self) -> PathBuf {
        self.resolve(&self.users_file)
    }

    /// Store lock wait as a duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }
}

/// `<config_dir>/railbook/config.toml`, if a config dir exists on this platform.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join("config.toml"))
}

/// Write the commented default config if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let Some(path) = default_config_path() else {
        return Ok(());
    };
    write_default_config(&path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_file_parses_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        write_default_config(&path)?;

        let loaded = AppConfig::load_from(Some(path))?;
        assert_eq!(loaded.max_passengers, 6);
        assert_eq!(loaded.booking_window_days, 7);
        assert_eq!(loaded.pnr_prefix, "PNR");
        assert_eq!(loaded.trains_path(), PathBuf::from("./trains.csv"));
        Ok(())
    }

    #[test]
    fn file_overrides_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/srv/rail\"\nmax_passengers = 4\n")?;

        let loaded = AppConfig::load_from(Some(path))?;
        assert_eq!(loaded.max_passengers, 4);
        assert_eq!(loaded.bookings_path(), PathBuf::from("/srv/rail/bookings.csv"));
        assert_eq!(loaded.admin_username, "admin");
        Ok(())
    }

    #[test]
    fn missing_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let loaded = AppConfig::load_from(Some(dir.path().join("absent.toml")))?;
        assert_eq!(loaded.lock_timeout(), Duration::from_millis(2000));
        Ok(())
    }

    #[test]
    fn existing_config_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_passengers = 2\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "max_passengers = 2\n");
        Ok(())
    }
}
