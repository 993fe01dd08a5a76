use crate::models::MazeConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the settings file inside the config directory
pub const CONFIG_FILE_NAME: &str = "mazerace.yaml";

/// Configuration manager for loading and saving `mazerace.yaml`.
///
/// Owns the config directory (created on first use). Relative log
/// directories in the settings resolve against it.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load and validate the settings file.
    ///
    /// Returns the defaults if the file doesn't exist.
    pub fn load(&self) -> Result<MazeConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
            return Ok(MazeConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: MazeConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        config
            .validate()
            .with_context(|| format!("Invalid settings in {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Validate and write the settings file.
    pub fn save(&self, config: &MazeConfig) -> Result<()> {
        config.validate().context("Refusing to save invalid settings")?;

        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Write the defaults if no settings file exists yet, so users have a
    /// template to edit. Returns true if a file was written.
    pub fn write_default_if_missing(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save(&MazeConfig::default())?;
        Ok(true)
    }

    /// Resolve the configured log directory against the config directory.
    pub fn log_dir(&self, config: &MazeConfig) -> Utf8PathBuf {
        let log_dir = Utf8Path::new(&config.logging.log_dir);
        if log_dir.is_absolute() {
            log_dir.to_path_buf()
        } else {
            self.config_dir.join(log_dir)
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
