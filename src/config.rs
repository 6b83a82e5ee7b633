use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MicelogConfig {
    pub devices: DeviceConfig,
    pub telemetry: TelemetryConfig,
    pub archive: ArchiveConfig,
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Device paths, in configuration order
    #[serde(default)]
    pub paths: Vec<String>,

    /// Optional file listing one device path per line
    #[serde(default)]
    pub list_file: Option<String>,

    /// Use the last path component as device id instead of the list position
    #[serde(default = "default_id_from_path")]
    pub id_from_path: bool,

    /// Log every decoded reading at info level
    #[serde(default = "default_print_readings")]
    pub print_readings: bool,

    /// Upper bound a reader waits on an idle device before rechecking its stop flag
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// Aggregation interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Topic attached to every published message
    #[serde(default = "default_topic")]
    pub topic: String,

    /// "-" for stdout, otherwise a file appended to
    #[serde(default = "default_output")]
    pub output: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ArchiveConfig {
    #[serde(default = "default_archive_enabled")]
    pub enabled: bool,

    /// Directory receiving one CSV file per device
    #[serde(default = "default_archive_directory")]
    pub directory: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ShutdownConfig {
    /// How long shutdown waits for each reader before abandoning it
    #[serde(default = "default_reader_join_timeout_ms")]
    pub reader_join_timeout_ms: u64,

    #[serde(default = "default_aggregator_timeout_ms")]
    pub aggregator_timeout_ms: u64,
}

impl DeviceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Inline paths followed by the entries of `list_file`, if any
    pub fn resolve_paths(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = self.paths.iter().map(PathBuf::from).collect();

        if let Some(list_file) = &self.list_file {
            let contents = std::fs::read_to_string(list_file)?;
            let listed = parse_device_list(&contents);
            debug!("Device list {} names {} devices", list_file, listed.len());
            paths.extend(listed);
        }

        Ok(paths)
    }
}

/// One path per line; trailing whitespace stripped, lines of one character or less skipped
pub fn parse_device_list(contents: &str) -> Vec<PathBuf> {
    contents
        .lines()
        .map(str::trim_end)
        .filter(|line| line.len() > 1)
        .map(PathBuf::from)
        .collect()
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ShutdownConfig {
    pub fn reader_join_timeout(&self) -> Duration {
        Duration::from_millis(self.reader_join_timeout_ms)
    }

    pub fn aggregator_timeout(&self) -> Duration {
        Duration::from_millis(self.aggregator_timeout_ms)
    }
}

impl MicelogConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("devices.paths", Vec::<String>::new())?
            .set_default("devices.id_from_path", default_id_from_path())?
            .set_default("devices.print_readings", default_print_readings())?
            .set_default("devices.poll_interval_ms", default_poll_interval_ms())?
            .set_default("telemetry.enabled", default_telemetry_enabled())?
            .set_default("telemetry.interval_ms", default_interval_ms())?
            .set_default("telemetry.topic", default_topic())?
            .set_default("telemetry.output", default_output())?
            .set_default("archive.enabled", default_archive_enabled())?
            .set_default("archive.directory", default_archive_directory())?
            .set_default(
                "shutdown.reader_join_timeout_ms",
                default_reader_join_timeout_ms(),
            )?
            .set_default(
                "shutdown.aggregator_timeout_ms",
                default_aggregator_timeout_ms(),
            )?
            .add_source(File::with_name(&path_str).required(false))
            // MICELOG_TELEMETRY__INTERVAL_MS=250
            .add_source(
                Environment::with_prefix("MICELOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: MicelogConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render the resolved configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Device poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.telemetry.enabled {
            if self.telemetry.interval_ms == 0 {
                return Err(ConfigError::Message(
                    "Telemetry interval_ms must be greater than 0".to_string(),
                ));
            }

            if self.telemetry.topic.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Telemetry topic must not be empty".to_string(),
                ));
            }
        }

        if self.archive.enabled && self.archive.directory.trim().is_empty() {
            return Err(ConfigError::Message(
                "Archive directory must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MicelogConfig {
    fn default() -> Self {
        Self {
            devices: DeviceConfig {
                paths: Vec::new(),
                list_file: None,
                id_from_path: default_id_from_path(),
                print_readings: default_print_readings(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            telemetry: TelemetryConfig {
                enabled: default_telemetry_enabled(),
                interval_ms: default_interval_ms(),
                topic: default_topic(),
                output: default_output(),
            },
            archive: ArchiveConfig {
                enabled: default_archive_enabled(),
                directory: default_archive_directory(),
            },
            shutdown: ShutdownConfig {
                reader_join_timeout_ms: default_reader_join_timeout_ms(),
                aggregator_timeout_ms: default_aggregator_timeout_ms(),
            },
        }
    }
}

// Default value functions
fn default_id_from_path() -> bool {
    true
}
fn default_print_readings() -> bool {
    false
}
fn default_poll_interval_ms() -> u64 {
    100
}

fn default_telemetry_enabled() -> bool {
    true
}
fn default_interval_ms() -> u64 {
    500
}
fn default_topic() -> String {
    "micelog/motion".to_string()
}
fn default_output() -> String {
    "-".to_string()
}

fn default_archive_enabled() -> bool {
    true
}
fn default_archive_directory() -> String {
    "logs".to_string()
}

fn default_reader_join_timeout_ms() -> u64 {
    1000
}
fn default_aggregator_timeout_ms() -> u64 {
    2000
}
