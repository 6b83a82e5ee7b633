use thiserror::Error;

#[derive(Error, Debug)]
pub enum MicelogError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Telemetry sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("No devices configured or resolved (list candidates with `ls -la /dev/input/by-path`)")]
    NoDevices,

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Errors raised by a single pointing device. They never leave the owning reader.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Failed to open device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Read from device {device} failed: {source}")]
    Read {
        device: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Duplicate device id: {0}")]
    DuplicateId(String),
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write snapshot: {0}")]
    Write(#[from] std::io::Error),

    #[error("Sink is closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to create archive directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive for device {device}: {source}")]
    Write {
        device: String,
        #[source]
        source: std::io::Error,
    },
}

impl MicelogError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MicelogError>;
