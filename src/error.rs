use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a GPS track file.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid track point: {0}")]
    InvalidPoint(String),

    #[error("no track points with a valid time found")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config dir found")]
    NoConfigDir,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("operation not allowed while {0}")]
    Busy(&'static str),

    #[error("no GPS tracks loaded")]
    NoTracks,
}
