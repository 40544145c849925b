use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartError {
    #[error("smartmp3mgr error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] SmartExpectedError),
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("error reading {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ID3 error: {0}")]
    Id3(#[from] id3::Error),
    #[error("Tag error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

/// Errors caused by user input or configuration rather than by the library state.
#[derive(Error, Debug)]
pub enum SmartExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("{} is not a directory", path.display())]
    NotADirectory { path: PathBuf },
    #[error("dop must be greater than zero: got {dop}")]
    InvalidParallelism { dop: usize },
    #[error("Configuration file not found ({})", path.display())]
    ConfigNotFound { path: PathBuf },
    #[error("Failed to decode configuration file ({}): {message}", path.display())]
    ConfigDecode { path: PathBuf, message: String },
    #[error("Invalid value for {key} in configuration file ({}): {message}", path.display())]
    InvalidConfigValue { path: PathBuf, key: String, message: String },
}

/// Failures to locate the audio payload inside a file's bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("file too short: {len} bytes, need at least 128")]
    TooShort { len: usize },
    #[error("invalid file; could not parse (payload would start at byte {start} of {len})")]
    InvalidFile { start: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, SmartError>;
