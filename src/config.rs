//! The config module reads the optional configuration file and turns command-line flags into the
//! option structs each command runs with.
//!
//! Every setting has a default, so the configuration file is optional. Flags given on the command
//! line always win over the file.
use crate::error::{Result, SmartError, SmartExpectedError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_DOP: usize = 20;
const DEFAULT_DB_FILENAME: &str = ".smartmp3mgr.sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub dop: usize,
    pub progress: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    db_path: Option<String>,
    dop: Option<i64>,
    progress: Option<bool>,
    #[serde(flatten)]
    unrecognized: BTreeMap<String, toml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: default_db_path(),
            dop: DEFAULT_DOP,
            progress: true,
        }
    }
}

/// `<config dir>/smartmp3mgr/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("smartmp3mgr").join("config.toml"))
}

fn default_db_path() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(DEFAULT_DB_FILENAME)
}

impl Config {
    /// Load configuration. An explicit `path` must exist; the default location may be absent, in
    /// which case the built-in defaults are used.
    pub fn parse(path: Option<&Path>) -> Result<Config> {
        let (cfgpath, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Config::default()),
            },
        };

        let text = match fs::read_to_string(&cfgpath) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if explicit {
                    return Err(SmartExpectedError::ConfigNotFound { path: cfgpath }.into());
                }
                debug!("no configuration file at {}, using defaults", cfgpath.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };
        Config::parse_str(&cfgpath, &text)
    }

    fn parse_str(cfgpath: &Path, text: &str) -> Result<Config> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| SmartExpectedError::ConfigDecode {
            path: cfgpath.to_path_buf(),
            message: e.to_string(),
        })?;

        for key in raw.unrecognized.keys() {
            warn!("unrecognized key {} in configuration file ({})", key, cfgpath.display());
        }

        let mut config = Config::default();
        if let Some(db_path) = raw.db_path {
            config.db_path = PathBuf::from(shellexpand::tilde(&db_path).into_owned());
        }
        if let Some(dop) = raw.dop {
            config.dop = usize::try_from(dop)
                .ok()
                .filter(|&d| d > 0)
                .ok_or_else(|| invalid_value(cfgpath, "dop", format!("must be a positive integer: got {dop}")))?;
        }
        if let Some(progress) = raw.progress {
            config.progress = progress;
        }
        Ok(config)
    }
}

fn invalid_value(cfgpath: &Path, key: &str, message: String) -> SmartError {
    SmartExpectedError::InvalidConfigValue {
        path: cfgpath.to_path_buf(),
        key: key.to_string(),
        message,
    }
    .into()
}

/// Options for one `record` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
    pub directory: PathBuf,
    pub db_path: PathBuf,
    /// Re-read every file even if the catalog already has a row for its path.
    pub reparse: bool,
    pub dop: usize,
}

/// Options for one `find-new` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindNewOptions {
    pub directory: PathBuf,
    pub db_path: PathBuf,
    /// Ignore the fingerprint cache and hash every file again.
    pub rehash: bool,
    pub dop: usize,
    /// Report the distinct parent directories of new files instead of the files.
    pub folders_only: bool,
}

impl Config {
    pub fn record_options(
        &self,
        directory: PathBuf,
        db_path: Option<PathBuf>,
        reparse: bool,
        dop: Option<usize>,
    ) -> RecordOptions {
        RecordOptions {
            directory,
            db_path: db_path.unwrap_or_else(|| self.db_path.clone()),
            reparse,
            dop: dop.unwrap_or(self.dop),
        }
    }

    pub fn find_new_options(
        &self,
        directory: PathBuf,
        db_path: Option<PathBuf>,
        rehash: bool,
        dop: Option<usize>,
        folders_only: bool,
    ) -> FindNewOptions {
        FindNewOptions {
            directory,
            db_path: db_path.unwrap_or_else(|| self.db_path.clone()),
            rehash,
            dop: dop.unwrap_or(self.dop),
            folders_only,
        }
    }
}
