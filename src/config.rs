//! TOML configuration: one target and a list of systems to push to it.
//!
//! ```toml
//! [target]
//! type = "rsync"
//! remote_host = "retropie"
//! path = "/home/pi/RetroPie/roms"
//!
//! [[systems]]
//! local_dir = "/data/No-Intro/Nintendo - Game Boy"
//! remote_dir = "gb"
//! region_list_include = ["USA", "Europe"]
//! special_list_exclude = ["Beta", "Proto"]
//! ```

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::PROGRAM_NAME;
use crate::error::{Result, SyncError};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Local,
    #[serde(alias = "remote")]
    Rsync,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TargetKind::Local => write!(f, "local"),
            TargetKind::Rsync => write!(f, "rsync"),
        }
    }
}

/// Where ROMs get pushed to.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub remote_host: String,
    pub path: PathBuf,
    /// Keys we don't know about, kept so `write` puts them back.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Target {
    /// Prefix for rsync destinations, `host:` for remote targets.
    pub fn host_prefix(&self) -> String {
        match self.kind {
            TargetKind::Rsync => format!("{}:", self.remote_host),
            TargetKind::Local => String::new(),
        }
    }
}

/// A local ROM directory and the filters applied when pushing it.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct System {
    pub local_dir: PathBuf,
    pub remote_dir: PathBuf,
    pub region_list_include: Vec<String>,
    pub region_list_exclude: Vec<String>,
    pub special_list_include: Vec<String>,
    pub special_list_exclude: Vec<String>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: Target,
    pub systems: Vec<System>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::from(e).with_path(path))?;
        Config::from_toml_str(&content).map_err(|e| e.with_path(path))
    }

    pub fn load_or_default(path: &Path) -> Result<Config> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Config::load(path)
    }

    pub fn from_toml_str(content: &str) -> Result<Config> {
        let mut config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Normalise the config in place and reject values that can't be synced.
    pub fn validate(&mut self) -> Result<()> {
        if self.target.kind == TargetKind::Rsync && self.target.remote_host.is_empty() {
            return Err(SyncError::invalid_config(
                "target type 'rsync' requires a remote_host",
            ));
        }

        for system in self.systems.iter_mut() {
            if system.local_dir.as_os_str().is_empty() {
                return Err(SyncError::invalid_config("local_dir is required"));
            }
            if system.remote_dir.as_os_str().is_empty() {
                return Err(SyncError::invalid_config("remote_dir is required"));
            }

            if system.local_dir == system.remote_dir {
                error!("local_dir and remote_dir cannot be the same.");
            }

            if system.remote_dir.is_absolute() {
                system.remote_dir = strip_root(&system.remote_dir);
                if system.remote_dir.as_os_str().is_empty() {
                    return Err(SyncError::invalid_config(
                        "remote_dir must name a directory below the target path",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Write the config as TOML, backing up an existing file whose content differs.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = toml::to_string_pretty(self)?;

        if path.exists() {
            let existing_content = fs::read_to_string(path)?;
            let existing: Option<toml::Value> = toml::from_str(&existing_content).ok();
            let new: toml::Value = toml::from_str(&body)?;

            if existing.as_ref() != Some(&new) {
                let backup = backup_path(path, &chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string());
                warn!(
                    "Validation has changed the config file, backing up the old one to {}",
                    backup.display()
                );
                fs::write(&backup, &existing_content)?;
            }
        } else {
            warn!("Config file does not exist, creating it at {}", path.display());
        }

        info!("Writing config to {}", path.display());
        let header = format!(
            "# Configuration file for {} v{}\n",
            PROGRAM_NAME,
            env!("CARGO_PKG_VERSION")
        );
        fs::write(path, header + &body)?;
        Ok(())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} v{}\n\
             Current configuration:\n  \
             Target Type: {}\n  \
             Remote Host: {}\n  \
             Remote base path: {}\n  \
             Systems: {}",
            PROGRAM_NAME,
            env!("CARGO_PKG_VERSION"),
            self.target.kind,
            self.target.remote_host,
            self.target.path.display(),
            self.systems.len()
        )
    }
}

fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// `<dir>/<stem>_<timestamp><.ext>.bak`
fn backup_path(path: &Path, timestamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    path.with_file_name(format!("{}_{}{}.bak", stem, timestamp, suffix))
}
