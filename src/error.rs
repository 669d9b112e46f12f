use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Log file error: {0}")]
    LogPath(String),

    #[error("{}: {}", .0.display(), .1)]
    WithPath(PathBuf, Box<SyncError>),
}

impl SyncError {
    pub fn invalid_config(msg: impl Into<String>) -> SyncError {
        SyncError::InvalidConfig(msg.into())
    }

    /// Attach a path to an error, turning a plain `NotFound` into `FileNotFound`.
    /// Errors that already carry a path are returned unchanged.
    pub fn with_path(self, path: impl Into<PathBuf>) -> SyncError {
        let path = path.into();
        match self {
            SyncError::IoError(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                SyncError::FileNotFound(path)
            }
            already_pathed @ (SyncError::FileNotFound(_) | SyncError::WithPath(_, _)) => already_pathed,
            other => SyncError::WithPath(path, Box::new(other)),
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_path_not_found_becomes_file_not_found() {
        let err = SyncError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        match err.with_path("roms/missing.toml") {
            SyncError::FileNotFound(path) => assert_eq!(path, PathBuf::from("roms/missing.toml")),
            other => panic!("Expected FileNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_with_path_wraps_other_errors() {
        let err = SyncError::invalid_config("bad target").with_path("config.toml");
        assert!(matches!(err, SyncError::WithPath(_, _)));
        assert_eq!(err.to_string(), "config.toml: Invalid config: bad target");

        let rewrapped = err.with_path("other.toml");
        assert_eq!(rewrapped.to_string(), "config.toml: Invalid config: bad target");
    }
}
