use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{Level, LevelFilter, debug, info, warn};

use crate::error::{Result, SyncError};

/// Map a level name to a filter. Accepts the Python-style names
/// (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL) in any case.
pub fn parse_log_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_uppercase().as_str() {
        "TRACE" => Some(LevelFilter::Trace),
        "DEBUG" => Some(LevelFilter::Debug),
        "INFO" => Some(LevelFilter::Info),
        "WARNING" | "WARN" => Some(LevelFilter::Warn),
        "ERROR" | "CRITICAL" => Some(LevelFilter::Error),
        _ => None,
    }
}

/// Size at which the log file is rolled over.
pub const LOG_MAX_BYTES: u64 = 1_000_000;
/// Number of rolled-over files kept next to the log file (`sync.log.1` .. `sync.log.5`).
pub const LOG_BACKUPS: usize = 5;

pub fn level_label(level: Level) -> &'static str {
    match level {
        Level::Warn => "WARNING",
        other => other.as_str(),
    }
}

/// Render one log line without the trailing newline. INFO lines are the bare
/// message, everything else is `LEVEL:target:message`.
pub fn format_line(level: Level, target: &str, message: impl Display) -> String {
    if level == Level::Info {
        message.to_string()
    } else {
        format!("{}:{}:{}", level_label(level), target, message)
    }
}

/// Open `path` for appending log output.
pub fn open_log_file(path: &Path) -> Result<File> {
    if path.is_dir() {
        return Err(SyncError::LogPath(
            "You are trying to log to a directory, try a file".to_string(),
        ));
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::PermissionDenied => {
                let resolved = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
                SyncError::LogPath(format!(
                    "The user running this does not have access to the file: {}",
                    resolved.display()
                ))
            }
            _ => SyncError::from(e),
        })
}

/// Log file that rolls over to `<path>.1`, `<path>.2`, ... once it would grow
/// past `max_bytes`. The oldest backup beyond `backups` is dropped.
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_bytes: u64,
    backups: usize,
}

impl RotatingFile {
    /// Open `path` with the default 1 MB limit and five backups.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_limits(path, LOG_MAX_BYTES, LOG_BACKUPS)
    }

    pub fn with_limits(path: &Path, max_bytes: u64, backups: usize) -> Result<Self> {
        let file = open_log_file(path)?;
        let written = file.metadata()?.len();
        let mut rotating = RotatingFile {
            path: path.to_path_buf(),
            file,
            written,
            max_bytes,
            backups,
        };
        if written >= max_bytes {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn numbered_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.backups == 0 {
            self.file = File::create(&self.path)?;
        } else {
            for n in (1..self.backups).rev() {
                let from = self.numbered_path(n);
                if from.exists() {
                    fs::rename(&from, self.numbered_path(n + 1))?;
                }
            }
            fs::rename(&self.path, self.numbered_path(1))?;
            self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 >= self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Writes every log line to stderr and a file.
struct Tee<W: Write> {
    file: W,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger with [`format_line`] as the line format. A log
/// file, if given, rotates at [`LOG_MAX_BYTES`].
///
/// Only the first call installs anything; later calls leave the existing
/// logger in place.
pub fn setup_logger(level_name: &str, log_path: Option<&Path>) -> Result<()> {
    let level = parse_log_level(level_name);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level.unwrap_or(LevelFilter::Info))
        .format(|buf, record| {
            let line = format_line(record.level(), record.target(), record.args());
            if record.level() == Level::Info {
                return writeln!(buf, "{}", line);
            }
            let style = buf.default_level_style(record.level());
            writeln!(buf, "{style}{}{style:#}", line)
        });

    if let Some(path) = log_path {
        let file = RotatingFile::open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    if builder.try_init().is_err() {
        debug!("Logger already configured");
        return Ok(());
    }

    match level {
        Some(level) => debug!("Set log level: {}", level),
        None => warn!("Invalid logging level: {}, defaulting to INFO", level_name),
    }

    if let Some(path) = log_path {
        info!("Logging to file: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::tempdir;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("INFO"), Some(LevelFilter::Info));
        assert_eq!(parse_log_level("info"), Some(LevelFilter::Info));
        assert_eq!(parse_log_level("Warning"), Some(LevelFilter::Warn));
        assert_eq!(parse_log_level("WARN"), Some(LevelFilter::Warn));
        assert_eq!(parse_log_level("TRACE"), Some(LevelFilter::Trace));
        assert_eq!(parse_log_level("CRITICAL"), Some(LevelFilter::Error));
        assert_eq!(parse_log_level("INVALID"), None);
    }

    #[test]
    fn test_level_label() {
        assert_eq!(level_label(Level::Warn), "WARNING");
        assert_eq!(level_label(Level::Error), "ERROR");
        assert_eq!(level_label(Level::Trace), "TRACE");
    }

    #[test]
    fn test_format_line_info_is_bare() {
        assert_eq!(format_line(Level::Info, "smart_rom_sync::sync", "Found 2 folders to push to"), "Found 2 folders to push to");
    }

    #[test]
    fn test_format_line_other_levels() {
        assert_eq!(
            format_line(Level::Warn, "smart_rom_sync::config", "Backing up"),
            "WARNING:smart_rom_sync::config:Backing up"
        );
        assert_eq!(
            format_line(Level::Error, "smartromsync", format_args!("{} failed", "gb")),
            "ERROR:smartromsync:gb failed"
        );
        assert_eq!(format_line(Level::Debug, "x", 42), "DEBUG:x:42");
    }

    #[test]
    fn test_open_log_file_directory() {
        let dir = tempdir().unwrap();
        match open_log_file(dir.path()) {
            Err(SyncError::LogPath(msg)) => assert!(msg.contains("directory")),
            other => panic!("Expected LogPath error, got {:?}", other),
        }
    }

    #[test]
    fn test_open_log_file_appends() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sync.log");
        std::fs::write(&path, "first\n")?;

        let mut file = open_log_file(&path)?;
        writeln!(file, "second")?;
        drop(file);

        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn test_tee_reaches_file() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sync.log");

        let mut tee = Tee {
            file: RotatingFile::open(&path)?,
        };
        writeln!(tee, "ERROR:smartromsync:gb failed")?;
        tee.flush()?;
        drop(tee);

        assert_eq!(std::fs::read_to_string(&path)?, "ERROR:smartromsync:gb failed\n");
        Ok(())
    }

    #[test]
    fn test_rotating_file_rolls_over() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sync.log");

        let mut log = RotatingFile::with_limits(&path, 10, 2)?;
        for line in ["aaaaaaaa\n", "bbbbbbbb\n", "cccccccc\n", "dddddddd\n"] {
            log.write_all(line.as_bytes())?;
        }
        log.flush()?;
        drop(log);

        assert_eq!(std::fs::read_to_string(&path)?, "dddddddd\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("sync.log.1"))?, "cccccccc\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("sync.log.2"))?, "bbbbbbbb\n");
        assert!(!dir.path().join("sync.log.3").exists());
        Ok(())
    }

    #[test]
    fn test_rotating_file_full_on_open() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sync.log");
        std::fs::write(&path, "x".repeat(20))?;

        let mut log = RotatingFile::with_limits(&path, 10, LOG_BACKUPS)?;
        log.write_all(b"fresh\n")?;
        drop(log);

        assert_eq!(std::fs::read_to_string(&path)?, "fresh\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("sync.log.1"))?, "x".repeat(20));
        Ok(())
    }

    #[test]
    fn test_rotating_file_appends_below_limit() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("sync.log");
        std::fs::write(&path, "first\n")?;

        let mut log = RotatingFile::open(&path)?;
        log.write_all(b"second\n")?;
        drop(log);

        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        assert!(!dir.path().join("sync.log.1").exists());
        Ok(())
    }

    #[test]
    fn test_setup_logger_twice() -> Result<(), Box<dyn Error>> {
        setup_logger("DEBUG", None)?;
        setup_logger("NOT_A_LEVEL", None)?;
        Ok(())
    }
}
