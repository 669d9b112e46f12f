use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, error, info, trace, warn};
use rayon::prelude::*;
use serde::Serialize;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::config::{System, Target, TargetKind};
use crate::error::{Result, SyncError};
use crate::filter::FilterRules;
use crate::release::ReleaseInfo;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Pass `--dry-run` to rsync.
    pub dry_run: bool,
    /// Only log the rsync commands.
    pub no_run: bool,
}

/// Shown in place of the `--files-from` path when commands are only printed.
pub const FILE_LIST_PLACEHOLDER: &str = "<file list>";

/// A single rsync invocation pushing a list of files into one folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncCommand {
    pub files_from: PathBuf,
    pub source: PathBuf,
    pub destination: String,
    pub dry_run: bool,
    /// Create missing parent folders on the receiving side (rsync 3.2.3+).
    pub mkpath: bool,
}

impl RsyncCommand {
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-av".to_string(),
            "--info=progress2".to_string(),
            // --files-from implies --relative; files land flat in the destination folder.
            "--no-relative".to_string(),
            "--from0".to_string(),
            format!("--files-from={}", self.files_from.display()),
        ];
        if self.mkpath {
            args.push("--mkpath".to_string());
        }
        if self.dry_run {
            args.push("--dry-run".to_string());
        }
        // Trailing slash so the file list is read relative to the source directory.
        args.push(format!("{}/", self.source.display()));
        args.push(self.destination.clone());
        args
    }

    pub fn to_command(&self) -> Command {
        self.to_command_for("rsync")
    }

    /// stdout is kept for `--json` output, so the child's stdout goes to stderr.
    fn to_command_for(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command.args(self.args()).stdout(std::io::stderr());
        command
    }
}

impl fmt::Display for RsyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rsync {}", self.args().join(" "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub system: String,
    pub folders: usize,
    pub files_planned: usize,
    pub files_rejected: usize,
    pub folders_synced: usize,
    pub folders_failed: usize,
}

impl SyncStats {
    pub fn has_failures(&self) -> bool {
        self.folders_failed > 0
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} files in {} folders ({} filtered out), {} folders synced, {} failed",
            self.system,
            self.files_planned,
            self.folders,
            self.files_rejected,
            self.folders_synced,
            self.folders_failed
        )
    }
}

/// The files of one system, sorted into destination folders.
#[derive(Debug)]
pub struct SystemSync {
    local_dir: PathBuf,
    target: Target,
    options: SyncOptions,
    /// Destination folder to file paths relative to `local_dir`.
    plan: BTreeMap<PathBuf, Vec<PathBuf>>,
    files_rejected: usize,
}

impl SystemSync {
    pub fn new(system: &System, target: &Target, options: SyncOptions) -> Result<SystemSync> {
        if system.local_dir.as_os_str().is_empty() {
            return Err(SyncError::invalid_config("local_dir is required"));
        }
        if system.remote_dir.as_os_str().is_empty() {
            return Err(SyncError::invalid_config("remote_dir is required"));
        }

        let remote_dir_full = target.path.join(&system.remote_dir);
        let rules = FilterRules::from_system(system);

        let files = scan_files(&system.local_dir)?;
        info!("Found {} files in {}", files.len(), system.local_dir.display());

        let (plan, files_rejected) = build_plan(&system.local_dir, &files, &remote_dir_full, &rules);

        Ok(SystemSync {
            local_dir: system.local_dir.clone(),
            target: target.clone(),
            options,
            plan,
            files_rejected,
        })
    }

    pub fn plan(&self) -> &BTreeMap<PathBuf, Vec<PathBuf>> {
        &self.plan
    }

    pub fn print_summary(&self) {
        info!("Found {} folders to push to", self.plan.len());
        for (dest, files) in &self.plan {
            debug!("  {} ({} files)", dest.display(), files.len());
        }
        if self.files_rejected > 0 {
            debug!("{} files filtered out", self.files_rejected);
        }
    }

    /// Push every destination folder with rsync.
    pub fn rsync(&self) -> SyncStats {
        self.rsync_with(&run_rsync)
    }

    /// Push every destination folder, handing each command to `runner`.
    ///
    /// `runner` returns whether the command succeeded. The file list it
    /// points at only lives for the duration of the call.
    pub fn rsync_with(&self, runner: &dyn Fn(&RsyncCommand) -> std::io::Result<bool>) -> SyncStats {
        let mut stats = self.empty_stats();

        for (dest, files) in &self.plan {
            info!("Syncing {} files to {}...", files.len(), dest.display());

            match self.sync_folder(dest, files, runner) {
                Ok(Some(true)) => stats.folders_synced += 1,
                Ok(Some(false)) => {
                    error!("rsync failed for {}", dest.display());
                    stats.folders_failed += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Could not sync {}: {}", dest.display(), e);
                    stats.folders_failed += 1;
                }
            }
        }

        stats
    }

    /// `Ok(None)` when the command was only printed.
    fn sync_folder(
        &self,
        dest: &Path,
        files: &[PathBuf],
        runner: &dyn Fn(&RsyncCommand) -> std::io::Result<bool>,
    ) -> Result<Option<bool>> {
        if self.options.no_run {
            info!("{}", self.command_for(dest, PathBuf::from(FILE_LIST_PLACEHOLDER)));
            for file in files {
                debug!("  {}", file.display());
            }
            return Ok(None);
        }

        let mut file_list = NamedTempFile::new()?;
        file_list.write_all(&file_list_bytes(files))?;
        file_list.flush()?;

        let command = self.command_for(dest, file_list.path().to_path_buf());

        if self.target.kind == TargetKind::Local && !self.options.dry_run {
            fs::create_dir_all(dest).map_err(|e| SyncError::from(e).with_path(dest))?;
        }

        debug!("Running: {}", command);
        Ok(Some(runner(&command)?))
    }

    fn command_for(&self, dest: &Path, files_from: PathBuf) -> RsyncCommand {
        RsyncCommand {
            files_from,
            source: self.local_dir.clone(),
            destination: format!("{}{}", self.target.host_prefix(), dest.display()),
            dry_run: self.options.dry_run,
            mkpath: self.target.kind == TargetKind::Rsync,
        }
    }

    fn empty_stats(&self) -> SyncStats {
        SyncStats {
            system: self.local_dir.display().to_string(),
            folders: self.plan.len(),
            files_planned: self.plan.values().map(Vec::len).sum(),
            files_rejected: self.files_rejected,
            ..SyncStats::default()
        }
    }
}

fn run_rsync(command: &RsyncCommand) -> std::io::Result<bool> {
    let status = command.to_command().status()?;
    if !status.success() {
        warn!("rsync exited with {}", status);
    }
    Ok(status.success())
}

/// NUL separated file names for `--from0 --files-from`, bytes taken as-is.
pub fn file_list_bytes(files: &[PathBuf]) -> Vec<u8> {
    let mut list = Vec::new();
    for file in files {
        list.extend_from_slice(file.as_os_str().as_encoded_bytes());
        list.push(0);
    }
    list
}

/// Every regular file below `dir`, sorted by name within each directory.
pub fn scan_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SyncError::FileNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.path().is_file() {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("Skipping unreadable entry: {}", e),
        }
    }

    Ok(files)
}

/// Sort `files` into destination folders, returning the plan and the number of files rejected.
fn build_plan(
    local_dir: &Path,
    files: &[PathBuf],
    remote_dir_full: &Path,
    rules: &FilterRules,
) -> (BTreeMap<PathBuf, Vec<PathBuf>>, usize) {
    let parsed: Vec<(&PathBuf, ReleaseInfo)> = files
        .par_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (path, ReleaseInfo::from_file_name(&name))
        })
        .collect();

    let mut plan: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    let mut rejected = 0;

    for (path, info) in parsed {
        if !rules.allows(&info) {
            trace!("Filtered out {}", path.display());
            rejected += 1;
            continue;
        }

        let relative = path.strip_prefix(local_dir).unwrap_or(path).to_path_buf();
        plan.entry(remote_dir_full.join(info.destination_dir()))
            .or_default()
            .push(relative);
    }

    (plan, rejected)
}
