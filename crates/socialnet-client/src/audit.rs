//! Append-only audit trail of what the user did.
//!
//! Separate from diagnostics: `tracing` output is for operators, the audit
//! log is a per-user record of actions and their outcomes.

use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditLevel::Info => "INFO",
            AuditLevel::Warning => "WARNING",
            AuditLevel::Error => "ERROR",
        })
    }
}

/// Sink for audit records.
pub trait AuditLog: Send + Sync {
    fn record(&self, level: AuditLevel, message: &str);
}

impl<T: AuditLog + ?Sized> AuditLog for Arc<T> {
    fn record(&self, level: AuditLevel, message: &str) {
        (**self).record(level, message);
    }
}

/// Record to the audit log and mirror the event into `tracing` at debug
/// level, under the `socialnet::audit` target.
pub(crate) fn emit(log: &dyn AuditLog, level: AuditLevel, message: &str) {
    tracing::debug!(target: "socialnet::audit", audit_level = %level, "{}", message);
    log.record(level, message);
}

/// Audit log appended to a file, one line per record:
/// `YYYY-MM-DD HH:MM:SS - LEVEL - message`.
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAuditLog {
    /// Open `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// `<dir>/<username>.log`
    pub fn for_user(dir: &Path, username: &str) -> io::Result<Self> {
        Self::open(dir.join(format!("{username}.log")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn record(&self, level: AuditLevel, message: &str) {
        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!("Failed to write audit log {}: {}", self.path.display(), e);
        }
    }
}

/// Audit log kept in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<(AuditLevel, String)>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(AuditLevel, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any record at `level` contains `needle`.
    pub fn contains(&self, level: AuditLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, level: AuditLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}
