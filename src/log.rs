//! Audit log sinks
//!
//! An [`AuditLog`] is the append-only destination for audit entries and
//! the query surface over them. Two implementations are provided: a
//! line-delimited JSON file log where each entry is one flushed JSON
//! line, and an in-memory log for tests and short-lived embedders.
//!
//! Each log instance is constructed with a [`QueryOrder`] so one
//! deployment reads its history in one consistent direction.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Default ordering of query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryOrder {
    /// Chronological: oldest entry first
    #[default]
    OldestFirst,
    /// Reverse chronological: most recent entry first
    NewestFirst,
}

/// An append-only destination for audit entries
pub trait AuditLog {
    /// Append a single entry
    fn append(&self, entry: &AuditEntry) -> AuditResult<()>;

    /// Append a batch of entries, flushing once at the end
    fn append_all(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        for entry in entries {
            self.append(entry)?;
        }
        Ok(())
    }

    /// Read every entry, in this log's query order
    fn read_all(&self) -> AuditResult<Vec<AuditEntry>>;

    /// Read the entries for one entity, in this log's query order
    fn for_entity(
        &self,
        app_name: &str,
        model_name: &str,
        model_id: u64,
    ) -> AuditResult<Vec<AuditEntry>> {
        let mut entries = self.read_all()?;
        entries.retain(|e| {
            e.app_name == app_name && e.model_name == model_name && e.model_id == model_id
        });
        Ok(entries)
    }
}

/// File-backed audit log using line-delimited JSON
///
/// Each entry is written as a single JSON line and flushed immediately.
/// Entries on disk are in write (chronological) order; reads apply the
/// configured [`QueryOrder`].
pub struct JsonlAuditLog {
    log_path: PathBuf,
    order: QueryOrder,
}

impl JsonlAuditLog {
    /// Create a log that writes to the specified path, oldest-first reads
    pub fn new(log_path: PathBuf) -> Self {
        Self::with_order(log_path, QueryOrder::default())
    }

    /// Create a log with an explicit query order
    pub fn with_order(log_path: PathBuf, order: QueryOrder) -> Self {
        Self { log_path, order }
    }

    /// Check if the log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }

    /// Get the number of entries in the log
    pub fn entry_count(&self) -> AuditResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Sink(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        Ok(reader.lines().map_while(Result::ok).count())
    }

    fn open_append(&self) -> AuditResult<File> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::Sink(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AuditError::Sink(format!("Failed to open audit log: {}", e)))
    }

    fn write_line(file: &mut File, entry: &AuditEntry) -> AuditResult<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| AuditError::Sink(format!("Failed to serialize audit entry: {}", e)))?;

        writeln!(file, "{}", json)
            .map_err(|e| AuditError::Sink(format!("Failed to write audit entry: {}", e)))
    }
}

impl AuditLog for JsonlAuditLog {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let mut file = self.open_append()?;
        Self::write_line(&mut file, entry)?;
        file.flush()
            .map_err(|e| AuditError::Sink(format!("Failed to flush audit log: {}", e)))
    }

    fn append_all(&self, entries: &[AuditEntry]) -> AuditResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = self.open_append()?;
        for entry in entries {
            Self::write_line(&mut file, entry)?;
        }
        file.flush()
            .map_err(|e| AuditError::Sink(format!("Failed to flush audit log: {}", e)))
    }

    fn read_all(&self) -> AuditResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Sink(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Sink(format!(
                    "Failed to read audit log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                AuditError::Sink(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        if self.order == QueryOrder::NewestFirst {
            entries.reverse();
        }
        Ok(entries)
    }
}

/// In-memory audit log
///
/// Backed by an `RwLock`-guarded vector in append order; useful in tests
/// and in embedders that flush history elsewhere.
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    order: QueryOrder,
}

impl MemoryAuditLog {
    /// Create an empty in-memory log, oldest-first reads
    pub fn new() -> Self {
        Self::with_order(QueryOrder::default())
    }

    /// Create an empty in-memory log with an explicit query order
    pub fn with_order(order: QueryOrder) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            order,
        }
    }

    /// Get the number of entries in the log
    pub fn entry_count(&self) -> AuditResult<usize> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AuditError::Sink(format!("Failed to acquire read lock: {}", e)))?;
        Ok(entries.len())
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| AuditError::Sink(format!("Failed to acquire write lock: {}", e)))?;
        entries.push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> AuditResult<Vec<AuditEntry>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| AuditError::Sink(format!("Failed to acquire read lock: {}", e)))?;

        let mut all = entries.clone();
        if self.order == QueryOrder::NewestFirst {
            all.reverse();
        }
        Ok(all)
    }
}
