//! Output file management module
//! Append-only log files with date/hour bucket rotation

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::info;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Time-bucket granularity for file rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// One file per calendar day: `{tag}_{YYYYMMDD}.log`
    Daily,
    /// One file per wall-clock hour: `{tag}_{YYYYMMDD}_{HH}.log`
    Hourly,
}

impl Rotation {
    fn bucket(&self, timestamp: DateTime<Utc>) -> String {
        match self {
            Rotation::Daily => timestamp.format("%Y%m%d").to_string(),
            Rotation::Hourly => timestamp.format("%Y%m%d_%H").to_string(),
        }
    }
}

/// An append-mode log file bound to a (format tag, time bucket) key.
///
/// Opened lazily on first write; closed and reopened under the new name
/// when an event crosses the bucket boundary. Files are appended to, never
/// truncated, so repeated runs against the same bucket accumulate.
pub struct RotatingLogFile {
    dir: PathBuf,
    tag: String,
    rotation: Rotation,
    current_bucket: Option<String>,
    file: Option<File>,
}

impl RotatingLogFile {
    pub fn new(dir: &Path, tag: &str, rotation: Rotation) -> Self {
        Self {
            dir: dir.to_path_buf(),
            tag: tag.to_string(),
            rotation,
            current_bucket: None,
            file: None,
        }
    }

    /// Path the given timestamp's bucket maps to.
    pub fn path_for(&self, timestamp: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("{}_{}.log", self.tag, self.rotation.bucket(timestamp)))
    }

    /// Currently open file path, if any.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current_bucket
            .as_ref()
            .map(|bucket| self.dir.join(format!("{}_{}.log", self.tag, bucket)))
    }

    /// Append one line, rotating first if the timestamp crossed into a new
    /// bucket. I/O failures propagate; the caller stops the run.
    pub fn write_line(&mut self, timestamp: DateTime<Utc>, line: &str) -> anyhow::Result<()> {
        let bucket = self.rotation.bucket(timestamp);

        if self.current_bucket.as_deref() != Some(bucket.as_str()) {
            self.rotate_to(bucket)?;
        }

        let file = match self.file.as_mut() {
            Some(file) => file,
            None => anyhow::bail!("No open log file ({})", self.tag),
        };
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to write log line ({})", self.tag))?;
        Ok(())
    }

    fn rotate_to(&mut self, bucket: String) -> anyhow::Result<()> {
        self.close()?;

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}_{}.log", self.tag, bucket));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        info!("Writing {} logs to {}", self.tag, path.display());
        self.current_bucket = Some(bucket);
        self.file = Some(file);
        Ok(())
    }

    /// Flush and close the current handle, if open.
    pub fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().context("Failed to flush log file")?;
        }
        self.current_bucket = None;
        Ok(())
    }
}

impl Drop for RotatingLogFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
