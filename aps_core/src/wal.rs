//! Write-Ahead Log (WAL) for treatment persistence.
//!
//! Treatments are appended to a JSONL (JSON Lines) file with file locking
//! so the CLI and any companion process can log deliveries safely. The
//! engine's in-memory log is seeded from this file on startup.

use crate::{Result, Treatment};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Treatment sink trait for persisting delivered insulin records
pub trait TreatmentSink {
    fn append(&mut self, treatment: &Treatment) -> Result<()>;
}

/// JSONL-based treatment sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl TreatmentSink for JsonlSink {
    fn append(&mut self, treatment: &Treatment) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write treatment as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(treatment)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended treatment {} to WAL", treatment.id);
        Ok(())
    }
}

/// Read all treatments from a WAL file
pub fn read_treatments(path: &Path) -> Result<Vec<Treatment>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut treatments = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Treatment>(&line) {
            Ok(treatment) => treatments.push(treatment),
            Err(e) => {
                tracing::warn!("Failed to parse treatment at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} treatments from WAL", treatments.len());
    Ok(treatments)
}
