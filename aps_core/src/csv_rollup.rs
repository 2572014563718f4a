//! CSV rollup functionality for archiving WAL treatments.
//!
//! The treatment log grows without bound by design; this module moves the
//! WAL's records into a CSV archive atomically so the WAL stays small
//! without the engine ever deleting a record itself.

use crate::{Result, Treatment, TreatmentKind};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    kind: String,
    time: i64,
    dose: f64,
    duration: i64,
    logged_at: String,
}

impl From<&Treatment> for CsvRow {
    fn from(treatment: &Treatment) -> Self {
        let kind = match treatment.kind {
            TreatmentKind::Bolus => "bolus",
            TreatmentKind::BasalSegment => "basal_segment",
        };
        CsvRow {
            id: treatment.id.to_string(),
            kind: kind.to_string(),
            time: treatment.time,
            dose: treatment.dose,
            duration: treatment.duration,
            logged_at: treatment.logged_at.to_rfc3339(),
        }
    }
}

/// Roll up WAL treatments into CSV and archive the WAL atomically
///
/// This function:
/// 1. Reads all treatments from the WAL
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the WAL to .processed
/// 5. Returns the number of treatments processed
///
/// # Safety
/// - CSV is fsynced before WAL is renamed
/// - WAL is renamed (not deleted) to allow manual recovery if needed
/// - Processed WAL files can be cleaned up manually
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    // Read all treatments from WAL
    let treatments = crate::wal::read_treatments(wal_path)?;

    if treatments.is_empty() {
        tracing::info!("No treatments in WAL to roll up");
        return Ok(0);
    }

    // Ensure parent directory exists
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Open CSV file for appending
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers are only needed when the archive starts out empty
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    // Write all treatments to CSV
    for treatment in &treatments {
        let row = CsvRow::from(treatment);
        writer.serialize(row)?;
    }

    // Flush and sync to disk
    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} treatments to CSV", treatments.len());

    // Atomically archive the WAL by renaming it
    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(treatments.len())
}

/// Clean up old processed WAL files
///
/// This removes all .wal.processed files in the given directory.
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed WAL: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::TreatmentSink;
    use std::fs::File;

    #[test]
    fn test_wal_to_csv_creates_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("treatments.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        for i in 0..3 {
            let treatment = Treatment::new(TreatmentKind::Bolus, i * 60, 1.0, 180);
            sink.append(&treatment).unwrap();
        }

        let count = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count, 3);

        assert!(csv_path.exists());

        // Verify WAL was archived
        assert!(!wal_path.exists());
        assert!(wal_path.with_extension("wal.processed").exists());
    }

    #[test]
    fn test_wal_to_csv_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("treatments.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        // First rollup
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&Treatment::new(TreatmentKind::Bolus, 0, 2.0, 180))
            .unwrap();
        let count1 = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count1, 1);

        // Second rollup (appends)
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&Treatment::new(TreatmentKind::BasalSegment, 60, 0.5, 60))
            .unwrap();
        let count2 = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count2, 1);

        // Verify CSV has both entries
        let reader = csv::Reader::from_path(&csv_path).unwrap();
        let record_count = reader.into_records().count();
        assert_eq!(record_count, 2);
    }

    #[test]
    fn test_empty_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("empty.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        // Create empty WAL
        File::create(&wal_path).unwrap();

        let count = wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_cleanup_processed_wals() {
        let temp_dir = tempfile::tempdir().unwrap();

        // Create some processed WAL files
        File::create(temp_dir.path().join("t1.wal.processed")).unwrap();
        File::create(temp_dir.path().join("t2.wal.processed")).unwrap();
        File::create(temp_dir.path().join("keep.wal")).unwrap();

        let count = cleanup_processed_wals(temp_dir.path()).unwrap();
        assert_eq!(count, 2);

        // Verify only .processed files were removed
        assert!(!temp_dir.path().join("t1.wal.processed").exists());
        assert!(!temp_dir.path().join("t2.wal.processed").exists());
        assert!(temp_dir.path().join("keep.wal").exists());
    }
}
