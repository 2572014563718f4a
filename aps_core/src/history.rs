//! Treatment history loading for engine startup.
//!
//! Merges the live WAL with the CSV archive so a restarted controller sees
//! the same treatment log it had before, deduplicated by record id and
//! bounded by a wall-clock window.

use crate::{Result, Treatment, TreatmentKind, TreatmentLog};
use chrono::{DateTime, Duration, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived treatments
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    kind: String,
    time: i64,
    dose: f64,
    duration: i64,
    logged_at: String,
}

impl TryFrom<CsvRow> for Treatment {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::Other(format!("Invalid UUID: {}", e)))?;

        let kind = match row.kind.as_str() {
            "bolus" => TreatmentKind::Bolus,
            "basal_segment" => TreatmentKind::BasalSegment,
            other => {
                return Err(crate::Error::Other(format!(
                    "Unknown treatment kind: {}",
                    other
                )))
            }
        };

        let logged_at = DateTime::parse_from_rfc3339(&row.logged_at)
            .map_err(|e| crate::Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        Ok(Treatment {
            id,
            kind,
            time: row.time,
            dose: row.dose,
            duration: row.duration,
            logged_at,
        })
    }
}

/// Load treatments from the last N days from both WAL and CSV
///
/// Returns treatments sorted by delivery time (oldest first), ready to seed
/// an engine log. Automatically deduplicates records that appear in both
/// WAL and CSV.
pub fn load_recent_treatments(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<TreatmentLog> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut treatments = Vec::new();
    let mut seen_ids = HashSet::new();

    // Load from WAL first (most recent)
    if wal_path.exists() {
        let wal_treatments = crate::wal::read_treatments(wal_path)?;
        for treatment in wal_treatments {
            if treatment.logged_at >= cutoff {
                seen_ids.insert(treatment.id);
                treatments.push(treatment);
            }
        }
        tracing::debug!("Loaded {} treatments from WAL", treatments.len());
    }

    // Load from CSV (archived)
    if csv_path.exists() {
        let csv_treatments = load_treatments_from_csv(csv_path)?;
        let mut csv_count = 0;
        for treatment in csv_treatments {
            if treatment.logged_at >= cutoff && !seen_ids.contains(&treatment.id) {
                seen_ids.insert(treatment.id);
                treatments.push(treatment);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} treatments from CSV", csv_count);
    }

    // Sort by delivery time, oldest first
    treatments.sort_by_key(|t| t.time);

    tracing::info!(
        "Loaded {} total treatments from last {} days",
        treatments.len(),
        days
    );

    Ok(TreatmentLog::from(treatments))
}

/// Load all treatments from a CSV file
fn load_treatments_from_csv(path: &Path) -> Result<Vec<Treatment>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut treatments = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match Treatment::try_from(row) {
                Ok(treatment) => treatments.push(treatment),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                    // Continue processing other rows
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(treatments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::TreatmentSink;

    fn treatment_logged_days_ago(time: i64, days_ago: i64) -> Treatment {
        let mut treatment = Treatment::new(TreatmentKind::Bolus, time, 1.0, 180);
        treatment.logged_at = Utc::now() - Duration::days(days_ago);
        treatment
    }

    #[test]
    fn test_load_recent_treatments_from_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("treatments.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&treatment_logged_days_ago(100, 1)).unwrap();
        sink.append(&treatment_logged_days_ago(200, 3)).unwrap();
        sink.append(&treatment_logged_days_ago(300, 10)).unwrap(); // Too old

        let log = load_recent_treatments(&wal_path, &csv_path, 7).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_deduplication_across_wal_and_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("treatments.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        // Add treatment to WAL, then roll it up to CSV
        let treatment = treatment_logged_days_ago(50, 1);
        let treatment_id = treatment.id;
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&treatment).unwrap();

        crate::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path).unwrap();

        // Log the same record to a fresh WAL, as if the rollup raced a writer
        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&treatment).unwrap();

        let log = load_recent_treatments(&wal_path, &csv_path, 7).unwrap();
        let count = log.iter().filter(|t| t.id == treatment_id).count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_treatments_sorted_by_delivery_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let wal_path = temp_dir.path().join("treatments.wal");
        let csv_path = temp_dir.path().join("treatments.csv");

        let mut sink = crate::wal::JsonlSink::new(&wal_path);
        sink.append(&treatment_logged_days_ago(500, 1)).unwrap();
        sink.append(&treatment_logged_days_ago(100, 1)).unwrap();

        let log = load_recent_treatments(&wal_path, &csv_path, 7).unwrap();
        let times: Vec<i64> = log.iter().map(|t| t.time).collect();
        assert_eq!(times, vec![100, 500]);
    }

    #[test]
    fn test_missing_files_yield_empty_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log = load_recent_treatments(
            &temp_dir.path().join("no.wal"),
            &temp_dir.path().join("no.csv"),
            7,
        )
        .unwrap();
        assert!(log.is_empty());
    }
}
