//! External glucose signal loader.
//!
//! The CGM runs as a separate process and drops its latest reading into a
//! JSON file; the CLI falls back to that file when no reading is passed on
//! the command line. A missing or malformed file is never an error — the
//! controller just has no reading to act on.

use crate::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Latest glucose reading from the external sensor
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct GlucoseReading {
    pub read_at: DateTime<Utc>,
    pub mg_dl: f64,
}

/// Load the external glucose reading from a JSON file
///
/// Returns None if the file doesn't exist or can't be parsed; the caller
/// decides whether a missing reading is acceptable.
pub fn load_glucose_signal(path: &Path) -> Result<Option<GlucoseReading>> {
    if !path.exists() {
        tracing::debug!("No glucose signal file found at {:?}", path);
        return Ok(None);
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(
                "Failed to read glucose signal at {:?}: {}. Ignoring signal.",
                path,
                e
            );
            return Ok(None);
        }
    };

    let reading: GlucoseReading = match serde_json::from_str(&contents) {
        Ok(reading) => reading,
        Err(e) => {
            tracing::warn!(
                "Failed to parse glucose signal at {:?}: {}. Ignoring signal.",
                path,
                e
            );
            return Ok(None);
        }
    };

    tracing::info!(
        "Loaded glucose signal: {:.0} mg/dL at {}",
        reading.mg_dl,
        reading.read_at
    );

    Ok(Some(reading))
}
