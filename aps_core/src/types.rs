//! Core domain types for the APS dosing engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Insulin treatments and the append-only treatment log
//! - Derived activity/IOB and forecast pairs
//! - Basal-rate decisions and their reasons

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Treatment Types
// ============================================================================

/// Kind of insulin delivery behind a treatment record
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Bolus,
    BasalSegment,
}

/// A single delivered-insulin record.
///
/// Immutable once created. `time` and `duration` are in minutes on the
/// controller's simulation clock; `logged_at` is the wall-clock moment the
/// record was written and is used only for history windowing and dedup.
///
/// Invariants (caller contract, not re-checked per call):
/// `dose >= 0`, `duration > 0`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Treatment {
    pub id: Uuid,
    pub kind: TreatmentKind,
    /// Delivery time, minutes since the controller epoch
    pub time: i64,
    /// Insulin units delivered
    pub dose: f64,
    /// Minutes the dose remains pharmacologically active
    pub duration: i64,
    pub logged_at: DateTime<Utc>,
}

impl Treatment {
    /// Create a new treatment stamped with a fresh id and the current wall clock
    pub fn new(kind: TreatmentKind, time: i64, dose: f64, duration: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            time,
            dose,
            duration,
            logged_at: Utc::now(),
        }
    }
}

/// Append-only, insertion-ordered collection of treatments.
///
/// No entry is ever removed; queries skip treatments whose action window
/// has elapsed. Archival of old records is the CSV rollup's concern.
#[derive(Clone, Debug, Default)]
pub struct TreatmentLog {
    treatments: Vec<Treatment>,
}

impl TreatmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record in insertion order. O(1), infallible.
    pub fn append(&mut self, treatment: Treatment) {
        self.treatments.push(treatment);
    }

    /// Read-only, ordered, restartable iteration over all records
    pub fn iter(&self) -> impl Iterator<Item = &Treatment> {
        self.treatments.iter()
    }

    pub fn len(&self) -> usize {
        self.treatments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.treatments.is_empty()
    }
}

impl From<Vec<Treatment>> for TreatmentLog {
    fn from(treatments: Vec<Treatment>) -> Self {
        Self { treatments }
    }
}

// ============================================================================
// Derived Result Types
// ============================================================================

/// Instantaneous insulin activity (units/minute) and insulin-on-board
/// (units) at a query time. Transient, never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActivityIob {
    pub activity: f64,
    pub iob: f64,
}

impl ActivityIob {
    pub const ZERO: Self = Self {
        activity: 0.0,
        iob: 0.0,
    };
}

/// Glucose projection pair, unclamped (mg/dL)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Forecast {
    /// Short-horizon projection assuming the current activity rate persists
    pub naive: f64,
    /// Long-horizon projection assuming all on-board insulin fully acts
    pub eventual: f64,
}

// ============================================================================
// Rate Decision Types
// ============================================================================

/// Why a basal rate was chosen
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateReason {
    /// Glucose at/below threshold, or projected to fall there
    Suspend,
    /// Above target with no projected return; correction applied
    Correction,
    /// Within the safe band; baseline unchanged
    Baseline,
}

/// A basal delivery rate decision (units/hour, always `>= 0`)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateDecision {
    pub rate: f64,
    pub reason: RateReason,
}
