#![forbid(unsafe_code)]

//! Core dosing-decision engine for the APS closed-loop controller.
//!
//! This crate provides:
//! - Domain types (treatments, activity/IOB, forecasts, rate decisions)
//! - Insulin pharmacokinetic model
//! - Glucose forecast and basal-rate policy
//! - Persistence (treatment WAL, CSV rollup, history loading)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod model;
pub mod forecast;
pub mod policy;
pub mod engine;
pub mod wal;
pub mod csv_rollup;
pub mod history;
pub mod glucose;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, Profile};
pub use model::insulin_calculations;
pub use forecast::bg_forecast;
pub use policy::basal_rate;
pub use engine::Engine;
pub use wal::{JsonlSink, TreatmentSink};
pub use history::load_recent_treatments;
pub use glucose::load_glucose_signal;
