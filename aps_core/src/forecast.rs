//! Near-term glucose forecasting.
//!
//! Both projections are deliberately unclamped: clamping is the policy's
//! responsibility, which keeps these values reusable for display.

use crate::Forecast;

/// Project glucose from the current reading and insulin state.
///
/// - naive: `current_bg - activity * isf`, a short-horizon linear
///   extrapolation assuming the instantaneous activity rate persists;
/// - eventual: `current_bg - iob * isf`, the level implied if all
///   on-board insulin fully acts with no further input.
///
/// Pure function with no failure modes for finite inputs.
pub fn bg_forecast(current_bg: f64, activity: f64, iob: f64, isf: f64) -> Forecast {
    Forecast {
        naive: current_bg - activity * isf,
        eventual: current_bg - iob * isf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_insulin_projects_flat() {
        let forecast = bg_forecast(110.0, 0.0, 0.0, 50.0);
        assert_eq!(forecast.naive, 110.0);
        assert_eq!(forecast.eventual, 110.0);
    }

    #[test]
    fn test_on_board_insulin_lowers_projection() {
        let forecast = bg_forecast(150.0, 0.02, 1.0, 50.0);
        assert!(forecast.naive < 150.0);
        assert!(forecast.eventual < 150.0);
        assert_eq!(forecast.naive, 150.0 - 0.02 * 50.0);
        assert_eq!(forecast.eventual, 150.0 - 1.0 * 50.0);
    }

    #[test]
    fn test_no_clamping_at_this_layer() {
        // A large IOB may project clinically impossible values; the
        // policy, not the forecast, decides what to do with them.
        let forecast = bg_forecast(80.0, 0.0, 5.0, 50.0);
        assert_eq!(forecast.eventual, -170.0);
    }
}
