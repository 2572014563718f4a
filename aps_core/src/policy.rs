//! Basal-rate dosing policy.
//!
//! Decision ladder, earlier rules taking precedence:
//! 1. Suspend: glucose at/below the hypoglycemia threshold, or the
//!    eventual forecast falling there. Insulin stacking is never increased
//!    when glucose is low or projected to go low.
//! 2. Correction: above target with no projected return; rate raised above
//!    baseline in proportion to how far the naive forecast sits over
//!    target, clamped to the configured maximum.
//! 3. Baseline: everything else keeps the configured baseline rate.

use crate::{forecast, model, Profile, RateDecision, RateReason, TreatmentLog};

/// Decide the basal rate at time `t` given the current glucose reading.
///
/// Every input combination maps to a defined non-negative rate; anomalous
/// readings fall through the ladder like any other value, with the suspend
/// rule as the backstop for unexpectedly low signals.
pub fn basal_rate(profile: &Profile, log: &TreatmentLog, t: i64, current_bg: f64) -> RateDecision {
    let calc = model::insulin_calculations(log, t);
    let forecast = forecast::bg_forecast(current_bg, calc.activity, calc.iob, profile.isf);

    // Rule 1: hypoglycemia protection dominates everything else
    if current_bg <= profile.threshold_bg || forecast.eventual <= profile.threshold_bg {
        tracing::info!(
            "Suspending basal: BG {:.0}, eventual {:.0}, threshold {:.0}",
            current_bg,
            forecast.eventual,
            profile.threshold_bg
        );
        return RateDecision {
            rate: 0.0,
            reason: RateReason::Suspend,
        };
    }

    // Rule 2: high glucose with no projected return to target
    if current_bg > profile.target_bg
        && forecast.naive > profile.target_bg
        && forecast.eventual > profile.target_bg
    {
        let correction = (forecast.naive - profile.target_bg) / profile.isf;
        let rate = (profile.baseline_basal + correction).min(profile.max_basal);
        tracing::info!(
            "Correction basal: BG {:.0} above target {:.0}, rate {:.2} U/h",
            current_bg,
            profile.target_bg,
            rate
        );
        return RateDecision {
            rate,
            reason: RateReason::Correction,
        };
    }

    // Rule 3: in band, or already trending toward target
    tracing::debug!(
        "Baseline basal: BG {:.0} within band or trending to target",
        current_bg
    );
    RateDecision {
        rate: profile.baseline_basal,
        reason: RateReason::Baseline,
    }
}
