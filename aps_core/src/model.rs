//! Insulin pharmacokinetic model.
//!
//! Each treatment contributes to instantaneous activity and remaining IOB
//! only while `0 <= elapsed < duration`. The activity curve is triangular
//! (bilinear): zero at both window edges, peaking at `duration / 2`, scaled
//! so the whole curve integrates to the delivered dose. IOB is the dose
//! minus the area already swept out, so the two outputs are always
//! mutually consistent.
//!
//! The per-treatment `duration` field is the single source of the action
//! window; the profile's DIA only supplies a default duration at logging
//! time and is never consulted here.

use crate::{ActivityIob, TreatmentLog};

/// Instantaneous activity contribution of one dose, units/minute.
///
/// Zero outside `[0, duration)`. Peak height is `2 * dose / duration` so
/// the triangle's area equals `dose`.
pub fn activity_contribution(dose: f64, duration: i64, elapsed: i64) -> f64 {
    if elapsed < 0 || elapsed >= duration || dose <= 0.0 {
        return 0.0;
    }
    let d = duration as f64;
    let e = elapsed as f64;
    let peak = d / 2.0;
    let height = 2.0 * dose / d;
    if e < peak {
        height * e / peak
    } else {
        height * (d - e) / (d - peak)
    }
}

/// Dose fraction not yet metabolized at `elapsed`, in units.
///
/// Closed form of `dose - integral(activity, 0..elapsed)` for the
/// triangular curve: monotonically decreasing from `dose` at entry to `0`
/// at the end of the window.
pub fn iob_contribution(dose: f64, duration: i64, elapsed: i64) -> f64 {
    if dose <= 0.0 || elapsed >= duration {
        return 0.0;
    }
    if elapsed < 0 {
        // Not yet delivered at the query time
        return 0.0;
    }
    let d = duration as f64;
    let e = elapsed as f64;
    if e < d / 2.0 {
        dose * (1.0 - 2.0 * e * e / (d * d))
    } else {
        2.0 * dose * (d - e) * (d - e) / (d * d)
    }
}

/// Total insulin activity and IOB over the log at query time `t`.
///
/// Pure function of (log contents, t): no mutation, deterministic. Returns
/// `(0, 0)` for an empty log or when no treatment window covers `t`, and
/// never fails for out-of-range `t`.
pub fn insulin_calculations(log: &TreatmentLog, t: i64) -> ActivityIob {
    let mut total = ActivityIob::ZERO;

    for treatment in log.iter() {
        let elapsed = t - treatment.time;
        total.activity += activity_contribution(treatment.dose, treatment.duration, elapsed);
        total.iob += iob_contribution(treatment.dose, treatment.duration, elapsed);
    }

    tracing::debug!(
        "insulin_calculations(t={}): activity={:.4} U/min, IOB={:.3} U over {} treatments",
        t,
        total.activity,
        total.iob,
        log.len()
    );

    total
}
