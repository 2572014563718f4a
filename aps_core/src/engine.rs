//! Dosing engine facade.
//!
//! Owns the treatment log and the validated profile, and exposes the four
//! controller operations as synchronous, non-blocking calls. The engine is
//! built for a single-threaded control loop: the external scheduler
//! supplies `t` and the glucose reading each tick, and hands the returned
//! rate to the pump driver. Callers that share an engine across threads
//! must wrap it in their own mutex.

use crate::{
    forecast, model, policy, ActivityIob, Forecast, Profile, RateDecision, Result, Treatment,
    TreatmentLog,
};

/// A dosing engine instance with a fixed profile and an append-only log
#[derive(Clone, Debug)]
pub struct Engine {
    profile: Profile,
    treatments: TreatmentLog,
}

impl Engine {
    /// Construct an engine with an empty treatment log.
    ///
    /// Fails if the profile is malformed; no dosing decision is ever
    /// produced from an invalid configuration.
    pub fn new(profile: Profile) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            treatments: TreatmentLog::new(),
        })
    }

    /// Construct an engine with a log pre-populated from persistence
    pub fn with_treatments(profile: Profile, treatments: TreatmentLog) -> Result<Self> {
        profile.validate()?;
        Ok(Self {
            profile,
            treatments,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn treatments(&self) -> &TreatmentLog {
        &self.treatments
    }

    /// Record a delivered treatment. Append-only, O(1), infallible.
    pub fn add_treatment(&mut self, treatment: Treatment) {
        tracing::debug!(
            "Logged {:?}: {:.2} U over {} min at t={}",
            treatment.kind,
            treatment.dose,
            treatment.duration,
            treatment.time
        );
        self.treatments.append(treatment);
    }

    /// Total insulin activity and IOB at query time `t`
    pub fn insulin_calculations(&self, t: i64) -> ActivityIob {
        model::insulin_calculations(&self.treatments, t)
    }

    /// Project glucose from a reading and insulin state
    pub fn bg_forecast(&self, current_bg: f64, activity: f64, iob: f64) -> Forecast {
        forecast::bg_forecast(current_bg, activity, iob, self.profile.isf)
    }

    /// Decide the basal rate at time `t` for the current glucose reading
    pub fn basal_rate(&self, t: i64, current_bg: f64) -> RateDecision {
        policy::basal_rate(&self.profile, &self.treatments, t, current_bg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RateReason, TreatmentKind};

    #[test]
    fn test_refuses_invalid_profile() {
        let mut profile = Profile::default();
        profile.isf = -1.0;
        assert!(Engine::new(profile).is_err());

        let mut profile = Profile::default();
        profile.threshold_bg = 200.0;
        assert!(Engine::new(profile).is_err());
    }

    #[test]
    fn test_empty_log_at_target_yields_baseline() {
        // End-to-end: empty log, BG equal to target
        let engine = Engine::new(Profile::default()).unwrap();

        let calc = engine.insulin_calculations(0);
        assert_eq!(calc, ActivityIob::ZERO);

        let forecast = engine.bg_forecast(110.0, calc.activity, calc.iob);
        assert_eq!(forecast.naive, 110.0);
        assert_eq!(forecast.eventual, 110.0);

        let decision = engine.basal_rate(0, 110.0);
        assert_eq!(decision.reason, RateReason::Baseline);
        assert_eq!(decision.rate, 1.0);
    }

    #[test]
    fn test_half_elapsed_bolus_end_to_end() {
        let mut engine = Engine::new(Profile::default()).unwrap();
        engine.add_treatment(Treatment::new(TreatmentKind::Bolus, 0, 2.0, 180));

        let calc = engine.insulin_calculations(90);
        assert!(calc.activity > 0.0);
        assert!(calc.iob > 0.0 && calc.iob < 2.0);

        let forecast = engine.bg_forecast(150.0, calc.activity, calc.iob);
        assert!(forecast.naive < 150.0);
        assert!(forecast.eventual < 150.0);
    }

    #[test]
    fn test_hypoglycemia_suspend_end_to_end() {
        let mut engine = Engine::new(Profile::default()).unwrap();
        engine.add_treatment(Treatment::new(TreatmentKind::Bolus, 0, 2.0, 180));

        let decision = engine.basal_rate(90, 65.0);
        assert_eq!(decision.rate, 0.0);
        assert_eq!(decision.reason, RateReason::Suspend);
    }

    #[test]
    fn test_with_treatments_seeds_log() {
        let mut log = TreatmentLog::new();
        log.append(Treatment::new(TreatmentKind::BasalSegment, 0, 0.5, 60));

        let engine = Engine::with_treatments(Profile::default(), log).unwrap();
        assert_eq!(engine.treatments().len(), 1);
        assert!(engine.insulin_calculations(30).iob > 0.0);
    }
}
