use aps_core::*;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aps")]
#[command(about = "Closed-loop insulin dosing controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a delivered insulin bolus to the treatment WAL
    Bolus {
        /// Insulin units delivered
        #[arg(long)]
        units: f64,

        /// Action window in minutes (defaults to the profile DIA)
        #[arg(long)]
        duration: Option<i64>,

        /// Delivery time in controller minutes (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Compute activity/IOB, forecast, and basal rate for a glucose reading
    Decide {
        /// Current glucose in mg/dL (falls back to the glucose signal file)
        #[arg(long)]
        bg: Option<f64>,

        /// Query time in controller minutes (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Roll up WAL treatments to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },

    /// Run a closed-loop virtual-patient simulation (in-memory only)
    Simulate {
        /// Number of control-loop ticks
        #[arg(long, default_value_t = 48)]
        steps: u32,

        /// Minutes between ticks
        #[arg(long, default_value_t = 5)]
        interval: i64,

        /// Starting glucose in mg/dL
        #[arg(long, default_value_t = 140.0)]
        bg: f64,

        /// RNG seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    aps_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Bolus {
            units,
            duration,
            at,
        } => cmd_bolus(data_dir, &config, units, duration, at),
        Commands::Decide { bg, at } => cmd_decide(data_dir, &config, bg, at),
        Commands::Rollup { cleanup } => cmd_rollup(data_dir, cleanup),
        Commands::Simulate {
            steps,
            interval,
            bg,
            seed,
        } => cmd_simulate(&config, steps, interval, bg, seed),
    }
}

/// Minutes since the Unix epoch, the controller's clock
fn current_minutes() -> i64 {
    chrono::Utc::now().timestamp() / 60
}

fn wal_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("wal").join("treatments.wal")
}

fn csv_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("treatments.csv")
}

fn cmd_bolus(
    data_dir: PathBuf,
    config: &Config,
    units: f64,
    duration: Option<i64>,
    at: Option<i64>,
) -> Result<()> {
    // Caller contract: well-formed input only
    if units < 0.0 {
        return Err(Error::Other(format!("dose must be non-negative: {}", units)));
    }
    let duration = duration.unwrap_or_else(|| config.profile.default_duration_minutes());
    if duration <= 0 {
        return Err(Error::Other(format!(
            "duration must be positive: {}",
            duration
        )));
    }

    let time = at.unwrap_or_else(current_minutes);
    let treatment = Treatment::new(TreatmentKind::Bolus, time, units, duration);

    let mut sink = JsonlSink::new(wal_path(&data_dir));
    sink.append(&treatment)?;

    println!(
        "✓ Logged {:.2} U bolus over {} min at t={}",
        units, duration, time
    );

    Ok(())
}

fn cmd_decide(
    data_dir: PathBuf,
    config: &Config,
    bg: Option<f64>,
    at: Option<i64>,
) -> Result<()> {
    let glucose_path = data_dir.join("glucose").join("latest.json");

    let current_bg = match bg {
        Some(bg) => bg,
        None => match load_glucose_signal(&glucose_path)? {
            Some(reading) => reading.mg_dl,
            None => {
                return Err(Error::Other(
                    "no glucose reading: pass --bg or provide the glucose signal file".into(),
                ))
            }
        },
    };

    let t = at.unwrap_or_else(current_minutes);

    // Seed the engine from persistence (7-day window covers any DIA)
    let treatments = load_recent_treatments(&wal_path(&data_dir), &csv_path(&data_dir), 7)?;
    let engine = Engine::with_treatments(config.profile.clone(), treatments)?;

    let calc = engine.insulin_calculations(t);
    let forecast = engine.bg_forecast(current_bg, calc.activity, calc.iob);
    let decision = engine.basal_rate(t, current_bg);

    println!("Glucose:  {:.0} mg/dL at t={}", current_bg, t);
    println!("Activity: {:.4} U/min", calc.activity);
    println!("IOB:      {:.2} U", calc.iob);
    println!(
        "Forecast: naive {:.0} mg/dL, eventual {:.0} mg/dL",
        forecast.naive, forecast.eventual
    );
    println!(
        "Basal rate: {:.2} U/h ({})",
        decision.rate,
        reason_label(decision.reason)
    );

    Ok(())
}

fn cmd_rollup(data_dir: PathBuf, cleanup: bool) -> Result<()> {
    let wal_dir = data_dir.join("wal");
    let wal_path = wal_path(&data_dir);
    let csv_path = csv_path(&data_dir);

    if !wal_path.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = aps_core::csv_rollup::wal_to_csv_and_archive(&wal_path, &csv_path)?;

    println!("✓ Rolled up {} treatments to CSV", count);
    println!("  CSV: {}", csv_path.display());

    if cleanup {
        let cleaned = aps_core::csv_rollup::cleanup_processed_wals(&wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

fn cmd_simulate(
    config: &Config,
    steps: u32,
    interval: i64,
    start_bg: f64,
    seed: Option<u64>,
) -> Result<()> {
    if interval <= 0 {
        return Err(Error::Other(format!(
            "interval must be positive: {}",
            interval
        )));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut engine = Engine::new(config.profile.clone())?;
    let profile = engine.profile().clone();
    let dia_minutes = profile.default_duration_minutes();

    let mut bg = start_bg;
    let mut t: i64 = 0;
    let mut in_range_ticks = 0u32;

    println!("{:>6}  {:>7}  {:>6}  {:>6}  reason", "t", "bg", "iob", "rate");

    for _ in 0..steps {
        let decision = engine.basal_rate(t, bg);
        let calc = engine.insulin_calculations(t);

        println!(
            "{:>6}  {:>7.1}  {:>6.2}  {:>6.2}  {}",
            t,
            bg,
            calc.iob,
            decision.rate,
            reason_label(decision.reason)
        );

        if bg >= profile.threshold_bg && bg <= profile.target_bg + 70.0 {
            in_range_ticks += 1;
        }

        // Deliver the decided rate back into the loop as a basal segment
        let dose = decision.rate * interval as f64 / 60.0;
        if dose > 0.0 {
            engine.add_treatment(Treatment::new(
                TreatmentKind::BasalSegment,
                t,
                dose,
                dia_minutes,
            ));
        }

        // Virtual patient: endogenous/meal rise minus insulin action, plus
        // sensor noise. Coarse but enough to exercise the whole ladder.
        let rise = rng.gen_range(0.2..0.7);
        let noise = rng.gen_range(-2.0..2.0);
        bg += (rise - calc.activity * profile.isf) * interval as f64 + noise;
        bg = bg.clamp(40.0, 400.0);

        t += interval;
    }

    println!(
        "Simulation complete: {} ticks of {} min, {:.0}% in range",
        steps,
        interval,
        100.0 * f64::from(in_range_ticks) / f64::from(steps.max(1))
    );

    Ok(())
}

fn reason_label(reason: RateReason) -> &'static str {
    match reason {
        RateReason::Suspend => "suspend",
        RateReason::Correction => "correction",
        RateReason::Baseline => "baseline",
    }
}
