//! Building Meter Simulation
//!
//! Generates realistic multi-building hourly meter data for testing
//! Wattline. Simulates:
//! - Daily occupancy cycles (office-hours peak, overnight trough)
//! - Weekday/weekend load difference
//! - Temperature-driven load (cooling above the comfort band)
//! - Injected waste events (stuck dampers, overrides) for the detector to find
//!
//! # Usage
//! ```bash
//! simulation --buildings 20 --days 30 --waste-events 15 --output readings.csv
//! wattline --input readings.csv
//! ```

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal, Uniform};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

// ============================================================================
// Simulation Constants
// ============================================================================

/// Comfort band upper edge; cooling load grows above this (°C)
const COOLING_SETPOINT_C: f64 = 18.0;
/// Occupied-hours load share on top of the overnight base fraction
const OCCUPANCY_SWING: f64 = 0.45;
/// Overnight fraction of a building's base load
const OVERNIGHT_FRACTION: f64 = 0.55;
/// Weekend multiplier on the occupancy swing
const WEEKEND_FACTOR: f64 = 0.35;
/// Gaussian noise as a fraction of base load
const NOISE_FRACTION: f64 = 0.04;
/// Building archetypes assigned round-robin
const PRIMARY_USES: [&str; 5] = ["Office", "Education", "Retail", "Healthcare", "Lodging"];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "meter-simulation")]
#[command(about = "Building meter data simulation for Wattline testing")]
#[command(version)]
struct Args {
    /// Number of buildings to simulate
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=500))]
    buildings: u32,

    /// Days of hourly history per building
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(2..=365))]
    days: u32,

    /// Waste events to inject across the fleet
    #[arg(short, long, default_value = "10")]
    waste_events: u32,

    /// Output CSV path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Suppress the injected-event log on stderr
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Building Model
// ============================================================================

struct Building {
    id: String,
    base_load_kwh: f64,
    square_feet: f64,
    primary_use: &'static str,
    /// Cooling load per degree above the setpoint (kWh/°C)
    temp_sensitivity: f64,
}

/// One injected waste window: a multiplier applied to a building's usage.
struct WasteEvent {
    building_idx: usize,
    start_hour: usize,
    duration_hours: usize,
    multiplier: f64,
}

fn make_buildings(count: u32, rng: &mut StdRng) -> Vec<Building> {
    let base = Uniform::new(25.0, 140.0);
    let sqft = Uniform::new(8_000.0_f64, 120_000.0);
    let sensitivity = Uniform::new(0.8, 3.5);
    (0..count)
        .map(|i| Building {
            id: format!("B{:03}", i + 1),
            base_load_kwh: base.sample(rng),
            square_feet: (sqft.sample(rng) / 100.0).round() * 100.0,
            primary_use: PRIMARY_USES[i as usize % PRIMARY_USES.len()],
            temp_sensitivity: sensitivity.sample(rng),
        })
        .collect()
}

fn make_waste_events(
    count: u32,
    buildings: usize,
    total_hours: usize,
    rng: &mut StdRng,
) -> Vec<WasteEvent> {
    // Events only land after the first day so the detector's warm-up
    // window doesn't swallow them.
    (0..count)
        .map(|_| WasteEvent {
            building_idx: rng.gen_range(0..buildings),
            start_hour: rng.gen_range(24..total_hours.saturating_sub(8).max(25)),
            duration_hours: rng.gen_range(2..=8),
            multiplier: rng.gen_range(1.5..2.8),
        })
        .collect()
}

/// Outdoor temperature at the given hour: a mild diurnal cycle peaking
/// mid-afternoon.
fn outdoor_temp(ts: DateTime<Utc>, rng: &mut StdRng) -> f64 {
    let hour = f64::from(ts.hour());
    let diurnal = 6.0 * (2.0 * std::f64::consts::PI * (hour - 15.0) / 24.0).cos();
    14.0 + diurnal + rng.gen_range(-1.0..1.0)
}

/// Expected load for a building at an hour, before waste injection.
fn hourly_load(building: &Building, ts: DateTime<Utc>, temp: f64, noise: f64) -> f64 {
    let hour = f64::from(ts.hour());
    // Occupied-hours bump centered on 13:00
    let occupancy = (-((hour - 13.0) / 4.5).powi(2)).exp();
    let weekend = ts.weekday().num_days_from_monday() >= 5;
    let swing = if weekend {
        OCCUPANCY_SWING * WEEKEND_FACTOR
    } else {
        OCCUPANCY_SWING
    };

    let base = building.base_load_kwh * (OVERNIGHT_FRACTION + swing * occupancy);
    let cooling = building.temp_sensitivity * (temp - COOLING_SETPOINT_C).max(0.0);
    (base + cooling + noise).max(0.0)
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);

    let total_hours = (args.days * 24) as usize;
    let buildings = make_buildings(args.buildings, &mut rng);
    let events = make_waste_events(args.waste_events, buildings.len(), total_hours, &mut rng);
    #[allow(clippy::expect_used)]
    let start = Utc
        .with_ymd_and_hms(2017, 1, 2, 0, 0, 0)
        .single()
        .expect("fixed simulation start date is valid");

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    if !args.quiet {
        eprintln!(
            "meter-simulation: {} buildings × {} days, {} waste events, seed {}",
            args.buildings, args.days, args.waste_events, seed
        );
        for e in &events {
            eprintln!(
                "  injected: {} hour {}..{} ×{:.2}",
                buildings[e.building_idx].id,
                e.start_hour,
                e.start_hour + e.duration_hours,
                e.multiplier
            );
        }
    }

    writeln!(
        out,
        "timestamp,building_id,meter_reading,air_temperature,square_feet,primary_use"
    )?;

    for (b_idx, building) in buildings.iter().enumerate() {
        let noise_dist = Normal::new(0.0, building.base_load_kwh * NOISE_FRACTION)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        for h in 0..total_hours {
            let ts = start + Duration::hours(h as i64);
            let temp = outdoor_temp(ts, &mut rng);
            let mut load = hourly_load(building, ts, temp, noise_dist.sample(&mut rng));

            for e in &events {
                if e.building_idx == b_idx
                    && h >= e.start_hour
                    && h < e.start_hour + e.duration_hours
                {
                    load *= e.multiplier;
                }
            }

            writeln!(
                out,
                "{},{},{:.3},{:.2},{:.0},{}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                building.id,
                load,
                temp,
                building.square_feet,
                building.primary_use
            )?;
        }
    }

    out.flush()
}
