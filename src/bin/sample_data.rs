//! Generate seeded synthetic input CSVs for demos and local testing.
//!
//! Produces machine_data.csv, registration_data.csv, and
//! patient_demographics.csv in the output directory. The same seed always
//! produces the same files.
//!
//! Usage:
//!   sample_data --out data/ [--patients 5] [--seed 42]

use std::error::Error;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use idhflow::timeparse::to_sql_text;
use idhflow::{DemographicRecord, Measurement, RegistrationRecord};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Raw integer epoch as the source systems encode it (1000x microseconds).
fn raw_epoch(ts: chrono::NaiveDateTime) -> i64 {
    ts.and_utc().timestamp() * 1_000_000_000
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let out_dir = arg_value(&args, "--out").ok_or("missing required argument: --out <dir>")?;
    let patients: i64 = arg_value(&args, "--patients")
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);

    let out_dir = Path::new(&out_dir);
    std::fs::create_dir_all(out_dir)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut measurements: Vec<Measurement> = Vec::new();
    let mut registrations: Vec<RegistrationRecord> = Vec::new();
    let mut demographics: Vec<DemographicRecord> = Vec::new();

    for pid in 1..=patients {
        let birthday = rng.gen_range(1940..1990);
        let first_dialysis = NaiveDate::from_ymd_opt(rng.gen_range(2015..2023), 6, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        demographics.push(DemographicRecord {
            pid,
            gender: Some(if rng.gen_bool(0.5) { "F" } else { "M" }.to_string()),
            birthday: Some(birthday),
            first_dialysis: raw_epoch(first_dialysis),
            dm: Some(i64::from(rng.gen_bool(0.4))),
        });

        let sessions: u32 = rng.gen_range(2..=4);
        for session in 0..sessions {
            // Sessions two days apart, starting at 08:00.
            let day = NaiveDate::from_ymd_opt(2024, 3, 4 + session * 2).unwrap();
            let start = day.and_hms_opt(8, 0, 0).unwrap();

            let weightstart = rng.gen_range(58.0..92.0);
            let dryweight = weightstart - rng.gen_range(1.5..3.5);
            registrations.push(RegistrationRecord {
                pid,
                keyindate: raw_epoch(day.and_hms_opt(7, 0, 0).unwrap()),
                weightstart: Some(weightstart),
                weightend: Some(dryweight + rng.gen_range(0.0..0.6)),
                dryweight: Some(dryweight),
                temperature: Some(rng.gen_range(20.0..24.0)),
            });

            // ~4 hours of telemetry at 5-minute cadence. Systolic BP is a
            // bounded random walk that sometimes drifts into hypotension.
            let mut sbp: f64 = rng.gen_range(110.0..150.0);
            let dipping = rng.gen_bool(0.3);
            for step in 0..48 {
                sbp += rng.gen_range(-6.0..5.0);
                if dipping && step > 30 {
                    sbp -= rng.gen_range(0.0..4.0);
                }
                sbp = sbp.clamp(70.0, 190.0);

                measurements.push(Measurement {
                    pid,
                    datatime: Some(start + Duration::minutes(step * 5)),
                    sbp: Some((sbp * 10.0).round() / 10.0),
                    dbp: Some(((sbp * 0.62 + rng.gen_range(-4.0..4.0)) * 10.0).round() / 10.0),
                    dia_temp_value: Some(36.5 + rng.gen_range(-0.3..0.3)),
                    conductivity: Some(14.0 + rng.gen_range(-0.3..0.3)),
                    uf: Some(rng.gen_range(0.3..0.8)),
                    blood_flow: Some(rng.gen_range(250.0..350.0)),
                });
            }
        }
    }

    write_csv(&out_dir.join("machine_data.csv"), &measurements)?;
    write_csv(&out_dir.join("registration_data.csv"), &registrations)?;
    write_csv(&out_dir.join("patient_demographics.csv"), &demographics)?;

    log::info!(
        "wrote {} measurements, {} registration rows, {} demographics rows to {}",
        measurements.len(),
        registrations.len(),
        demographics.len(),
        out_dir.display()
    );
    // A quick sanity line so users can eyeball the time range.
    if let (Some(first), Some(last)) = (measurements.first(), measurements.last()) {
        log::info!(
            "telemetry spans {} .. {}",
            first.datatime.map(to_sql_text).unwrap_or_default(),
            last.datatime.map(to_sql_text).unwrap_or_default()
        );
    }

    Ok(())
}

fn write_csv<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
