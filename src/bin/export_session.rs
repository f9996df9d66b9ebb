//! Export one session from the warehouse as a session CSV.
//!
//! Pulls the session's telemetry from the sessionized table, enriches it
//! with registration and demographics in process, and writes
//! `<save_dir>/<session_id>.csv` in the stable session column order. The
//! file feeds make_payload / predict_session.
//!
//! Usage:
//!   export_session --session-id 1025914_383 [--save-dir data]

use std::error::Error;
use std::path::Path;

use idhflow::enrich::{join_demographics, join_registration};
use idhflow::{io, Config, Warehouse};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let session_id = arg_value(&args, "--session-id")
        .ok_or("missing required argument: --session-id <id>")?;
    let save_dir = arg_value(&args, "--save-dir").unwrap_or_else(|| "data".to_string());

    let config = Config::from_env();
    let warehouse = Warehouse::open(&config.db_path)?;

    let machine = warehouse.fetch_session(&config.tables.sessionized, &session_id)?;
    if machine.is_empty() {
        return Err(format!("session {session_id} not found in the warehouse").into());
    }
    let registration = warehouse.fetch_registration(&config.tables.registration)?;
    let demographics = warehouse.fetch_demographics(&config.tables.demographics)?;

    let enriched = join_demographics(&join_registration(&machine, &registration), &demographics);
    if enriched.is_empty() {
        return Err(format!("session {session_id} has no registration/demographics match").into());
    }

    std::fs::create_dir_all(&save_dir)?;
    let out_path = Path::new(&save_dir).join(format!("{session_id}.csv"));
    io::save_session_csv(&out_path, &enriched)?;
    log::info!("wrote {} rows to {}", enriched.len(), out_path.display());

    Ok(())
}
