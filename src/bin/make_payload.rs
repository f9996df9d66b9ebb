//! Convert a session CSV into an inference payload JSON file.
//!
//! Usage:
//!   make_payload --csv session.csv --out payload.json

use std::error::Error;
use std::path::Path;

use idhflow::{aggregate_features, io, prediction_payload, Config, MODEL_FEATURES};

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
    let csv_path = arg_value(&args, "--csv").ok_or("missing required argument: --csv <file>")?;
    let out_path = arg_value(&args, "--out").ok_or("missing required argument: --out <file>")?;

    let config = Config::from_env();

    let rows = io::load_session_csv(Path::new(&csv_path))?;
    log::info!("creating aggregate features for {} rows", rows.len());
    let features = aggregate_features(&rows, &config.params);

    let payload = prediction_payload(&features, &MODEL_FEATURES)?;
    io::save_payload_json(Path::new(&out_path), &payload)?;
    log::info!(
        "wrote {} instance(s) to {}",
        payload.instances.len(),
        out_path
    );

    Ok(())
}
