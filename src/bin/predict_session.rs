//! Score a session against the deployed model endpoint.
//!
//! Accepts either a session CSV (features are computed here) or a
//! ready-made payload JSON, posts it to the configured endpoint, and
//! prints a risk verdict.
//!
//! Usage:
//!   predict_session --csv session.csv
//!   predict_session --json payload.json

use std::error::Error;
use std::path::Path;

use idhflow::model::{high_risk, HttpEndpointClient, PredictionClient};
use idhflow::payload::prepare_for_inference;
use idhflow::{aggregate_features, io, prediction_payload, Config, MODEL_FEATURES};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let csv_path = arg_value(&args, "--csv");
    let json_path = arg_value(&args, "--json");

    let config = Config::from_env();

    let payload = match (csv_path, json_path) {
        (Some(csv), None) => {
            let rows = io::load_session_csv(Path::new(&csv))?;
            let features = aggregate_features(&rows, &config.params);
            prediction_payload(&features, &MODEL_FEATURES)?
        }
        (None, Some(json)) => io::load_payload_json(Path::new(&json))?,
        _ => return Err("provide exactly one of --csv <file> or --json <file>".into()),
    };

    let client = HttpEndpointClient::new(&config.endpoint_url)?;
    let (instances, parameters) = prepare_for_inference(&payload);
    let response = client.predict(&instances, &parameters).await?;

    if let Some(model_id) = &response.deployed_model_id {
        log::info!("scored by deployed model {}", model_id);
    }
    for (i, prediction) in response.predictions.iter().enumerate() {
        log::debug!("prediction[{}]: {}", i, prediction);
    }

    if high_risk(&response.predictions) {
        println!("HIGH IDH RISK");
    } else {
        println!("low IDH risk");
    }

    Ok(())
}
