//! Download the published sample dataset CSVs for local experiments.
//!
//! Usage:
//!   fetch_data [--out data/raw]

use std::error::Error;
use std::path::Path;

use idhflow::fetch::download_raw_files;

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
    let out_dir = arg_value(&args, "--out").unwrap_or_else(|| "data/raw".to_string());

    let dir = download_raw_files(Path::new(&out_dir)).await?;
    log::info!("raw dataset files are in {}", dir.display());

    Ok(())
}
