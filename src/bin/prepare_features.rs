//! Build the training feature table in the warehouse.
//!
//! Loads raw measurement/registration/demographics CSVs into the store,
//! then runs the declarative sessionization and feature-engineering plans.
//!
//! Usage:
//!   prepare_features --measurements machine.csv \
//!                    --registration registration.csv \
//!                    --demographics demographics.csv
//!
//! Warehouse location and pipeline parameters come from the environment
//! (see `Config::from_env`); a `.env` file is honored.

use std::error::Error;
use std::path::Path;

use idhflow::warehouse::{features_table_sql, sessionize_table_sql};
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
    let measurements_path = arg_value(&args, "--measurements")
        .ok_or("missing required argument: --measurements <csv>")?;
    let registration_path = arg_value(&args, "--registration")
        .ok_or("missing required argument: --registration <csv>")?;
    let demographics_path = arg_value(&args, "--demographics")
        .ok_or("missing required argument: --demographics <csv>")?;

    let config = Config::from_env();

    let measurements = if measurements_path.ends_with(".jsonl") {
        io::load_measurements_jsonl(Path::new(&measurements_path))?
    } else {
        io::load_measurements_csv(Path::new(&measurements_path))?
    };
    let registration = io::load_registration_csv(Path::new(&registration_path))?;
    let demographics = io::load_demographics_csv(Path::new(&demographics_path))?;
    log::info!(
        "loaded {} measurements, {} registration rows, {} demographics rows",
        measurements.len(),
        registration.len(),
        demographics.len()
    );

    let mut warehouse = Warehouse::open(&config.db_path)?;
    warehouse.create_raw_tables(&config.tables)?;

    // Re-runs replace the raw tables wholesale.
    for table in [
        &config.tables.raw,
        &config.tables.registration,
        &config.tables.demographics,
    ] {
        warehouse.execute_plan(&format!("DELETE FROM {table};"))?;
    }
    warehouse.load_measurements(&config.tables.raw, &measurements)?;
    warehouse.load_registration(&config.tables.registration, &registration)?;
    warehouse.load_demographics(&config.tables.demographics, &demographics)?;

    log::info!("building sessionized table `{}`", config.tables.sessionized);
    warehouse.execute_plan(&sessionize_table_sql(
        &config.tables.sessionized,
        &config.tables.raw,
        config.session_window_hours,
    ))?;

    log::info!("building feature table `{}`", config.tables.features);
    warehouse.execute_plan(&features_table_sql(
        &config.tables.features,
        &config.tables.sessionized,
        &config.tables.registration,
        &config.tables.demographics,
        &config.params,
    ))?;

    let sessionized_rows = warehouse.table_count(&config.tables.sessionized)?;
    let feature_rows = warehouse.table_count(&config.tables.features)?;
    let (train, test) = warehouse.split_counts(&config.tables.features)?;
    log::info!(
        "done: {} sessionized rows, {} feature rows ({} TRAIN / {} TEST) in {}",
        sessionized_rows,
        feature_rows,
        train,
        test,
        config.db_path
    );

    Ok(())
}
