//! File IO: CSV and JSON-lines loading, session CSV persistence, payload
//! files.
//!
//! The session CSV keeps a stable 17-column order (the contract with
//! collaborators that produce and consume these files); loading infers
//! `session_start_ts` from the rows rather than trusting the file.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payload::PredictionPayload;
use crate::timeparse::serde_naive_opt;
use crate::types::{DemographicRecord, EnrichedMeasurement, Measurement, RegistrationRecord};

/// Column order of the persisted session CSV.
pub const SESSION_CSV_COLUMNS: [&str; 17] = [
    "pid",
    "datatime",
    "session_id",
    "first_dialysis_ts",
    "sbp",
    "dbp",
    "dia_temp_value",
    "conductivity",
    "uf",
    "blood_flow",
    "weightstart",
    "weightend",
    "dryweight",
    "temperature",
    "gender",
    "birthday",
    "DM",
];

/// On-disk session row. Field order mirrors [`SESSION_CSV_COLUMNS`];
/// `session_start_ts` is intentionally absent and recomputed on load.
#[derive(Debug, Serialize, Deserialize)]
struct SessionCsvRow {
    pid: i64,
    #[serde(with = "serde_naive_opt")]
    datatime: Option<NaiveDateTime>,
    session_id: String,
    #[serde(with = "serde_naive_opt")]
    first_dialysis_ts: Option<NaiveDateTime>,
    sbp: Option<f64>,
    dbp: Option<f64>,
    dia_temp_value: Option<f64>,
    conductivity: Option<f64>,
    uf: Option<f64>,
    blood_flow: Option<f64>,
    weightstart: Option<f64>,
    weightend: Option<f64>,
    dryweight: Option<f64>,
    temperature: Option<f64>,
    gender: Option<String>,
    birthday: Option<i64>,
    #[serde(rename = "DM")]
    dm: Option<i64>,
}

/// Load a session CSV and infer the session start timestamp per session.
pub fn load_session_csv(path: &Path) -> Result<Vec<EnrichedMeasurement>> {
    log::info!("loading session data from {}", path.display());
    let mut reader = csv::Reader::from_path(path)?;
    let rows: Vec<SessionCsvRow> = reader.deserialize().collect::<csv::Result<_>>()?;

    let mut starts: HashMap<String, NaiveDateTime> = HashMap::new();
    for row in &rows {
        if let Some(ts) = row.datatime {
            starts
                .entry(row.session_id.clone())
                .and_modify(|s| *s = (*s).min(ts))
                .or_insert(ts);
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let session_start_ts = starts.get(&row.session_id).copied();
            EnrichedMeasurement {
                pid: row.pid,
                datatime: row.datatime,
                session_id: row.session_id,
                session_start_ts,
                first_dialysis_ts: row.first_dialysis_ts,
                sbp: row.sbp,
                dbp: row.dbp,
                dia_temp_value: row.dia_temp_value,
                conductivity: row.conductivity,
                uf: row.uf,
                blood_flow: row.blood_flow,
                weightstart: row.weightstart,
                weightend: row.weightend,
                dryweight: row.dryweight,
                temperature: row.temperature,
                gender: row.gender,
                birthday: row.birthday,
                dm: row.dm,
            }
        })
        .collect())
}

/// Persist session rows with the stable column order.
pub fn save_session_csv(path: &Path, rows: &[EnrichedMeasurement]) -> Result<()> {
    log::info!("saving session data as {}", path.display());
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(SessionCsvRow {
            pid: row.pid,
            datatime: row.datatime,
            session_id: row.session_id.clone(),
            first_dialysis_ts: row.first_dialysis_ts,
            sbp: row.sbp,
            dbp: row.dbp,
            dia_temp_value: row.dia_temp_value,
            conductivity: row.conductivity,
            uf: row.uf,
            blood_flow: row.blood_flow,
            weightstart: row.weightstart,
            weightend: row.weightend,
            dryweight: row.dryweight,
            temperature: row.temperature,
            gender: row.gender.clone(),
            birthday: row.birthday,
            dm: row.dm,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Load raw telemetry measurements from CSV.
pub fn load_measurements_csv(path: &Path) -> Result<Vec<Measurement>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<csv::Result<_>>()?;
    Ok(rows)
}

/// Load raw telemetry measurements from a JSON-lines file.
pub fn load_measurements_jsonl(path: &Path) -> Result<Vec<Measurement>> {
    let reader = BufReader::new(File::open(path)?);
    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(&line)?);
    }
    Ok(rows)
}

pub fn load_registration_csv(path: &Path) -> Result<Vec<RegistrationRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<csv::Result<_>>()?;
    Ok(rows)
}

pub fn load_demographics_csv(path: &Path) -> Result<Vec<DemographicRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<csv::Result<_>>()?;
    Ok(rows)
}

/// Write a prediction payload as pretty-printed JSON.
pub fn save_payload_json(path: &Path, payload: &PredictionPayload) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, payload)?;
    log::info!("saved payload to {}", path.display());
    Ok(())
}

/// Read a prediction payload from a JSON file.
pub fn load_payload_json(path: &Path) -> Result<PredictionPayload> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeparse::parse_datetime;
    use std::io::Write;

    fn sample_row(ts: &str) -> EnrichedMeasurement {
        EnrichedMeasurement {
            pid: 1,
            datatime: parse_datetime(ts),
            session_id: "1_0".to_string(),
            session_start_ts: None,
            first_dialysis_ts: parse_datetime("2020-01-01 00:00:00"),
            sbp: Some(120.0),
            dbp: Some(75.0),
            dia_temp_value: Some(36.4),
            conductivity: Some(14.1),
            uf: Some(0.4),
            blood_flow: Some(280.0),
            weightstart: Some(72.0),
            weightend: Some(70.0),
            dryweight: Some(69.5),
            temperature: Some(22.0),
            gender: Some("M".to_string()),
            birthday: Some(1969),
            dm: Some(0),
        }
    }

    #[test]
    fn test_session_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");

        let rows = vec![
            sample_row("2024-01-01 00:15:00"),
            sample_row("2024-01-01 00:00:00"),
        ];
        save_session_csv(&path, &rows).unwrap();

        // Header preserves the stable column order.
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, SESSION_CSV_COLUMNS.join(","));

        let loaded = load_session_csv(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        // Session start is inferred as the minimum timestamp in the file.
        assert_eq!(
            loaded[0].session_start_ts,
            parse_datetime("2024-01-01 00:00:00")
        );
        assert_eq!(loaded[0].datatime, parse_datetime("2024-01-01 00:15:00"));
        assert_eq!(loaded[1].gender.as_deref(), Some("M"));
    }

    #[test]
    fn test_measurement_csv_tolerates_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "pid,datatime,sbp,dbp,dia_temp_value,conductivity,uf,blood_flow").unwrap();
        writeln!(f, "1,2024-01-01 10:00:00,120.5,70,,14.0,0.5,300").unwrap();
        writeln!(f, "1,garbage,110,,,,,").unwrap();
        drop(f);

        let rows = load_measurements_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].datatime, parse_datetime("2024-01-01 10:00:00"));
        assert_eq!(rows[0].dia_temp_value, None);
        // Unparseable timestamp degrades to None instead of failing the load.
        assert_eq!(rows[1].datatime, None);
        assert_eq!(rows[1].sbp, Some(110.0));
    }

    #[test]
    fn test_measurement_jsonl_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machine.jsonl");
        let mut f = File::create(&path).unwrap();
        writeln!(
            f,
            r#"{{"pid": 1, "datatime": "2024-01-01 10:00:00", "sbp": 120.0, "dbp": null, "dia_temp_value": null, "conductivity": null, "uf": null, "blood_flow": null}}"#
        )
        .unwrap();
        writeln!(f).unwrap();
        drop(f);

        let rows = load_measurements_jsonl(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sbp, Some(120.0));
    }
}
