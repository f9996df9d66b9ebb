//! SQL store executing the declarative pipeline plans.
//!
//! Wraps a rusqlite connection, registers the custom functions the plans
//! depend on, loads raw tables, and reads engineered feature rows back.
//! The production deployment points this at a shared database file; tests
//! use an in-memory store.

use rusqlite::functions::{Aggregate, Context, FunctionFlags, WindowAggregate};
use rusqlite::{params, Connection};

use crate::config::TableNames;
use crate::error::Result;
use crate::split::{split_bucket, DatasetSplit};
use crate::timeparse::{self, to_sql_text};
use crate::types::{
    DemographicRecord, FeatureRow, Measurement, RegistrationRecord, SessionizedMeasurement,
};

/// Running sums for the sample standard deviation.
#[derive(Default)]
struct StddevState {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl StddevState {
    fn value(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

/// `stddev_samp(x)`: sample standard deviation, registered as a window
/// function so it also works as a plain aggregate. NULL inputs are
/// ignored; fewer than two observations yield NULL.
struct StddevSamp;

impl Aggregate<StddevState, Option<f64>> for StddevSamp {
    fn init(&self, _ctx: &mut Context<'_>) -> rusqlite::Result<StddevState> {
        Ok(StddevState::default())
    }

    fn step(&self, ctx: &mut Context<'_>, state: &mut StddevState) -> rusqlite::Result<()> {
        if let Some(v) = ctx.get::<Option<f64>>(0)? {
            state.count += 1;
            state.sum += v;
            state.sum_sq += v * v;
        }
        Ok(())
    }

    fn finalize(
        &self,
        _ctx: &mut Context<'_>,
        state: Option<StddevState>,
    ) -> rusqlite::Result<Option<f64>> {
        Ok(state.and_then(|s| s.value()))
    }
}

impl WindowAggregate<StddevState, Option<f64>> for StddevSamp {
    fn value(&self, state: Option<&mut StddevState>) -> rusqlite::Result<Option<f64>> {
        Ok(state.and_then(|s| s.value()))
    }

    fn inverse(&self, ctx: &mut Context<'_>, state: &mut StddevState) -> rusqlite::Result<()> {
        if let Some(v) = ctx.get::<Option<f64>>(0)? {
            state.count -= 1;
            state.sum -= v;
            state.sum_sq -= v * v;
        }
        Ok(())
    }
}

/// Warehouse connection with the pipeline's SQL functions registered.
pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    /// Open (or create) the warehouse database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// In-memory warehouse, used by tests and one-shot runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.create_window_function(
            "stddev_samp",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            StddevSamp,
        )?;

        // Same fingerprint code path as the in-process split.
        conn.create_scalar_function(
            "split_bucket",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let session_id = ctx.get::<String>(0)?;
                Ok(i64::from(split_bucket(&session_id)))
            },
        )?;

        Ok(Self { conn })
    }

    /// Create the raw input tables if they do not exist.
    pub fn create_raw_tables(&self, tables: &TableNames) -> Result<()> {
        self.conn.execute_batch(&format!(
            r#"
CREATE TABLE IF NOT EXISTS {raw} (
    pid INTEGER NOT NULL,
    datatime TEXT,
    sbp REAL,
    dbp REAL,
    dia_temp_value REAL,
    conductivity REAL,
    uf REAL,
    blood_flow REAL
);
CREATE TABLE IF NOT EXISTS {registration} (
    pid INTEGER NOT NULL,
    keyindate INTEGER NOT NULL,
    weightstart REAL,
    weightend REAL,
    dryweight REAL,
    temperature REAL
);
CREATE TABLE IF NOT EXISTS {demographics} (
    pid INTEGER NOT NULL,
    gender TEXT,
    birthday INTEGER,
    first_dialysis INTEGER NOT NULL,
    DM INTEGER
);
"#,
            raw = tables.raw,
            registration = tables.registration,
            demographics = tables.demographics,
        ))?;
        Ok(())
    }

    /// Bulk-insert measurements. Timestamps are stored in the canonical
    /// text form; unparsed timestamps become NULL.
    pub fn load_measurements(&mut self, table: &str, rows: &[Measurement]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table}
                 (pid, datatime, sbp, dbp, dia_temp_value, conductivity, uf, blood_flow)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ))?;
            for m in rows {
                stmt.execute(params![
                    m.pid,
                    m.datatime.map(to_sql_text),
                    m.sbp,
                    m.dbp,
                    m.dia_temp_value,
                    m.conductivity,
                    m.uf,
                    m.blood_flow,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    pub fn load_registration(&mut self, table: &str, rows: &[RegistrationRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table}
                 (pid, keyindate, weightstart, weightend, dryweight, temperature)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for r in rows {
                stmt.execute(params![
                    r.pid,
                    r.keyindate,
                    r.weightstart,
                    r.weightend,
                    r.dryweight,
                    r.temperature,
                ])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    pub fn load_demographics(&mut self, table: &str, rows: &[DemographicRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {table} (pid, gender, birthday, first_dialysis, DM)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            for d in rows {
                stmt.execute(params![d.pid, d.gender, d.birthday, d.first_dialysis, d.dm])?;
            }
        }
        tx.commit()?;
        log::info!("loaded {} rows into {}", rows.len(), table);
        Ok(rows.len())
    }

    /// Execute a generated plan (a `DROP`/`CREATE TABLE AS` batch). Errors
    /// from the store are fatal and propagate unchanged; there is no
    /// partial-result recovery.
    pub fn execute_plan(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn table_count(&self, table: &str) -> Result<i64> {
        let count =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }

    /// (train, test) row counts of a feature table.
    pub fn split_counts(&self, features_table: &str) -> Result<(i64, i64)> {
        let train = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {features_table} WHERE dataset_split = 'TRAIN'"),
            [],
            |row| row.get(0),
        )?;
        let test = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {features_table} WHERE dataset_split = 'TEST'"),
            [],
            |row| row.get(0),
        )?;
        Ok((train, test))
    }

    /// Telemetry rows of a single session, ordered by time.
    pub fn fetch_session(
        &self,
        table: &str,
        session_id: &str,
    ) -> Result<Vec<SessionizedMeasurement>> {
        log::info!("querying for session_id {session_id}");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pid, datatime, sbp, dbp, dia_temp_value, conductivity, uf, blood_flow,
                    is_new_session, session_id, session_start_ts
             FROM {table}
             WHERE session_id = ?1
             ORDER BY datatime"
        ))?;
        let rows = stmt
            .query_map([session_id], map_sessionized)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if rows.is_empty() {
            log::warn!("no data found for session_id {session_id}");
        }
        Ok(rows)
    }

    pub fn fetch_registration(&self, table: &str) -> Result<Vec<RegistrationRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pid, keyindate, weightstart, weightend, dryweight, temperature FROM {table}"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RegistrationRecord {
                    pid: row.get(0)?,
                    keyindate: row.get(1)?,
                    weightstart: row.get(2)?,
                    weightend: row.get(3)?,
                    dryweight: row.get(4)?,
                    temperature: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn fetch_demographics(&self, table: &str) -> Result<Vec<DemographicRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pid, gender, birthday, first_dialysis, DM FROM {table}"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DemographicRecord {
                    pid: row.get(0)?,
                    gender: row.get(1)?,
                    birthday: row.get(2)?,
                    first_dialysis: row.get(3)?,
                    dm: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Read the sessionized table back, ordered like the in-process output.
    pub fn fetch_sessionized(&self, table: &str) -> Result<Vec<SessionizedMeasurement>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT pid, datatime, sbp, dbp, dia_temp_value, conductivity, uf, blood_flow,
                    is_new_session, session_id, session_start_ts
             FROM {table}
             ORDER BY pid, datatime"
        ))?;
        let rows = stmt
            .query_map([], map_sessionized)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Read engineered feature rows back, ordered by (session_id, time_bin)
    /// to match the in-process aggregator's output order.
    pub fn fetch_feature_rows(&self, features_table: &str) -> Result<Vec<FeatureRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT dataset_split, pid, session_id, time_bin,
                    age_at_session, dialysis_vintage_years, fluid_to_remove, minutes_into_session,
                    gender, DM,
                    avg_sbp, min_sbp, stddev_sbp, avg_dbp, avg_dia_temp, avg_conductivity,
                    avg_uf_rate, avg_blood_flow,
                    lag_1_avg_sbp, trend_1_sbp, lag_1_avg_uf_rate, trend_1_conductivity,
                    rolling_avg_sbp, rolling_max_sbp, rolling_stddev_sbp,
                    label
             FROM {features_table}
             ORDER BY session_id, time_bin"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                let split: String = row.get(0)?;
                Ok(FeatureRow {
                    dataset_split: if split == "TRAIN" {
                        DatasetSplit::Train
                    } else {
                        DatasetSplit::Test
                    },
                    pid: row.get(1)?,
                    session_id: row.get(2)?,
                    time_bin: opt_datetime(row.get::<_, Option<String>>(3)?),
                    age_at_session: row.get(4)?,
                    dialysis_vintage_years: row.get(5)?,
                    fluid_to_remove: row.get(6)?,
                    minutes_into_session: row.get(7)?,
                    gender: row.get(8)?,
                    dm: row.get(9)?,
                    avg_sbp: row.get(10)?,
                    min_sbp: row.get(11)?,
                    stddev_sbp: row.get(12)?,
                    avg_dbp: row.get(13)?,
                    avg_dia_temp: row.get(14)?,
                    avg_conductivity: row.get(15)?,
                    avg_uf_rate: row.get(16)?,
                    avg_blood_flow: row.get(17)?,
                    lag_1_avg_sbp: row.get(18)?,
                    trend_1_sbp: row.get(19)?,
                    lag_1_avg_uf_rate: row.get(20)?,
                    trend_1_conductivity: row.get(21)?,
                    rolling_avg_sbp: row.get(22)?,
                    rolling_max_sbp: row.get(23)?,
                    rolling_stddev_sbp: row.get(24)?,
                    label: row.get(25)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn map_sessionized(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionizedMeasurement> {
    Ok(SessionizedMeasurement {
        pid: row.get(0)?,
        datatime: opt_datetime(row.get::<_, Option<String>>(1)?),
        sbp: row.get(2)?,
        dbp: row.get(3)?,
        dia_temp_value: row.get(4)?,
        conductivity: row.get(5)?,
        uf: row.get(6)?,
        blood_flow: row.get(7)?,
        is_new_session: row.get::<_, i64>(8)? != 0,
        session_id: row.get(9)?,
        session_start_ts: opt_datetime(row.get::<_, Option<String>>(10)?),
    })
}

fn opt_datetime(text: Option<String>) -> Option<chrono::NaiveDateTime> {
    text.as_deref().and_then(timeparse::parse_datetime)
}
