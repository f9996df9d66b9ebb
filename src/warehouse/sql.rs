//! Declarative pipeline plans.
//!
//! Training tables are built by a single set-oriented plan per stage rather
//! than row-at-a-time in process: full-population feature engineering does
//! not fit in memory. Each generator returns a `DROP`/`CREATE TABLE … AS`
//! batch mirroring the in-process stages one CTE per step, and must produce
//! numerically identical results for the same inputs and parameters.
//!
//! The plans rely on two functions the store registers on every
//! connection: `stddev_samp` (sample standard deviation, usable as plain
//! aggregate and as window function) and `split_bucket` (stable session
//! fingerprint decile, shared with `crate::split`).

use crate::config::FeatureParams;

/// Plan: sessionize the raw measurement table.
///
/// Flags a row as a session start when it has no predecessor for the same
/// patient or the gap to it exceeds `session_window_hours` (fractional
/// hours, strict); derives 0-based per-patient ordinals and the session
/// start timestamp.
pub fn sessionize_table_sql(
    sessionized_table: &str,
    raw_table: &str,
    session_window_hours: f64,
) -> String {
    format!(
        r#"
DROP TABLE IF EXISTS {sessionized_table};
CREATE TABLE {sessionized_table} AS
WITH new_session_flags AS (
    SELECT
        pid, datatime, sbp, dbp, dia_temp_value, conductivity, uf, blood_flow,
        CASE
            WHEN datatime IS NULL THEN 1
            WHEN LAG(datatime) OVER w IS NULL THEN 1
            WHEN (CAST(strftime('%s', datatime) AS INTEGER)
                  - CAST(strftime('%s', LAG(datatime) OVER w) AS INTEGER)) / 3600.0
                 > {session_window_hours} THEN 1
            ELSE 0
        END AS is_new_session
    FROM {raw_table}
    WINDOW w AS (PARTITION BY pid ORDER BY datatime)
),
session_identifiers AS (
    SELECT
        *,
        CAST(pid AS TEXT) || '_' || CAST(
            SUM(is_new_session) OVER (
                PARTITION BY pid ORDER BY datatime
                ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW
            ) - 1 AS TEXT
        ) AS session_id
    FROM new_session_flags
)
SELECT
    *,
    MIN(datatime) OVER (PARTITION BY session_id) AS session_start_ts
FROM session_identifiers;
"#
    )
}

/// Plan: build the engineered feature table from the sessionized,
/// registration, and demographics tables.
///
/// Stages, one CTE each:
/// 1. `sessionized`  - backfill any missing session start timestamps.
/// 2. `combined`     - inner-join registration (pid + session-start date vs
///    check-in date) and demographics (pid), converting raw integer epochs.
/// 3. `time_binned`  - floor measurements onto the bin grid and aggregate
///    vitals per (pid, session, bin).
/// 4. `static_features` - age, vintage, fluid to remove, minutes into
///    session.
/// 5. `final_features`  - lag/trend, rolling window, and the forward
///    hypotension flag over the next `prediction_intervals` bins.
/// 6. final SELECT   - TRAIN/TEST assignment and the fixed column order,
///    coercing a missing look-ahead to label 0.
pub fn features_table_sql(
    features_table: &str,
    sessionized_table: &str,
    registration_table: &str,
    demographics_table: &str,
    params: &FeatureParams,
) -> String {
    let bin_seconds = params.interval_minutes * 60;
    let rolling = params.rolling_window;
    let look_ahead = params.prediction_intervals;
    let threshold = params.idh_threshold;

    format!(
        r#"
DROP TABLE IF EXISTS {features_table};
CREATE TABLE {features_table} AS
WITH sessionized AS (
    SELECT
        pid,
        datatime AS measurement_ts,
        sbp, dbp, dia_temp_value, conductivity, uf, blood_flow,
        session_id,
        COALESCE(
            session_start_ts,
            MIN(datatime) OVER (PARTITION BY session_id)
        ) AS session_start_ts
    FROM {sessionized_table}
),
combined AS (
    SELECT
        m.*,
        r.weightstart,
        r.dryweight,
        p.gender,
        p.birthday,
        p.DM,
        datetime(p.first_dialysis / 1000 / 1000000, 'unixepoch') AS first_dialysis_ts
    FROM sessionized m
    JOIN {registration_table} r
      ON m.pid = r.pid
     AND date(m.session_start_ts) = date(r.keyindate / 1000 / 1000000, 'unixepoch')
    JOIN {demographics_table} p
      ON m.pid = p.pid
),
time_binned AS (
    SELECT
        pid,
        session_id,
        datetime(
            (CAST(strftime('%s', measurement_ts) AS INTEGER) / {bin_seconds}) * {bin_seconds},
            'unixepoch'
        ) AS time_bin,
        MIN(session_start_ts) AS session_start_ts,
        AVG(sbp) AS avg_sbp,
        MIN(sbp) AS min_sbp,
        stddev_samp(sbp) AS stddev_sbp,
        AVG(dbp) AS avg_dbp,
        AVG(dia_temp_value) AS avg_dia_temp,
        AVG(conductivity) AS avg_conductivity,
        AVG(uf) AS avg_uf_rate,
        AVG(blood_flow) AS avg_blood_flow,
        MIN(weightstart) AS weight_start,
        MIN(dryweight) AS dry_weight,
        MIN(gender) AS gender,
        MIN(birthday) AS birthday,
        MIN(DM) AS DM,
        MIN(first_dialysis_ts) AS first_dialysis_ts
    FROM combined
    WHERE measurement_ts IS NOT NULL
    GROUP BY 1, 2, 3
),
static_features AS (
    SELECT
        *,
        CAST(strftime('%Y', session_start_ts) AS INTEGER) - birthday AS age_at_session,
        CAST(julianday(session_start_ts) - julianday(first_dialysis_ts) AS INTEGER) / 365.25
            AS dialysis_vintage_years,
        weight_start - dry_weight AS fluid_to_remove,
        (CAST(strftime('%s', time_bin) AS INTEGER)
         - CAST(strftime('%s', session_start_ts) AS INTEGER)) / 60.0 AS minutes_into_session
    FROM time_binned
),
final_features AS (
    SELECT
        *,
        LAG(avg_sbp, 1) OVER w AS lag_1_avg_sbp,
        avg_sbp - LAG(avg_sbp, 1) OVER w AS trend_1_sbp,
        LAG(avg_uf_rate, 1) OVER w AS lag_1_avg_uf_rate,
        avg_conductivity - LAG(avg_conductivity, 1) OVER w AS trend_1_conductivity,
        AVG(avg_sbp) OVER (w ROWS BETWEEN {rolling} PRECEDING AND CURRENT ROW)
            AS rolling_avg_sbp,
        MAX(avg_sbp) OVER (w ROWS BETWEEN {rolling} PRECEDING AND CURRENT ROW)
            AS rolling_max_sbp,
        stddev_samp(avg_sbp) OVER (w ROWS BETWEEN {rolling} PRECEDING AND CURRENT ROW)
            AS rolling_stddev_sbp,
        MAX(CASE WHEN min_sbp < {threshold} THEN 1 ELSE 0 END) OVER (
            w ROWS BETWEEN 1 FOLLOWING AND {look_ahead} FOLLOWING
        ) AS future_hypotension
    FROM static_features
    WINDOW w AS (PARTITION BY session_id ORDER BY time_bin)
)
SELECT
    CASE WHEN split_bucket(session_id) < 8 THEN 'TRAIN' ELSE 'TEST' END AS dataset_split,
    pid,
    session_id,
    time_bin,
    age_at_session,
    dialysis_vintage_years,
    fluid_to_remove,
    minutes_into_session,
    gender,
    DM,
    avg_sbp,
    min_sbp,
    stddev_sbp,
    avg_dbp,
    avg_dia_temp,
    avg_conductivity,
    avg_uf_rate,
    avg_blood_flow,
    lag_1_avg_sbp,
    trend_1_sbp,
    lag_1_avg_uf_rate,
    trend_1_conductivity,
    rolling_avg_sbp,
    rolling_max_sbp,
    rolling_stddev_sbp,
    COALESCE(future_hypotension, 0) AS label
FROM final_features;
"#
    )
}
