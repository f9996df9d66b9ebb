//! Feature aggregation: the in-process half of the dual pipeline.
//!
//! Enriched measurements are floored onto a fixed time-bin grid, aggregated
//! per (session, bin), decorated with static/session-level features, then
//! with lag/trend/rolling statistics and the forward-looking hypotension
//! label. The warehouse plan in `warehouse::sql` expresses the same
//! computation declaratively; the two must agree numerically on identical
//! inputs and parameters.
//!
//! Ordering is load-bearing: lag, rolling, and label values are only
//! correct when bins are processed in (session_id, time_bin) ascending
//! order, which this module establishes before any window computation.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};

use crate::config::FeatureParams;
use crate::split::DatasetSplit;
use crate::timeparse;
use crate::types::{EnrichedMeasurement, FeatureRow};

/// One aggregated (session, time bin) group before window features.
struct BinnedRow {
    pid: i64,
    session_id: String,
    time_bin: NaiveDateTime,
    session_start_ts: Option<NaiveDateTime>,
    first_dialysis_ts: Option<NaiveDateTime>,
    avg_sbp: Option<f64>,
    min_sbp: Option<f64>,
    stddev_sbp: Option<f64>,
    avg_dbp: Option<f64>,
    avg_dia_temp: Option<f64>,
    avg_conductivity: Option<f64>,
    avg_uf_rate: Option<f64>,
    avg_blood_flow: Option<f64>,
    weight_start: Option<f64>,
    dry_weight: Option<f64>,
    gender: Option<String>,
    birthday: Option<i64>,
    dm: Option<i64>,
}

/// Aggregate enriched measurements into labeled feature rows.
///
/// Rows without a timestamp are excluded from binning (their session
/// membership was still established upstream). The output is sorted by
/// (session_id, time_bin) and is deterministic for a given input: no
/// clocks, no randomness, stable grouping.
pub fn aggregate_features(
    measurements: &[EnrichedMeasurement],
    params: &FeatureParams,
) -> Vec<FeatureRow> {
    // Group into (session, bin); BTreeMap keys double as the final sort.
    let mut groups: BTreeMap<(String, NaiveDateTime), Vec<&EnrichedMeasurement>> = BTreeMap::new();
    for m in measurements {
        let Some(ts) = m.datatime else {
            continue;
        };
        let bin = timeparse::floor_to_bin(ts, params.interval_minutes);
        groups
            .entry((m.session_id.clone(), bin))
            .or_default()
            .push(m);
    }

    let binned: Vec<BinnedRow> = groups
        .into_iter()
        .map(|((session_id, time_bin), group)| bin_group(session_id, time_bin, &group))
        .collect();

    let mut out = Vec::with_capacity(binned.len());
    let mut start = 0;
    while start < binned.len() {
        let mut end = start + 1;
        while end < binned.len() && binned[end].session_id == binned[start].session_id {
            end += 1;
        }
        window_features(&binned[start..end], params, &mut out);
        start = end;
    }
    out
}

/// Collapse one (session, bin) group of measurements into a `BinnedRow`.
fn bin_group(session_id: String, time_bin: NaiveDateTime, group: &[&EnrichedMeasurement]) -> BinnedRow {
    let sbp: Vec<f64> = group.iter().filter_map(|m| m.sbp).collect();
    let dbp: Vec<f64> = group.iter().filter_map(|m| m.dbp).collect();
    let dia_temp: Vec<f64> = group.iter().filter_map(|m| m.dia_temp_value).collect();
    let conductivity: Vec<f64> = group.iter().filter_map(|m| m.conductivity).collect();
    let uf: Vec<f64> = group.iter().filter_map(|m| m.uf).collect();
    let blood_flow: Vec<f64> = group.iter().filter_map(|m| m.blood_flow).collect();

    BinnedRow {
        pid: group[0].pid,
        session_id,
        time_bin,
        session_start_ts: group.iter().find_map(|m| m.session_start_ts),
        first_dialysis_ts: group.iter().find_map(|m| m.first_dialysis_ts),
        avg_sbp: mean(&sbp),
        min_sbp: min_value(&sbp),
        stddev_sbp: stddev_samp(&sbp),
        avg_dbp: mean(&dbp),
        avg_dia_temp: mean(&dia_temp),
        avg_conductivity: mean(&conductivity),
        avg_uf_rate: mean(&uf),
        avg_blood_flow: mean(&blood_flow),
        weight_start: group.iter().find_map(|m| m.weightstart),
        dry_weight: group.iter().find_map(|m| m.dryweight),
        gender: group.iter().find_map(|m| m.gender.clone()),
        birthday: group.iter().find_map(|m| m.birthday),
        dm: group.iter().find_map(|m| m.dm),
    }
}

/// Compute lag/trend, rolling, and label features for one session's bins
/// (already in time_bin order) and push the finished rows.
fn window_features(session: &[BinnedRow], params: &FeatureParams, out: &mut Vec<FeatureRow>) {
    let n = session.len();
    let hypotensive: Vec<bool> = session
        .iter()
        .map(|b| b.min_sbp.map(|v| v < params.idh_threshold).unwrap_or(false))
        .collect();

    for (i, bin) in session.iter().enumerate() {
        let prev = if i > 0 { Some(&session[i - 1]) } else { None };

        let lag_1_avg_sbp = prev.and_then(|p| p.avg_sbp);
        let lag_1_avg_uf_rate = prev.and_then(|p| p.avg_uf_rate);
        let trend_1_sbp = sub(bin.avg_sbp, lag_1_avg_sbp);
        let trend_1_conductivity = sub(bin.avg_conductivity, prev.and_then(|p| p.avg_conductivity));

        let lo = i.saturating_sub(params.rolling_window);
        let window: Vec<f64> = session[lo..=i].iter().filter_map(|b| b.avg_sbp).collect();

        // Look ahead over whatever future bins exist; an empty window is 0,
        // never null.
        let horizon = (i + params.prediction_intervals).min(n.saturating_sub(1));
        let label = ((i + 1)..=horizon).any(|j| hypotensive[j]) as i64;

        out.push(FeatureRow {
            dataset_split: DatasetSplit::for_session_id(&bin.session_id),
            pid: bin.pid,
            session_id: bin.session_id.clone(),
            time_bin: Some(bin.time_bin),
            age_at_session: age_at_session(bin.session_start_ts, bin.birthday),
            dialysis_vintage_years: vintage_years(bin.session_start_ts, bin.first_dialysis_ts),
            fluid_to_remove: sub(bin.weight_start, bin.dry_weight),
            minutes_into_session: bin
                .session_start_ts
                .map(|start| (bin.time_bin - start).num_seconds() as f64 / 60.0),
            gender: bin.gender.clone(),
            dm: bin.dm,
            avg_sbp: bin.avg_sbp,
            min_sbp: bin.min_sbp,
            stddev_sbp: bin.stddev_sbp,
            avg_dbp: bin.avg_dbp,
            avg_dia_temp: bin.avg_dia_temp,
            avg_conductivity: bin.avg_conductivity,
            avg_uf_rate: bin.avg_uf_rate,
            avg_blood_flow: bin.avg_blood_flow,
            lag_1_avg_sbp,
            trend_1_sbp,
            lag_1_avg_uf_rate,
            trend_1_conductivity,
            rolling_avg_sbp: mean(&window),
            rolling_max_sbp: max_value(&window),
            rolling_stddev_sbp: stddev_samp(&window),
            label,
        });
    }
}

/// Age at session start, from the start year and birth year.
fn age_at_session(start: Option<NaiveDateTime>, birthday: Option<i64>) -> Option<i64> {
    match (start, birthday) {
        (Some(start), Some(birth_year)) => Some(i64::from(start.year()) - birth_year),
        _ => None,
    }
}

/// Whole elapsed days between first dialysis and session start, over 365.25.
fn vintage_years(start: Option<NaiveDateTime>, first: Option<NaiveDateTime>) -> Option<f64> {
    match (start, first) {
        (Some(start), Some(first)) => Some((start - first).num_days() as f64 / 365.25),
        _ => None,
    }
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a - b),
        _ => None,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn min_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

fn max_value(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Sample standard deviation (ddof = 1); `None` below two observations.
fn stddev_samp(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(variance.sqrt())
}
