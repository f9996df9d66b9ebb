//! Gap-threshold sessionization.
//!
//! A session is a maximal run of one patient's measurements in which no
//! consecutive gap exceeds the session window. Sessionization never drops
//! or duplicates rows; it only annotates them.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::types::{Measurement, SessionizedMeasurement};

/// Assign session ids and session start timestamps to a measurement stream.
///
/// Steps:
/// 1. Stable-sort by (pid, timestamp); identical timestamps keep their
///    input order, rows with an unparsed timestamp sort first.
/// 2. A row starts a new session when its gap to the previous row of the
///    same patient is undefined (first row, or either timestamp missing)
///    or exceeds `session_window_hours` (fractional hours, strict).
/// 3. Session ordinal is the 0-based running count of new-session flags
///    per patient; session id is `"{pid}_{ordinal}"`.
/// 4. Session start is the earliest timestamp among rows sharing an id.
///
/// Output length always equals input length.
pub fn sessionize(
    measurements: &[Measurement],
    session_window_hours: f64,
) -> Vec<SessionizedMeasurement> {
    let mut sorted: Vec<&Measurement> = measurements.iter().collect();
    sorted.sort_by(|a, b| (a.pid, a.datatime).cmp(&(b.pid, b.datatime)));

    let mut rows = Vec::with_capacity(sorted.len());
    let mut prev: Option<(i64, Option<NaiveDateTime>)> = None;
    let mut ordinal: i64 = -1;

    for m in sorted {
        let gap_hours = match prev {
            Some((prev_pid, prev_ts)) if prev_pid == m.pid => match (prev_ts, m.datatime) {
                (Some(a), Some(b)) => Some((b - a).num_seconds() as f64 / 3600.0),
                _ => None,
            },
            _ => {
                // New patient partition
                ordinal = -1;
                None
            }
        };

        let is_new_session = match gap_hours {
            Some(gap) => gap > session_window_hours,
            None => true,
        };
        if is_new_session {
            ordinal += 1;
        }

        rows.push(SessionizedMeasurement {
            pid: m.pid,
            datatime: m.datatime,
            sbp: m.sbp,
            dbp: m.dbp,
            dia_temp_value: m.dia_temp_value,
            conductivity: m.conductivity,
            uf: m.uf,
            blood_flow: m.blood_flow,
            is_new_session,
            session_id: format!("{}_{}", m.pid, ordinal),
            session_start_ts: None,
        });

        prev = Some((m.pid, m.datatime));
    }

    let starts = session_start_times(&rows);
    for row in &mut rows {
        row.session_start_ts = starts.get(&row.session_id).copied().flatten();
    }

    rows
}

/// Earliest measurement timestamp per session id. Sessions whose rows all
/// lack a timestamp map to `None`.
pub fn session_start_times(
    rows: &[SessionizedMeasurement],
) -> HashMap<String, Option<NaiveDateTime>> {
    let mut starts: HashMap<String, Option<NaiveDateTime>> = HashMap::new();
    for row in rows {
        let entry = starts.entry(row.session_id.clone()).or_insert(None);
        if let Some(ts) = row.datatime {
            *entry = Some(match *entry {
                Some(current) => current.min(ts),
                None => ts,
            });
        }
    }
    starts
}
