//! Joins sessionized telemetry with registration and demographic data.
//!
//! Both joins are inner joins: measurements without a matching registration
//! row (same patient, same check-in date as the session start) or without a
//! demographics row are dropped, not errored. That silent loss is inherited
//! source behavior that downstream consumers rely on; the dropped counts
//! are logged so reduced row counts stay visible.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::timeparse;
use crate::types::{
    DemographicRecord, EnrichedMeasurement, Measurement, RegistrationRecord,
    SessionizedMeasurement,
};

/// A sessionized measurement with its registration attributes attached.
#[derive(Debug, Clone)]
pub struct RegisteredMeasurement {
    pub inner: SessionizedMeasurement,
    pub weightstart: Option<f64>,
    pub weightend: Option<f64>,
    pub dryweight: Option<f64>,
    pub temperature: Option<f64>,
}

/// Inner-join sessionized rows with registration records on patient id and
/// the calendar date of the session start vs. the check-in date.
///
/// Registration rows with an unconvertible `keyindate` never match. A
/// measurement matching several registration rows fans out (no dedup).
pub fn join_registration(
    rows: &[SessionizedMeasurement],
    registrations: &[RegistrationRecord],
) -> Vec<RegisteredMeasurement> {
    let mut by_key: HashMap<(i64, NaiveDate), Vec<&RegistrationRecord>> = HashMap::new();
    for reg in registrations {
        if let Some(ts) = timeparse::from_raw_epoch(reg.keyindate) {
            by_key.entry((reg.pid, ts.date())).or_default().push(reg);
        }
    }

    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(start) = row.session_start_ts else {
            continue;
        };
        let Some(matches) = by_key.get(&(row.pid, start.date())) else {
            continue;
        };
        for reg in matches {
            joined.push(RegisteredMeasurement {
                inner: row.clone(),
                weightstart: reg.weightstart,
                weightend: reg.weightend,
                dryweight: reg.dryweight,
                temperature: reg.temperature,
            });
        }
    }

    if joined.len() < rows.len() {
        log::warn!(
            "registration join dropped {} of {} measurement rows",
            rows.len() - joined.len(),
            rows.len()
        );
    }
    joined
}

/// Inner-join registered rows with demographics on patient id, converting
/// the raw first-dialysis epoch to a timestamp.
pub fn join_demographics(
    rows: &[RegisteredMeasurement],
    demographics: &[DemographicRecord],
) -> Vec<EnrichedMeasurement> {
    let mut by_pid: HashMap<i64, Vec<&DemographicRecord>> = HashMap::new();
    for demo in demographics {
        by_pid.entry(demo.pid).or_default().push(demo);
    }

    let mut joined = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(matches) = by_pid.get(&row.inner.pid) else {
            continue;
        };
        for demo in matches {
            joined.push(EnrichedMeasurement {
                pid: row.inner.pid,
                datatime: row.inner.datatime,
                session_id: row.inner.session_id.clone(),
                session_start_ts: row.inner.session_start_ts,
                first_dialysis_ts: timeparse::from_raw_epoch(demo.first_dialysis),
                sbp: row.inner.sbp,
                dbp: row.inner.dbp,
                dia_temp_value: row.inner.dia_temp_value,
                conductivity: row.inner.conductivity,
                uf: row.inner.uf,
                blood_flow: row.inner.blood_flow,
                weightstart: row.weightstart,
                weightend: row.weightend,
                dryweight: row.dryweight,
                temperature: row.temperature,
                gender: demo.gender.clone(),
                birthday: demo.birthday,
                dm: demo.dm,
            });
        }
    }

    if joined.len() < rows.len() {
        log::warn!(
            "demographics join dropped {} of {} rows",
            rows.len() - joined.len(),
            rows.len()
        );
    }
    joined
}

/// Sessionize and fully enrich a raw measurement stream.
pub fn enrich(
    measurements: &[Measurement],
    registrations: &[RegistrationRecord],
    demographics: &[DemographicRecord],
    session_window_hours: f64,
) -> Vec<EnrichedMeasurement> {
    let sessionized = crate::session::sessionize(measurements, session_window_hours);
    let registered = join_registration(&sessionized, registrations);
    join_demographics(&registered, demographics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeparse::parse_datetime;

    /// Raw epoch integer for midnight of the given date (micros * 1000).
    fn raw_epoch(date: &str) -> i64 {
        parse_datetime(date).unwrap().and_utc().timestamp() * 1_000_000_000
    }

    fn sessionized(pid: i64, ts: &str, start: &str) -> SessionizedMeasurement {
        SessionizedMeasurement {
            pid,
            datatime: parse_datetime(ts),
            sbp: Some(110.0),
            dbp: None,
            dia_temp_value: None,
            conductivity: None,
            uf: None,
            blood_flow: None,
            is_new_session: true,
            session_id: format!("{pid}_0"),
            session_start_ts: parse_datetime(start),
        }
    }

    #[test]
    fn test_registration_join_matches_on_pid_and_date() {
        let rows = vec![
            sessionized(1, "2024-01-01 10:00:00", "2024-01-01 09:00:00"),
            sessionized(2, "2024-01-01 10:00:00", "2024-01-01 09:00:00"),
        ];
        let regs = vec![RegistrationRecord {
            pid: 1,
            keyindate: raw_epoch("2024-01-01 07:30:00"),
            weightstart: Some(70.0),
            weightend: Some(68.0),
            dryweight: Some(67.0),
            temperature: Some(21.5),
        }];

        let joined = join_registration(&rows, &regs);
        // Patient 2 has no registration row and is silently dropped.
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].inner.pid, 1);
        assert_eq!(joined[0].weightstart, Some(70.0));
    }

    #[test]
    fn test_registration_join_rejects_wrong_date() {
        let rows = vec![sessionized(1, "2024-01-02 10:00:00", "2024-01-02 09:00:00")];
        let regs = vec![RegistrationRecord {
            pid: 1,
            keyindate: raw_epoch("2024-01-01 07:30:00"),
            weightstart: Some(70.0),
            weightend: None,
            dryweight: None,
            temperature: None,
        }];
        assert!(join_registration(&rows, &regs).is_empty());
    }

    #[test]
    fn test_demographics_join_converts_first_dialysis() {
        let rows = vec![sessionized(1, "2024-01-01 10:00:00", "2024-01-01 09:00:00")];
        let regs = vec![RegistrationRecord {
            pid: 1,
            keyindate: raw_epoch("2024-01-01 00:00:00"),
            weightstart: Some(70.0),
            weightend: None,
            dryweight: Some(67.0),
            temperature: None,
        }];
        let demos = vec![DemographicRecord {
            pid: 1,
            gender: Some("F".to_string()),
            birthday: Some(1980),
            first_dialysis: raw_epoch("2020-01-01 00:00:00"),
            dm: Some(1),
        }];

        let enriched = join_demographics(&join_registration(&rows, &regs), &demos);
        assert_eq!(enriched.len(), 1);
        assert_eq!(enriched[0].gender.as_deref(), Some("F"));
        assert_eq!(
            enriched[0].first_dialysis_ts,
            parse_datetime("2020-01-01 00:00:00")
        );
    }

    #[test]
    fn test_duplicate_demographics_fan_out() {
        // The join is not deduplicated; a duplicated patient row fans out.
        let rows = vec![sessionized(1, "2024-01-01 10:00:00", "2024-01-01 09:00:00")];
        let regs = vec![RegistrationRecord {
            pid: 1,
            keyindate: raw_epoch("2024-01-01 00:00:00"),
            weightstart: None,
            weightend: None,
            dryweight: None,
            temperature: None,
        }];
        let demo = DemographicRecord {
            pid: 1,
            gender: Some("M".to_string()),
            birthday: Some(1975),
            first_dialysis: raw_epoch("2019-06-01 00:00:00"),
            dm: Some(0),
        };
        let enriched =
            join_demographics(&join_registration(&rows, &regs), &[demo.clone(), demo]);
        assert_eq!(enriched.len(), 2);
    }
}
