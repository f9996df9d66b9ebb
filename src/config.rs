//! Runtime configuration from environment variables.
//!
//! Binaries load `.env` via dotenv before calling [`Config::from_env`].
//! The feature-engineering parameters live in [`FeatureParams`] and are
//! passed explicitly into both the in-process aggregator and the warehouse
//! plan generator, so the two substrates always run under identical values.

use std::env;

/// Parameters shared by the in-process and declarative feature pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureParams {
    /// Time-bin width in minutes.
    pub interval_minutes: i64,
    /// Number of *preceding* bins in a rolling window; the window covers
    /// `rolling_window + 1` rows including the current one.
    pub rolling_window: usize,
    /// Forward look-ahead in bins for the hypotension label.
    pub prediction_intervals: usize,
    /// Systolic BP threshold (mmHg) below which a bin is hypotensive.
    pub idh_threshold: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            interval_minutes: 15,
            rolling_window: 3,
            prediction_intervals: 5,
            idh_threshold: 90.0,
        }
    }
}

/// Warehouse table names.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub raw: String,
    pub sessionized: String,
    pub registration: String,
    pub demographics: String,
    pub features: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            raw: "machine_data".to_string(),
            sessionized: "sessionized_machine_data".to_string(),
            registration: "registration_data".to_string(),
            demographics: "patient_demographics".to_string(),
            features: "model_features".to_string(),
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the warehouse database file.
    pub db_path: String,
    /// Prediction endpoint URL; empty when inference is not configured.
    pub endpoint_url: String,
    /// Session split threshold in hours.
    pub session_window_hours: f64,
    pub tables: TableNames,
    pub params: FeatureParams,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `IDH_DB_PATH` (default: idh.db)
    /// - `IDH_ENDPOINT_URL` (default: empty)
    /// - `IDH_SESSION_WINDOW_HOURS` (default: 12)
    /// - `IDH_INTERVAL_MINUTES` (default: 15)
    /// - `IDH_ROLLING_WINDOW` (default: 3)
    /// - `IDH_PREDICTION_INTERVALS` (default: 5)
    /// - `IDH_THRESHOLD` (default: 90.0)
    /// - `IDH_RAW_TABLE`, `IDH_SESSIONIZED_TABLE`, `IDH_REGISTRATION_TABLE`,
    ///   `IDH_DEMOGRAPHICS_TABLE`, `IDH_FEATURES_TABLE`
    pub fn from_env() -> Self {
        let defaults = FeatureParams::default();
        let tables = TableNames::default();

        Self {
            db_path: env::var("IDH_DB_PATH").unwrap_or_else(|_| "idh.db".to_string()),

            endpoint_url: env::var("IDH_ENDPOINT_URL").unwrap_or_default(),

            session_window_hours: env::var("IDH_SESSION_WINDOW_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(12.0),

            tables: TableNames {
                raw: env::var("IDH_RAW_TABLE").unwrap_or(tables.raw),
                sessionized: env::var("IDH_SESSIONIZED_TABLE").unwrap_or(tables.sessionized),
                registration: env::var("IDH_REGISTRATION_TABLE").unwrap_or(tables.registration),
                demographics: env::var("IDH_DEMOGRAPHICS_TABLE").unwrap_or(tables.demographics),
                features: env::var("IDH_FEATURES_TABLE").unwrap_or(tables.features),
            },

            params: FeatureParams {
                interval_minutes: env::var("IDH_INTERVAL_MINUTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.interval_minutes),

                rolling_window: env::var("IDH_ROLLING_WINDOW")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.rolling_window),

                prediction_intervals: env::var("IDH_PREDICTION_INTERVALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.prediction_intervals),

                idh_threshold: env::var("IDH_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.idh_threshold),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Default and override checks share one #[test]: they mutate
    // process-global env vars and must not interleave under the parallel
    // test runner.
    #[test]
    fn test_config_from_env() {
        let vars = [
            "IDH_DB_PATH",
            "IDH_ENDPOINT_URL",
            "IDH_SESSION_WINDOW_HOURS",
            "IDH_INTERVAL_MINUTES",
            "IDH_ROLLING_WINDOW",
            "IDH_PREDICTION_INTERVALS",
            "IDH_THRESHOLD",
        ];
        for v in vars {
            env::remove_var(v);
        }

        let config = Config::from_env();
        assert_eq!(config.db_path, "idh.db");
        assert_eq!(config.endpoint_url, "");
        assert_eq!(config.session_window_hours, 12.0);
        assert_eq!(config.params, FeatureParams::default());
        assert_eq!(config.tables.features, "model_features");

        env::set_var("IDH_DB_PATH", "/tmp/test.db");
        env::set_var("IDH_SESSION_WINDOW_HOURS", "6");
        env::set_var("IDH_ROLLING_WINDOW", "2");
        env::set_var("IDH_THRESHOLD", "85");

        let config = Config::from_env();
        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.session_window_hours, 6.0);
        assert_eq!(config.params.rolling_window, 2);
        assert_eq!(config.params.idh_threshold, 85.0);
        // Unset values keep their defaults
        assert_eq!(config.params.prediction_intervals, 5);

        for v in vars {
            env::remove_var(v);
        }
    }
}
