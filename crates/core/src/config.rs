use serde::Deserialize;

use crate::error::{ChurnError, ChurnResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `LISTING_CHURN__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub churn: ChurnConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChurnConfig {
    /// Gaps between spans of one advertiser up to this many seconds are
    /// bridged when merging. Zero means only touching or overlapping spans
    /// merge.
    #[serde(default = "default_merge_gap_tolerance_secs")]
    pub merge_gap_tolerance_secs: i64,
    /// Decimal places to round the churn rate to. `None` keeps it exact.
    #[serde(default)]
    pub churn_rate_scale: Option<u32>,
    #[serde(default = "default_series_capacity_hint")]
    pub series_capacity_hint: usize,
}

// Default functions
fn default_merge_gap_tolerance_secs() -> i64 {
    0
}
fn default_series_capacity_hint() -> usize {
    24
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            merge_gap_tolerance_secs: default_merge_gap_tolerance_secs(),
            churn_rate_scale: None,
            series_capacity_hint: default_series_capacity_hint(),
        }
    }
}

impl ChurnConfig {
    pub fn merge_gap_tolerance(&self) -> ChurnResult<chrono::Duration> {
        chrono::Duration::try_seconds(self.merge_gap_tolerance_secs).ok_or_else(|| {
            ChurnError::invalid(format!(
                "merge_gap_tolerance_secs out of range, got {}",
                self.merge_gap_tolerance_secs
            ))
        })
    }

    pub fn validate(&self) -> ChurnResult<()> {
        if self.merge_gap_tolerance_secs < 0 {
            return Err(ChurnError::invalid(format!(
                "merge_gap_tolerance_secs must not be negative, got {}",
                self.merge_gap_tolerance_secs
            )));
        }
        self.merge_gap_tolerance()?;
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> ChurnResult<Self> {
        Self::load_from(None)
    }

    /// Same as [`AppConfig::load`], reading `path` (TOML) before the
    /// environment when given.
    pub fn load_from(path: Option<&str>) -> ChurnResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("LISTING_CHURN")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.churn.merge_gap_tolerance_secs, 0);
        assert_eq!(config.churn.churn_rate_scale, None);
        assert_eq!(config.churn.series_capacity_hint, 24);
        assert!(config.churn.validate().is_ok());
    }

    #[test]
    fn test_partial_section_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"churn": {"churn_rate_scale": 4}}"#).unwrap();
        assert_eq!(config.churn.churn_rate_scale, Some(4));
        assert_eq!(config.churn.merge_gap_tolerance_secs, 0);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let churn = ChurnConfig {
            merge_gap_tolerance_secs: -1,
            ..ChurnConfig::default()
        };
        assert!(churn.validate().is_err());
    }

    #[test]
    fn test_tolerance_duration() {
        let churn = ChurnConfig {
            merge_gap_tolerance_secs: 86_400,
            ..ChurnConfig::default()
        };
        assert_eq!(churn.merge_gap_tolerance().unwrap(), chrono::Duration::days(1));
    }

    #[test]
    fn test_out_of_range_tolerance_rejected() {
        let churn = ChurnConfig {
            merge_gap_tolerance_secs: i64::MAX,
            ..ChurnConfig::default()
        };
        assert!(matches!(churn.validate(), Err(ChurnError::InvalidArgument(_))));
        assert!(churn.merge_gap_tolerance().is_err());
    }

    #[test]
    fn test_missing_config_file_is_config_error() {
        let err = AppConfig::load_from(Some("/nonexistent/listing-churn/config.toml")).unwrap_err();
        assert!(matches!(err, ChurnError::Config(_)));
    }
}
