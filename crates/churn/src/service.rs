//! Churn service — loads intervals from an [`IntervalSource`] and answers
//! window, single-month, and monthly-series queries.

use chrono::{DateTime, Utc};
use listing_core::{ChurnConfig, ChurnError, ChurnFilter, ChurnResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::calculator::CohortCalculator;
use crate::ledger::IntervalSource;
use crate::metrics::{ChurnMetrics, ChurnMetricsPoint};
use crate::series::{month_start_of, next_month_start, validate_month_bounds, MonthlySeriesBuilder};

pub struct ChurnService {
    source: Arc<dyn IntervalSource>,
    config: ChurnConfig,
}

impl ChurnService {
    pub fn new(source: Arc<dyn IntervalSource>, config: ChurnConfig) -> ChurnResult<Self> {
        config.validate()?;
        info!(
            merge_gap_tolerance_secs = config.merge_gap_tolerance_secs,
            churn_rate_scale = ?config.churn_rate_scale,
            "ChurnService initialized"
        );
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &ChurnConfig {
        &self.config
    }

    /// Metrics for `[window_start, window_end_open)`.
    pub fn compute_window(
        &self,
        window_start: DateTime<Utc>,
        window_end_open: DateTime<Utc>,
        filter: &ChurnFilter,
    ) -> ChurnResult<ChurnMetrics> {
        if window_end_open <= window_start {
            return Err(ChurnError::invalid(format!(
                "window end {window_end_open} must be after window start {window_start}"
            )));
        }

        let calculator = self.calculator(filter)?;
        let metrics = calculator.compute_window(window_start, window_end_open)?;

        info!(
            window_start = %window_start,
            window_end_open = %window_end_open,
            ?filter,
            active_at_start = metrics.active_at_start,
            activated = metrics.activated_in_window,
            churned = metrics.churned_in_window,
            active_at_end = metrics.active_at_end,
            churn_rate = %metrics.churn_rate,
            "Churn window computed"
        );
        Ok(metrics)
    }

    /// Metrics for the UTC calendar month containing `month`.
    pub fn compute_month(
        &self,
        month: DateTime<Utc>,
        filter: &ChurnFilter,
    ) -> ChurnResult<ChurnMetrics> {
        let start = month_start_of(month)?;
        let end_open = next_month_start(start)?;
        self.compute_window(start, end_open, filter)
    }

    /// One point per month in `[start_month, end_month_open)`. Intervals are
    /// loaded and merged once and shared by every month.
    pub fn compute_monthly_series(
        &self,
        start_month: DateTime<Utc>,
        end_month_open: DateTime<Utc>,
        filter: &ChurnFilter,
        cancel: &CancellationToken,
    ) -> ChurnResult<Vec<ChurnMetricsPoint>> {
        validate_month_bounds(start_month, end_month_open)?;
        if start_month >= end_month_open {
            debug!(
                start_month = %start_month,
                end_month_open = %end_month_open,
                "Empty month range, returning empty series"
            );
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ChurnError::Cancelled);
        }

        let calculator = self.calculator(filter)?;
        let points = MonthlySeriesBuilder::new(&calculator)
            .with_capacity_hint(self.config.series_capacity_hint)
            .build(start_month, end_month_open, cancel)?;

        info!(
            start_month = %start_month,
            end_month_open = %end_month_open,
            ?filter,
            months = points.len(),
            "Monthly churn series computed"
        );
        Ok(points)
    }

    fn calculator(&self, filter: &ChurnFilter) -> ChurnResult<CohortCalculator> {
        let intervals = self.source.paid_intervals(filter)?;
        Ok(
            CohortCalculator::new(intervals, filter, self.config.merge_gap_tolerance()?)
                .with_rate_scale(self.config.churn_rate_scale),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::ActivityInterval;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    /// Serves fixed intervals and counts how often it is queried.
    struct CountingSource {
        intervals: Vec<ActivityInterval>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(intervals: Vec<ActivityInterval>) -> Arc<Self> {
            Arc::new(Self {
                intervals,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl IntervalSource for CountingSource {
        fn paid_intervals(&self, _filter: &ChurnFilter) -> ChurnResult<Vec<ActivityInterval>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.intervals.clone())
        }
    }

    struct FailingSource;

    impl IntervalSource for FailingSource {
        fn paid_intervals(&self, _filter: &ChurnFilter) -> ChurnResult<Vec<ActivityInterval>> {
            Err(ChurnError::Source(anyhow::anyhow!("invoice store offline")))
        }
    }

    #[test]
    fn test_invalid_window_skips_source() {
        let source = CountingSource::new(vec![]);
        let service = ChurnService::new(source.clone(), ChurnConfig::default()).unwrap();

        let err = service
            .compute_window(at(2025, 2, 1), at(2025, 1, 1), &ChurnFilter::all())
            .unwrap_err();
        assert!(matches!(err, ChurnError::InvalidArgument(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_series_loads_intervals_once() {
        let source = CountingSource::new(vec![ActivityInterval::new(
            1,
            at(2025, 1, 10),
            at(2025, 3, 5),
        )]);
        let service = ChurnService::new(source.clone(), ChurnConfig::default()).unwrap();

        let points = service
            .compute_monthly_series(
                at(2025, 1, 1),
                at(2025, 7, 1),
                &ChurnFilter::all(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(points.len(), 6);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_series_skips_source() {
        let source = CountingSource::new(vec![]);
        let service = ChurnService::new(source.clone(), ChurnConfig::default()).unwrap();

        let points = service
            .compute_monthly_series(
                at(2025, 3, 1),
                at(2025, 3, 1),
                &ChurnFilter::all(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert!(points.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_compute_month_normalizes_instant() {
        let source = CountingSource::new(vec![ActivityInterval::new(
            4,
            at(2025, 2, 10),
            at(2025, 2, 20),
        )]);
        let service = ChurnService::new(source, ChurnConfig::default()).unwrap();

        let mid_month = Utc.with_ymd_and_hms(2025, 2, 14, 9, 30, 0).unwrap();
        let m = service.compute_month(mid_month, &ChurnFilter::all()).unwrap();
        assert_eq!(m.window_start_utc, at(2025, 2, 1));
        assert_eq!(m.window_end_open_utc, at(2025, 3, 1));
        assert_eq!(m.activated_in_window, 1);
        assert_eq!(m.churned_in_window, 1);
    }

    #[test]
    fn test_rate_scale_from_config() {
        let source = CountingSource::new(vec![
            ActivityInterval::new(1, at(2024, 1, 1), at(2025, 1, 10)),
            ActivityInterval::new(2, at(2024, 1, 1), at(2025, 6, 1)),
            ActivityInterval::new(3, at(2024, 1, 1), at(2025, 6, 1)),
        ]);
        let config = ChurnConfig {
            churn_rate_scale: Some(4),
            ..ChurnConfig::default()
        };
        let service = ChurnService::new(source, config).unwrap();

        let m = service
            .compute_window(at(2025, 1, 1), at(2025, 2, 1), &ChurnFilter::all())
            .unwrap();
        assert_eq!(m.churn_rate, Decimal::new(3333, 4));
    }

    #[test]
    fn test_source_error_propagates() {
        let service = ChurnService::new(Arc::new(FailingSource), ChurnConfig::default()).unwrap();
        let err = service
            .compute_window(at(2025, 1, 1), at(2025, 2, 1), &ChurnFilter::all())
            .unwrap_err();
        assert!(matches!(err, ChurnError::Source(_)));
        assert!(err.to_string().contains("invoice store offline"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ChurnConfig {
            merge_gap_tolerance_secs: -5,
            ..ChurnConfig::default()
        };
        assert!(ChurnService::new(CountingSource::new(vec![]), config).is_err());
    }

    #[test]
    fn test_oversized_tolerance_rejected_at_construction() {
        let source = CountingSource::new(vec![]);
        let config = ChurnConfig {
            merge_gap_tolerance_secs: i64::MAX,
            ..ChurnConfig::default()
        };
        let err = ChurnService::new(source.clone(), config).err().unwrap();
        assert!(matches!(err, ChurnError::InvalidArgument(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }
}
