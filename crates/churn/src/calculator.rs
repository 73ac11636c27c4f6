//! Cohort calculator — active/activated/churned counts for one window.

use chrono::{DateTime, Duration, Utc};
use listing_core::{AdvertiserId, ChurnError, ChurnFilter, ChurnResult};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::interval::{build_timelines, ActivityInterval, Timeline};
use crate::metrics::ChurnMetrics;

/// Holds merged timelines for one scope and answers window queries over
/// them. Building is the expensive part; queries only read.
#[derive(Debug, Clone)]
pub struct CohortCalculator {
    timelines: BTreeMap<AdvertiserId, Timeline>,
    filter: ChurnFilter,
    rate_scale: Option<u32>,
}

impl CohortCalculator {
    /// Filters `intervals` to `filter`, then merges them per advertiser.
    pub fn new<I>(intervals: I, filter: &ChurnFilter, merge_gap_tolerance: Duration) -> Self
    where
        I: IntoIterator<Item = ActivityInterval>,
    {
        Self {
            timelines: build_timelines(intervals, filter, merge_gap_tolerance),
            filter: *filter,
            rate_scale: None,
        }
    }

    /// Round churn rates to `scale` decimal places.
    pub fn with_rate_scale(mut self, scale: Option<u32>) -> Self {
        self.rate_scale = scale;
        self
    }

    pub fn filter(&self) -> &ChurnFilter {
        &self.filter
    }

    pub fn advertiser_count(&self) -> usize {
        self.timelines.len()
    }

    pub fn compute_window(
        &self,
        window_start: DateTime<Utc>,
        window_end_open: DateTime<Utc>,
    ) -> ChurnResult<ChurnMetrics> {
        if window_end_open <= window_start {
            return Err(ChurnError::invalid(format!(
                "window end {window_end_open} must be after window start {window_start}"
            )));
        }

        let mut active_at_start = 0usize;
        let mut active_at_end = 0usize;
        let mut unique_active = 0usize;
        let mut churned_from_start_cohort = 0usize;
        let mut activated_ids = Vec::new();
        let mut churned_ids = Vec::new();

        for (&advertiser_id, timeline) in &self.timelines {
            let at_start = timeline.active_at(window_start);
            let at_end = timeline.active_at(window_end_open);

            if at_start {
                active_at_start += 1;
                if !at_end {
                    churned_from_start_cohort += 1;
                }
            }
            if at_end {
                active_at_end += 1;
            }
            if timeline.active_during(window_start, window_end_open) {
                unique_active += 1;
            }

            let first = timeline.first_start();
            if !at_start && window_start <= first && first < window_end_open {
                activated_ids.push(advertiser_id);
            }

            // Churn looks only at the final span: any later renewal means the
            // advertiser did not leave.
            let last = timeline.final_span();
            if last.intersects(window_start, window_end_open) && last.end <= window_end_open {
                churned_ids.push(advertiser_id);
            }
        }

        let churn_rate = churn_rate(churned_ids.len(), active_at_start, self.rate_scale);

        debug!(
            window_start = %window_start,
            window_end_open = %window_end_open,
            active_at_start,
            activated = activated_ids.len(),
            churned = churned_ids.len(),
            active_at_end,
            "Computed churn window"
        );

        Ok(ChurnMetrics {
            window_start_utc: window_start,
            window_end_open_utc: window_end_open,
            filter: self.filter,
            active_at_start,
            activated_in_window: activated_ids.len(),
            churned_in_window: churned_ids.len(),
            active_at_end,
            unique_active_in_window: unique_active,
            churned_from_start_cohort,
            churn_rate,
            activated_advertiser_ids: activated_ids,
            churned_advertiser_ids: churned_ids,
        })
    }
}

/// `churned / max(active_at_start, 1)`, optionally rounded half-to-even.
pub fn churn_rate(churned: usize, active_at_start: usize, scale: Option<u32>) -> Decimal {
    let denominator = Decimal::from(active_at_start.max(1) as u64);
    let rate = Decimal::from(churned as u64) / denominator;
    match scale {
        Some(dp) => rate.round_dp(dp),
        None => rate,
    }
}
