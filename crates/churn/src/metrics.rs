//! Result types for window and monthly churn computations.

use chrono::{DateTime, Utc};
use listing_core::{AdvertiserId, ChurnFilter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Churn metrics for one window `[window_start_utc, window_end_open_utc)`
/// and scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnMetrics {
    pub window_start_utc: DateTime<Utc>,
    pub window_end_open_utc: DateTime<Utc>,
    pub filter: ChurnFilter,
    /// Advertisers active at the window start.
    pub active_at_start: usize,
    /// Advertisers whose first-ever activity falls inside the window.
    pub activated_in_window: usize,
    /// Advertisers whose final span ends inside the window with no renewal.
    pub churned_in_window: usize,
    /// Advertisers active at the exclusive window end.
    pub active_at_end: usize,
    /// Advertisers active at any instant of the window.
    pub unique_active_in_window: usize,
    /// Start-cohort members no longer active at the window end.
    pub churned_from_start_cohort: usize,
    /// `churned_in_window / max(active_at_start, 1)`.
    pub churn_rate: Decimal,
    pub activated_advertiser_ids: Vec<AdvertiserId>,
    pub churned_advertiser_ids: Vec<AdvertiserId>,
}

impl ChurnMetrics {
    pub fn net_change(&self) -> i64 {
        self.active_at_end as i64 - self.active_at_start as i64
    }

    /// Whether `active_at_end == max(0, start + activated - churned)`.
    /// Holds unless an advertiser lapses and renews around the window.
    pub fn reconciles(&self) -> bool {
        let expected = (self.active_at_start as i64 + self.activated_in_window as i64
            - self.churned_in_window as i64)
            .max(0);
        self.active_at_end as i64 == expected
    }
}

/// One period of a monthly churn series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnMetricsPoint {
    pub period_start_utc: DateTime<Utc>,
    pub period_end_open_utc: DateTime<Utc>,
    pub filter: ChurnFilter,
    pub active_at_start: usize,
    pub activated_in_period: usize,
    pub churned_in_period: usize,
    pub active_at_end: usize,
    pub unique_active_in_period: usize,
    pub churned_from_start_cohort: usize,
    pub churn_rate: Decimal,
    pub activated_advertiser_ids: Vec<AdvertiserId>,
    pub churned_advertiser_ids: Vec<AdvertiserId>,
}

impl From<ChurnMetrics> for ChurnMetricsPoint {
    fn from(m: ChurnMetrics) -> Self {
        Self {
            period_start_utc: m.window_start_utc,
            period_end_open_utc: m.window_end_open_utc,
            filter: m.filter,
            active_at_start: m.active_at_start,
            activated_in_period: m.activated_in_window,
            churned_in_period: m.churned_in_window,
            active_at_end: m.active_at_end,
            unique_active_in_period: m.unique_active_in_window,
            churned_from_start_cohort: m.churned_from_start_cohort,
            churn_rate: m.churn_rate,
            activated_advertiser_ids: m.activated_advertiser_ids,
            churned_advertiser_ids: m.churned_advertiser_ids,
        }
    }
}
