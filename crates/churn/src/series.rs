//! Calendar-month helpers and the monthly churn series builder.

use chrono::{DateTime, Datelike, Months, TimeZone, Timelike, Utc};
use listing_core::{ChurnError, ChurnResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::calculator::CohortCalculator;
use crate::metrics::ChurnMetricsPoint;

// ---------------------------------------------------------------------------
// Month arithmetic
// ---------------------------------------------------------------------------

/// Whether `t` is the first instant of a UTC calendar month.
pub fn is_month_start(t: DateTime<Utc>) -> bool {
    t.day() == 1 && t.hour() == 0 && t.minute() == 0 && t.second() == 0 && t.nanosecond() == 0
}

/// Truncates `t` to the first instant of its UTC calendar month.
pub fn month_start_of(t: DateTime<Utc>) -> ChurnResult<DateTime<Utc>> {
    Utc.with_ymd_and_hms(t.year(), t.month(), 1, 0, 0, 0)
        .single()
        .ok_or_else(|| ChurnError::invalid(format!("no month start for {t}")))
}

/// First instant of the month after the one `month_start` opens.
pub fn next_month_start(month_start: DateTime<Utc>) -> ChurnResult<DateTime<Utc>> {
    month_start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ChurnError::invalid(format!("month after {month_start} is out of range")))
}

fn require_month_start(name: &str, t: DateTime<Utc>) -> ChurnResult<()> {
    if is_month_start(t) {
        Ok(())
    } else {
        Err(ChurnError::invalid(format!(
            "{name} must be the first instant of a UTC month, got {t}"
        )))
    }
}

/// Rejects bounds that are not canonical month starts.
pub fn validate_month_bounds(
    start_month: DateTime<Utc>,
    end_month_open: DateTime<Utc>,
) -> ChurnResult<()> {
    require_month_start("series start", start_month)?;
    require_month_start("series end", end_month_open)
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Runs a [`CohortCalculator`] over consecutive calendar months.
pub struct MonthlySeriesBuilder<'a> {
    calculator: &'a CohortCalculator,
    capacity_hint: usize,
}

impl<'a> MonthlySeriesBuilder<'a> {
    pub fn new(calculator: &'a CohortCalculator) -> Self {
        Self {
            calculator,
            capacity_hint: 24,
        }
    }

    pub fn with_capacity_hint(mut self, capacity_hint: usize) -> Self {
        self.capacity_hint = capacity_hint;
        self
    }

    /// One point per month in `[start_month, end_month_open)`, oldest first.
    ///
    /// Both bounds must be month starts. An empty or inverted range yields an
    /// empty series. `cancel` is checked before every month; once it fires no
    /// points are returned.
    pub fn build(
        &self,
        start_month: DateTime<Utc>,
        end_month_open: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> ChurnResult<Vec<ChurnMetricsPoint>> {
        validate_month_bounds(start_month, end_month_open)?;
        if start_month >= end_month_open {
            return Ok(Vec::new());
        }

        let mut points = Vec::with_capacity(self.capacity_hint);
        let mut month = start_month;

        while month < end_month_open {
            if cancel.is_cancelled() {
                debug!(month = %month, "Monthly series cancelled");
                return Err(ChurnError::Cancelled);
            }

            let period_end = next_month_start(month)?;
            let metrics = self.calculator.compute_window(month, period_end)?;
            points.push(ChurnMetricsPoint::from(metrics));
            month = period_end;
        }

        Ok(points)
    }
}
