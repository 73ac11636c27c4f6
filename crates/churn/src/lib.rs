//! Advertiser churn and active-cohort metrics over paid sponsorship
//! intervals: arbitrary windows, single months, and monthly series.

pub mod calculator;
pub mod interval;
pub mod ledger;
pub mod metrics;
pub mod series;
pub mod service;

pub use calculator::CohortCalculator;
pub use interval::{ActivityInterval, Span, Timeline};
pub use ledger::{IntervalSource, InvoiceLedger, SponsorshipInvoice};
pub use metrics::{ChurnMetrics, ChurnMetricsPoint};
pub use series::MonthlySeriesBuilder;
pub use service::ChurnService;
