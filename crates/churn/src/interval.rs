//! Activity intervals and per-advertiser timelines of merged spans.

use chrono::{DateTime, Duration, Utc};
use listing_core::{AdvertiserId, ChurnFilter, SponsorshipType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One paid sponsorship period for one advertiser, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInterval {
    pub advertiser_id: AdvertiserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sponsorship_type: SponsorshipType,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub subcategory_id: Option<i32>,
}

impl ActivityInterval {
    /// Unscoped interval; tag it with [`ActivityInterval::scoped`].
    pub fn new(advertiser_id: AdvertiserId, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            advertiser_id,
            start,
            end,
            sponsorship_type: SponsorshipType::Unknown,
            category_id: None,
            subcategory_id: None,
        }
    }

    pub fn scoped(
        mut self,
        sponsorship_type: SponsorshipType,
        category_id: Option<i32>,
        subcategory_id: Option<i32>,
    ) -> Self {
        self.sponsorship_type = sponsorship_type;
        self.category_id = category_id;
        self.subcategory_id = subcategory_id;
        self
    }

    pub fn in_scope(&self, filter: &ChurnFilter) -> bool {
        filter.matches(self.sponsorship_type, self.category_id, self.subcategory_id)
    }

    /// The interval as a span, clamping an inverted record to its start.
    fn span(&self) -> Span {
        if self.end < self.start {
            warn!(
                advertiser_id = self.advertiser_id,
                start = %self.start,
                end = %self.end,
                "Interval ends before it starts, treating as instantaneous"
            );
            Span::instant(self.start)
        } else {
            Span {
                start: self.start,
                end: self.end,
            }
        }
    }
}

/// A continuous stretch of activity. `start == end` marks activity at
/// exactly one instant; otherwise the span is half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Span {
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }

    /// Whether the advertiser is active at `t` through this span.
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        if self.is_instant() {
            t == self.start
        } else {
            self.start <= t && t < self.end
        }
    }

    /// Whether this span covers any instant of `[from, until)`.
    pub fn intersects(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        if self.is_instant() {
            from <= self.start && self.start < until
        } else {
            self.start < until && self.end > from
        }
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merges overlapping, touching, and (within `tolerance`) nearly touching
/// spans into maximal non-overlapping spans ordered by start.
pub fn merge_spans(mut spans: Vec<Span>, tolerance: Duration) -> Vec<Span> {
    spans.sort();

    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(cur) = merged.last_mut() {
            if bridges(cur.end, span.start, tolerance) {
                if span.end > cur.end {
                    cur.end = span.end;
                }
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

fn bridges(cur_end: DateTime<Utc>, next_start: DateTime<Utc>, tolerance: Duration) -> bool {
    match cur_end.checked_add_signed(tolerance) {
        Some(limit) => next_start <= limit,
        None => true,
    }
}

/// Merged activity of one advertiser. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    spans: Vec<Span>,
}

impl Timeline {
    /// Builds a timeline from raw spans; `None` when there are none.
    pub fn from_spans(spans: Vec<Span>, tolerance: Duration) -> Option<Self> {
        if spans.is_empty() {
            return None;
        }
        Some(Self {
            spans: merge_spans(spans, tolerance),
        })
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Earliest instant the advertiser was ever active.
    pub fn first_start(&self) -> DateTime<Utc> {
        self.spans[0].start
    }

    /// The span after which the advertiser never renewed.
    pub fn final_span(&self) -> Span {
        self.spans[self.spans.len() - 1]
    }

    pub fn active_at(&self, t: DateTime<Utc>) -> bool {
        self.spans.iter().any(|s| s.covers(t))
    }

    pub fn active_during(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> bool {
        self.spans.iter().any(|s| s.intersects(from, until))
    }
}

/// Groups in-scope intervals by advertiser and merges each group.
pub fn build_timelines<I>(
    intervals: I,
    filter: &ChurnFilter,
    tolerance: Duration,
) -> BTreeMap<AdvertiserId, Timeline>
where
    I: IntoIterator<Item = ActivityInterval>,
{
    let mut grouped: BTreeMap<AdvertiserId, Vec<Span>> = BTreeMap::new();
    let mut skipped = 0usize;

    for interval in intervals {
        if !interval.in_scope(filter) {
            skipped += 1;
            continue;
        }
        grouped
            .entry(interval.advertiser_id)
            .or_default()
            .push(interval.span());
    }

    let timelines: BTreeMap<_, _> = grouped
        .into_iter()
        .filter_map(|(id, spans)| Timeline::from_spans(spans, tolerance).map(|t| (id, t)))
        .collect();

    debug!(
        advertisers = timelines.len(),
        out_of_scope = skipped,
        "Built advertiser timelines"
    );
    timelines
}
