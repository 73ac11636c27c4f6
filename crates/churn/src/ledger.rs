//! Interval source seam and the in-memory sponsorship invoice ledger.
//!
//! Production deployments implement [`IntervalSource`] over their invoice
//! store; [`InvoiceLedger`] keeps invoices in a `DashMap` for development,
//! tests, and the report CLI.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use listing_core::{
    AdvertiserId, ChurnError, ChurnFilter, ChurnResult, PaymentStatus, SponsorshipType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::interval::ActivityInterval;

/// Supplies paid activity intervals for a scope, unbounded in time.
pub trait IntervalSource: Send + Sync {
    fn paid_intervals(&self, filter: &ChurnFilter) -> ChurnResult<Vec<ActivityInterval>>;
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An invoice for one sponsored-listing campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorshipInvoice {
    #[serde(default = "Uuid::new_v4")]
    pub invoice_id: Uuid,
    pub advertiser_id: AdvertiserId,
    pub campaign_start: DateTime<Utc>,
    pub campaign_end: DateTime<Utc>,
    pub sponsorship_type: SponsorshipType,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub subcategory_id: Option<i32>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub amount: Decimal,
}

impl SponsorshipInvoice {
    /// A paid invoice with a fresh id and no category tags.
    pub fn paid(
        advertiser_id: AdvertiserId,
        sponsorship_type: SponsorshipType,
        campaign_start: DateTime<Utc>,
        campaign_end: DateTime<Utc>,
    ) -> Self {
        Self {
            invoice_id: Uuid::new_v4(),
            advertiser_id,
            campaign_start,
            campaign_end,
            sponsorship_type,
            category_id: None,
            subcategory_id: None,
            payment_status: PaymentStatus::Paid,
            amount: Decimal::ZERO,
        }
    }

    pub fn in_category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn in_subcategory(mut self, subcategory_id: i32) -> Self {
        self.subcategory_id = Some(subcategory_id);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn to_interval(&self) -> ActivityInterval {
        ActivityInterval::new(self.advertiser_id, self.campaign_start, self.campaign_end).scoped(
            self.sponsorship_type,
            self.category_id,
            self.subcategory_id,
        )
    }
}

// ---------------------------------------------------------------------------
// InvoiceLedger
// ---------------------------------------------------------------------------

/// Concurrent invoice store keyed by invoice id.
pub struct InvoiceLedger {
    invoices: DashMap<Uuid, SponsorshipInvoice>,
}

impl Default for InvoiceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceLedger {
    pub fn new() -> Self {
        Self {
            invoices: DashMap::new(),
        }
    }

    /// Insert or replace an invoice.
    pub fn record(&self, invoice: SponsorshipInvoice) {
        debug!(
            invoice_id = %invoice.invoice_id,
            advertiser_id = invoice.advertiser_id,
            status = ?invoice.payment_status,
            "Recorded sponsorship invoice"
        );
        self.invoices.insert(invoice.invoice_id, invoice);
    }

    pub fn record_all<I>(&self, invoices: I) -> usize
    where
        I: IntoIterator<Item = SponsorshipInvoice>,
    {
        let mut count = 0;
        for invoice in invoices {
            self.invoices.insert(invoice.invoice_id, invoice);
            count += 1;
        }
        info!(count, total = self.invoices.len(), "Loaded sponsorship invoices");
        count
    }

    /// Loads a JSON array of invoices from `path`.
    pub fn record_json_file(&self, path: &Path) -> ChurnResult<usize> {
        let raw = std::fs::read_to_string(path)?;
        let invoices: Vec<SponsorshipInvoice> = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "Parsed invoice export");
        Ok(self.record_all(invoices))
    }

    pub fn get(&self, invoice_id: &Uuid) -> Option<SponsorshipInvoice> {
        self.invoices.get(invoice_id).map(|i| i.value().clone())
    }

    pub fn set_payment_status(&self, invoice_id: &Uuid, status: PaymentStatus) -> ChurnResult<()> {
        let mut invoice = self
            .invoices
            .get_mut(invoice_id)
            .ok_or_else(|| ChurnError::NotFound(format!("invoice {invoice_id}")))?;
        invoice.payment_status = status;
        Ok(())
    }

    pub fn remove(&self, invoice_id: &Uuid) -> Option<SponsorshipInvoice> {
        self.invoices.remove(invoice_id).map(|(_, invoice)| invoice)
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}

impl IntervalSource for InvoiceLedger {
    fn paid_intervals(&self, filter: &ChurnFilter) -> ChurnResult<Vec<ActivityInterval>> {
        let intervals: Vec<ActivityInterval> = self
            .invoices
            .iter()
            .filter(|entry| entry.is_paid())
            .map(|entry| entry.to_interval())
            .filter(|interval| interval.in_scope(filter))
            .collect();

        debug!(
            intervals = intervals.len(),
            invoices = self.invoices.len(),
            "Selected paid intervals"
        );
        Ok(intervals)
    }
}
