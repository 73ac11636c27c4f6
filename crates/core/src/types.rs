use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ChurnError;

/// Directory entry id of the advertiser that bought a sponsorship.
pub type AdvertiserId = i32;

/// Placement a sponsorship was sold for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorshipType {
    Unknown,
    MainSponsor,
    CategorySponsor,
    SubcategorySponsor,
}

impl SponsorshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::MainSponsor => "main_sponsor",
            Self::CategorySponsor => "category_sponsor",
            Self::SubcategorySponsor => "subcategory_sponsor",
        }
    }
}

impl std::fmt::Display for SponsorshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SponsorshipType {
    type Err = ChurnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "unknown" => Ok(Self::Unknown),
            "main_sponsor" | "main" => Ok(Self::MainSponsor),
            "category_sponsor" | "category" => Ok(Self::CategorySponsor),
            "subcategory_sponsor" | "subcategory" => Ok(Self::SubcategorySponsor),
            other => Err(ChurnError::invalid(format!(
                "unknown sponsorship type '{other}'"
            ))),
        }
    }
}

/// Settlement state of a sponsorship invoice. Only `Paid` invoices count
/// as advertiser activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unknown,
    Pending,
    Paid,
    Expired,
    Failed,
    Refunded,
}

/// Optional scope restrictions for churn computations. Every present field
/// must match for an interval to be in scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnFilter {
    #[serde(default)]
    pub sponsorship_type: Option<SponsorshipType>,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub subcategory_id: Option<i32>,
}

impl ChurnFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_sponsorship_type(mut self, sponsorship_type: SponsorshipType) -> Self {
        self.sponsorship_type = Some(sponsorship_type);
        self
    }

    pub fn with_category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_subcategory(mut self, subcategory_id: i32) -> Self {
        self.subcategory_id = Some(subcategory_id);
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.sponsorship_type.is_none() && self.category_id.is_none() && self.subcategory_id.is_none()
    }

    /// Whether a record tagged with the given scope is in this filter.
    pub fn matches(
        &self,
        sponsorship_type: SponsorshipType,
        category_id: Option<i32>,
        subcategory_id: Option<i32>,
    ) -> bool {
        self.sponsorship_type.map_or(true, |t| t == sponsorship_type)
            && self.category_id.map_or(true, |c| category_id == Some(c))
            && self.subcategory_id.map_or(true, |s| subcategory_id == Some(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sponsorship_type_parse() {
        assert_eq!(
            "main-sponsor".parse::<SponsorshipType>().unwrap(),
            SponsorshipType::MainSponsor
        );
        assert_eq!(
            "Subcategory".parse::<SponsorshipType>().unwrap(),
            SponsorshipType::SubcategorySponsor
        );
        assert!("banner".parse::<SponsorshipType>().is_err());
    }

    #[test]
    fn test_sponsorship_type_serde_matches_display() {
        let json = serde_json::to_string(&SponsorshipType::CategorySponsor).unwrap();
        assert_eq!(json, format!("\"{}\"", SponsorshipType::CategorySponsor));
    }

    #[test]
    fn test_payment_status_defaults_to_unknown() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unknown);
    }

    #[test]
    fn test_unfiltered_matches_everything() {
        let filter = ChurnFilter::all();
        assert!(filter.is_unfiltered());
        assert!(filter.matches(SponsorshipType::Unknown, None, None));
        assert!(filter.matches(SponsorshipType::CategorySponsor, Some(3), Some(9)));
    }

    #[test]
    fn test_filter_requires_every_present_field() {
        let filter = ChurnFilter::all()
            .with_sponsorship_type(SponsorshipType::SubcategorySponsor)
            .with_subcategory(12);

        assert!(filter.matches(SponsorshipType::SubcategorySponsor, Some(4), Some(12)));
        assert!(!filter.matches(SponsorshipType::SubcategorySponsor, Some(4), Some(13)));
        assert!(!filter.matches(SponsorshipType::SubcategorySponsor, Some(4), None));
        assert!(!filter.matches(SponsorshipType::MainSponsor, None, Some(12)));
    }

    #[test]
    fn test_category_filter_ignores_missing_tag() {
        let filter = ChurnFilter::all().with_category(7);
        assert!(!filter.matches(SponsorshipType::MainSponsor, None, None));
        assert!(filter.matches(SponsorshipType::CategorySponsor, Some(7), None));
    }
}
