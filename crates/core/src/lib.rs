//! Shared types for the sponsored-listing churn engine: scope enums,
//! filters, the error taxonomy, and application configuration.

pub mod config;
pub mod error;
pub mod types;

pub use crate::config::{AppConfig, ChurnConfig};
pub use crate::error::{ChurnError, ChurnResult};
pub use crate::types::{AdvertiserId, ChurnFilter, PaymentStatus, SponsorshipType};
