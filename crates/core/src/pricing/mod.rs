pub mod engine;
pub mod rules;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::AvailableOrderOption;

pub use engine::{PricingEngine, RuleBasedPricingEngine};
pub use rules::{default_rules, PricingRule};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerTier {
    #[default]
    Bronze,
    Silver,
    Gold,
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerTier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            other => Err(format!("unknown customer tier `{other}`")),
        }
    }
}

/// The five discount models. Declaration order is the display order and the
/// tie-break order when two models land on the same adjusted cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingModel {
    Standard,
    MultiDelivery,
    VolumeDiscount,
    LoyaltyDiscount,
    BulkOrder,
}

impl PricingModel {
    pub const ALL: [PricingModel; 5] = [
        Self::Standard,
        Self::MultiDelivery,
        Self::VolumeDiscount,
        Self::LoyaltyDiscount,
        Self::BulkOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::MultiDelivery => "multi_delivery",
            Self::VolumeDiscount => "volume_discount",
            Self::LoyaltyDiscount => "loyalty_discount",
            Self::BulkOrder => "bulk_order",
        }
    }
}

impl fmt::Display for PricingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to one comparison. Built fresh per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingContext {
    pub delivery_count: u32,
    pub customer_tier: CustomerTier,
    pub order_frequency: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_order_value: Decimal,
    pub is_bulk_order: bool,
}

impl Default for PricingContext {
    fn default() -> Self {
        Self {
            delivery_count: 0,
            customer_tier: CustomerTier::Bronze,
            order_frequency: 0,
            total_order_value: Decimal::ZERO,
            is_bulk_order: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub model: PricingModel,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub original_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub adjusted_cost: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_percent: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings: Decimal,
    pub eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingComparison {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_estimate: Option<AvailableOrderOption>,
    pub pricing_models: Vec<PricingResult>,
    pub best_option: Option<PricingResult>,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings_percentage: Decimal,
}

impl PricingComparison {
    pub fn result_for(&self, model: PricingModel) -> Option<&PricingResult> {
        self.pricing_models.iter().find(|result| result.model == model)
    }

    pub fn eligible(&self) -> impl Iterator<Item = &PricingResult> {
        self.pricing_models.iter().filter(|result| result.eligible)
    }
}
