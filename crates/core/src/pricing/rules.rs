use rust_decimal::Decimal;
use serde::Serialize;

use super::{CustomerTier, PricingContext, PricingModel};

/// Minimum number of monthly orders before volume pricing applies.
pub const VOLUME_MIN_ORDER_FREQUENCY: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PricingRule {
    pub model: PricingModel,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub base_multiplier: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max_discount: Decimal,
    pub volume_threshold: u32,
    pub loyalty_tier: Option<CustomerTier>,
}

impl PricingRule {
    pub fn is_eligible(&self, context: &PricingContext) -> bool {
        match self.model {
            PricingModel::Standard => true,
            PricingModel::MultiDelivery => context.delivery_count >= self.volume_threshold,
            PricingModel::VolumeDiscount => {
                context.delivery_count >= self.volume_threshold
                    && context.order_frequency >= VOLUME_MIN_ORDER_FREQUENCY
            }
            PricingModel::LoyaltyDiscount => Some(context.customer_tier) == self.loyalty_tier,
            PricingModel::BulkOrder => {
                context.is_bulk_order && context.delivery_count >= self.volume_threshold
            }
        }
    }

    /// Explains the shortfall for an ineligible context. Standard pricing has none.
    pub fn ineligibility_reason(&self, context: &PricingContext) -> Option<String> {
        match self.model {
            PricingModel::Standard => None,
            PricingModel::MultiDelivery => Some(format!(
                "Requires {}+ deliveries, you have {}",
                self.volume_threshold, context.delivery_count
            )),
            PricingModel::VolumeDiscount => Some(format!(
                "Requires {}+ deliveries and {}+ orders/month, you have {} deliveries and {} orders/month",
                self.volume_threshold,
                VOLUME_MIN_ORDER_FREQUENCY,
                context.delivery_count,
                context.order_frequency
            )),
            PricingModel::LoyaltyDiscount => Some(format!(
                "Requires {} tier, you are {}",
                self.loyalty_tier.unwrap_or(CustomerTier::Gold),
                context.customer_tier
            )),
            PricingModel::BulkOrder => Some(format!(
                "Requires bulk order with {}+ deliveries, you have {}",
                self.volume_threshold, context.delivery_count
            )),
        }
    }

    /// Extra percentage points stacked on top of the base multiplier, capped at
    /// `max_discount`.
    pub fn additional_discount(&self, context: &PricingContext) -> Decimal {
        let mut additional = Decimal::ZERO;

        if context.delivery_count > self.volume_threshold {
            let extra = context.delivery_count - self.volume_threshold;
            additional += Decimal::from(extra) * Decimal::TWO;
        }
        if context.order_frequency > 5 {
            additional += Decimal::from(5);
        }
        if context.total_order_value > Decimal::from(1000) {
            additional += Decimal::from(3);
        }

        additional.min(self.max_discount)
    }
}

pub fn default_rules() -> Vec<PricingRule> {
    vec![
        PricingRule {
            model: PricingModel::Standard,
            name: "Standard Pricing",
            description: "Standard pricing with no discounts",
            base_multiplier: Decimal::ONE,
            min_discount: Decimal::ZERO,
            max_discount: Decimal::ZERO,
            volume_threshold: 0,
            loyalty_tier: None,
        },
        PricingRule {
            model: PricingModel::MultiDelivery,
            name: "Multi-Delivery Discount",
            description: "Discount for multiple deliveries in the same order",
            base_multiplier: Decimal::new(85, 2),
            min_discount: Decimal::from(5),
            max_discount: Decimal::from(25),
            volume_threshold: 2,
            loyalty_tier: None,
        },
        PricingRule {
            model: PricingModel::VolumeDiscount,
            name: "Volume Discount",
            description: "Discount based on order volume and frequency",
            base_multiplier: Decimal::new(80, 2),
            min_discount: Decimal::from(10),
            max_discount: Decimal::from(30),
            volume_threshold: 5,
            loyalty_tier: None,
        },
        PricingRule {
            model: PricingModel::LoyaltyDiscount,
            name: "Loyalty Discount",
            description: "Discount for loyal customers",
            base_multiplier: Decimal::new(90, 2),
            min_discount: Decimal::from(5),
            max_discount: Decimal::from(15),
            volume_threshold: 0,
            loyalty_tier: Some(CustomerTier::Gold),
        },
        PricingRule {
            model: PricingModel::BulkOrder,
            name: "Bulk Order Discount",
            description: "Discount for large bulk orders",
            base_multiplier: Decimal::new(75, 2),
            min_discount: Decimal::from(15),
            max_discount: Decimal::from(40),
            volume_threshold: 10,
            loyalty_tier: None,
        },
    ]
}
