use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use super::rules::{default_rules, PricingRule};
use super::{PricingComparison, PricingContext, PricingResult};
use crate::booking::AvailableOrderOption;

pub trait PricingEngine: Send + Sync {
    fn rules(&self) -> &[PricingRule];

    fn compare(&self, original_cost: Decimal, context: &PricingContext) -> PricingComparison;

    fn compare_estimate(
        &self,
        estimate: &AvailableOrderOption,
        context: &PricingContext,
    ) -> PricingComparison {
        let original_cost =
            Decimal::from_f64(estimate.estimated_order_cost).unwrap_or(Decimal::ZERO);
        let mut comparison = self.compare(original_cost, context);
        comparison.original_estimate = Some(estimate.clone());
        comparison
    }
}

/// Applies the fixed rule table. Pure: identical inputs give identical output.
pub struct RuleBasedPricingEngine {
    rules: Vec<PricingRule>,
}

impl Default for RuleBasedPricingEngine {
    fn default() -> Self {
        Self { rules: default_rules() }
    }
}

impl RuleBasedPricingEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PricingEngine for RuleBasedPricingEngine {
    fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    fn compare(&self, original_cost: Decimal, context: &PricingContext) -> PricingComparison {
        let pricing_models: Vec<PricingResult> =
            self.rules.iter().map(|rule| apply_rule(original_cost, rule, context)).collect();

        let best_option = best_option(&pricing_models).cloned();
        let savings = best_option
            .as_ref()
            .map(|best| original_cost - best.adjusted_cost)
            .unwrap_or(Decimal::ZERO);

        PricingComparison {
            original_estimate: None,
            pricing_models,
            best_option,
            savings,
            savings_percentage: percent_of(savings, original_cost),
        }
    }
}

pub fn apply_rule(
    original_cost: Decimal,
    rule: &PricingRule,
    context: &PricingContext,
) -> PricingResult {
    if !rule.is_eligible(context) {
        return PricingResult {
            model: rule.model,
            name: rule.name.to_string(),
            original_cost,
            adjusted_cost: original_cost,
            discount: Decimal::ZERO,
            discount_percent: Decimal::ZERO,
            savings: Decimal::ZERO,
            eligible: false,
            reason: rule.ineligibility_reason(context),
        };
    }

    // Halving cannot overflow; anything that does overflow lands on the floor.
    let floor = original_cost * Decimal::new(5, 1);
    let adjusted_cost = match discounted_cost(original_cost, rule, context) {
        Some(cost) if cost >= floor => cost,
        _ => floor,
    };

    let discount = original_cost - adjusted_cost;
    PricingResult {
        model: rule.model,
        name: rule.name.to_string(),
        original_cost,
        adjusted_cost,
        discount,
        discount_percent: percent_of(discount, original_cost),
        savings: discount,
        eligible: true,
        reason: None,
    }
}

fn discounted_cost(
    original_cost: Decimal,
    rule: &PricingRule,
    context: &PricingContext,
) -> Option<Decimal> {
    let base = original_cost.checked_mul(rule.base_multiplier)?;
    let additional = rule.additional_discount(context);
    if additional <= Decimal::ZERO {
        return Some(base);
    }
    let reduction = base.checked_mul(additional)?.checked_div(Decimal::ONE_HUNDRED)?;
    base.checked_sub(reduction)
}

/// Lowest adjusted cost among eligible results. Only a strictly lower cost
/// replaces the current pick, so ties keep the earlier rule.
pub fn best_option(results: &[PricingResult]) -> Option<&PricingResult> {
    results.iter().filter(|result| result.eligible).fold(None, |best, result| match best {
        Some(current) if current.adjusted_cost <= result.adjusted_cost => Some(current),
        _ => Some(result),
    })
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    part.checked_div(whole)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}
