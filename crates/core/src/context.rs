//! Per-session conversation state.
//!
//! A [`ConversationContext`] is created on the first message of a session and
//! mutated in place on every turn after that. Every field has a serde default
//! so partially filled contexts (from tool callers or older exports) load
//! without errors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{ContactStop, Order};
use crate::flows::OrderStep;
use crate::pricing::{CustomerTier, PricingComparison, PricingContext, PricingModel, PricingResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationContext {
    pub session_id: String,
    pub customer_profile: CustomerProfile,
    pub delivery_history: Vec<DeliveryRequirement>,
    pub pricing_history: Vec<PricingSnapshot>,
    pub current_goal: String,
    pub preferences: CustomerPreferences,
    pub order_creation: OrderCreationState,
    pub last_activity: DateTime<Utc>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            customer_profile: CustomerProfile::default(),
            delivery_history: Vec::new(),
            pricing_history: Vec::new(),
            current_goal: String::new(),
            preferences: CustomerPreferences::default(),
            order_creation: OrderCreationState::default(),
            last_activity: Utc::now(),
        }
    }
}

impl ConversationContext {
    /// A fresh bronze-tier context under a newly generated session id.
    pub fn new() -> Self {
        Self::with_session_id(format!("session_{}", Uuid::new_v4().simple()))
    }

    pub fn with_session_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            customer_profile: CustomerProfile {
                tier: Some(CustomerTier::Bronze),
                ..CustomerProfile::default()
            },
            ..Self::default()
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Snapshot used for recommendations. An unknown tier prices as bronze.
    pub fn pricing_context(&self) -> PricingContext {
        let profile = &self.customer_profile;
        PricingContext {
            delivery_count: profile.current_delivery_count,
            customer_tier: profile.tier.unwrap_or_default(),
            order_frequency: profile.order_frequency,
            total_order_value: profile.average_order_value,
            is_bulk_order: profile.is_bulk_order,
        }
    }

    pub fn record_comparison(&mut self, comparison: &PricingComparison) {
        self.pricing_history.push(PricingSnapshot::from_comparison(comparison));
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerProfile {
    pub tier: Option<CustomerTier>,
    pub order_frequency: u32,
    pub current_delivery_count: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_order_value: Decimal,
    pub preferred_vehicle: String,
    pub special_needs: Vec<String>,
    pub is_bulk_order: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryRequirement {
    pub count: u32,
    pub locations: Vec<String>,
    pub vehicle_type: String,
    pub special_requirements: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerPreferences {
    pub priority: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub budget: Decimal,
    pub time_constraints: Vec<String>,
    pub special_needs: Vec<String>,
}

/// One pricing model's outcome as presented to the customer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRecommendation {
    pub model: PricingModel,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings_percent: Decimal,
    pub eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&PricingResult> for PricingRecommendation {
    fn from(result: &PricingResult) -> Self {
        Self {
            model: result.model,
            name: result.name.clone(),
            savings: result.savings,
            savings_percent: result.discount_percent,
            eligible: result.eligible,
            reason: result.reason.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSnapshot {
    #[serde(with = "rust_decimal::serde::float")]
    pub original_cost: Decimal,
    pub best_option: Option<PricingModel>,
    #[serde(with = "rust_decimal::serde::float")]
    pub best_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub savings_percent: Decimal,
    pub recommendations: Vec<PricingRecommendation>,
}

impl PricingSnapshot {
    pub fn from_comparison(comparison: &PricingComparison) -> Self {
        let original_cost = comparison
            .pricing_models
            .first()
            .map(|result| result.original_cost)
            .unwrap_or(Decimal::ZERO);

        Self {
            original_cost,
            best_option: comparison.best_option.as_ref().map(|best| best.model),
            best_price: comparison
                .best_option
                .as_ref()
                .map(|best| best.adjusted_cost)
                .unwrap_or(original_cost),
            savings: comparison.savings,
            savings_percent: comparison.savings_percentage,
            recommendations: comparison.pricing_models.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleChoice {
    pub vehicle_type_id: String,
    pub vehicle_type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingInfo {
    pub pickup_time: String,
    pub delivery_time: String,
    pub pickup_date: String,
    pub delivery_date: String,
}

/// Progress of the multi-turn order form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCreationState {
    pub in_progress: bool,
    pub step: OrderStep,
    pub current_question: String,
    pub multi_stop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_info: Option<ContactStop>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drop_offs: Vec<ContactStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleChoice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling: Option<SchedulingInfo>,
    pub completed_fields: Vec<String>,
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_order: Option<Order>,
}

impl OrderCreationState {
    pub fn has_pickup_address(&self) -> bool {
        self.pickup_info.as_ref().and_then(ContactStop::address).is_some()
    }

    pub fn mark_completed(&mut self, field: impl Into<String>) {
        let field = field.into();
        self.missing_fields.retain(|missing| *missing != field);
        if !self.completed_fields.contains(&field) {
            self.completed_fields.push(field);
        }
    }

    /// Takes back the most recent drop-off and its `delivery_N` progress entry.
    pub fn withdraw_last_drop_off(&mut self) -> Option<ContactStop> {
        let field = format!("delivery_{}", self.drop_offs.len());
        let withdrawn = self.drop_offs.pop()?;
        self.completed_fields.retain(|completed| *completed != field);
        Some(withdrawn)
    }

    /// Drops the transient validation errors, returning what was queued.
    pub fn take_validation_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.validation_errors)
    }

    /// Back to `not_started`, the only way out of `completed`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A single chat turn, forwarded to the AI collaborator as history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{ConversationContext, OrderCreationState};
    use crate::flows::OrderStep;
    use crate::pricing::{CustomerTier, PricingContext, PricingEngine, RuleBasedPricingEngine};

    #[test]
    fn new_context_starts_bronze_with_generated_session_id() {
        let context = ConversationContext::new();

        assert!(context.session_id.starts_with("session_"));
        assert_eq!(context.customer_profile.tier, Some(CustomerTier::Bronze));
        assert_eq!(context.order_creation.step, OrderStep::NotStarted);
        assert!(!context.order_creation.in_progress);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let context: ConversationContext = serde_json::from_value(json!({
            "session_id": "abc",
            "customer_profile": {"tier": "gold", "order_frequency": 4}
        }))
        .expect("partial context");

        assert_eq!(context.session_id, "abc");
        assert_eq!(context.customer_profile.tier, Some(CustomerTier::Gold));
        assert_eq!(context.customer_profile.current_delivery_count, 0);
        assert!(context.delivery_history.is_empty());
    }

    #[test]
    fn pricing_context_uses_current_delivery_count_not_frequency() {
        let mut context = ConversationContext::new();
        context.customer_profile.current_delivery_count = 3;
        context.customer_profile.order_frequency = 8;
        context.customer_profile.is_bulk_order = true;

        let pricing = context.pricing_context();
        assert_eq!(
            pricing,
            PricingContext {
                delivery_count: 3,
                customer_tier: CustomerTier::Bronze,
                order_frequency: 8,
                total_order_value: Decimal::ZERO,
                is_bulk_order: true,
            }
        );
    }

    #[test]
    fn recorded_comparison_keeps_best_price() {
        let mut context = ConversationContext::new();
        context.customer_profile.current_delivery_count = 3;
        let comparison =
            RuleBasedPricingEngine::new().compare(Decimal::from(50), &context.pricing_context());

        context.record_comparison(&comparison);
        let snapshot = &context.pricing_history[0];
        assert_eq!(snapshot.original_cost, Decimal::from(50));
        assert_eq!(snapshot.recommendations.len(), 5);
        assert!(snapshot.best_price < Decimal::from(50));
    }

    #[test]
    fn completed_fields_are_unique_and_clear_missing() {
        let mut state = OrderCreationState {
            missing_fields: vec!["pickup_business".to_string(), "pickup_phone".to_string()],
            ..OrderCreationState::default()
        };

        state.mark_completed("pickup_business");
        state.mark_completed("pickup_business");

        assert_eq!(state.completed_fields, vec!["pickup_business".to_string()]);
        assert_eq!(state.missing_fields, vec!["pickup_phone".to_string()]);
    }
}
