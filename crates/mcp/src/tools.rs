//! Tool logic behind the MCP surface.
//!
//! Every argument arrives as a string; structured ones carry JSON. Each tool
//! validates its arguments with [`InputValidator`] before parsing them, and
//! every failure is a [`ToolError`] whose text is returned to the caller as an
//! error result.

use std::str::FromStr;
use std::sync::Arc;

use parcelwise_agent::ConversationEngine;
use parcelwise_core::booking::{
    AvailableOrderOption, BookingService, ContactStop, CreateEstimateInput, CreateEstimateResponse,
    CreateOrderInput, DeliveryInfoInput, DropOffInfoInput, PickupInfoInput, TagInput,
};
use parcelwise_core::context::{ConversationContext, CustomerProfile};
use parcelwise_core::pricing::{
    CustomerTier, PricingContext, PricingEngine, RuleBasedPricingEngine,
};
use parcelwise_core::validation::{InputValidator, ValidationResult};
use rmcp::schemars::{self, JsonSchema};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolError;

pub const ALL_TOOL_NAMES: &[&str] = &[
    "create_estimate",
    "create_order",
    "compare_pricing_models",
    "select_delivery_option",
    "conversational_pricing_advisor",
];

/// Upper bound for a single estimate priced through `compare_pricing_models`.
const MAX_ESTIMATED_COST: f64 = 1_000_000.0;

const FASTEST_DESCRIPTION: &str = "Fastest delivery (most expensive)";
const CHEAPEST_DESCRIPTION: &str = "Cheapest delivery (slowest)";

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateEstimateArgs {
    #[schemars(description = "Pickup location information as JSON: {business_name, location: {address: {street, city, state, zip_code, country}}}")]
    pub pickup_info: String,

    #[schemars(description = "Drop-off locations as a JSON array of {business_name, location}")]
    pub drop_offs: String,

    #[schemars(description = "Type of vehicle required: pickup_truck, cargo_van, sprinter_van or box_truck")]
    pub vehicle_type: String,

    #[schemars(description = "Optional add-ons for delivery as a JSON array of strings")]
    #[serde(default)]
    pub add_ons: Option<String>,

    #[schemars(description = "Whether a dedicated vehicle is requested (true/false)")]
    #[serde(default)]
    pub dedicated_vehicle: Option<String>,

    #[schemars(description = "Organization ID")]
    #[serde(default)]
    pub organization_druid: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateOrderArgs {
    #[schemars(description = "Delivery information as JSON: {service_type, organization_druid}")]
    pub delivery_info: String,

    #[schemars(description = "Pickup stop as JSON: {business_name, contact_name, contact_phone_number, location, pickup_notes}")]
    pub pickup_info: String,

    #[schemars(description = "Drop-off stops as a JSON array")]
    pub drop_offs: String,

    #[schemars(description = "Optional order tags as a JSON array of {name, value}")]
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ComparePricingArgs {
    #[schemars(description = "One available order option from an estimate, as JSON")]
    pub original_estimate: String,

    #[schemars(description = "Number of deliveries in the order (default: 1)")]
    #[serde(default)]
    pub delivery_count: Option<String>,

    #[schemars(description = "Customer loyalty tier (bronze, silver, gold)")]
    #[serde(default)]
    pub customer_tier: Option<String>,

    #[schemars(description = "Number of orders per month (default: 1)")]
    #[serde(default)]
    pub order_frequency: Option<String>,

    #[schemars(description = "Total value of the order (default: the estimate's cost)")]
    #[serde(default)]
    pub total_order_value: Option<String>,

    #[schemars(description = "Whether this is a bulk order (true/false)")]
    #[serde(default)]
    pub is_bulk_order: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SelectDeliveryArgs {
    #[schemars(description = "The full JSON response returned by create_estimate")]
    pub estimate_response: String,

    #[schemars(description = "fastest, asap, urgent, cheapest, economy or sometime_today")]
    pub delivery_scenario: String,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct AdvisorArgs {
    #[schemars(description = "User's natural language message")]
    pub user_message: String,

    #[schemars(description = "Previous conversation context in JSON format")]
    #[serde(default)]
    pub conversation_context: Option<String>,

    #[schemars(description = "Customer information and preferences in JSON format")]
    #[serde(default)]
    pub customer_profile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeliverySelection {
    pub selected_option: AvailableOrderOption,
    pub scenario: String,
    pub description: String,
    pub total_options: usize,
    pub all_options: Vec<AvailableOrderOption>,
}

/// Shared state for all five tools.
pub struct ToolService {
    validator: InputValidator,
    pricing: RuleBasedPricingEngine,
    booking: Arc<dyn BookingService>,
    engine: ConversationEngine,
}

impl ToolService {
    pub fn new(engine: ConversationEngine) -> Self {
        Self {
            validator: InputValidator::new(),
            pricing: RuleBasedPricingEngine::new(),
            booking: engine.booking(),
            engine,
        }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub async fn create_estimate(&self, args: &CreateEstimateArgs) -> Result<String, ToolError> {
        let pickup_value = self.json_value(&args.pickup_info, "pickup_info")?;
        checked(self.validator.validate_pickup_info(&pickup_value), "pickup_info")?;
        let pickup_info: PickupInfoInput = from_value(pickup_value, "pickup_info")?;

        self.require_json(&args.drop_offs, "drop_offs")?;
        let drop_off_values: Vec<Value> = parse(&args.drop_offs, "drop_offs")?;
        checked(self.validator.validate_drop_offs(&drop_off_values), "drop_offs")?;
        let drop_offs: Vec<DropOffInfoInput> =
            from_value(Value::Array(drop_off_values), "drop_offs")?;

        checked(self.validator.validate_vehicle_type(&args.vehicle_type), "vehicle_type")?;

        let mut input = CreateEstimateInput {
            pickup_info,
            drop_offs,
            vehicle_type: args.vehicle_type.to_ascii_lowercase(),
            ..CreateEstimateInput::default()
        };

        // Unparseable add-ons are dropped rather than failing the estimate.
        if let Some(add_ons) = present(&args.add_ons) {
            input.add_ons = serde_json::from_str::<Vec<String>>(add_ons).unwrap_or_default();
        }
        if let Some(dedicated) = present(&args.dedicated_vehicle) {
            checked(
                self.validator.validate_boolean_string(dedicated, "dedicated_vehicle"),
                "dedicated_vehicle",
            )?;
            input.dedicated_vehicle = Some(dedicated == "true");
        }
        input.organization_druid = present(&args.organization_druid).map(str::to_string);

        let response = self
            .booking
            .create_estimate(&input)
            .await
            .map_err(|error| ToolError::Upstream(format!("failed to create estimate: {error:#}")))?;
        pretty(&response)
    }

    pub async fn create_order(&self, args: &CreateOrderArgs) -> Result<String, ToolError> {
        self.require_json(&args.delivery_info, "delivery_info")?;
        let delivery_info: DeliveryInfoInput = parse(&args.delivery_info, "delivery_info")?;

        self.require_json(&args.pickup_info, "pickup_info")?;
        let pickup_info: ContactStop = parse(&args.pickup_info, "pickup_info")?;

        self.require_json(&args.drop_offs, "drop_offs")?;
        let drop_offs: Vec<ContactStop> = parse(&args.drop_offs, "drop_offs")?;

        let tags = present(&args.tags)
            .and_then(|tags| serde_json::from_str::<Vec<TagInput>>(tags).ok())
            .unwrap_or_default();

        let input = CreateOrderInput {
            delivery_info,
            pickup_info,
            drop_offs,
            tags,
            ..CreateOrderInput::default()
        };

        let response = self
            .booking
            .create_order(&input)
            .await
            .map_err(|error| ToolError::Upstream(format!("failed to create order: {error:#}")))?;
        pretty(&response)
    }

    pub fn compare_pricing_models(&self, args: &ComparePricingArgs) -> Result<String, ToolError> {
        self.require_json(&args.original_estimate, "original_estimate")?;
        let estimate: AvailableOrderOption = parse(&args.original_estimate, "original_estimate")?;
        let original_cost = estimate_cost(estimate.estimated_order_cost)?;

        let mut context = PricingContext {
            delivery_count: 1,
            customer_tier: CustomerTier::Bronze,
            order_frequency: 1,
            total_order_value: original_cost,
            is_bulk_order: false,
        };

        if let Some(count) = present(&args.delivery_count) {
            context.delivery_count = self.bounded_count(count, "delivery_count")?;
        }
        if let Some(tier) = present(&args.customer_tier) {
            checked(self.validator.validate_customer_tier(tier), "customer_tier")?;
            context.customer_tier = CustomerTier::from_str(tier)
                .map_err(|error| ToolError::Invalid(format!("customer_tier: {error}")))?;
        }
        if let Some(frequency) = present(&args.order_frequency) {
            context.order_frequency = self.bounded_count(frequency, "order_frequency")?;
        }
        if let Some(total) = present(&args.total_order_value) {
            context.total_order_value = parse_amount(total)?;
        }
        if let Some(bulk) = present(&args.is_bulk_order) {
            checked(self.validator.validate_boolean_string(bulk, "is_bulk_order"), "is_bulk_order")?;
            context.is_bulk_order = bulk == "true";
        }

        pretty(&self.pricing.compare_estimate(&estimate, &context))
    }

    pub fn select_delivery_option(&self, args: &SelectDeliveryArgs) -> Result<String, ToolError> {
        self.require_json(&args.estimate_response, "estimate_response")?;
        let response: CreateEstimateResponse =
            parse(&args.estimate_response, "estimate_response")?;

        checked(
            self.validator.validate_delivery_scenario(&args.delivery_scenario),
            "delivery_scenario",
        )?;

        let options = response.options();
        let scenario = args.delivery_scenario.to_ascii_lowercase();
        let picked = match scenario.as_str() {
            "fastest" | "asap" | "urgent" => {
                options.first().map(|option| (option, FASTEST_DESCRIPTION))
            }
            _ => options.last().map(|option| (option, CHEAPEST_DESCRIPTION)),
        };
        let Some((selected, description)) = picked else {
            return Err(ToolError::Invalid("no delivery options available".to_string()));
        };

        pretty(&DeliverySelection {
            selected_option: selected.clone(),
            scenario,
            description: description.to_string(),
            total_options: options.len(),
            all_options: options.to_vec(),
        })
    }

    pub async fn conversational_pricing_advisor(
        &self,
        args: &AdvisorArgs,
    ) -> Result<String, ToolError> {
        if args.user_message.trim().is_empty() {
            return Err(ToolError::Invalid("user_message is required".to_string()));
        }

        let mut context = match present(&args.conversation_context) {
            Some(raw) => parse::<ConversationContext>(raw, "conversation_context")?,
            None => ConversationContext::new(),
        };
        if let Some(raw) = present(&args.customer_profile) {
            context.customer_profile = parse::<CustomerProfile>(raw, "customer_profile")?;
        }

        let response = self.engine.process_message(&args.user_message, &mut context).await;
        pretty(&response)
    }

    fn require_json(&self, raw: &str, field: &str) -> Result<(), ToolError> {
        checked(self.validator.validate_json_string(raw, field), field)
    }

    fn json_value(&self, raw: &str, field: &str) -> Result<Value, ToolError> {
        self.require_json(raw, field)?;
        parse(raw, field)
    }

    fn bounded_count(&self, raw: &str, field: &str) -> Result<u32, ToolError> {
        checked(self.validator.validate_numeric_string(raw, field, 1, 100), field)?;
        raw.parse::<u32>().map_err(|error| ToolError::Invalid(format!("{field}: {error}")))
    }
}

fn checked(result: ValidationResult, field: &str) -> Result<(), ToolError> {
    result.map_err(|report| ToolError::Invalid(report.describe(field)))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn parse<T: DeserializeOwned>(raw: &str, field: &str) -> Result<T, ToolError> {
    serde_json::from_str(raw).map_err(|source| ToolError::Parse { field: field.to_string(), source })
}

fn from_value<T: DeserializeOwned>(value: Value, field: &str) -> Result<T, ToolError> {
    serde_json::from_value(value)
        .map_err(|source| ToolError::Parse { field: field.to_string(), source })
}

fn parse_amount(raw: &str) -> Result<Decimal, ToolError> {
    let invalid = |detail: String| ToolError::Invalid(format!("total_order_value must be a valid number: {detail}"));
    let value = raw.trim().parse::<f64>().map_err(|error| invalid(error.to_string()))?;
    if value < 0.0 {
        return Err(invalid(format!("{raw} is negative")));
    }
    Decimal::from_f64(value).ok_or_else(|| invalid(format!("{raw} is not a finite amount")))
}

fn estimate_cost(cost: f64) -> Result<Decimal, ToolError> {
    if !cost.is_finite() || !(0.0..=MAX_ESTIMATED_COST).contains(&cost) {
        return Err(ToolError::Invalid(format!(
            "original_estimate: estimatedOrderCost must be between 0 and {MAX_ESTIMATED_COST}, got {cost}"
        )));
    }
    Decimal::from_f64(cost).ok_or_else(|| {
        ToolError::Invalid(format!("original_estimate: {cost} is not a valid amount"))
    })
}

fn pretty<T: Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string_pretty(value).map_err(ToolError::Encode)
}
