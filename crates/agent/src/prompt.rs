use std::fmt::Write as _;

use parcelwise_core::context::{ConversationContext, OrderCreationState};
use parcelwise_core::flows::next_detail_step;
use parcelwise_core::pricing::PricingComparison;

const ROLE_AND_RULES: &str = "You are a delivery order assistant. Help the customer create a delivery order and point out the pricing that saves them the most.

Conversation rules:
- Ask ONE question at a time and wait for the answer.
- Collect the pickup stop (business, address, contact, phone), then each delivery stop, then vehicle, special services and timing.
- Never invent prices, discounts or order numbers. Only quote the figures listed below.
- Keep answers short, direct and focused on getting the order created.";

const PRICING_TABLE: &str = "Pricing models:
- Standard Pricing: no discount, always available
- Multi-Delivery Discount: 15% off for 2+ deliveries in one order
- Volume Discount: 20% off for 5+ deliveries and 3+ orders per month
- Loyalty Discount: 10% off for gold tier customers
- Bulk Order Discount: 25% off for 10+ deliveries flagged as a bulk order";

/// Builds the system prompt for one turn from the already-updated context and
/// the locally computed comparison.
pub fn system_prompt(context: &ConversationContext, comparison: &PricingComparison) -> String {
    let profile = &context.customer_profile;
    let order = &context.order_creation;
    let mut prompt = String::new();

    prompt.push_str(ROLE_AND_RULES);
    prompt.push_str("\n\n");
    prompt.push_str(PRICING_TABLE);

    prompt.push_str("\n\nCustomer context:\n");
    let _ = writeln!(prompt, "- Delivery count: {}", profile.current_delivery_count);
    let _ = writeln!(
        prompt,
        "- Customer tier: {}",
        profile.tier.map(|tier| tier.as_str()).unwrap_or("unknown")
    );
    let _ = writeln!(prompt, "- Order frequency: {} orders/month", profile.order_frequency);
    let _ = writeln!(prompt, "- Average order value: ${:.2}", profile.average_order_value);
    let _ = writeln!(prompt, "- Bulk order: {}", profile.is_bulk_order);

    prompt.push_str("\nComputed pricing for a $50.00 sample estimate:\n");
    for result in &comparison.pricing_models {
        if result.eligible {
            let _ = writeln!(prompt, "- {}: ${:.2} (save ${:.2})", result.name, result.adjusted_cost, result.savings);
        } else {
            let _ = writeln!(
                prompt,
                "- {}: not available ({})",
                result.name,
                result.reason.as_deref().unwrap_or("requirements not met")
            );
        }
    }

    prompt.push_str("\nOrder creation progress:\n");
    let _ = writeln!(prompt, "- In progress: {}", order.in_progress);
    let _ = writeln!(prompt, "- Current step: {}", order.step);
    let _ = writeln!(prompt, "- Current question: {}", order.current_question);
    let _ = writeln!(prompt, "- Completed fields: {}", order.completed_fields.join(", "));
    let _ = writeln!(prompt, "- Missing fields: {}", order.missing_fields.join(", "));
    let _ = writeln!(prompt, "- Suggested next prompt: {}", next_detail_step(order).prompt(order));

    prompt.push_str("\nCollected order information:\n");
    prompt.push_str(&collected_information(order));
    prompt
}

fn collected_information(order: &OrderCreationState) -> String {
    if !order.in_progress {
        return "- No order in progress\n".to_string();
    }

    let mut info = String::new();
    if let Some(pickup) = &order.pickup_info {
        info.push_str("- Pickup:\n");
        if let Some(business) = &pickup.business_name {
            let _ = writeln!(info, "  - Business: {business}");
        }
        if let Some(contact) = &pickup.contact_name {
            let _ = writeln!(info, "  - Contact: {contact}");
        }
        if let Some(phone) = &pickup.contact_phone_number {
            let _ = writeln!(info, "  - Phone: {phone}");
        }
        if let Some(address) = pickup.address() {
            let _ = writeln!(
                info,
                "  - Address: {}, {}, {} {}",
                address.street, address.city, address.state, address.zip_code
            );
        }
    }

    if order.drop_offs.is_empty() {
        info.push_str("- Deliveries: none collected yet\n");
    }
    for (index, drop_off) in order.drop_offs.iter().enumerate() {
        let _ = writeln!(info, "- Delivery {}:", index + 1);
        if let Some(business) = &drop_off.business_name {
            let _ = writeln!(info, "  - Business: {business}");
        }
        if let Some(address) = drop_off.address() {
            let _ = writeln!(
                info,
                "  - Address: {}, {}, {} {}",
                address.street, address.city, address.state, address.zip_code
            );
        }
    }

    if let Some(vehicle) = &order.vehicle_type {
        let _ = writeln!(info, "- Vehicle: {}", vehicle.vehicle_type_name);
    }
    if !order.capabilities.is_empty() {
        let _ = writeln!(info, "- Special services: {}", order.capabilities.join(", "));
    }
    info
}

#[cfg(test)]
mod tests {
    use parcelwise_core::context::ConversationContext;
    use parcelwise_core::flows::OrderFlowDriver;
    use parcelwise_core::pricing::{PricingEngine, RuleBasedPricingEngine};
    use rust_decimal::Decimal;

    use super::system_prompt;

    #[test]
    fn prompt_carries_profile_pricing_and_progress() {
        let mut context = ConversationContext::new();
        context.customer_profile.current_delivery_count = 3;
        OrderFlowDriver::new().advance("123 Main St, San Francisco, CA, 94105", &mut context);
        let comparison =
            RuleBasedPricingEngine::new().compare(Decimal::from(50), &context.pricing_context());

        let prompt = system_prompt(&context, &comparison);

        assert!(prompt.contains("Ask ONE question at a time"));
        assert!(prompt.contains("- Delivery count: 3"));
        assert!(prompt.contains("- Customer tier: bronze"));
        assert!(prompt.contains("- Current step: pickup"));
        assert!(prompt.contains("Address: 123 Main St, San Francisco, CA 94105"));
        assert!(prompt.contains("Deliveries: none collected yet"));
    }

    #[test]
    fn idle_session_reports_no_order() {
        let context = ConversationContext::new();
        let comparison =
            RuleBasedPricingEngine::new().compare(Decimal::from(50), &context.pricing_context());

        assert!(system_prompt(&context, &comparison).contains("- No order in progress"));
    }
}
