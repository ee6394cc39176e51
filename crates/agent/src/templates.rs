//! Deterministic replies used whenever text generation is unavailable.

use std::fmt::Write as _;

use parcelwise_core::context::{ConversationContext, PricingRecommendation};
use parcelwise_core::extractor::{Intent, IntentType, ENTITY_CUSTOMER_TIER, ENTITY_DELIVERY_COUNT};
use parcelwise_core::pricing::CustomerTier;
use rust_decimal::Decimal;

pub const SAMPLE_ESTIMATE_DOLLARS: i64 = 50;

pub fn reply_for_intent(intent: &Intent, recommendations: &[PricingRecommendation]) -> String {
    match intent.intent_type {
        IntentType::ComparePricing => comparison_reply(recommendations),
        IntentType::GetRecommendation => recommendation_reply(recommendations),
        IntentType::ExploreOptions => exploration_reply(recommendations),
        IntentType::DeliveryRequirements => delivery_requirements_reply(intent),
        IntentType::CustomerTier => customer_tier_reply(intent),
        IntentType::VolumeQuestions | IntentType::GeneralInquiry => default_reply(),
    }
}

// Highest positive savings among eligible models. Ties keep the earlier model.
fn top_savings(recommendations: &[PricingRecommendation]) -> Option<&PricingRecommendation> {
    recommendations
        .iter()
        .filter(|recommendation| recommendation.eligible && recommendation.savings > Decimal::ZERO)
        .fold(None, |best: Option<&PricingRecommendation>, candidate| match best {
            Some(current) if current.savings >= candidate.savings => Some(current),
            _ => Some(candidate),
        })
}

pub fn comparison_reply(recommendations: &[PricingRecommendation]) -> String {
    if recommendations.is_empty() {
        return "I'd be happy to help you compare pricing options! Could you tell me about your delivery needs?".to_string();
    }

    let mut reply = String::from("Here are your pricing options:\n\n");
    for recommendation in recommendations {
        if recommendation.eligible {
            let _ = writeln!(
                reply,
                "✅ **{}**: Save ${:.2} ({:.1}%)",
                recommendation.name, recommendation.savings, recommendation.savings_percent
            );
        } else {
            let _ = writeln!(
                reply,
                "❌ **{}**: {}",
                recommendation.name,
                recommendation.reason.as_deref().unwrap_or_default()
            );
        }
    }

    if let Some(best) = top_savings(recommendations) {
        let _ = write!(reply, "\n🏆 **Best Option**: {} with ${:.2} savings!", best.name, best.savings);
    }
    reply
}

pub fn recommendation_reply(recommendations: &[PricingRecommendation]) -> String {
    if recommendations.is_empty() {
        return "I'd love to recommend the best pricing for you! Could you tell me about your delivery needs and customer tier?".to_string();
    }

    match top_savings(recommendations) {
        Some(best) => {
            let percent = best.savings / Decimal::from(SAMPLE_ESTIMATE_DOLLARS) * Decimal::from(100);
            format!(
                "Based on your profile, I recommend **{}** for ${:.2} savings ({:.1}% off)! This gives you the best value for your delivery needs.",
                best.name, best.savings, percent
            )
        }
        None => "I need a bit more information to give you the best recommendation. Could you tell me about your delivery count and customer tier?".to_string(),
    }
}

pub fn exploration_reply(recommendations: &[PricingRecommendation]) -> String {
    let mut reply = String::from("Let's explore your pricing options! Here's what's available:\n\n");
    let (eligible, ineligible): (Vec<_>, Vec<_>) =
        recommendations.iter().partition(|recommendation| recommendation.eligible);

    if !eligible.is_empty() {
        reply.push_str("**Available Options:**\n");
        for recommendation in eligible {
            let _ = writeln!(reply, "• {}: ${:.2} savings", recommendation.name, recommendation.savings);
        }
    }
    if !ineligible.is_empty() {
        reply.push_str("\n**Potential Options:**\n");
        for recommendation in ineligible {
            let _ = writeln!(
                reply,
                "• {}: {}",
                recommendation.name,
                recommendation.reason.as_deref().unwrap_or_default()
            );
        }
    }
    reply
}

fn delivery_requirements_reply(intent: &Intent) -> String {
    match intent.entity(ENTITY_DELIVERY_COUNT) {
        Some(count) => format!(
            "Great! {count} deliveries gives you access to our Multi-Delivery Discount (15% off). Would you like to see all your pricing options?"
        ),
        None => "I'd love to help you with your delivery needs! How many deliveries are you planning?"
            .to_string(),
    }
}

fn customer_tier_reply(intent: &Intent) -> String {
    match intent.entity(ENTITY_CUSTOMER_TIER) {
        Some(tier) => format!(
            "Excellent! Your {tier} tier status gives you access to our Loyalty Discount (10% off). Let me show you all available pricing options."
        ),
        None => "What's your customer tier? This helps me find the best pricing options for you."
            .to_string(),
    }
}

fn default_reply() -> String {
    "I'd be happy to help you with pricing! Could you tell me about your delivery needs? For example, how many deliveries do you need and what's your customer tier?".to_string()
}

/// Follow-up questions for gaps in the customer profile.
pub fn next_questions(context: &ConversationContext) -> Vec<String> {
    let profile = &context.customer_profile;
    let mut questions = Vec::new();

    if profile.tier.is_none() {
        questions.push("What's your customer tier? (bronze, silver, gold)".to_string());
    }
    if profile.order_frequency == 0 {
        questions.push("How many orders do you place per month?".to_string());
    }
    if context.delivery_history.is_empty() {
        questions.push("How many deliveries do you need for this order?".to_string());
    }
    if profile.tier == Some(CustomerTier::Bronze) {
        questions.push("Would you like to learn about our loyalty program?".to_string());
    }
    if profile.order_frequency < 3 {
        questions.push(
            "Are you interested in increasing your order frequency for better pricing?".to_string(),
        );
    }
    questions
}

#[cfg(test)]
mod tests {
    use parcelwise_core::context::{ConversationContext, PricingRecommendation};
    use parcelwise_core::extractor::{IntentExtractor, PatternExtractor};
    use parcelwise_core::pricing::{PricingEngine, RuleBasedPricingEngine};
    use rust_decimal::Decimal;

    use super::{
        comparison_reply, exploration_reply, next_questions, recommendation_reply,
        reply_for_intent,
    };

    fn recommendations_for(delivery_count: u32) -> Vec<PricingRecommendation> {
        let mut context = ConversationContext::new();
        context.customer_profile.current_delivery_count = delivery_count;
        RuleBasedPricingEngine::new()
            .compare(Decimal::from(50), &context.pricing_context())
            .pricing_models
            .iter()
            .map(Into::into)
            .collect()
    }

    #[test]
    fn comparison_lists_every_model_and_crowns_best_savings() {
        let reply = comparison_reply(&recommendations_for(3));

        assert!(reply.starts_with("Here are your pricing options:\n\n"));
        assert!(reply.contains("✅ **Standard Pricing**: Save $0.00 (0.0%)"));
        assert!(reply.contains("✅ **Multi-Delivery Discount**: Save $8.35 (16.7%)"));
        assert!(reply.contains("❌ **Volume Discount**: Requires 5+ deliveries"));
        assert!(reply.ends_with("🏆 **Best Option**: Multi-Delivery Discount with $8.35 savings!"));
    }

    #[test]
    fn comparison_without_savings_has_no_best_line() {
        let reply = comparison_reply(&recommendations_for(1));
        assert!(!reply.contains("Best Option"));
    }

    #[test]
    fn recommendation_quotes_percent_of_sample_estimate() {
        let reply = recommendation_reply(&recommendations_for(3));
        assert_eq!(
            reply,
            "Based on your profile, I recommend **Multi-Delivery Discount** for $8.35 savings (16.7% off)! This gives you the best value for your delivery needs."
        );

        let reply = recommendation_reply(&recommendations_for(1));
        assert!(reply.starts_with("I need a bit more information"));
        assert!(recommendation_reply(&[]).starts_with("I'd love to recommend"));
    }

    #[test]
    fn exploration_groups_available_and_potential() {
        let reply = exploration_reply(&recommendations_for(3));
        assert!(reply.contains("**Available Options:**\n• Standard Pricing: $0.00 savings\n"));
        assert!(reply.contains("\n**Potential Options:**\n• Volume Discount: "));
    }

    #[test]
    fn entity_driven_replies_echo_extracted_values() {
        let extractor = PatternExtractor::new();

        let intent = extractor.extract_intent("I need to deliver 4 packages");
        assert!(reply_for_intent(&intent, &[]).starts_with("Great! 4 deliveries"));

        let intent = extractor.extract_intent("I'm on the gold tier");
        assert!(reply_for_intent(&intent, &[]).starts_with("Excellent! Your gold tier status"));

        let intent = extractor.extract_intent("hello there");
        assert!(reply_for_intent(&intent, &[]).starts_with("I'd be happy to help you with pricing!"));
    }

    #[test]
    fn next_questions_follow_profile_gaps() {
        let mut context = ConversationContext::new();
        let questions = next_questions(&context);
        assert_eq!(questions.len(), 4);
        assert!(questions.contains(&"Would you like to learn about our loyalty program?".to_string()));

        context.customer_profile.tier = None;
        context.customer_profile.order_frequency = 6;
        let questions = next_questions(&context);
        assert_eq!(
            questions,
            vec![
                "What's your customer tier? (bronze, silver, gold)".to_string(),
                "How many deliveries do you need for this order?".to_string(),
            ]
        );
    }
}
