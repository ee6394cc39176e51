//! Keyword and regex heuristics that turn free text into an [`Intent`].
//!
//! The extraction sits behind the [`IntentExtractor`] trait so a proper NLU
//! component can replace it. Order dependencies are part of the contract:
//! intent categories are tested in [`IntentType::MATCH_ORDER`], and tier
//! detection checks gold before silver before bronze.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::{ConversationContext, DeliveryRequirement};
use crate::pricing::CustomerTier;

pub const MATCHED_CONFIDENCE: f32 = 0.8;
pub const FALLBACK_CONFIDENCE: f32 = 0.5;

pub const ENTITY_DELIVERY_COUNT: &str = "delivery_count";
pub const ENTITY_CUSTOMER_TIER: &str = "customer_tier";
pub const ENTITY_ORDER_FREQUENCY: &str = "order_frequency";
pub const ENTITY_VEHICLE_TYPE: &str = "vehicle_type";
pub const ENTITY_BULK_ORDER: &str = "is_bulk_order";

const DELIVERY_KEYWORDS: &[&str] =
    &["deliver", "delivery", "deliveries", "package", "packages", "shipment", "shipments", "drop", "drops"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    ComparePricing,
    GetRecommendation,
    ExploreOptions,
    DeliveryRequirements,
    CustomerTier,
    VolumeQuestions,
    GeneralInquiry,
}

impl IntentType {
    pub const MATCH_ORDER: [IntentType; 6] = [
        Self::ComparePricing,
        Self::GetRecommendation,
        Self::ExploreOptions,
        Self::DeliveryRequirements,
        Self::CustomerTier,
        Self::VolumeQuestions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ComparePricing => "compare_pricing",
            Self::GetRecommendation => "get_recommendation",
            Self::ExploreOptions => "explore_options",
            Self::DeliveryRequirements => "delivery_requirements",
            Self::CustomerTier => "customer_tier",
            Self::VolumeQuestions => "volume_questions",
            Self::GeneralInquiry => "general_inquiry",
        }
    }

    fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::ComparePricing => {
                &["compare.*pricing", "what.*pricing.*options", "show.*me.*pricing", "pricing.*models"]
            }
            Self::GetRecommendation => {
                &["what.*best.*pricing", "recommend.*pricing", "which.*pricing.*best", "best.*option"]
            }
            Self::ExploreOptions => &[
                "explore.*pricing",
                "what.*options.*available",
                "show.*me.*options",
                "pricing.*choices",
            ],
            Self::DeliveryRequirements => {
                &["need.*deliver", "deliver.*to", "pickup.*from", "delivery.*count"]
            }
            Self::CustomerTier => &["gold.*tier", "silver.*tier", "bronze.*tier", "loyalty.*tier"],
            Self::VolumeQuestions => {
                &["how.*many.*deliver", "delivery.*count", "multiple.*deliver", "bulk.*order"]
            }
            Self::GeneralInquiry => &[],
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub entities: BTreeMap<String, String>,
    pub confidence: f32,
}

impl Intent {
    pub fn entity(&self, name: &str) -> Option<&str> {
        self.entities.get(name).map(String::as_str)
    }
}

pub trait IntentExtractor: Send + Sync {
    fn extract_intent(&self, text: &str) -> Intent;

    fn extract_entities(&self, text: &str) -> BTreeMap<String, String>;
}

#[derive(Clone, Debug, Default)]
pub struct PatternExtractor;

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl IntentExtractor for PatternExtractor {
    fn extract_intent(&self, text: &str) -> Intent {
        let normalized = text.to_lowercase();
        let entities = self.extract_entities(&normalized);

        let matched = compiled_patterns()
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|pattern| pattern.is_match(&normalized)))
            .map(|(intent_type, _)| *intent_type);

        match matched {
            Some(intent_type) => Intent { intent_type, entities, confidence: MATCHED_CONFIDENCE },
            None => Intent {
                intent_type: IntentType::GeneralInquiry,
                entities,
                confidence: FALLBACK_CONFIDENCE,
            },
        }
    }

    fn extract_entities(&self, text: &str) -> BTreeMap<String, String> {
        let normalized = text.to_lowercase();
        let tokens = tokenize(&normalized);
        let mut entities = BTreeMap::new();

        if let Some(count) = extract_delivery_count(&tokens) {
            entities.insert(ENTITY_DELIVERY_COUNT.to_string(), count.to_string());
        }
        if let Some(tier) = extract_tier(&normalized) {
            entities.insert(ENTITY_CUSTOMER_TIER.to_string(), tier.to_string());
        }
        if let Some(frequency) = extract_order_frequency(&normalized) {
            entities.insert(ENTITY_ORDER_FREQUENCY.to_string(), frequency.to_string());
        }
        if let Some(vehicle) = extract_vehicle_type(&normalized) {
            entities.insert(ENTITY_VEHICLE_TYPE.to_string(), vehicle.to_string());
        }
        if normalized.contains("bulk") {
            entities.insert(ENTITY_BULK_ORDER.to_string(), "true".to_string());
        }

        entities
    }
}

fn compiled_patterns() -> &'static [(IntentType, Vec<Regex>)] {
    static PATTERNS: OnceLock<Vec<(IntentType, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        IntentType::MATCH_ORDER
            .iter()
            .map(|intent_type| {
                let patterns = intent_type
                    .patterns()
                    .iter()
                    .map(|pattern| Regex::new(pattern).expect("intent pattern compiles"))
                    .collect();
                (*intent_type, patterns)
            })
            .collect()
    })
}

/// Folds extracted entities into the session. Only entities that were found
/// overwrite existing values.
pub fn apply_to_context(context: &mut ConversationContext, intent: &Intent) {
    let profile = &mut context.customer_profile;

    if let Some(tier) = intent.entity(ENTITY_CUSTOMER_TIER).and_then(|tier| tier.parse().ok()) {
        profile.tier = Some(tier);
    }
    if let Some(frequency) =
        intent.entity(ENTITY_ORDER_FREQUENCY).and_then(|value| value.parse::<u32>().ok())
    {
        profile.order_frequency = frequency;
    }
    if let Some(vehicle) = intent.entity(ENTITY_VEHICLE_TYPE) {
        profile.preferred_vehicle = vehicle.to_string();
    }
    if intent.entity(ENTITY_BULK_ORDER) == Some("true") {
        profile.is_bulk_order = true;
    }
    if let Some(count) =
        intent.entity(ENTITY_DELIVERY_COUNT).and_then(|value| value.parse::<u32>().ok())
    {
        profile.current_delivery_count = count;
        let vehicle_type = profile.preferred_vehicle.clone();
        context.delivery_history.push(DeliveryRequirement {
            count,
            vehicle_type,
            ..DeliveryRequirement::default()
        });
    }

    if matches!(
        intent.intent_type,
        IntentType::ComparePricing | IntentType::GetRecommendation | IntentType::ExploreOptions
    ) {
        context.current_goal = intent.intent_type.as_str().to_string();
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|character: char| !character.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

// A number directly before or after a delivery keyword ("3 packages",
// "deliver 3"). The first keyword with an adjacent number wins.
fn extract_delivery_count(tokens: &[String]) -> Option<u32> {
    tokens.iter().enumerate().find_map(|(index, token)| {
        if !is_delivery_keyword(token) {
            return None;
        }
        let before = index.checked_sub(1).and_then(|previous| tokens.get(previous));
        let after = tokens.get(index + 1);
        before.and_then(|word| small_number(word)).or_else(|| after.and_then(|word| small_number(word)))
    })
}

fn is_delivery_keyword(token: &str) -> bool {
    DELIVERY_KEYWORDS.iter().any(|keyword| {
        token == *keyword || token.strip_suffix('s').is_some_and(|stem| stem == *keyword)
    })
}

fn small_number(word: &str) -> Option<u32> {
    let number = match word {
        "one" | "1" => 1,
        "two" | "2" => 2,
        "three" | "3" => 3,
        "four" | "4" => 4,
        "five" | "5" => 5,
        "six" | "6" => 6,
        "seven" | "7" => 7,
        "eight" | "8" => 8,
        "nine" | "9" => 9,
        "ten" | "10" => 10,
        _ => return None,
    };
    Some(number)
}

fn extract_tier(normalized: &str) -> Option<CustomerTier> {
    if normalized.contains("gold") {
        Some(CustomerTier::Gold)
    } else if normalized.contains("silver") {
        Some(CustomerTier::Silver)
    } else if normalized.contains("bronze") {
        Some(CustomerTier::Bronze)
    } else {
        None
    }
}

// Only the literal values 5 and 10 are recognized, and only alongside "month".
fn extract_order_frequency(normalized: &str) -> Option<u32> {
    if !normalized.contains("month") {
        return None;
    }
    if normalized.contains('5') {
        Some(5)
    } else if normalized.contains("10") {
        Some(10)
    } else {
        None
    }
}

fn extract_vehicle_type(normalized: &str) -> Option<&'static str> {
    if normalized.contains("cargo") {
        Some("cargo_van")
    } else if normalized.contains("sprinter") {
        Some("sprinter_van")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{
        apply_to_context, IntentExtractor, IntentType, PatternExtractor, ENTITY_CUSTOMER_TIER,
        ENTITY_DELIVERY_COUNT, ENTITY_ORDER_FREQUENCY,
    };
    use crate::context::ConversationContext;
    use crate::pricing::CustomerTier;

    #[test]
    fn classifies_intents_in_fixed_order() {
        struct Case {
            text: &'static str,
            expected: IntentType,
        }

        let cases = vec![
            Case { text: "Can you compare pricing for me?", expected: IntentType::ComparePricing },
            Case { text: "What pricing options do I have?", expected: IntentType::ComparePricing },
            Case { text: "Show me pricing models", expected: IntentType::ComparePricing },
            Case { text: "What is the best pricing?", expected: IntentType::GetRecommendation },
            Case { text: "Which is my best option", expected: IntentType::GetRecommendation },
            Case { text: "I'd like to explore pricing", expected: IntentType::ExploreOptions },
            Case { text: "show me options", expected: IntentType::ExploreOptions },
            Case { text: "I need 3 deliveries", expected: IntentType::DeliveryRequirements },
            Case { text: "pickup from our warehouse", expected: IntentType::DeliveryRequirements },
            Case { text: "I'm a gold tier member", expected: IntentType::CustomerTier },
            Case { text: "how many can you deliver?", expected: IntentType::VolumeQuestions },
            Case { text: "is this a bulk order", expected: IntentType::VolumeQuestions },
            Case { text: "hello there", expected: IntentType::GeneralInquiry },
        ];

        let extractor = PatternExtractor::new();
        for case in cases {
            let intent = extractor.extract_intent(case.text);
            assert_eq!(intent.intent_type, case.expected, "text: {}", case.text);
        }
    }

    #[test]
    fn confidence_depends_on_match() {
        let extractor = PatternExtractor::new();
        assert!((extractor.extract_intent("compare pricing").confidence - 0.8).abs() < f32::EPSILON);
        assert!((extractor.extract_intent("hi").confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn delivery_count_reads_adjacent_numbers() {
        let extractor = PatternExtractor::new();
        let count = |text: &str| extractor.extract_entities(text).get(ENTITY_DELIVERY_COUNT).cloned();

        assert_eq!(count("I need 3 deliveries"), Some("3".to_string()));
        assert_eq!(count("we deliver five packages a day"), Some("5".to_string()));
        assert_eq!(count("Ten shipments, please."), Some("10".to_string()));
        assert_eq!(count("drops 4"), Some("4".to_string()));
        assert_eq!(count("I need 40 deliveries"), None);
        assert_eq!(count("3 apples"), None);
    }

    #[test]
    fn gold_beats_bronze_in_tier_detection() {
        let entities = PatternExtractor::new()
            .extract_entities("I used to be bronze but now I'm gold");
        assert_eq!(entities.get(ENTITY_CUSTOMER_TIER).map(String::as_str), Some("gold"));
    }

    #[test]
    fn order_frequency_only_knows_five_and_ten() {
        let extractor = PatternExtractor::new();
        let frequency =
            |text: &str| extractor.extract_entities(text).get(ENTITY_ORDER_FREQUENCY).cloned();

        assert_eq!(frequency("about 5 orders a month"), Some("5".to_string()));
        assert_eq!(frequency("10 per month"), Some("10".to_string()));
        assert_eq!(frequency("7 per month"), None);
        assert_eq!(frequency("5 orders a week"), None);
    }

    #[test]
    fn vehicle_and_bulk_flags() {
        let entities = PatternExtractor::new().extract_entities("Bulk job, sprinter preferred");
        assert_eq!(entities.get("vehicle_type").map(String::as_str), Some("sprinter_van"));
        assert_eq!(entities.get("is_bulk_order").map(String::as_str), Some("true"));
    }

    #[test]
    fn applying_intent_updates_profile_and_history() {
        let extractor = PatternExtractor::new();
        let mut context = ConversationContext::new();

        apply_to_context(&mut context, &extractor.extract_intent("I need 3 deliveries by cargo van"));
        assert_eq!(context.customer_profile.current_delivery_count, 3);
        assert_eq!(context.delivery_history.len(), 1);
        assert_eq!(context.delivery_history[0].vehicle_type, "cargo_van");

        apply_to_context(&mut context, &extractor.extract_intent("compare pricing, I'm silver"));
        assert_eq!(context.customer_profile.tier, Some(CustomerTier::Silver));
        assert_eq!(context.current_goal, "compare_pricing");
        assert_eq!(context.customer_profile.current_delivery_count, 3);
    }
}
