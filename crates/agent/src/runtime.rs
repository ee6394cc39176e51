use std::sync::Arc;

use anyhow::Result;
use parcelwise_core::booking::BookingService;
use parcelwise_core::config::{AppConfig, BookingAuthMode};
use parcelwise_core::context::{ConversationContext, ConversationMessage, PricingRecommendation};
use parcelwise_core::extractor::{apply_to_context, IntentExtractor, IntentType, PatternExtractor};
use parcelwise_core::flows::{
    friendly_validation_messages, next_detail_step, order_created_message, order_input,
    question_prompt, review_message, service_area_request, FlowAction, OrderFlowDriver,
    ORDER_FAILED_MESSAGE,
};
use parcelwise_core::pricing::{PricingComparison, PricingEngine, RuleBasedPricingEngine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::booking_service_from_config;
use crate::llm::{llm_client_from_config, CompletionRequest, LlmClient};
use crate::prompt::system_prompt;
use crate::templates::{next_questions, reply_for_intent, SAMPLE_ESTIMATE_DOLLARS};

const AI_FEATURES: [&str; 4] = [
    "natural_language_understanding",
    "contextual_responses",
    "intelligent_recommendations",
    "conversational_flow",
];
const FALLBACK_FEATURES: [&str; 3] =
    ["rule_based_processing", "pattern_matching", "basic_intent_recognition"];

/// `Hybrid` lets the text-generation client phrase replies and leaves the flow
/// prompts to it. `RuleBased` never calls the client and also returns
/// follow-up questions for gaps in the customer profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    #[default]
    Hybrid,
    RuleBased,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub message: String,
    pub recommendations: Vec<PricingRecommendation>,
    pub next_questions: Vec<String>,
    pub context: ConversationContext,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub engine_type: String,
    pub ai_available: bool,
    pub fallback_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub features: Vec<String>,
}

#[derive(Default)]
struct TurnNotes {
    messages: Vec<String>,
    submission: Option<String>,
}

impl TurnNotes {
    fn joined(&self) -> Option<String> {
        (!self.messages.is_empty()).then(|| self.messages.join("\n\n"))
    }
}

/// Runs one conversational turn end to end. Context updates, pricing and
/// order-flow transitions are always computed locally; an optional
/// text-generation client only supplies the prose.
pub struct ConversationEngine {
    extractor: Box<dyn IntentExtractor>,
    pricing: RuleBasedPricingEngine,
    driver: OrderFlowDriver,
    booking: Arc<dyn BookingService>,
    llm: Option<Box<dyn LlmClient>>,
    organization_id: Option<String>,
    mode: EngineMode,
}

impl ConversationEngine {
    pub fn new(booking: Arc<dyn BookingService>) -> Self {
        Self {
            extractor: Box::new(PatternExtractor::new()),
            pricing: RuleBasedPricingEngine::new(),
            driver: OrderFlowDriver::new(),
            booking,
            llm: None,
            organization_id: None,
            mode: EngineMode::Hybrid,
        }
    }

    pub fn rule_based(booking: Arc<dyn BookingService>) -> Self {
        Self { mode: EngineMode::RuleBased, ..Self::new(booking) }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let booking = booking_service_from_config(&config.booking)?;
        let mut engine = Self::new(booking);
        engine.llm = llm_client_from_config(&config.llm);
        engine.organization_id = config.booking.organization_id.clone();

        tracing::info!(
            event_name = "conversation.engine_ready",
            correlation_id = "bootstrap",
            ai_available = engine.ai_available(),
            booking_mode = engine.booking_mode().as_str(),
            "conversation engine initialized"
        );
        Ok(engine)
    }

    pub fn with_llm(mut self, llm: Box<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_organization_id(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn ai_available(&self) -> bool {
        self.mode == EngineMode::Hybrid && self.llm.is_some()
    }

    pub fn booking_mode(&self) -> BookingAuthMode {
        self.booking.mode()
    }

    pub fn booking(&self) -> Arc<dyn BookingService> {
        Arc::clone(&self.booking)
    }

    pub fn engine_info(&self) -> EngineInfo {
        let ai_available = self.ai_available();
        let features: &[&str] = if ai_available { &AI_FEATURES } else { &FALLBACK_FEATURES };

        EngineInfo {
            engine_type: "hybrid".to_string(),
            ai_available,
            fallback_mode: !ai_available,
            model: self
                .llm
                .as_ref()
                .filter(|_| ai_available)
                .map(|client| client.model().to_string()),
            features: features.iter().map(|feature| feature.to_string()).collect(),
        }
    }

    pub async fn process_message(
        &self,
        text: &str,
        context: &mut ConversationContext,
    ) -> ConversationResponse {
        self.process_message_with_history(text, context, &[]).await
    }

    pub async fn process_message_with_history(
        &self,
        text: &str,
        context: &mut ConversationContext,
        history: &[ConversationMessage],
    ) -> ConversationResponse {
        let intent = self.extractor.extract_intent(text);
        apply_to_context(context, &intent);

        let actions = self.driver.advance(text, context);
        let notes = self.run_actions(actions, context).await;

        let errors = context.order_creation.take_validation_errors();
        if let Some(message) = friendly_validation_messages(&errors) {
            tracing::info!(
                event_name = "conversation.validation_reply",
                correlation_id = %context.session_id,
                error_count = errors.len(),
                "answering with validation guidance"
            );
            context.touch();
            return ConversationResponse {
                message,
                recommendations: Vec::new(),
                next_questions: Vec::new(),
                context: context.clone(),
            };
        }

        let comparison = self
            .pricing
            .compare(Decimal::from(SAMPLE_ESTIMATE_DOLLARS), &context.pricing_context());
        if matches!(
            intent.intent_type,
            IntentType::ComparePricing | IntentType::GetRecommendation | IntentType::ExploreOptions
        ) {
            context.record_comparison(&comparison);
        }
        let recommendations: Vec<PricingRecommendation> =
            comparison.pricing_models.iter().map(Into::into).collect();

        let message = match notes.submission.clone() {
            Some(submission) => submission,
            None => match self.generated_reply(text, context, history, &comparison).await {
                Some(reply) => reply,
                None => notes
                    .joined()
                    .or_else(|| order_progress_prompt(context))
                    .unwrap_or_else(|| reply_for_intent(&intent, &recommendations)),
            },
        };

        let next_questions = match self.mode {
            EngineMode::Hybrid => Vec::new(),
            EngineMode::RuleBased => next_questions(context),
        };

        tracing::debug!(
            event_name = "conversation.turn_processed",
            correlation_id = %context.session_id,
            intent = %intent.intent_type,
            step = %context.order_creation.step,
            "conversation turn processed"
        );

        context.touch();
        ConversationResponse { message, recommendations, next_questions, context: context.clone() }
    }

    async fn run_actions(
        &self,
        actions: Vec<FlowAction>,
        context: &mut ConversationContext,
    ) -> TurnNotes {
        let mut notes = TurnNotes::default();

        for action in actions {
            match action {
                FlowAction::AskQuestion(question) => {
                    if let Some(prompt) = question_prompt(&question) {
                        notes.messages.push(prompt.to_string());
                    }
                }
                FlowAction::ValidateServiceArea => self.validate_service_area(context).await,
                FlowAction::ShowOrderSummary => {
                    notes.messages.push(review_message(&context.order_creation));
                }
                FlowAction::SubmitOrder => {
                    notes.submission = Some(self.submit_order(context).await);
                }
            }
        }
        notes
    }

    async fn validate_service_area(&self, context: &mut ConversationContext) {
        let Some(request) = service_area_request(&context.order_creation) else {
            return;
        };

        let rejection = match self.booking.create_estimate(&request).await {
            Ok(response) if response.options().is_empty() => Some(
                "Service area validation failed: no delivery options available for this location"
                    .to_string(),
            ),
            Ok(_) => None,
            Err(error) => Some(format!("Service area validation failed: {error}")),
        };

        if let Some(rejection) = rejection {
            tracing::warn!(
                event_name = "order_flow.service_area_rejected",
                correlation_id = %context.session_id,
                reason = %rejection,
                "service area check rejected the newest drop-off"
            );
            let state = &mut context.order_creation;
            state.withdraw_last_drop_off();
            state.validation_errors.push(rejection);
        }
    }

    async fn submit_order(&self, context: &mut ConversationContext) -> String {
        let input = order_input(&context.order_creation, self.organization_id.as_deref());

        match self.booking.create_order(&input).await {
            Ok(response) => {
                let order = response.order().clone();
                tracing::info!(
                    event_name = "order_flow.order_created",
                    correlation_id = %context.session_id,
                    order_id = %order.id,
                    "order created"
                );
                let message = order_created_message(&order);
                if let Err(error) = self.driver.complete_order(context, order) {
                    tracing::warn!(
                        event_name = "order_flow.completion_rejected",
                        correlation_id = %context.session_id,
                        error = %error,
                        "order created outside the review step"
                    );
                }
                message
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "order_flow.order_failed",
                    correlation_id = %context.session_id,
                    error = %error,
                    "order submission failed; staying at review"
                );
                ORDER_FAILED_MESSAGE.to_string()
            }
        }
    }

    async fn generated_reply(
        &self,
        text: &str,
        context: &ConversationContext,
        history: &[ConversationMessage],
        comparison: &PricingComparison,
    ) -> Option<String> {
        if self.mode != EngineMode::Hybrid {
            return None;
        }
        let llm = self.llm.as_ref()?;

        let request = CompletionRequest {
            system: system_prompt(context, comparison),
            history: history.to_vec(),
            user_message: text.to_string(),
        };
        match llm.complete(&request).await {
            Ok(reply) => Some(reply),
            Err(error) => {
                tracing::warn!(
                    event_name = "conversation.llm_fallback",
                    correlation_id = %context.session_id,
                    error = %error,
                    "text generation failed; using local reply"
                );
                None
            }
        }
    }
}

fn order_progress_prompt(context: &ConversationContext) -> Option<String> {
    let state = &context.order_creation;
    if !state.in_progress {
        return None;
    }
    let prompt = question_prompt(&state.current_question)
        .unwrap_or_else(|| next_detail_step(state).prompt(state));
    Some(prompt.to_string())
}
