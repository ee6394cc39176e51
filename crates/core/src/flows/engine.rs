use thiserror::Error;

use crate::flows::states::{FlowAction, FlowContext, FlowEvent, OrderStep, TransitionOutcome};

pub const QUESTION_PICKUP_BUSINESS: &str = "pickup_business";
pub const QUESTION_PICKUP_ADDRESS: &str = "pickup_address";
pub const QUESTION_PICKUP_CONTACT: &str = "pickup_contact";
pub const QUESTION_PICKUP_PHONE: &str = "pickup_phone";
pub const QUESTION_DROP_OFF_ADDRESS: &str = "drop_off_address";
pub const QUESTION_CONFIRM_ORDER: &str = "confirm_order";

pub trait FlowDefinition {
    fn initial_state(&self) -> OrderStep;
    fn transition(
        &self,
        current: &OrderStep,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// `not_started -> pickup -> deliveries -> review -> completed`.
#[derive(Clone, Debug, Default)]
pub struct OrderCreationFlow;

impl FlowDefinition for OrderCreationFlow {
    fn initial_state(&self) -> OrderStep {
        OrderStep::NotStarted
    }

    fn transition(
        &self,
        current: &OrderStep,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_order_creation(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> OrderStep {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &OrderStep,
        event: &FlowEvent,
        context: &FlowContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, context)
    }

    /// Same as [`FlowEngine::apply`], plus a trace event keyed by session.
    pub fn apply_logged(
        &self,
        current: &OrderStep,
        event: &FlowEvent,
        context: &FlowContext,
        session_id: &str,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let result = self.apply(current, event, context);
        match &result {
            Ok(outcome) => tracing::debug!(
                event_name = "order_flow.transition_applied",
                correlation_id = session_id,
                from = %outcome.from,
                to = %outcome.to,
                trigger = ?outcome.event,
                "order flow transition applied"
            ),
            Err(error) => tracing::debug!(
                event_name = "order_flow.transition_rejected",
                correlation_id = session_id,
                error = %error,
                "order flow transition rejected"
            ),
        }
        result
    }
}

impl Default for FlowEngine<OrderCreationFlow> {
    fn default() -> Self {
        Self::new(OrderCreationFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before leaving {state}: {missing_fields:?}")]
    MissingRequiredFields { state: OrderStep, missing_fields: Vec<String> },
    #[error("invalid transition from {state} using event {event:?}")]
    InvalidTransition { state: OrderStep, event: FlowEvent },
}

fn transition_order_creation(
    current: &OrderStep,
    event: &FlowEvent,
    context: &FlowContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{AskQuestion, ShowOrderSummary, SubmitOrder};
    use FlowEvent::{
        AddressDetected, ConfirmationReceived, ConfirmationWithheld, DeliveriesCollected,
        OrderSubmitted, PickupCompleted, StartRequested,
    };
    use OrderStep::{Completed, Deliveries, NotStarted, Pickup, Review};

    let require_fields = || {
        if context.missing_required_fields.is_empty() {
            Ok(())
        } else {
            Err(FlowTransitionError::MissingRequiredFields {
                state: *current,
                missing_fields: context.missing_required_fields.clone(),
            })
        }
    };

    let (to, actions) = match (current, event) {
        (NotStarted, StartRequested) => {
            (Pickup, vec![AskQuestion(QUESTION_PICKUP_BUSINESS.to_string())])
        }
        (NotStarted, AddressDetected) => (Pickup, Vec::new()),
        (Pickup, PickupCompleted) => {
            require_fields()?;
            (Deliveries, vec![AskQuestion(QUESTION_DROP_OFF_ADDRESS.to_string())])
        }
        (Deliveries, DeliveriesCollected) => {
            require_fields()?;
            (Review, vec![AskQuestion(QUESTION_CONFIRM_ORDER.to_string()), ShowOrderSummary])
        }
        (Review, ConfirmationReceived) => (Review, vec![SubmitOrder]),
        (Review, ConfirmationWithheld) => (Review, vec![ShowOrderSummary]),
        (Review, OrderSubmitted) => (Completed, Vec::new()),
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: *current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: *current, to, event: event.clone(), actions })
}
