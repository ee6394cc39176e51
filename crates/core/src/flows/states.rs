use std::fmt;

use serde::{Deserialize, Serialize};

/// Steps of the order form. Declaration order is the only direction a
/// session may move in.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStep {
    #[default]
    NotStarted,
    Pickup,
    Deliveries,
    Review,
    Completed,
}

impl OrderStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Pickup => "pickup",
            Self::Deliveries => "deliveries",
            Self::Review => "review",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for OrderStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    /// The user asked to create an order.
    StartRequested,
    /// An address-shaped message arrived with no order in progress.
    AddressDetected,
    PickupCompleted,
    DeliveriesCollected,
    ConfirmationReceived,
    ConfirmationWithheld,
    OrderSubmitted,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowContext {
    pub missing_required_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    AskQuestion(String),
    ValidateServiceArea,
    ShowOrderSummary,
    SubmitOrder,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderStep,
    pub to: OrderStep,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
