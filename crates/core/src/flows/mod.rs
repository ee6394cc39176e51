pub mod engine;
pub mod order;
pub mod states;

pub use engine::{
    FlowDefinition, FlowEngine, FlowTransitionError, OrderCreationFlow, QUESTION_CONFIRM_ORDER,
    QUESTION_DROP_OFF_ADDRESS, QUESTION_PICKUP_ADDRESS, QUESTION_PICKUP_BUSINESS,
    QUESTION_PICKUP_CONTACT, QUESTION_PICKUP_PHONE,
};
pub use order::{
    friendly_validation_messages, next_detail_step, order_created_message, order_input,
    order_summary, question_prompt, review_message, scan_order_details, service_area_request,
    DetailStep, OrderFlowDriver, ORDER_FAILED_MESSAGE,
};
pub use states::{FlowAction, FlowContext, FlowEvent, OrderStep, TransitionOutcome};
