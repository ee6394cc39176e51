//! Slot filling for the order form: feeds each chat message through the
//! current step, the address-block parser and the detail scanners.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;

use crate::address::{looks_like_address, parse_address_block, parse_inline_address, AddressBlock};
use crate::booking::{
    AddressInput, ContactStop, CreateEstimateInput, CreateOrderInput, DeliveryInfoInput,
    DropOffInfoInput, LocationInput, Order, PickupInfoInput, TagInput,
};
use crate::context::{ConversationContext, OrderCreationState, SchedulingInfo, VehicleChoice};
use crate::errors::DomainError;
use crate::flows::engine::{
    FlowEngine, OrderCreationFlow, QUESTION_CONFIRM_ORDER, QUESTION_DROP_OFF_ADDRESS,
    QUESTION_PICKUP_ADDRESS, QUESTION_PICKUP_BUSINESS, QUESTION_PICKUP_CONTACT,
    QUESTION_PICKUP_PHONE,
};
use crate::flows::states::{FlowAction, FlowContext, FlowEvent, OrderStep};
use crate::validation::InputValidator;

pub const SERVICE_AREA_VEHICLE: &str = "cargo_van";
pub const ORDER_SERVICE_TYPE: &str = "delivery";
pub const ORDER_FAILED_MESSAGE: &str = "I wasn't able to create your order just now. Your details are saved, so reply \"yes\" to try again or contact support if it keeps happening.";

const PICKUP_QUESTIONS: [&str; 4] = [
    QUESTION_PICKUP_BUSINESS,
    QUESTION_PICKUP_ADDRESS,
    QUESTION_PICKUP_CONTACT,
    QUESTION_PICKUP_PHONE,
];

const VEHICLE_KEYWORDS: &[(&str, &str)] = &[
    ("cargo van", "cargo_van"),
    ("pickup truck", "pickup_truck"),
    ("box truck", "box_truck"),
    ("van", "cargo_van"),
    ("truck", "pickup_truck"),
    ("cargo", "cargo_van"),
    ("pickup", "pickup_truck"),
];

const CAPABILITY_KEYWORDS: &[(&str, &str)] = &[
    ("temperature", "temperature_control"),
    ("white glove", "white_glove_service"),
    ("fragile", "fragile_handling"),
    ("signature", "signature_required"),
    ("assistance", "unloading_assistance"),
];

const MULTI_STOP_KEYWORDS: &[&str] = &["multiple", "several", "many", "more than one"];
const CONFIRMATION_KEYWORDS: &[&str] = &["yes", "create", "confirm"];

/// Drives [`OrderCreationState`] one message at a time.
pub struct OrderFlowDriver {
    engine: FlowEngine<OrderCreationFlow>,
    validator: InputValidator,
}

impl Default for OrderFlowDriver {
    fn default() -> Self {
        Self { engine: FlowEngine::default(), validator: InputValidator::new() }
    }
}

impl OrderFlowDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one message and returns the side effects the caller must run
    /// (service-area checks, order submission) or render (questions, summary).
    ///
    /// The current step's handler sees the message first; address-shaped
    /// messages always fall through to the address-block parser instead.
    pub fn advance(&self, message: &str, context: &mut ConversationContext) -> Vec<FlowAction> {
        let session_id = context.session_id.clone();
        let state = &mut context.order_creation;
        let lowered = message.to_lowercase();
        let is_address = looks_like_address(message);
        let mut actions = Vec::new();

        let answered_field = match state.step {
            OrderStep::NotStarted => {
                if lowered.contains("create") && lowered.contains("order") {
                    self.start_explicitly(state, &session_id, &mut actions);
                }
                false
            }
            OrderStep::Pickup if !is_address => {
                self.answer_pickup_question(message, state, &session_id, &mut actions)
            }
            OrderStep::Deliveries if !is_address => {
                self.finish_deliveries(state, &session_id, &mut actions);
                false
            }
            OrderStep::Review => {
                self.handle_review(&lowered, state, &session_id, &mut actions);
                false
            }
            _ => false,
        };

        if is_address && state.step != OrderStep::Review {
            self.absorb_address_block(message, state, &session_id, &mut actions);
        }

        if state.in_progress && !is_address && !answered_field {
            scan_order_details(message, state);
        }

        actions
    }

    /// Records a successful submission and closes the form. Only valid from
    /// the review step.
    pub fn complete_order(
        &self,
        context: &mut ConversationContext,
        order: Order,
    ) -> Result<(), DomainError> {
        let state = &mut context.order_creation;
        let outcome = self.engine.apply_logged(
            &state.step,
            &FlowEvent::OrderSubmitted,
            &FlowContext::default(),
            &context.session_id,
        )?;

        state.step = outcome.to;
        state.in_progress = false;
        state.current_question.clear();
        state.missing_fields.clear();
        state.created_order = Some(order);
        Ok(())
    }

    fn start_explicitly(
        &self,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        let Ok(outcome) = self.engine.apply_logged(
            &state.step,
            &FlowEvent::StartRequested,
            &FlowContext::default(),
            session_id,
        ) else {
            return;
        };

        begin(state, outcome.to);
        state.current_question = QUESTION_PICKUP_BUSINESS.to_string();
        state.missing_fields = PICKUP_QUESTIONS.iter().map(|question| question.to_string()).collect();
        actions.extend(outcome.actions);
    }

    fn answer_pickup_question(
        &self,
        message: &str,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) -> bool {
        let answer = message.trim();
        if answer.is_empty() {
            return false;
        }

        let question = state.current_question.clone();
        let pickup = state.pickup_info.get_or_insert_with(ContactStop::default);
        match question.as_str() {
            QUESTION_PICKUP_BUSINESS => pickup.business_name = Some(answer.to_string()),
            QUESTION_PICKUP_CONTACT => pickup.contact_name = Some(answer.to_string()),
            QUESTION_PICKUP_PHONE => pickup.contact_phone_number = Some(answer.to_string()),
            QUESTION_PICKUP_ADDRESS => {
                let Some(address) = parse_inline_address(answer) else {
                    state.validation_errors.push(
                        "Pickup address validation failed: street, city and state are required"
                            .to_string(),
                    );
                    return true;
                };
                if let Err(report) = self.validator.validate_address(&address) {
                    state.validation_errors.push(format!(
                        "Pickup address validation failed: {}",
                        report.first_error().unwrap_or(&report.message)
                    ));
                    return true;
                }
                pickup.location = Some(LocationInput::from_address(address));
            }
            _ => return false,
        }

        state.mark_completed(question);
        self.refresh_pickup_progress(state, session_id, actions);
        true
    }

    // Points the form at the first unanswered pickup field, or moves on to
    // deliveries once all four are present.
    fn refresh_pickup_progress(
        &self,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        let missing = missing_pickup_fields(state);
        state.missing_fields = missing.clone();

        if let Some(next) = missing.first() {
            state.current_question = next.clone();
            actions.push(FlowAction::AskQuestion(next.clone()));
            return;
        }

        if let Ok(outcome) = self.engine.apply_logged(
            &state.step,
            &FlowEvent::PickupCompleted,
            &FlowContext { missing_required_fields: missing },
            session_id,
        ) {
            state.step = outcome.to;
            state.current_question = QUESTION_DROP_OFF_ADDRESS.to_string();
            actions.extend(outcome.actions);
        }
    }

    fn finish_deliveries(
        &self,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        let missing_required_fields = if state.drop_offs.is_empty() {
            vec![QUESTION_DROP_OFF_ADDRESS.to_string()]
        } else {
            Vec::new()
        };

        match self.engine.apply_logged(
            &state.step,
            &FlowEvent::DeliveriesCollected,
            &FlowContext { missing_required_fields },
            session_id,
        ) {
            Ok(outcome) => {
                state.step = outcome.to;
                state.current_question = QUESTION_CONFIRM_ORDER.to_string();
                actions.extend(outcome.actions);
            }
            Err(_) => actions.push(FlowAction::AskQuestion(QUESTION_DROP_OFF_ADDRESS.to_string())),
        }
    }

    fn handle_review(
        &self,
        lowered: &str,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        let event = if CONFIRMATION_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            FlowEvent::ConfirmationReceived
        } else {
            FlowEvent::ConfirmationWithheld
        };

        if let Ok(outcome) =
            self.engine.apply_logged(&state.step, &event, &FlowContext::default(), session_id)
        {
            state.step = outcome.to;
            actions.extend(outcome.actions);
        }
    }

    fn absorb_address_block(
        &self,
        message: &str,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        if !state.in_progress {
            let Ok(outcome) = self.engine.apply_logged(
                &state.step,
                &FlowEvent::AddressDetected,
                &FlowContext::default(),
                session_id,
            ) else {
                return;
            };
            begin(state, outcome.to);
            actions.extend(outcome.actions);
        }

        let Some(block) = parse_address_block(message) else {
            return;
        };

        if state.has_pickup_address() {
            self.add_drop_off(block, state, actions);
        } else {
            self.set_pickup(block, state, session_id, actions);
        }
    }

    fn set_pickup(
        &self,
        block: AddressBlock,
        state: &mut OrderCreationState,
        session_id: &str,
        actions: &mut Vec<FlowAction>,
    ) {
        if let Err(report) = self.validator.validate_address(&block.address) {
            state.validation_errors.push(format!(
                "Pickup address validation failed: {}",
                report.first_error().unwrap_or(&report.message)
            ));
            return;
        }

        let pickup = state.pickup_info.get_or_insert_with(ContactStop::default);
        let mut filled = vec![QUESTION_PICKUP_ADDRESS];
        if let Some(business) = non_empty(block.business_name) {
            pickup.business_name = Some(business);
            filled.push(QUESTION_PICKUP_BUSINESS);
        }
        if let Some(contact) = non_empty(block.contact_name) {
            pickup.contact_name = Some(contact);
            filled.push(QUESTION_PICKUP_CONTACT);
        }
        if let Some(phone) = non_empty(block.phone) {
            pickup.contact_phone_number = Some(phone);
            filled.push(QUESTION_PICKUP_PHONE);
        }
        pickup.location = Some(LocationInput::from_address(block.address));

        for field in filled {
            state.mark_completed(field);
        }
        self.refresh_pickup_progress(state, session_id, actions);
    }

    fn add_drop_off(
        &self,
        block: AddressBlock,
        state: &mut OrderCreationState,
        actions: &mut Vec<FlowAction>,
    ) {
        if let Err(report) = self.validator.validate_address(&block.address) {
            state.validation_errors.push(format!(
                "Delivery address validation failed: {}",
                report.first_error().unwrap_or(&report.message)
            ));
            return;
        }

        state.drop_offs.push(ContactStop {
            business_name: non_empty(block.business_name),
            contact_name: non_empty(block.contact_name),
            contact_phone_number: non_empty(block.phone),
            location: Some(LocationInput::from_address(block.address)),
            notes: None,
        });
        state.mark_completed(format!("delivery_{}", state.drop_offs.len()));
        actions.push(FlowAction::ValidateServiceArea);
    }
}

fn begin(state: &mut OrderCreationState, step: OrderStep) {
    state.in_progress = true;
    state.step = step;
    state.pickup_info = Some(ContactStop::default());
    state.drop_offs.clear();
    state.completed_fields.clear();
    state.missing_fields.clear();
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn missing_pickup_fields(state: &OrderCreationState) -> Vec<String> {
    let pickup = state.pickup_info.as_ref();
    let has = |value: Option<&String>| value.is_some_and(|value| !value.trim().is_empty());

    PICKUP_QUESTIONS
        .iter()
        .filter(|question| match **question {
            QUESTION_PICKUP_BUSINESS => !has(pickup.and_then(|stop| stop.business_name.as_ref())),
            QUESTION_PICKUP_ADDRESS => !state.has_pickup_address(),
            QUESTION_PICKUP_CONTACT => !has(pickup.and_then(|stop| stop.contact_name.as_ref())),
            _ => !has(pickup.and_then(|stop| stop.contact_phone_number.as_ref())),
        })
        .map(|question| question.to_string())
        .collect()
}

/// Updates vehicle, capabilities, multi-stop and schedule from free text.
/// Values that are not mentioned are left alone.
pub fn scan_order_details(message: &str, state: &mut OrderCreationState) {
    let lowered = message.to_lowercase();

    if let Some(vehicle) = detect_vehicle(&lowered) {
        state.vehicle_type = Some(vehicle);
    }
    let capabilities = detect_capabilities(&lowered);
    if !capabilities.is_empty() {
        state.capabilities = capabilities;
    }
    if detect_multi_stop(&lowered) {
        state.multi_stop = true;
    }
    if let Some(schedule) = detect_schedule(message) {
        state.scheduling = Some(schedule);
    }
}

pub fn detect_vehicle(lowered: &str) -> Option<VehicleChoice> {
    VEHICLE_KEYWORDS.iter().find(|(keyword, _)| lowered.contains(keyword)).map(
        |(keyword, vehicle_type)| VehicleChoice {
            vehicle_type_id: vehicle_type.to_string(),
            vehicle_type_name: keyword.to_string(),
        },
    )
}

pub fn detect_capabilities(lowered: &str) -> Vec<String> {
    CAPABILITY_KEYWORDS
        .iter()
        .filter(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, capability)| capability.to_string())
        .collect()
}

pub fn detect_multi_stop(lowered: &str) -> bool {
    MULTI_STOP_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,2}(?::\d{2})?\s*(?:am|pm)\b|\b\d{1,2}:\d{2}\b")
            .expect("time pattern compiles")
    })
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").expect("date pattern compiles"))
}

/// First time/date found is the pickup, the second the delivery.
pub fn detect_schedule(message: &str) -> Option<SchedulingInfo> {
    let times: Vec<&str> = time_pattern().find_iter(message).map(|found| found.as_str()).collect();
    let dates: Vec<&str> = date_pattern().find_iter(message).map(|found| found.as_str()).collect();
    if times.is_empty() && dates.is_empty() {
        return None;
    }

    let nth = |values: &[&str], index: usize| values.get(index).map(|value| value.to_string()).unwrap_or_default();
    Some(SchedulingInfo {
        pickup_time: nth(&times, 0),
        delivery_time: nth(&times, 1),
        pickup_date: nth(&dates, 0),
        delivery_date: nth(&dates, 1),
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailStep {
    MultiStop,
    Pickup,
    DropOff,
    Vehicle,
    AddOns,
    Delivery,
    Review,
}

impl DetailStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiStop => "multi_stop",
            Self::Pickup => "pickup",
            Self::DropOff => "drop_off",
            Self::Vehicle => "vehicle",
            Self::AddOns => "add_ons",
            Self::Delivery => "delivery",
            Self::Review => "review",
        }
    }

    pub fn prompt(&self, state: &OrderCreationState) -> &'static str {
        match self {
            Self::MultiStop => "I'll help you create a delivery order. First, let me know: do you need to deliver to one location or multiple locations?",
            Self::Pickup => "Great! Now I need your pickup information. What's the business name and address where we'll be picking up the package?",
            Self::DropOff if state.multi_stop => "Perfect! Now I need your delivery information. Where should we deliver this package? (You can add multiple delivery locations)",
            Self::DropOff => "Perfect! Now I need your delivery information. Where should we deliver this package?",
            Self::Vehicle => "What type of vehicle do you need for this delivery? (cargo van, pickup truck, etc.)",
            Self::AddOns => "Do you need any special services or capabilities for this delivery? (temperature control, white glove service, etc.)",
            Self::Delivery => "When would you like this delivered? I need pickup time and delivery time.",
            Self::Review => "Let me review your order details before we create it...",
        }
    }
}

/// The next detail still missing from the form.
pub fn next_detail_step(state: &OrderCreationState) -> DetailStep {
    if !state.in_progress {
        DetailStep::MultiStop
    } else if !state.has_pickup_address() {
        DetailStep::Pickup
    } else if state.drop_offs.is_empty() {
        DetailStep::DropOff
    } else if state.vehicle_type.is_none() {
        DetailStep::Vehicle
    } else if state.capabilities.is_empty() {
        DetailStep::AddOns
    } else if state.scheduling.is_none() {
        DetailStep::Delivery
    } else {
        DetailStep::Review
    }
}

pub fn question_prompt(question: &str) -> Option<&'static str> {
    let prompt = match question {
        QUESTION_PICKUP_BUSINESS => "What's the name of the business we're picking up from?",
        QUESTION_PICKUP_ADDRESS => "What's the pickup address? (street, city, state, zip)",
        QUESTION_PICKUP_CONTACT => "Who should the driver ask for at pickup?",
        QUESTION_PICKUP_PHONE => "What's the best phone number for the pickup contact?",
        QUESTION_DROP_OFF_ADDRESS => "Where should we deliver? Send it as: business, contact, street, city, state, zip, phone. Say \"done\" when every stop is in.",
        QUESTION_CONFIRM_ORDER => "Should I create this order for you?",
        _ => return None,
    };
    Some(prompt)
}

pub fn order_summary(state: &OrderCreationState) -> String {
    let mut summary = String::from("📋 **Order Summary**\n\n");

    if let Some(pickup) = &state.pickup_info {
        summary.push_str("**Pickup Location:**\n");
        let _ = writeln!(summary, "- Business: {}", pickup.business_name.as_deref().unwrap_or_default());
        let _ = writeln!(
            summary,
            "- Contact: {} ({})",
            pickup.contact_name.as_deref().unwrap_or_default(),
            pickup.contact_phone_number.as_deref().unwrap_or_default()
        );
        if let Some(address) = pickup.address() {
            let _ = writeln!(summary, "- Address: {}", format_address(address));
        }
    }

    if !state.drop_offs.is_empty() {
        summary.push_str("\n**Delivery Locations:**\n");
        for (index, drop_off) in state.drop_offs.iter().enumerate() {
            let _ = writeln!(
                summary,
                "{}. {}",
                index + 1,
                drop_off.business_name.as_deref().unwrap_or_default()
            );
            let _ = writeln!(
                summary,
                "   Contact: {} ({})",
                drop_off.contact_name.as_deref().unwrap_or_default(),
                drop_off.contact_phone_number.as_deref().unwrap_or_default()
            );
            if let Some(address) = drop_off.address() {
                let _ = writeln!(summary, "   Address: {}", format_address(address));
            }
        }
    }

    if let Some(vehicle) = &state.vehicle_type {
        let _ = writeln!(summary, "\n**Vehicle Type:** {}", vehicle.vehicle_type_name);
    }
    if !state.capabilities.is_empty() {
        let _ = writeln!(summary, "\n**Special Services:** {}", state.capabilities.join(", "));
    }
    if let Some(schedule) = &state.scheduling {
        summary.push_str("\n**Schedule:**\n");
        let _ = writeln!(summary, "- Pickup: {} {}", schedule.pickup_date, schedule.pickup_time);
        let _ = writeln!(summary, "- Delivery: {} {}", schedule.delivery_date, schedule.delivery_time);
    }

    summary
}

pub fn review_message(state: &OrderCreationState) -> String {
    format!("{}\n\nShould I create this order for you?", order_summary(state))
}

fn format_address(address: &AddressInput) -> String {
    format!("{}, {}, {} {}", address.street, address.city, address.state, address.zip_code)
}

pub fn order_created_message(order: &Order) -> String {
    format!(
        "🎉 Order created successfully!\n\nOrder ID: {}\nTracking Number: {}\nTotal Price: ${:.2}\n\nYou'll receive a confirmation email shortly.",
        order.id, order.tracking_number, order.total_cost
    )
}

/// Maps queued validation errors to customer-facing sentences, one per line.
pub fn friendly_validation_messages(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }

    let messages: Vec<&str> = errors
        .iter()
        .map(|error| {
            let lowered = error.to_lowercase();
            if lowered.contains("no delivery options available") {
                "No delivery options are available for this location. Please try a different address."
            } else if lowered.contains("service area validation failed") {
                "Sorry, we don't currently deliver to this location. Please try a different address or contact support for service area information."
            } else if lowered.contains("zip code") {
                "Please provide a valid zip code (5 digits or 5+4 format like 12345 or 12345-6789)"
            } else if lowered.contains("state") {
                "Please provide a valid 2-letter state code (e.g., CA, NY, TX)"
            } else if lowered.contains("required") {
                "Please provide a complete address with street, city, state, and zip code"
            } else {
                "Please check your address format and try again"
            }
        })
        .collect();

    Some(messages.join("\n"))
}

/// Estimate request used to check that the collected stops are serviceable.
pub fn service_area_request(state: &OrderCreationState) -> Option<CreateEstimateInput> {
    let pickup = state.pickup_info.as_ref()?;
    let pickup_location = pickup.location.clone()?;
    if state.drop_offs.is_empty() {
        return None;
    }

    let drop_offs = state
        .drop_offs
        .iter()
        .filter_map(|drop_off| {
            Some(DropOffInfoInput {
                business_name: drop_off.business_name.clone().unwrap_or_default(),
                estimated_weight: None,
                location: drop_off.location.clone()?,
            })
        })
        .collect();

    Some(CreateEstimateInput {
        pickup_info: PickupInfoInput {
            business_name: pickup.business_name.clone().unwrap_or_default(),
            location: pickup_location,
            pickup_date_time_utc: None,
        },
        drop_offs,
        vehicle_type: SERVICE_AREA_VEHICLE.to_string(),
        ..CreateEstimateInput::default()
    })
}

pub fn order_input(state: &OrderCreationState, organization_id: Option<&str>) -> CreateOrderInput {
    let mut tags = Vec::new();
    if let Some(vehicle) = &state.vehicle_type {
        tags.push(TagInput { name: "vehicle_type".to_string(), value: vehicle.vehicle_type_id.clone() });
    }
    if let Some(schedule) = &state.scheduling {
        let slots = [
            ("pickup_date", &schedule.pickup_date),
            ("pickup_time", &schedule.pickup_time),
            ("delivery_date", &schedule.delivery_date),
            ("delivery_time", &schedule.delivery_time),
        ];
        tags.extend(slots.into_iter().filter(|(_, value)| !value.is_empty()).map(|(name, value)| {
            TagInput { name: name.to_string(), value: value.clone() }
        }));
    }

    CreateOrderInput {
        add_ons: state.capabilities.clone(),
        delivery_info: DeliveryInfoInput {
            service_type: ORDER_SERVICE_TYPE.to_string(),
            organization_druid: organization_id.map(str::to_string),
        },
        drop_offs: state.drop_offs.clone(),
        pickup_info: state.pickup_info.clone().unwrap_or_default(),
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        detect_schedule, detect_vehicle, friendly_validation_messages, next_detail_step,
        order_input, order_summary, service_area_request, DetailStep, OrderFlowDriver,
    };
    use crate::booking::Order;
    use crate::context::ConversationContext;
    use crate::errors::DomainError;
    use crate::flows::states::{FlowAction, OrderStep};

    const PICKUP_BLOCK: &str =
        "Acme Corp, John Smith, 500 Market Street, San Francisco, CA, 94105, 555-0100";
    const DROP_OFF_BLOCK: &str =
        "Blue Bottle, Ana Lee, 300 Webster Street, Oakland, California, 94607, 555-0199";

    #[test]
    fn bare_address_starts_order_implicitly() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();

        driver.advance("123 Main St, San Francisco, CA, 94105", &mut context);

        let state = &context.order_creation;
        assert!(state.in_progress);
        assert_eq!(state.step, OrderStep::Pickup);
        let address = state.pickup_info.as_ref().and_then(|pickup| pickup.address()).expect("address");
        assert_eq!(address.state, "CA");
        assert_eq!(state.current_question, "pickup_business");
        assert!(state.validation_errors.is_empty());
    }

    #[test]
    fn explicit_start_walks_pickup_questions_in_order() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();

        let actions = driver.advance("I want to create an order", &mut context);
        assert_eq!(actions, vec![FlowAction::AskQuestion("pickup_business".to_string())]);
        assert_eq!(context.order_creation.missing_fields.len(), 4);

        driver.advance("Acme Corp", &mut context);
        assert_eq!(context.order_creation.current_question, "pickup_address");
        driver.advance("500 Market St, San Francisco, ca, 94105", &mut context);
        assert_eq!(context.order_creation.current_question, "pickup_contact");
        driver.advance("John Smith", &mut context);
        assert_eq!(context.order_creation.current_question, "pickup_phone");
        let actions = driver.advance("555-0100", &mut context);

        let state = &context.order_creation;
        assert_eq!(state.step, OrderStep::Deliveries);
        assert_eq!(actions, vec![FlowAction::AskQuestion("drop_off_address".to_string())]);
        assert_eq!(
            state.pickup_info.as_ref().and_then(|pickup| pickup.business_name.as_deref()),
            Some("Acme Corp")
        );
        assert!(state.missing_fields.is_empty());
    }

    #[test]
    fn invalid_pickup_answer_queues_validation_error_and_keeps_question() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance("create order", &mut context);
        driver.advance("Acme", &mut context);

        driver.advance("1 Main St, Springfield, Illinoisland", &mut context);

        let state = &context.order_creation;
        assert_eq!(state.current_question, "pickup_address");
        assert_eq!(state.validation_errors.len(), 1);
        assert!(state.validation_errors[0].starts_with("Pickup address validation failed: "));
    }

    #[test]
    fn full_flow_reaches_review_and_completes() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();

        driver.advance(PICKUP_BLOCK, &mut context);
        assert_eq!(context.order_creation.step, OrderStep::Deliveries);

        let actions = driver.advance(DROP_OFF_BLOCK, &mut context);
        assert_eq!(actions, vec![FlowAction::ValidateServiceArea]);
        assert_eq!(context.order_creation.drop_offs.len(), 1);
        assert!(context.order_creation.completed_fields.contains(&"delivery_1".to_string()));

        let actions = driver.advance("That's all, use a box truck please", &mut context);
        assert_eq!(context.order_creation.step, OrderStep::Review);
        assert!(actions.contains(&FlowAction::ShowOrderSummary));
        assert_eq!(
            context.order_creation.vehicle_type.as_ref().map(|v| v.vehicle_type_id.as_str()),
            Some("box_truck")
        );

        let actions = driver.advance("hmm, not sure", &mut context);
        assert_eq!(actions, vec![FlowAction::ShowOrderSummary]);

        let actions = driver.advance("Yes, go ahead", &mut context);
        assert_eq!(actions, vec![FlowAction::SubmitOrder]);
        assert!(context.order_creation.in_progress);

        driver
            .complete_order(&mut context, Order { id: "ORD-1".to_string(), ..Order::default() })
            .expect("completes from review");
        assert_eq!(context.order_creation.step, OrderStep::Completed);
        assert!(!context.order_creation.in_progress);

        // A completed form does not restart on a new address.
        driver.advance(DROP_OFF_BLOCK, &mut context);
        assert_eq!(context.order_creation.step, OrderStep::Completed);
        assert_eq!(context.order_creation.drop_offs.len(), 1);
    }

    #[test]
    fn completing_before_review_is_a_domain_error() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance(PICKUP_BLOCK, &mut context);

        let error = driver
            .complete_order(&mut context, Order { id: "ORD-2".to_string(), ..Order::default() })
            .expect_err("deliveries step cannot complete");

        assert!(matches!(error, DomainError::FlowTransition(_)));
        assert_eq!(context.order_creation.step, OrderStep::Deliveries);
        assert!(context.order_creation.created_order.is_none());
    }

    #[test]
    fn deliveries_step_waits_for_a_drop_off() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance(PICKUP_BLOCK, &mut context);

        let actions = driver.advance("done", &mut context);

        assert_eq!(context.order_creation.step, OrderStep::Deliveries);
        assert_eq!(actions, vec![FlowAction::AskQuestion("drop_off_address".to_string())]);
    }

    #[test]
    fn invalid_drop_off_zip_is_queued() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance(PICKUP_BLOCK, &mut context);

        driver.advance("Cafe, Bo, 9 Elm Street, Oakland, CA, 9460", &mut context);

        let errors = &context.order_creation.validation_errors;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("zip code"));
        assert!(context.order_creation.drop_offs.is_empty());
    }

    #[test]
    fn steps_never_regress_across_a_conversation() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        let mut previous = context.order_creation.step;

        for message in [
            "hello",
            "let's create an order",
            PICKUP_BLOCK,
            "what about a cargo van",
            DROP_OFF_BLOCK,
            "123 Main St, San Francisco, CA, 94105",
            "done",
            "maybe",
            PICKUP_BLOCK,
            "confirm",
        ] {
            driver.advance(message, &mut context);
            assert!(context.order_creation.step >= previous, "regressed on {message}");
            previous = context.order_creation.step;
        }
    }

    #[test]
    fn vehicle_keywords_resolve_in_priority_order() {
        assert_eq!(detect_vehicle("a cargo van please").map(|v| v.vehicle_type_id), Some("cargo_van".to_string()));
        assert_eq!(detect_vehicle("pickup truck").map(|v| v.vehicle_type_name), Some("pickup truck".to_string()));
        assert_eq!(detect_vehicle("any truck").map(|v| v.vehicle_type_id), Some("pickup_truck".to_string()));
        assert!(detect_vehicle("a bicycle").is_none());
    }

    #[test]
    fn schedule_reads_times_and_dates_in_order() {
        let schedule =
            detect_schedule("Pick up 03/04/2025 at 9am, drop off 03/05/2025 by 2:30 pm")
                .expect("schedule");
        assert_eq!(schedule.pickup_time, "9am");
        assert_eq!(schedule.delivery_time, "2:30 pm");
        assert_eq!(schedule.pickup_date, "03/04/2025");
        assert_eq!(schedule.delivery_date, "03/05/2025");

        assert!(detect_schedule("call 555-0100").is_none());
    }

    #[test]
    fn next_detail_step_follows_missing_details() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        assert_eq!(next_detail_step(&context.order_creation), DetailStep::MultiStop);

        driver.advance(PICKUP_BLOCK, &mut context);
        assert_eq!(next_detail_step(&context.order_creation), DetailStep::DropOff);
        driver.advance(DROP_OFF_BLOCK, &mut context);
        assert_eq!(next_detail_step(&context.order_creation), DetailStep::Vehicle);
        driver.advance("cargo van with white glove service at 10am", &mut context);
        assert_eq!(next_detail_step(&context.order_creation), DetailStep::Review);
    }

    #[test]
    fn summary_lists_pickup_and_numbered_drop_offs() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance(PICKUP_BLOCK, &mut context);
        driver.advance(DROP_OFF_BLOCK, &mut context);

        let summary = order_summary(&context.order_creation);
        assert!(summary.starts_with("📋 **Order Summary**"));
        assert!(summary.contains("- Business: Acme Corp"));
        assert!(summary.contains("1. Blue Bottle"));
        assert!(summary.contains("   Address: 300 Webster Street, Oakland, CA 94607"));
    }

    #[test]
    fn order_and_service_area_inputs_follow_collected_state() {
        let driver = OrderFlowDriver::new();
        let mut context = ConversationContext::new();
        driver.advance(PICKUP_BLOCK, &mut context);
        driver.advance(DROP_OFF_BLOCK, &mut context);
        driver.advance("fragile items, box truck", &mut context);

        let request = service_area_request(&context.order_creation).expect("request");
        assert_eq!(request.vehicle_type, "cargo_van");
        assert_eq!(request.pickup_info.business_name, "Acme Corp");
        assert_eq!(request.drop_offs.len(), 1);

        let input = order_input(&context.order_creation, Some("org-7"));
        assert_eq!(input.delivery_info.service_type, "delivery");
        assert_eq!(input.delivery_info.organization_druid.as_deref(), Some("org-7"));
        assert_eq!(input.add_ons, vec!["fragile_handling".to_string()]);
        assert!(input.tags.iter().any(|tag| tag.name == "vehicle_type" && tag.value == "box_truck"));
    }

    #[test]
    fn validation_errors_map_to_canned_sentences() {
        let message = friendly_validation_messages(&[
            "Pickup address validation failed: Invalid zip code format. Must be 5 digits".to_string(),
            "Delivery address validation failed: Invalid state format".to_string(),
            "Pickup address validation failed: city is required".to_string(),
            "Service area validation failed: connection refused".to_string(),
            "Service area validation failed: no delivery options available for this location"
                .to_string(),
            "something odd".to_string(),
        ])
        .expect("messages");

        let lines: Vec<_> = message.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("Please provide a valid zip code"));
        assert!(lines[1].starts_with("Please provide a valid 2-letter state code"));
        assert!(lines[2].starts_with("Please provide a complete address"));
        assert!(lines[3].starts_with("Sorry, we don't currently deliver"));
        assert!(lines[4].starts_with("No delivery options are available"));
        assert_eq!(lines[5], "Please check your address format and try again");
        assert!(friendly_validation_messages(&[]).is_none());
    }
}
