use std::fmt::Write as _;

use parcelwise_agent::booking_service_from_config;
use parcelwise_core::booking::CreateOrderResponse;
use parcelwise_core::config::LoadOptions;

use crate::commands::{
    load_config, runtime, samples, CommandResult, EXIT_BOOKING_API, EXIT_BOOKING_CLIENT,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("order", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("order") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let booking = match booking_service_from_config(&config.booking) {
        Ok(booking) => booking,
        Err(error) => {
            return CommandResult::failure(
                "order",
                "booking_client",
                format!("failed to create booking client: {error:#}"),
                EXIT_BOOKING_CLIENT,
            );
        }
    };

    let input = samples::order(config.booking.organization_id.as_deref());
    match runtime.block_on(booking.create_order(&input)) {
        Ok(response) => CommandResult::report(render(&response)),
        Err(error) => CommandResult::failure(
            "order",
            "booking_api",
            format!("failed to create order: {error:#}"),
            EXIT_BOOKING_API,
        ),
    }
}

fn render(response: &CreateOrderResponse) -> String {
    let order = response.order();
    let mut out = String::from("📦 Creating Delivery Order...\n==============================\n");
    out.push_str("✅ Order created successfully!\n\n");
    let _ = writeln!(out, "🆔 Order ID: {}", order.id);
    let _ = writeln!(out, "📊 Status: {}", order.status);
    let _ = writeln!(out, "💰 Total Cost: ${:.2}", order.total_cost);
    let _ = writeln!(out, "📦 Tracking Number: {}", order.tracking_number);
    let _ = writeln!(out, "⏰ Scheduled At: {}", order.scheduled_at);

    out.push_str("\n📋 Full Response:\n");
    out.push_str(&serde_json::to_string_pretty(response).unwrap_or_else(|error| {
        format!("<response could not be rendered: {error}>")
    }));
    out
}
