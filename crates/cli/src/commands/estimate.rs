use std::fmt::Write as _;

use parcelwise_agent::booking_service_from_config;
use parcelwise_core::booking::CreateEstimateResponse;
use parcelwise_core::config::LoadOptions;

use crate::commands::{
    load_config, runtime, samples, CommandResult, EXIT_BOOKING_API, EXIT_BOOKING_CLIENT,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("estimate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("estimate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let booking = match booking_service_from_config(&config.booking) {
        Ok(booking) => booking,
        Err(error) => {
            return CommandResult::failure(
                "estimate",
                "booking_client",
                format!("failed to create booking client: {error:#}"),
                EXIT_BOOKING_CLIENT,
            );
        }
    };

    match runtime.block_on(booking.create_estimate(&samples::estimate())) {
        Ok(response) => CommandResult::report(render(&response)),
        Err(error) => CommandResult::failure(
            "estimate",
            "booking_api",
            format!("failed to create estimate: {error:#}"),
            EXIT_BOOKING_API,
        ),
    }
}

fn render(response: &CreateEstimateResponse) -> String {
    let mut out = String::from("📊 Creating Cost Estimate...\n============================\n");
    out.push_str("✅ Estimate created successfully!\n\n");

    match response.options().first() {
        Some(option) => {
            let _ = writeln!(out, "💰 Estimated Cost: ${:.2}", option.estimated_order_cost);
            let _ = writeln!(out, "🚚 Vehicle Type: {}", option.vehicle_type);
            let _ = writeln!(out, "⏰ Estimated Delivery: {}", option.estimated_delivery_time_utc);
            let _ = writeln!(out, "🏢 Service Type: {}", option.service_type);
        }
        None => out.push_str("⚠️  No delivery options available\n"),
    }

    out.push_str("\n📋 Full Response:\n");
    out.push_str(&serde_json::to_string_pretty(response).unwrap_or_else(|error| {
        format!("<response could not be rendered: {error}>")
    }));
    out
}
