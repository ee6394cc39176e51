use std::fmt::Write as _;

use parcelwise_agent::{ConversationEngine, EngineInfo};
use parcelwise_core::config::{AppConfig, LoadOptions};

use crate::commands::{load_config, CommandResult, EXIT_BOOKING_CLIENT};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("status", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    match ConversationEngine::from_config(&config) {
        Ok(engine) => CommandResult::report(render(&config, &engine.engine_info())),
        Err(error) => CommandResult::failure(
            "status",
            "booking_client",
            format!("❌ Client Error: {error:#}"),
            EXIT_BOOKING_CLIENT,
        ),
    }
}

pub fn render(config: &AppConfig, info: &EngineInfo) -> String {
    let booking = &config.booking;
    let mut out = String::from("🔍 Connection Status\n===================\n");

    let _ = writeln!(out, "🔐 Booking mode: {}", booking.effective_auth_mode().as_str());
    let _ = writeln!(
        out,
        "🏢 Organization ID: {}",
        booking.organization_id.as_deref().unwrap_or("<unset>")
    );
    let _ = writeln!(out, "📡 GraphQL Endpoint: {}", booking.graphql_endpoint);
    out.push_str("✅ Client created successfully\n\n");

    let _ = writeln!(out, "🧠 Engine: {}", info.engine_type);
    let _ = writeln!(out, "   AI available: {}", info.ai_available);
    let _ = writeln!(out, "   Fallback mode: {}", info.fallback_mode);
    if let Some(model) = &info.model {
        let _ = writeln!(out, "   Model: {model}");
    }
    let _ = write!(out, "   Features: {}", info.features.join(", "));
    out
}
