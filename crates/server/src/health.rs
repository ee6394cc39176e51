use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use parcelwise_core::config::BookingAuthMode;
use serde::Serialize;

pub const SERVICE_NAME: &str = "parcelwise-server";

#[derive(Clone, Copy)]
pub struct HealthState {
    pub ai_available: bool,
    pub booking_mode: BookingAuthMode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub service: &'static str,
    pub ai_available: bool,
    pub booking_mode: &'static str,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/api/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        service: SERVICE_NAME,
        ai_available: state.ai_available,
        booking_mode: state.booking_mode.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use parcelwise_core::config::BookingAuthMode;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_reports_engine_capabilities() {
        let state = HealthState { ai_available: false, booking_mode: BookingAuthMode::Mock };

        let Json(payload) = health(State(state)).await;

        assert_eq!(payload.status, "healthy");
        assert_eq!(payload.service, "parcelwise-server");
        assert!(!payload.ai_available);
        assert_eq!(payload.booking_mode, "mock");
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.timestamp).is_ok());
    }

    #[tokio::test]
    async fn health_route_is_mounted_under_api() {
        let app = router(HealthState { ai_available: true, booking_mode: BookingAuthMode::Idp });

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["ai_available"], true);
        assert_eq!(body["booking_mode"], "idp");
    }
}
