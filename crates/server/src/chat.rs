//! Browser chat sessions.
//!
//! Each chat session pairs a stored [`ConversationContext`] with the visible
//! transcript and the order/pricing side panels the page renders. Turns on a
//! session go through [`ContextManager::with_session`], so the transcript and
//! the context always advance together.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use parcelwise_agent::{ConversationEngine, ConversationResponse};
use parcelwise_core::booking::ContactStop;
use parcelwise_core::config::SessionConfig;
use parcelwise_core::context::{ConversationContext, ConversationMessage, PricingRecommendation};
use parcelwise_core::errors::{ApplicationError, DomainError, InterfaceError};
use parcelwise_core::flows::OrderStep;
use parcelwise_core::session::{ContextManager, SessionError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(kind: &str, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            kind: kind.to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub context: ConversationContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_info: Option<OrderInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing_info: Option<PricingInfo>,
}

/// Order-form progress shown beside the conversation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderInfo {
    pub in_progress: bool,
    pub step: String,
    pub current_question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_info: Option<StopInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<StopInfo>,
    pub completed_fields: Vec<String>,
    pub missing_fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StopInfo {
    pub business_name: String,
    pub address: String,
    pub contact_name: String,
    pub phone_number: String,
}

impl From<&ContactStop> for StopInfo {
    fn from(stop: &ContactStop) -> Self {
        Self {
            business_name: stop.business_name.clone().unwrap_or_default(),
            address: stop
                .address()
                .map(|address| {
                    format!(
                        "{}, {}, {} {}",
                        address.street, address.city, address.state, address.zip_code
                    )
                })
                .unwrap_or_default(),
            contact_name: stop.contact_name.clone().unwrap_or_default(),
            phone_number: stop.contact_phone_number.clone().unwrap_or_default(),
        }
    }
}

impl OrderInfo {
    /// `None` until an order has been started in this session.
    fn from_context(context: &ConversationContext) -> Option<Self> {
        let order = &context.order_creation;
        if order.step == OrderStep::NotStarted {
            return None;
        }

        Some(Self {
            in_progress: order.in_progress,
            step: order.step.to_string(),
            current_question: order.current_question.clone(),
            pickup_info: order.pickup_info.as_ref().map(StopInfo::from),
            deliveries: order.drop_offs.iter().map(StopInfo::from).collect(),
            completed_fields: order.completed_fields.clone(),
            missing_fields: order.missing_fields.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricingInfo {
    pub recommendations: Vec<PricingRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_option: Option<PricingRecommendation>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_savings: Decimal,
}

impl PricingInfo {
    /// The best option is the eligible model with the highest positive
    /// savings; the first one listed wins a tie.
    fn from_recommendations(recommendations: &[PricingRecommendation]) -> Option<Self> {
        if recommendations.is_empty() {
            return None;
        }

        let mut best_option: Option<&PricingRecommendation> = None;
        for recommendation in recommendations.iter().filter(|candidate| candidate.eligible) {
            let best_savings = best_option.map_or(Decimal::ZERO, |best| best.savings);
            if recommendation.savings > best_savings {
                best_option = Some(recommendation);
            }
        }

        Some(Self {
            recommendations: recommendations.to_vec(),
            total_savings: best_option.map_or(Decimal::ZERO, |best| best.savings),
            best_option: best_option.cloned(),
        })
    }
}

#[derive(Clone, Debug, Default)]
struct Transcript {
    messages: Vec<ChatMessage>,
    order_info: Option<OrderInfo>,
    pricing_info: Option<PricingInfo>,
}

impl Transcript {
    fn history(&self) -> Vec<ConversationMessage> {
        self.messages
            .iter()
            .map(|message| ConversationMessage {
                role: message.kind.clone(),
                content: message.content.clone(),
            })
            .collect()
    }

    fn session(&self, context: ConversationContext) -> ChatSession {
        ChatSession {
            id: context.session_id.clone(),
            messages: self.messages.clone(),
            context,
            order_info: self.order_info.clone(),
            pricing_info: self.pricing_info.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub session: ChatSession,
}

pub struct ChatSessions {
    contexts: Arc<ContextManager>,
    transcripts: RwLock<HashMap<String, Transcript>>,
}

impl ChatSessions {
    pub fn new(contexts: Arc<ContextManager>) -> Self {
        Self { contexts, transcripts: RwLock::new(HashMap::new()) }
    }

    pub async fn create(&self) -> Result<ChatSession, SessionError> {
        let context = self.contexts.create().await?;
        let transcript = Transcript::default();
        let session = transcript.session(context);
        self.transcripts.write().await.insert(session.id.clone(), transcript);
        Ok(session)
    }

    pub async fn chat(
        &self,
        engine: &ConversationEngine,
        session_id: &str,
        message: &str,
    ) -> Result<ChatReply, SessionError> {
        if !self.transcripts.read().await.contains_key(session_id) {
            return Err(SessionError::NotFound(session_id.to_string()));
        }

        self.contexts
            .with_session(session_id, |mut context| async move {
                let history = self.history(session_id).await;
                let response =
                    engine.process_message_with_history(message, &mut context, &history).await;
                let session = self.record_turn(session_id, message, response.clone()).await;
                (context, ChatReply { message: response.message, session })
            })
            .await
    }

    async fn history(&self, session_id: &str) -> Vec<ConversationMessage> {
        self.transcripts
            .read()
            .await
            .get(session_id)
            .map(Transcript::history)
            .unwrap_or_default()
    }

    async fn record_turn(
        &self,
        session_id: &str,
        user_text: &str,
        response: ConversationResponse,
    ) -> ChatSession {
        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts.entry(session_id.to_string()).or_default();

        transcript.messages.push(ChatMessage::new("user", user_text));
        transcript.messages.push(ChatMessage::new("assistant", response.message));
        if let Some(order_info) = OrderInfo::from_context(&response.context) {
            transcript.order_info = Some(order_info);
        }
        if let Some(pricing_info) = PricingInfo::from_recommendations(&response.recommendations) {
            transcript.pricing_info = Some(pricing_info);
        }
        transcript.session(response.context)
    }

    /// Drops sessions idle for longer than `max_age`, with their transcripts.
    pub async fn sweep(&self, max_age: Duration) -> Result<usize, SessionError> {
        let expired = self.contexts.clear_expired(max_age).await?;
        if !expired.is_empty() {
            let mut transcripts = self.transcripts.write().await;
            for session_id in &expired {
                transcripts.remove(session_id);
            }
        }
        Ok(expired.len())
    }
}

pub fn spawn_sweeper(sessions: Arc<ChatSessions>, config: &SessionConfig) -> JoinHandle<()> {
    let max_age = Duration::from_secs(config.max_age_secs);
    let period = Duration::from_secs(config.sweep_interval_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; nothing can have expired yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match sessions.sweep(max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(
                    event_name = "server.session_sweep.completed",
                    correlation_id = "session_sweep",
                    removed,
                    "expired chat sessions removed"
                ),
                Err(error) => warn!(
                    event_name = "server.session_sweep.failed",
                    correlation_id = "session_sweep",
                    error = %error,
                    "session sweep failed"
                ),
            }
        }
    })
}

#[derive(Clone)]
pub struct ChatState {
    engine: Arc<ConversationEngine>,
    sessions: Arc<ChatSessions>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(engine: Arc<ConversationEngine>, sessions: Arc<ChatSessions>) -> Router {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/chat", post(chat))
        .with_state(ChatState { engine, sessions })
}

pub async fn create_session(
    State(state): State<ChatState>,
) -> Result<Json<ChatSession>, ApiFailure> {
    let session = state
        .sessions
        .create()
        .await
        .map_err(|error| failure(error.into(), "new_session"))?;
    Ok(Json(session))
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiFailure> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(
            event_name = "server.chat.invalid_payload",
            correlation_id = "unknown",
            error = %rejection,
            "chat request body rejected"
        );
        (StatusCode::BAD_REQUEST, Json(ApiError { error: "Invalid JSON".to_string() }))
    })?;

    if request.message.trim().is_empty() {
        let invalid = DomainError::Validation("message is required".to_string());
        return Err(failure(invalid.into(), &request.session_id));
    }

    let reply = state
        .sessions
        .chat(&state.engine, &request.session_id, &request.message)
        .await
        .map_err(|error| failure(error.into(), &request.session_id))?;
    Ok(Json(reply))
}

fn failure(error: ApplicationError, correlation_id: &str) -> ApiFailure {
    let interface = error.into_interface(correlation_id);
    match &interface {
        InterfaceError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, Json(ApiError { error: "Session not found".to_string() }))
        }
        InterfaceError::BadRequest { message, .. } => {
            (StatusCode::BAD_REQUEST, Json(ApiError { error: message.clone() }))
        }
        InterfaceError::ServiceUnavailable { .. } => {
            error!(
                event_name = "server.chat.session_failure",
                correlation_id = interface.correlation_id(),
                error = %interface,
                "chat session storage failed"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiError { error: interface.user_message().to_string() }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use parcelwise_agent::{ConversationEngine, MockBookingClient};
    use parcelwise_core::session::ContextManager;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::chat::{router, ChatSessions};

    fn app() -> (Router, Arc<ChatSessions>) {
        let engine = Arc::new(ConversationEngine::new(Arc::new(MockBookingClient::new())));
        let sessions = Arc::new(ChatSessions::new(Arc::new(ContextManager::default())));
        (router(engine, sessions.clone()), sessions)
    }

    async fn post_json(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn new_session(app: &Router) -> String {
        let (status, session) = post_json(app, "/api/session", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        session["id"].as_str().expect("session id").to_string()
    }

    async fn say(app: &Router, session_id: &str, message: &str) -> (StatusCode, Value) {
        let body = json!({ "session_id": session_id, "message": message }).to_string();
        post_json(app, "/api/chat", body).await
    }

    #[tokio::test]
    async fn new_session_starts_empty() {
        let (app, _) = app();
        let (status, session) = post_json(&app, "/api/session", String::new()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(session["id"].as_str().is_some_and(|id| id.starts_with("session_")));
        assert_eq!(session["messages"], json!([]));
        assert_eq!(session["context"]["session_id"], session["id"]);
        assert!(session.get("order_info").is_none());
        assert!(session.get("pricing_info").is_none());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (app, _) = app();
        let (status, body) = say(&app, "session_missing", "hello").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Session not found");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_as_invalid_json() {
        let (app, _) = app();
        let (status, body) = post_json(&app, "/api/chat", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON");

        let (status, _) = post_json(&app, "/api/chat", json!({ "message": "hi" }).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_message_is_a_bad_request() {
        let (app, _) = app();
        let session_id = new_session(&app).await;

        let (status, body) = say(&app, &session_id, "   ").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "message is required");
    }

    #[tokio::test]
    async fn pricing_turn_records_transcript_and_best_option() {
        let (app, _) = app();
        let session_id = new_session(&app).await;

        let (status, reply) = say(&app, &session_id, "compare pricing for 3 deliveries").await;

        assert_eq!(status, StatusCode::OK);
        assert!(reply["message"].as_str().is_some_and(|text| text.contains("Best Option")));

        let session = &reply["session"];
        let messages = session["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["type"], "user");
        assert_eq!(messages[1]["type"], "assistant");
        assert_eq!(messages[1]["content"], reply["message"]);

        let pricing = &session["pricing_info"];
        assert_eq!(pricing["best_option"]["name"], "Multi-Delivery Discount");
        assert_eq!(pricing["total_savings"], json!(8.35));
        assert_eq!(pricing["recommendations"].as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn order_turns_fill_the_order_panel() {
        let (app, _) = app();
        let session_id = new_session(&app).await;

        let (_, reply) = say(&app, &session_id, "I want to create an order").await;
        let order = &reply["session"]["order_info"];
        assert_eq!(order["in_progress"], true);
        assert_eq!(order["step"], "pickup");
        assert_eq!(order["current_question"], "pickup_business");

        say(&app, &session_id, "Acme Corp").await;
        let (_, reply) =
            say(&app, &session_id, "500 Market St, San Francisco, ca, 94105").await;
        let pickup = &reply["session"]["order_info"]["pickup_info"];
        assert_eq!(pickup["business_name"], "Acme Corp");
        assert_eq!(pickup["address"], "500 Market St, San Francisco, CA 94105");
        assert_eq!(reply["session"]["messages"].as_array().map(Vec::len), Some(6));
    }

    #[tokio::test]
    async fn sweep_drops_idle_sessions_and_their_transcripts() {
        let (app, sessions) = app();
        let session_id = new_session(&app).await;

        assert_eq!(sessions.sweep(Duration::from_secs(3600)).await.expect("sweep"), 0);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(sessions.sweep(Duration::ZERO).await.expect("sweep"), 1);

        let (status, _) = say(&app, &session_id, "hello").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
