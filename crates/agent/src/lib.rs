//! Conversation runtime for parcelwise.
//!
//! This crate turns a customer's message into a reply while keeping every
//! decision that matters deterministic:
//! - Intent and entity extraction, order-flow transitions and pricing are
//!   computed by `parcelwise-core` on every turn
//! - Booking side effects (service-area checks, order submission) run through
//!   a [`BookingService`](parcelwise_core::booking::BookingService) selected
//!   from config: GraphQL with a static token, GraphQL with IDP client
//!   credentials, or the offline mock
//! - An optional text-generation client phrases the reply from a system
//!   prompt built out of the updated context
//!
//! # Architecture
//!
//! 1. **Extraction** - profile entities are folded into the context
//! 2. **Order flow** - the form advances and returns actions to run
//! 3. **Booking** (`booking`) - actions call the booking service
//! 4. **Pricing** - all five models are priced against a $50 sample estimate
//! 5. **Reply** (`llm`, `prompt`, `templates`) - generated text when
//!    available, local templates otherwise
//!
//! # Safety Principle
//!
//! Generated text never decides prices, order numbers or state transitions.
//! Any failure of the text client degrades to the local templates.

pub mod booking;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod templates;

pub use booking::{booking_service_from_config, GraphqlBookingClient, IdpTokenProvider, MockBookingClient};
pub use llm::{llm_client_from_config, AnthropicClient, CompletionRequest, LlmClient};
pub use runtime::{ConversationEngine, ConversationResponse, EngineInfo, EngineMode};
