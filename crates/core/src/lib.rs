pub mod address;
pub mod booking;
pub mod config;
pub mod context;
pub mod errors;
pub mod extractor;
pub mod flows;
pub mod pricing;
pub mod session;
pub mod validation;

pub use address::{looks_like_address, normalize_state_code, parse_address_block, AddressBlock};
pub use booking::{
    AddressInput, AvailableOrderOption, BookingService, ContactStop, CreateEstimateInput,
    CreateEstimateResponse, CreateOrderInput, CreateOrderResponse, DeliveryInfoInput,
    DropOffInfoInput, Estimate, LocationInput, Order, PickupInfoInput, TagInput,
};
pub use config::{AppConfig, BookingAuthMode, ConfigError, LlmProvider, LoadOptions, LogFormat};
pub use context::{
    ConversationContext, ConversationMessage, CustomerProfile, OrderCreationState,
    PricingRecommendation, PricingSnapshot,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extractor::{apply_to_context, Intent, IntentExtractor, IntentType, PatternExtractor};
pub use flows::{FlowAction, OrderFlowDriver, OrderStep};
pub use pricing::{
    CustomerTier, PricingComparison, PricingContext, PricingEngine, PricingModel, PricingResult,
    RuleBasedPricingEngine,
};
pub use session::{ContextManager, InMemorySessionStore, SessionError, SessionStats, SessionStore};
pub use validation::{FieldError, InputValidator, ValidationReport};
