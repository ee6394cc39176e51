//! Booking service clients: the live GraphQL API (static bearer token or IDP
//! client credentials) and a deterministic mock for demos and tests.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parcelwise_core::booking::{
    AvailableOrderOption, BookingService, CreateEstimateInput, CreateEstimateResponse,
    CreateOrderInput, CreateOrderResponse, Estimate, EstimateInfo, LocationInfo, Order,
};
use parcelwise_core::config::{BookingAuthMode, BookingConfig};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

const CREATE_ESTIMATE_MUTATION: &str = r#"
mutation CreateEstimate($input: CreateEstimateInput!) {
  createEstimate(input: $input) {
    estimate {
      availableOrderOptions {
        serviceType
        estimatedDeliveryTimeUtc
        estimatedOrderCost
        vehicleType
        pickupLocationInfo { googlePlaceId lat lng }
        dropOffLocationsInfo { googlePlaceId lat lng }
        estimateInfo {
          serviceType
          vehicleType
          tollAmount
          estimatedOrderCost
          dedicatedVehicleRequested
          dedicatedVehicleFee
        }
        addOns
      }
    }
  }
}
"#;

const CREATE_ORDER_MUTATION: &str = r#"
mutation CreateOrder($input: CreateOrderInput!) {
  createOrder(input: $input) {
    order {
      id
      status
      scheduledAt
      totalCost
      trackingNumber
      estimatedArrival
    }
  }
}
"#;

pub const MOCK_ORDER_COST: f64 = 45.99;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Serialize)]
struct GraphqlRequest<'a, I> {
    query: &'a str,
    variables: GraphqlVariables<'a, I>,
}

#[derive(Serialize)]
struct GraphqlVariables<'a, I> {
    input: &'a I,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

/// OAuth2 client-credentials token source. The token is reused until its
/// `expires_in` window has elapsed.
pub struct IdpTokenProvider {
    client: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl IdpTokenProvider {
    pub fn new(
        client: reqwest::Client,
        token_endpoint: String,
        client_id: String,
        client_secret: SecretString,
        scope: String,
    ) -> Self {
        Self { client, token_endpoint, client_id, client_secret, scope, cached: Mutex::new(None) }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.expires_at {
                return Ok(token.access_token.expose_secret().to_string());
            }
        }

        let response = self
            .client
            .post(&self.token_endpoint)
            .header("Accept", "application/json")
            .json(&TokenRequest {
                grant_type: "client_credentials",
                client_id: &self.client_id,
                client_secret: self.client_secret.expose_secret(),
                scope: Some(self.scope.as_str()).filter(|scope| !scope.is_empty()),
            })
            .send()
            .await
            .context("failed to request token")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("token request failed with status {status}: {detail}"));
        }

        let token: TokenResponse =
            response.json().await.context("failed to decode token response")?;
        if token.access_token.is_empty() {
            return Err(anyhow!("token endpoint returned empty access token"));
        }

        tracing::debug!(
            event_name = "booking.idp_token_refreshed",
            correlation_id = "idp",
            expires_in = token.expires_in,
            "idp access token refreshed"
        );
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token.into(),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }
}

enum Credentials {
    Static(SecretString),
    Idp(IdpTokenProvider),
}

/// Posts `{query, variables: {input}}` to the booking GraphQL endpoint.
pub struct GraphqlBookingClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl GraphqlBookingClient {
    pub fn with_token(config: &BookingConfig, token: SecretString) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: config.graphql_endpoint.clone(),
            credentials: Credentials::Static(token),
        })
    }

    pub fn with_idp(config: &BookingConfig) -> Result<Self> {
        let client = http_client(config)?;
        let token_endpoint = config
            .idp
            .token_endpoint
            .clone()
            .ok_or_else(|| anyhow!("idp token endpoint is not configured"))?;
        let client_id =
            config.idp.client_id.clone().ok_or_else(|| anyhow!("idp client id is not configured"))?;
        let client_secret = config
            .idp
            .client_secret
            .clone()
            .ok_or_else(|| anyhow!("idp client secret is not configured"))?;

        let provider = IdpTokenProvider::new(
            client.clone(),
            token_endpoint,
            client_id,
            client_secret,
            config.idp.scope.clone(),
        );
        Ok(Self {
            client,
            endpoint: config.graphql_endpoint.clone(),
            credentials: Credentials::Idp(provider),
        })
    }

    async fn bearer_token(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Static(token) => Ok(token.expose_secret().to_string()),
            Credentials::Idp(provider) => {
                provider.access_token().await.context("failed to get auth token")
            }
        }
    }

    async fn execute<I, T>(&self, query: &str, input: &I) -> Result<T>
    where
        I: Serialize + Sync,
        T: DeserializeOwned + Send,
    {
        let token = self.bearer_token().await?;
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&GraphqlRequest { query, variables: GraphqlVariables { input } })
            .send()
            .await
            .context("booking request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("booking request failed with status {status}: {detail}"));
        }

        let body: Value = response.json().await.context("failed to parse response")?;
        if let Some(message) = graphql_error(&body) {
            return Err(anyhow!("booking service returned an error: {message}"));
        }
        serde_json::from_value(body).context("failed to parse response")
    }
}

fn http_client(config: &BookingConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("failed to build booking http client")
}

fn graphql_error(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let first = errors.first()?;
    Some(first.get("message").and_then(Value::as_str).unwrap_or("unknown error").to_string())
}

#[async_trait]
impl BookingService for GraphqlBookingClient {
    fn mode(&self) -> BookingAuthMode {
        match self.credentials {
            Credentials::Static(_) => BookingAuthMode::Token,
            Credentials::Idp(_) => BookingAuthMode::Idp,
        }
    }

    async fn create_estimate(&self, input: &CreateEstimateInput) -> Result<CreateEstimateResponse> {
        self.execute(CREATE_ESTIMATE_MUTATION, input).await.context("failed to create estimate")
    }

    async fn create_order(&self, input: &CreateOrderInput) -> Result<CreateOrderResponse> {
        self.execute(CREATE_ORDER_MUTATION, input).await.context("failed to create order")
    }
}

/// Demo data: one $45.99 option, San Francisco to Oakland.
#[derive(Clone, Debug, Default)]
pub struct MockBookingClient {
    latency: Duration,
}

impl MockBookingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps before answering, to mimic a network round trip.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl BookingService for MockBookingClient {
    fn mode(&self) -> BookingAuthMode {
        BookingAuthMode::Mock
    }

    async fn create_estimate(&self, input: &CreateEstimateInput) -> Result<CreateEstimateResponse> {
        self.simulate_latency().await;
        let now = Utc::now();

        let option = AvailableOrderOption {
            service_type: "delivery".to_string(),
            estimated_delivery_time_utc: (now + chrono::Duration::hours(2)).to_rfc3339(),
            estimated_order_cost: MOCK_ORDER_COST,
            vehicle_type: input.vehicle_type.clone(),
            pickup_location_info: LocationInfo {
                google_place_id: "mock_pickup_place_id".to_string(),
                lat: 37.7749,
                lng: -122.4194,
            },
            drop_off_locations_info: vec![LocationInfo {
                google_place_id: "mock_dropoff_place_id".to_string(),
                lat: 37.8044,
                lng: -122.2712,
            }],
            estimate_info: EstimateInfo {
                service_type: "delivery".to_string(),
                vehicle_type: input.vehicle_type.clone(),
                toll_amount: "5.50".to_string(),
                estimated_order_cost: format!("{MOCK_ORDER_COST:.2}"),
                dedicated_vehicle_requested: Some(false),
                dedicated_vehicle_fee: "0.00".to_string(),
            },
            add_ons: input.add_ons.clone(),
        };

        Ok(CreateEstimateResponse::from_estimate(Estimate {
            available_order_options: vec![option],
        }))
    }

    async fn create_order(&self, _input: &CreateOrderInput) -> Result<CreateOrderResponse> {
        self.simulate_latency().await;
        let now = Utc::now();
        let stamp = now.timestamp();

        Ok(CreateOrderResponse::from_order(Order {
            id: format!("ORD-{stamp}"),
            status: "pending".to_string(),
            scheduled_at: (now + chrono::Duration::hours(1)).to_rfc3339(),
            total_cost: MOCK_ORDER_COST,
            tracking_number: format!("TRK-{stamp}"),
            estimated_arrival: (now + chrono::Duration::hours(3)).to_rfc3339(),
        }))
    }
}

/// Picks the client for the configured auth mode. A live mode whose
/// credentials cannot be assembled is an error, never a silent mock.
pub fn booking_service_from_config(config: &BookingConfig) -> Result<Arc<dyn BookingService>> {
    let mode = config.effective_auth_mode();
    let service: Arc<dyn BookingService> = match mode {
        BookingAuthMode::Mock => Arc::new(MockBookingClient::new()),
        BookingAuthMode::Token => {
            let token = config
                .auth_token
                .clone()
                .ok_or_else(|| anyhow!("booking auth token is not configured"))?;
            Arc::new(GraphqlBookingClient::with_token(config, token)?)
        }
        BookingAuthMode::Idp => Arc::new(GraphqlBookingClient::with_idp(config)?),
    };

    tracing::info!(
        event_name = "booking.client_selected",
        correlation_id = "bootstrap",
        mode = mode.as_str(),
        "booking client selected"
    );
    Ok(service)
}

#[cfg(test)]
mod tests {
    use parcelwise_core::booking::{BookingService, CreateEstimateInput, CreateOrderInput};
    use parcelwise_core::config::{AppConfig, BookingAuthMode};
    use serde_json::json;

    use super::{booking_service_from_config, graphql_error, MockBookingClient, MOCK_ORDER_COST};

    #[tokio::test]
    async fn mock_estimate_echoes_vehicle_and_add_ons() {
        let client = MockBookingClient::new();
        let input = CreateEstimateInput {
            vehicle_type: "box_truck".to_string(),
            add_ons: vec!["fragile_handling".to_string()],
            ..CreateEstimateInput::default()
        };

        let response = client.create_estimate(&input).await.expect("estimate");
        let options = response.options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].vehicle_type, "box_truck");
        assert_eq!(options[0].add_ons, vec!["fragile_handling".to_string()]);
        assert_eq!(options[0].estimate_info.toll_amount, "5.50");
        assert!((options[0].estimated_order_cost - MOCK_ORDER_COST).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn mock_order_is_pending_with_matching_ids() {
        let response =
            MockBookingClient::new().create_order(&CreateOrderInput::default()).await.expect("order");
        let order = response.order();

        assert_eq!(order.status, "pending");
        assert!(order.id.starts_with("ORD-"));
        assert_eq!(order.id.trim_start_matches("ORD-"), order.tracking_number.trim_start_matches("TRK-"));
    }

    #[test]
    fn default_config_selects_mock_client() {
        let service = booking_service_from_config(&AppConfig::default().booking).expect("service");
        assert_eq!(service.mode(), BookingAuthMode::Mock);
    }

    #[test]
    fn token_config_selects_graphql_client() {
        let mut config = AppConfig::default();
        config.booking.auth_token = Some("token-123".to_string().into());

        let service = booking_service_from_config(&config.booking).expect("service");
        assert_eq!(service.mode(), BookingAuthMode::Token);
    }

    #[test]
    fn explicit_idp_mode_without_credentials_is_an_error() {
        let mut config = AppConfig::default();
        config.booking.auth_mode = Some(BookingAuthMode::Idp);

        assert!(booking_service_from_config(&config.booking).is_err());
    }

    #[test]
    fn graphql_errors_array_is_detected() {
        let body = json!({"errors": [{"message": "pickup outside service area"}], "data": null});
        assert_eq!(graphql_error(&body).as_deref(), Some("pickup outside service area"));
        assert!(graphql_error(&json!({"data": {}})).is_none());
    }
}
