//! Wire types exchanged with the delivery booking service.
//!
//! Request inputs serialize with snake_case keys (the GraphQL `input` variable
//! shape); responses use the service's camelCase keys.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BookingAuthMode;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinatesInput {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_coordinates: Option<GeoCoordinatesInput>,
}

impl LocationInput {
    pub fn from_address(address: AddressInput) -> Self {
        Self { address: Some(address), geo_coordinates: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PickupInfoInput {
    pub business_name: String,
    pub location: LocationInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_date_time_utc: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DropOffInfoInput {
    pub business_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_weight: Option<u32>,
    pub location: LocationInput,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEstimateInput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_ons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedicated_vehicle: Option<bool>,
    pub drop_offs: Vec<DropOffInfoInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_off_date_time_utc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_druid: Option<String>,
    pub pickup_info: PickupInfoInput,
    pub vehicle_type: String,
}

/// A pickup or drop-off stop on an order, with the contact to meet there.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactStop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationInput>,
    #[serde(
        default,
        alias = "pickup_notes",
        alias = "drop_off_notes",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
}

impl ContactStop {
    pub fn address(&self) -> Option<&AddressInput> {
        self.location.as_ref().and_then(|location| location.address.as_ref())
    }

    pub fn address_mut(&mut self) -> &mut AddressInput {
        let location = self.location.get_or_insert_with(LocationInput::default);
        location.address.get_or_insert_with(AddressInput::default)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInfoInput {
    pub service_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_druid: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagInput {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderInput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_ons: Vec<String>,
    pub delivery_info: DeliveryInfoInput,
    pub drop_offs: Vec<ContactStop>,
    pub pickup_info: ContactStop,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagInput>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    pub google_place_id: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateInfo {
    pub service_type: String,
    pub vehicle_type: String,
    pub toll_amount: String,
    pub estimated_order_cost: String,
    #[serde(default)]
    pub dedicated_vehicle_requested: Option<bool>,
    pub dedicated_vehicle_fee: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AvailableOrderOption {
    pub service_type: String,
    pub estimated_delivery_time_utc: String,
    pub estimated_order_cost: f64,
    pub vehicle_type: String,
    pub pickup_location_info: LocationInfo,
    pub drop_off_locations_info: Vec<LocationInfo>,
    pub estimate_info: EstimateInfo,
    pub add_ons: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    #[serde(default)]
    pub available_order_options: Vec<AvailableOrderOption>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: String,
    pub scheduled_at: String,
    pub total_cost: f64,
    pub tracking_number: String,
    pub estimated_arrival: String,
}

/// `{ data: { createEstimate: { estimate } } }`, as returned by the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEstimateResponse {
    pub data: CreateEstimateData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEstimateData {
    pub create_estimate: CreateEstimatePayload,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateEstimatePayload {
    pub estimate: Estimate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub data: CreateOrderData,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderData {
    pub create_order: CreateOrderPayload,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderPayload {
    pub order: Order,
}

impl CreateEstimateResponse {
    pub fn from_estimate(estimate: Estimate) -> Self {
        Self { data: CreateEstimateData { create_estimate: CreateEstimatePayload { estimate } } }
    }

    pub fn options(&self) -> &[AvailableOrderOption] {
        &self.data.create_estimate.estimate.available_order_options
    }
}

impl CreateOrderResponse {
    pub fn from_order(order: Order) -> Self {
        Self { data: CreateOrderData { create_order: CreateOrderPayload { order } } }
    }

    pub fn order(&self) -> &Order {
        &self.data.create_order.order
    }
}

/// The delivery booking collaborator. Zero returned options is a valid
/// response; callers decide whether that means "no service here".
#[async_trait]
pub trait BookingService: Send + Sync {
    fn mode(&self) -> BookingAuthMode;

    async fn create_estimate(
        &self,
        input: &CreateEstimateInput,
    ) -> anyhow::Result<CreateEstimateResponse>;

    async fn create_order(&self, input: &CreateOrderInput) -> anyhow::Result<CreateOrderResponse>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AvailableOrderOption, ContactStop, CreateEstimateResponse, Estimate};

    #[test]
    fn estimate_response_reads_service_camel_case_keys() {
        let raw = json!({
            "data": {
                "createEstimate": {
                    "estimate": {
                        "availableOrderOptions": [{
                            "serviceType": "delivery",
                            "estimatedDeliveryTimeUtc": "2024-01-01T12:00:00Z",
                            "estimatedOrderCost": 45.99,
                            "vehicleType": "cargo_van"
                        }]
                    }
                }
            }
        });

        let response: CreateEstimateResponse =
            serde_json::from_value(raw).expect("envelope should deserialize");
        let options = response.options();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].vehicle_type, "cargo_van");
        assert!((options[0].estimated_order_cost - 45.99).abs() < f64::EPSILON);
    }

    #[test]
    fn estimate_envelope_serializes_with_nested_keys() {
        let response = CreateEstimateResponse::from_estimate(Estimate {
            available_order_options: vec![AvailableOrderOption::default()],
        });
        let value = serde_json::to_value(&response).expect("serialize");
        assert!(value["data"]["createEstimate"]["estimate"]["availableOrderOptions"].is_array());
    }

    #[test]
    fn contact_stop_accepts_pickup_and_drop_off_note_keys() {
        let pickup: ContactStop =
            serde_json::from_value(json!({"business_name": "Acme", "pickup_notes": "dock 4"}))
                .expect("pickup stop");
        let drop_off: ContactStop =
            serde_json::from_value(json!({"drop_off_notes": "front desk"})).expect("drop-off stop");

        assert_eq!(pickup.notes.as_deref(), Some("dock 4"));
        assert_eq!(drop_off.notes.as_deref(), Some("front desk"));
    }

    #[test]
    fn address_mut_creates_missing_location() {
        let mut stop = ContactStop::default();
        stop.address_mut().city = "Oakland".to_string();

        assert_eq!(stop.address().map(|address| address.city.as_str()), Some("Oakland"));
    }
}
