//! Fixed demo payloads used by the `estimate`, `order` and `pricing` commands.

use parcelwise_core::booking::{
    AddressInput, ContactStop, CreateEstimateInput, CreateOrderInput, DeliveryInfoInput,
    DropOffInfoInput, LocationInput, PickupInfoInput,
};

pub const SAMPLE_VEHICLE: &str = "cargo_van";

fn address(street: &str, city: &str, zip_code: &str) -> AddressInput {
    AddressInput {
        street: street.to_string(),
        city: city.to_string(),
        state: "CA".to_string(),
        zip_code: zip_code.to_string(),
        country: "US".to_string(),
    }
}

fn pickup_address() -> AddressInput {
    address("123 Market St", "San Francisco", "94105")
}

fn oakland_address() -> AddressInput {
    address("456 Oak Ave", "Oakland", "94610")
}

fn drop_off(business_name: &str, address: AddressInput) -> DropOffInfoInput {
    DropOffInfoInput {
        business_name: business_name.to_string(),
        estimated_weight: None,
        location: LocationInput::from_address(address),
    }
}

fn estimate_input(drop_offs: Vec<DropOffInfoInput>) -> CreateEstimateInput {
    CreateEstimateInput {
        drop_offs,
        pickup_info: PickupInfoInput {
            business_name: "Demo Business".to_string(),
            location: LocationInput::from_address(pickup_address()),
            pickup_date_time_utc: None,
        },
        vehicle_type: SAMPLE_VEHICLE.to_string(),
        ..CreateEstimateInput::default()
    }
}

/// San Francisco pickup to a single Oakland drop-off.
pub fn estimate() -> CreateEstimateInput {
    estimate_input(vec![drop_off("Customer Location", oakland_address())])
}

/// Two drop-offs, used as the base estimate for pricing comparisons.
pub fn multi_stop_estimate() -> CreateEstimateInput {
    estimate_input(vec![
        drop_off("Customer Location 1", oakland_address()),
        drop_off("Customer Location 2", address("789 Pine St", "Berkeley", "94710")),
    ])
}

pub fn order(organization_id: Option<&str>) -> CreateOrderInput {
    CreateOrderInput {
        delivery_info: DeliveryInfoInput {
            service_type: "delivery".to_string(),
            organization_druid: organization_id.map(str::to_string),
        },
        pickup_info: ContactStop {
            business_name: Some("Demo Business".to_string()),
            contact_name: Some("John Doe".to_string()),
            contact_phone_number: Some("555-123-4567".to_string()),
            location: Some(LocationInput::from_address(pickup_address())),
            notes: None,
        },
        drop_offs: vec![ContactStop {
            business_name: Some("Customer Location".to_string()),
            contact_name: Some("Jane Smith".to_string()),
            contact_phone_number: Some("555-987-6543".to_string()),
            location: Some(LocationInput::from_address(oakland_address())),
            notes: None,
        }],
        ..CreateOrderInput::default()
    }
}
