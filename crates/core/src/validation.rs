use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::booking::AddressInput;

pub const VEHICLE_TYPES: &[&str] = &["pickup_truck", "cargo_van", "sprinter_van", "box_truck"];
pub const DELIVERY_SCENARIOS: &[&str] =
    &["fastest", "asap", "urgent", "cheapest", "economy", "sometime_today"];
pub const CUSTOMER_TIERS: &[&str] = &["bronze", "silver", "gold"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A failed check: a summary plus one entry per offending field.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ValidationReport {
    pub message: String,
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    fn single(field: &str, detail: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            message: summary.into(),
            errors: vec![FieldError { field: field.to_string(), message: detail.into() }],
        }
    }

    pub fn first_error(&self) -> Option<&str> {
        self.errors.first().map(|error| error.message.as_str())
    }

    /// `"{field} validation failed: {summary} - {first error}"`, the shape tool
    /// callers receive.
    pub fn describe(&self, field: &str) -> String {
        match self.first_error() {
            Some(first) => format!("{field} validation failed: {} - {first}", self.message),
            None => format!("{field} validation failed: {}", self.message),
        }
    }

    fn prefixed(mut self, prefix: &str) -> Self {
        for error in &mut self.errors {
            error.field = format!("{prefix}{}", error.field);
        }
        self
    }
}

pub type ValidationResult = Result<(), ValidationReport>;

fn zip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("zip pattern compiles"))
}

fn state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z]{2}$").expect("state pattern compiles"))
}

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+$").expect("numeric pattern compiles"))
}

#[derive(Clone, Debug, Default)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_vehicle_type(&self, vehicle_type: &str) -> ValidationResult {
        if vehicle_type.is_empty() {
            return Err(ValidationReport::single(
                "vehicle_type",
                "vehicle_type is required",
                "Vehicle type is required",
            ));
        }
        if VEHICLE_TYPES.iter().any(|valid| valid.eq_ignore_ascii_case(vehicle_type)) {
            return Ok(());
        }
        Err(ValidationReport::single(
            "vehicle_type",
            format!(
                "Invalid vehicle type '{vehicle_type}'. Must be one of: {}",
                VEHICLE_TYPES.join(", ")
            ),
            "Invalid vehicle type",
        ))
    }

    pub fn validate_delivery_scenario(&self, scenario: &str) -> ValidationResult {
        if scenario.is_empty() {
            return Err(ValidationReport::single(
                "delivery_scenario",
                "delivery_scenario is required",
                "Delivery scenario is required",
            ));
        }
        if DELIVERY_SCENARIOS.iter().any(|valid| valid.eq_ignore_ascii_case(scenario)) {
            return Ok(());
        }
        Err(ValidationReport::single(
            "delivery_scenario",
            format!(
                "Invalid delivery scenario '{scenario}'. Must be one of: {}",
                DELIVERY_SCENARIOS.join(", ")
            ),
            "Invalid delivery scenario",
        ))
    }

    pub fn validate_address(&self, address: &AddressInput) -> ValidationResult {
        let mut errors = Vec::new();
        let fields = [
            ("street", address.street.as_str()),
            ("city", address.city.as_str()),
            ("state", address.state.as_str()),
            ("zip_code", address.zip_code.as_str()),
            ("country", address.country.as_str()),
        ];
        for (field, value) in fields {
            if value.is_empty() {
                errors.push(FieldError {
                    field: field.to_string(),
                    message: format!("{field} is required"),
                });
            }
        }

        if !address.zip_code.is_empty() && !zip_pattern().is_match(&address.zip_code) {
            errors.push(FieldError {
                field: "zip_code".to_string(),
                message: "Invalid zip code format. Must be 5 digits or 5+4 format (e.g., 12345 or 12345-6789)"
                    .to_string(),
            });
        }

        if !address.state.is_empty() && !state_pattern().is_match(&address.state) {
            errors.push(FieldError {
                field: "state".to_string(),
                message: "Invalid state format. Must be 2-letter state code (e.g., CA, NY, TX)"
                    .to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { message: "Address validation failed".to_string(), errors })
        }
    }

    /// Checks an untyped stop object for `location.address` and validates it.
    pub fn validate_pickup_info(&self, pickup_info: &Value) -> ValidationResult {
        let Some(location) = pickup_info.get("location") else {
            return Err(ValidationReport::single(
                "location",
                "location is required",
                "Pickup location is required",
            ));
        };
        if !location.is_object() {
            return Err(ValidationReport::single(
                "location",
                "location must be an object",
                "Invalid location format",
            ));
        }
        let Some(address) = location.get("address") else {
            return Err(ValidationReport::single(
                "location.address",
                "address is required in location",
                "Address is required in location",
            ));
        };
        if !address.is_object() {
            return Err(ValidationReport::single(
                "location.address",
                "address must be an object",
                "Invalid address format",
            ));
        }

        self.validate_address(&address_from_value(address))
            .map_err(|report| report.prefixed("location.address."))
    }

    pub fn validate_drop_offs(&self, drop_offs: &[Value]) -> ValidationResult {
        if drop_offs.is_empty() {
            return Err(ValidationReport::single(
                "drop_offs",
                "At least one drop-off location is required",
                "Drop-off locations are required",
            ));
        }

        let errors: Vec<FieldError> = drop_offs
            .iter()
            .enumerate()
            .filter_map(|(index, drop_off)| {
                self.validate_pickup_info(drop_off)
                    .err()
                    .map(|report| report.prefixed(&format!("drop_offs[{index}].")).errors)
            })
            .flatten()
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport { message: "Drop-off validation failed".to_string(), errors })
        }
    }

    pub fn validate_json_string(&self, raw: &str, field: &str) -> ValidationResult {
        if raw.is_empty() {
            let required = format!("{field} is required");
            return Err(ValidationReport::single(field, required.clone(), required));
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(_) => Ok(()),
            Err(error) => Err(ValidationReport::single(
                field,
                format!("Invalid JSON format: {error}"),
                "Invalid JSON format",
            )),
        }
    }

    /// Empty is accepted: the tier is optional wherever it is taken.
    pub fn validate_customer_tier(&self, tier: &str) -> ValidationResult {
        if tier.is_empty() || CUSTOMER_TIERS.iter().any(|valid| valid.eq_ignore_ascii_case(tier)) {
            return Ok(());
        }
        Err(ValidationReport::single(
            "customer_tier",
            format!("Invalid customer tier '{tier}'. Must be one of: {}", CUSTOMER_TIERS.join(", ")),
            "Invalid customer tier",
        ))
    }

    pub fn validate_numeric_string(
        &self,
        value: &str,
        field: &str,
        min: u32,
        max: u32,
    ) -> ValidationResult {
        if value.is_empty() {
            return Ok(());
        }
        if !numeric_pattern().is_match(value) {
            return Err(ValidationReport::single(
                field,
                format!("{field} must be a positive integer"),
                "Invalid numeric format",
            ));
        }
        match value.parse::<u32>() {
            Ok(number) if (min..=max).contains(&number) => Ok(()),
            _ => Err(ValidationReport::single(
                field,
                format!("{field} must be between {min} and {max}"),
                "Value out of range",
            )),
        }
    }

    pub fn validate_boolean_string(&self, value: &str, field: &str) -> ValidationResult {
        if value.is_empty() || value == "true" || value == "false" {
            return Ok(());
        }
        Err(ValidationReport::single(
            field,
            format!("{field} must be 'true' or 'false'"),
            "Invalid boolean format",
        ))
    }
}

fn address_from_value(address: &Value) -> AddressInput {
    let field = |name: &str| match address.get(name) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    };

    AddressInput {
        street: field("street"),
        city: field("city"),
        state: field("state"),
        zip_code: field("zip_code"),
        country: field("country"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::InputValidator;
    use crate::booking::AddressInput;

    fn address() -> AddressInput {
        AddressInput {
            street: "123 Main St".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            zip_code: "94105".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn vehicle_types_are_case_insensitive() {
        let validator = InputValidator::new();
        assert!(validator.validate_vehicle_type("Cargo_Van").is_ok());

        let report = validator.validate_vehicle_type("hovercraft").expect_err("invalid vehicle");
        assert_eq!(report.message, "Invalid vehicle type");
        assert!(report.first_error().unwrap_or_default().contains("pickup_truck, cargo_van"));
        assert_eq!(
            validator.validate_vehicle_type("").expect_err("missing").first_error(),
            Some("vehicle_type is required")
        );
    }

    #[test]
    fn zip_and_state_formats_are_checked() {
        let validator = InputValidator::new();
        assert!(validator.validate_address(&address()).is_ok());
        assert!(validator
            .validate_address(&AddressInput { zip_code: "94105-1234".to_string(), ..address() })
            .is_ok());

        let bad_zip = validator
            .validate_address(&AddressInput { zip_code: "9410".to_string(), ..address() })
            .expect_err("short zip");
        assert!(bad_zip.errors[0].message.starts_with("Invalid zip code format"));

        let bad_state = validator
            .validate_address(&AddressInput { state: "Calif".to_string(), ..address() })
            .expect_err("long state");
        assert_eq!(bad_state.errors[0].field, "state");
    }

    #[test]
    fn missing_address_fields_are_reported_individually() {
        let report = InputValidator::new()
            .validate_address(&AddressInput { street: String::new(), city: String::new(), ..address() })
            .expect_err("missing fields");

        let messages: Vec<_> = report.errors.iter().map(|error| error.message.as_str()).collect();
        assert_eq!(messages, vec!["street is required", "city is required"]);
    }

    #[test]
    fn pickup_info_requires_location_address() {
        let validator = InputValidator::new();
        let missing = validator.validate_pickup_info(&json!({"business_name": "Acme"}));
        assert_eq!(missing.expect_err("missing location").message, "Pickup location is required");

        let nested = validator
            .validate_pickup_info(&json!({
                "location": {"address": {"street": "1 Main", "city": "SF", "state": "ca",
                                         "zip_code": 94105, "country": "US"}}
            }))
            .expect_err("lowercase state");
        assert_eq!(nested.errors[0].field, "location.address.state");
    }

    #[test]
    fn drop_offs_are_indexed_in_errors() {
        let validator = InputValidator::new();
        assert_eq!(
            validator.validate_drop_offs(&[]).expect_err("empty").first_error(),
            Some("At least one drop-off location is required")
        );

        let report = validator
            .validate_drop_offs(&[
                json!({"location": {"address": {"street": "1 Main", "city": "SF", "state": "CA",
                                                 "zip_code": "94105", "country": "US"}}}),
                json!({"location": {}}),
            ])
            .expect_err("second drop-off lacks address");
        assert_eq!(report.errors[0].field, "drop_offs[1].location.address");
    }

    #[test]
    fn json_strings_must_be_present_and_well_formed() {
        let validator = InputValidator::new();
        assert_eq!(
            validator.validate_json_string("", "pickup_info").expect_err("empty").message,
            "pickup_info is required"
        );

        let malformed =
            validator.validate_json_string("{not json", "drop_offs").expect_err("malformed");
        assert!(malformed.first_error().unwrap_or_default().starts_with("Invalid JSON format:"));
        assert!(malformed.describe("drop_offs").starts_with("drop_offs validation failed: Invalid JSON format - "));
    }

    #[test]
    fn numeric_boolean_and_tier_strings() {
        let validator = InputValidator::new();
        assert!(validator.validate_numeric_string("", "delivery_count", 1, 100).is_ok());
        assert!(validator.validate_numeric_string("12", "delivery_count", 1, 100).is_ok());
        assert!(validator.validate_numeric_string("-3", "delivery_count", 1, 100).is_err());
        assert!(validator.validate_numeric_string("0", "delivery_count", 1, 100).is_err());
        assert!(validator.validate_numeric_string("101", "delivery_count", 1, 100).is_err());

        assert!(validator.validate_boolean_string("true", "is_bulk_order").is_ok());
        assert!(validator.validate_boolean_string("yes", "is_bulk_order").is_err());

        assert!(validator.validate_customer_tier("").is_ok());
        assert!(validator.validate_customer_tier("GOLD").is_ok());
        assert!(validator.validate_customer_tier("platinum").is_err());
    }

    #[test]
    fn scenarios_accept_known_values() {
        let validator = InputValidator::new();
        for scenario in ["fastest", "ASAP", "sometime_today"] {
            assert!(validator.validate_delivery_scenario(scenario).is_ok());
        }
        assert!(validator.validate_delivery_scenario("whenever").is_err());
    }
}
