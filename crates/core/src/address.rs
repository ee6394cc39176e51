//! Heuristic parsing of comma-separated address blocks typed into chat.

use std::sync::OnceLock;

use regex::Regex;

use crate::booking::AddressInput;

const ADDRESS_INDICATORS: &[&str] = &[
    "drive", "street", "avenue", "road", "lane", "way", "blvd", "boulevard", "st", "ave", "rd",
    "ln", "pkwy", "parkway",
];

const DEFAULT_COUNTRY: &str = "US";

/// A stop typed as `business, contact, street, city, state, zip, phone`.
/// Leading business/contact parts may be absent; trailing parts may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressBlock {
    pub business_name: String,
    pub contact_name: String,
    pub address: AddressInput,
    pub phone: String,
}

fn zip_token() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\d{5}\b").expect("zip token pattern compiles"))
}

/// Four or more comma-separated parts plus a street keyword or a 5-digit token.
pub fn looks_like_address(text: &str) -> bool {
    if text.split(',').count() < 4 {
        return false;
    }

    let lowered = text.to_lowercase();
    ADDRESS_INDICATORS.iter().any(|indicator| lowered.contains(indicator))
        || zip_token().is_match(text)
}

pub fn parse_address_block(text: &str) -> Option<AddressBlock> {
    if !looks_like_address(text) {
        return None;
    }

    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let street_index = locate_street(&parts);
    let part = |index: usize| parts.get(index).map(|value| value.to_string()).unwrap_or_default();

    let (business_name, contact_name) = match street_index {
        0 => (String::new(), String::new()),
        1 => (part(0), String::new()),
        _ => (part(street_index - 2), part(street_index - 1)),
    };

    Some(AddressBlock {
        business_name,
        contact_name,
        address: AddressInput {
            street: part(street_index),
            city: part(street_index + 1),
            state: normalize_state_code(&part(street_index + 2)),
            zip_code: part(street_index + 3),
            country: DEFAULT_COUNTRY.to_string(),
        },
        phone: part(street_index + 4),
    })
}

/// Parses a bare `street, city, state[, zip]` answer.
pub fn parse_inline_address(text: &str) -> Option<AddressInput> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }

    Some(AddressInput {
        street: parts[0].to_string(),
        city: parts[1].to_string(),
        state: normalize_state_code(parts[2]),
        zip_code: parts.get(3).map(|zip| zip.to_string()).unwrap_or_default(),
        country: DEFAULT_COUNTRY.to_string(),
    })
}

// Prefer a part that starts with a house number and names a street type, then
// any street-type word, then any part starting with a digit. Index 2 matches
// the full `business, contact, street, ...` layout.
fn locate_street(parts: &[&str]) -> usize {
    let starts_with_digit =
        |part: &&str| part.chars().next().map(|ch| ch.is_ascii_digit()).unwrap_or(false);

    parts
        .iter()
        .position(|part| starts_with_digit(part) && has_street_word(part))
        .or_else(|| parts.iter().position(|part| has_street_word(part)))
        .or_else(|| parts.iter().position(starts_with_digit))
        .unwrap_or(2)
}

fn has_street_word(part: &str) -> bool {
    part.split_whitespace().any(|word| {
        let word = word.trim_matches('.').to_lowercase();
        ADDRESS_INDICATORS.contains(&word.as_str())
    })
}

pub fn normalize_state_code(state: &str) -> String {
    let trimmed = state.trim();
    if let Some(code) = state_code_for(&trimmed.to_lowercase()) {
        return code.to_string();
    }

    if trimmed.chars().count() == 2 {
        return trimmed.to_uppercase();
    }

    trimmed.to_string()
}

fn state_code_for(name: &str) -> Option<&'static str> {
    let code = match name {
        "alabama" | "al" => "AL",
        "alaska" | "ak" => "AK",
        "arizona" | "az" => "AZ",
        "arkansas" | "ar" => "AR",
        "california" | "calif" | "ca" => "CA",
        "colorado" | "co" => "CO",
        "connecticut" | "ct" => "CT",
        "delaware" | "de" => "DE",
        "district of columbia" | "washington dc" | "dc" => "DC",
        "florida" | "fl" => "FL",
        "georgia" | "ga" => "GA",
        "hawaii" | "hi" => "HI",
        "idaho" | "id" => "ID",
        "illinois" | "il" => "IL",
        "indiana" | "in" => "IN",
        "iowa" | "ia" => "IA",
        "kansas" | "ks" => "KS",
        "kentucky" | "ky" => "KY",
        "louisiana" | "la" => "LA",
        "maine" | "me" => "ME",
        "maryland" | "md" => "MD",
        "massachusetts" | "ma" => "MA",
        "michigan" | "mi" => "MI",
        "minnesota" | "mn" => "MN",
        "mississippi" | "ms" => "MS",
        "missouri" | "mo" => "MO",
        "montana" | "mt" => "MT",
        "nebraska" | "ne" => "NE",
        "nevada" | "nv" => "NV",
        "new hampshire" | "nh" => "NH",
        "new jersey" | "nj" => "NJ",
        "new mexico" | "nm" => "NM",
        "new york" | "ny" => "NY",
        "north carolina" | "nc" => "NC",
        "north dakota" | "nd" => "ND",
        "ohio" | "oh" => "OH",
        "oklahoma" | "ok" => "OK",
        "oregon" | "or" => "OR",
        "pennsylvania" | "pa" => "PA",
        "rhode island" | "ri" => "RI",
        "south carolina" | "sc" => "SC",
        "south dakota" | "sd" => "SD",
        "tennessee" | "tn" => "TN",
        "texas" | "tx" => "TX",
        "utah" | "ut" => "UT",
        "vermont" | "vt" => "VT",
        "virginia" | "va" => "VA",
        "washington" | "wa" => "WA",
        "west virginia" | "wv" => "WV",
        "wisconsin" | "wi" => "WI",
        "wyoming" | "wy" => "WY",
        _ => return None,
    };
    Some(code)
}
