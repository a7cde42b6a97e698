//! Card input validation and brand detection. Pure functions, no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw card data received from the checkout form. The PAN and CVV are
/// only ever forwarded to the processor; they must not be persisted or
/// logged, which is why `Debug` redacts them.
#[derive(Clone, Deserialize)]
pub struct CardData {
    pub number: String,
    pub holder_name: String,
    /// `MM/YY`.
    pub expiration: String,
    pub cvv: String,
}

impl fmt::Debug for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardData")
            .field("number", &format_args!("****{}", last_four(&self.number)))
            .field("holder_name", &self.holder_name)
            .field("expiration", &self.expiration)
            .field("cvv", &"***")
            .finish()
    }
}

/// Persisted card snapshot: never holds the PAN or CVV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub last_four: String,
    pub brand: CardBrand,
    pub holder_name: String,
}

impl CardSnapshot {
    pub fn from_card(card: &CardData) -> Self {
        Self {
            last_four: last_four(&card.number),
            brand: detect_brand(&card.number),
            holder_name: card.holder_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Elo,
    Hipercard,
    Unknown,
}

impl CardBrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Amex => "amex",
            CardBrand::Elo => "elo",
            CardBrand::Hipercard => "hipercard",
            CardBrand::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CardBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix table ordered by prefix length so the more specific Elo ranges
/// win over the generic Visa/Mastercard prefixes they overlap with.
const BRAND_PREFIXES: &[(&str, CardBrand)] = &[
    ("636368", CardBrand::Elo),
    ("636297", CardBrand::Elo),
    ("504175", CardBrand::Elo),
    ("451416", CardBrand::Elo),
    ("438935", CardBrand::Elo),
    ("5067", CardBrand::Elo),
    ("4576", CardBrand::Elo),
    ("4011", CardBrand::Elo),
    ("3841", CardBrand::Hipercard),
    ("34", CardBrand::Amex),
    ("37", CardBrand::Amex),
    ("51", CardBrand::Mastercard),
    ("52", CardBrand::Mastercard),
    ("53", CardBrand::Mastercard),
    ("54", CardBrand::Mastercard),
    ("55", CardBrand::Mastercard),
    ("60", CardBrand::Hipercard),
    ("4", CardBrand::Visa),
];

/// Detects the card brand from the cleaned digit string by
/// longest-prefix match against a fixed table.
pub fn detect_brand(number: &str) -> CardBrand {
    let cleaned = digits(number);
    for (prefix, brand) in BRAND_PREFIXES {
        if cleaned.starts_with(prefix) {
            return *brand;
        }
    }
    CardBrand::Unknown
}

/// Validates card input before any network call. Rules: number has at
/// least 13 digits, holder name at least 3 characters, expiry matches
/// `MM/YY`, CVV has 3 or 4 digits.
pub fn validate_card(card: &CardData) -> Result<(), &'static str> {
    if digits(&card.number).len() < 13 {
        return Err("card number must have at least 13 digits");
    }
    if card.holder_name.trim().len() < 3 {
        return Err("holder name must have at least 3 characters");
    }
    if split_expiration(&card.expiration).is_none() {
        return Err("expiration must be in MM/YY format");
    }
    let cvv_len = card.cvv.len();
    if !(3..=4).contains(&cvv_len) || !card.cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err("cvv must have 3 or 4 digits");
    }
    Ok(())
}

/// Splits a valid `MM/YY` expiration into its month and two-digit year.
pub fn split_expiration(expiration: &str) -> Option<(&str, &str)> {
    let (month, year) = expiration.split_once('/')?;
    if month.len() != 2 || year.len() != 2 {
        return None;
    }
    if !month.chars().chain(year.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    match month.parse::<u8>() {
        Ok(1..=12) => Some((month, year)),
        _ => None,
    }
}

pub fn last_four(number: &str) -> String {
    let cleaned = digits(number);
    let start = cleaned.len().saturating_sub(4);
    cleaned[start..].to_string()
}

fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
