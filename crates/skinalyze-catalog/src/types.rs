use serde::{Deserialize, Serialize};
use skinalyze_core::Condition;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Numeric concern bucket used by the catalog API. Coarser than [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConcernCode(pub u32);

impl ConcernCode {
    pub const ACNE: ConcernCode = ConcernCode(1);
    pub const PIGMENTATION: ConcernCode = ConcernCode(2);
}

impl fmt::Display for ConcernCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The condition → concern table. Pigmentation and dark spots share a bucket.
pub fn concern_for(condition: Condition) -> ConcernCode {
    match condition {
        Condition::Acne => ConcernCode::ACNE,
        Condition::Pigmentation | Condition::DarkSpots => ConcernCode::PIGMENTATION,
    }
}

/// Concern code for a display label, or `None` for labels outside the vocabulary.
pub fn concern_for_label(label: &str) -> Option<ConcernCode> {
    Condition::from_label(label).map(concern_for)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("unknown skin type {0:?}: expected 1-6 or oily, dry, normal, combination, sensitive, all")]
    UnknownSkinType(String),
    #[error("unknown product type {0:?}: expected 1-5 or cleansers, serums, toners, moisturisers, sunscreens")]
    UnknownProductType(String),
}

/// User-selected skin classification (catalog ids 1..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkinType {
    Oily,
    Dry,
    Normal,
    Combination,
    Sensitive,
    AllTypes,
}

impl SkinType {
    pub const ALL: [SkinType; 6] = [
        SkinType::Oily,
        SkinType::Dry,
        SkinType::Normal,
        SkinType::Combination,
        SkinType::Sensitive,
        SkinType::AllTypes,
    ];

    pub fn id(self) -> u32 {
        match self {
            SkinType::Oily => 1,
            SkinType::Dry => 2,
            SkinType::Normal => 3,
            SkinType::Combination => 4,
            SkinType::Sensitive => 5,
            SkinType::AllTypes => 6,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            SkinType::Oily => "Oily / Normal-Oily",
            SkinType::Dry => "Dry / Dry-Normal",
            SkinType::Normal => "Normal",
            SkinType::Combination => "Combination",
            SkinType::Sensitive => "Sensitive",
            SkinType::AllTypes => "All Types",
        }
    }
}

impl fmt::Display for SkinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SkinType {
    type Err = ParseIdError;

    /// Accepts the numeric id or a case-insensitive name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if let Ok(id) = key.parse::<u32>() {
            return Self::from_id(id).ok_or_else(|| ParseIdError::UnknownSkinType(s.to_string()));
        }
        match key.as_str() {
            "oily" | "normal-oily" | "oily / normal-oily" => Ok(SkinType::Oily),
            "dry" | "dry-normal" | "dry / dry-normal" => Ok(SkinType::Dry),
            "normal" => Ok(SkinType::Normal),
            "combination" => Ok(SkinType::Combination),
            "sensitive" => Ok(SkinType::Sensitive),
            "all" | "all types" | "all-types" => Ok(SkinType::AllTypes),
            _ => Err(ParseIdError::UnknownSkinType(s.to_string())),
        }
    }
}

/// Optional category filter (catalog ids 1..=5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductType {
    Cleansers,
    Serums,
    Toners,
    Moisturisers,
    Sunscreens,
}

impl ProductType {
    pub const ALL: [ProductType; 5] = [
        ProductType::Cleansers,
        ProductType::Serums,
        ProductType::Toners,
        ProductType::Moisturisers,
        ProductType::Sunscreens,
    ];

    pub fn id(self) -> u32 {
        match self {
            ProductType::Cleansers => 1,
            ProductType::Serums => 2,
            ProductType::Toners => 3,
            ProductType::Moisturisers => 4,
            ProductType::Sunscreens => 5,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            ProductType::Cleansers => "Cleansers",
            ProductType::Serums => "Serums",
            ProductType::Toners => "Toners",
            ProductType::Moisturisers => "Moisturisers",
            ProductType::Sunscreens => "Sunscreens",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProductType {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if let Ok(id) = key.parse::<u32>() {
            return Self::from_id(id).ok_or_else(|| ParseIdError::UnknownProductType(s.to_string()));
        }
        match key.trim_end_matches('s') {
            "cleanser" => Ok(ProductType::Cleansers),
            "serum" => Ok(ProductType::Serums),
            "toner" => Ok(ProductType::Toners),
            "moisturiser" | "moisturizer" => Ok(ProductType::Moisturisers),
            "sunscreen" => Ok(ProductType::Sunscreens),
            _ => Err(ParseIdError::UnknownProductType(s.to_string())),
        }
    }
}

/// A product record as returned by the catalog. Fields this crate does not
/// interpret (ids, skin type, ...) are carried through untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub concern: String,
    #[serde(default)]
    pub key_ingredients: String,
    #[serde(default)]
    pub all_ingredients: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of a recommendation request.
///
/// `NoProducts` is a sentinel, not an error: every lookup failed or came back
/// empty. Serializes as either a JSON array or the bare message string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Recommendations {
    /// Never empty.
    Products(Vec<Product>),
    NoProducts(&'static str),
}

impl Recommendations {
    pub fn products(&self) -> &[Product] {
        match self {
            Recommendations::Products(products) => products,
            Recommendations::NoProducts(_) => &[],
        }
    }
}
