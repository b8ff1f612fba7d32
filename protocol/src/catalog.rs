//! Sanitized catalog records as the BFF serves them.
//!
//! Every string field has already been through the HTML sanitizer and every
//! collection is present (possibly empty), so consumers never branch on
//! missing data.

use serde::Deserialize;
use serde::Serialize;

/// Upstream identifiers arrive as either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
    Int(i64),
    Text(String),
}

/// Label plus optional icon reference, used for room features and hotel
/// amenities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    pub label: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Room {
    pub id: Option<ResourceId>,
    /// Plain text.
    pub title: String,
    /// Restricted HTML.
    pub description: String,
    /// Restricted HTML; the upstream formats prices as markup fragments.
    pub price: String,
    pub currency: String,
    pub capacity: u32,
    pub images: Vec<String>,
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hotel {
    pub id: Option<ResourceId>,
    pub name: String,
    /// Restricted HTML.
    pub description: String,
    pub address: String,
    pub rating: Option<f64>,
    pub images: Vec<String>,
    pub amenities: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub id: Option<ResourceId>,
    pub name: String,
    pub label: String,
}

/// `{ "data": ... }` wrapper every successful catalog response uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}
