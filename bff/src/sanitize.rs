//! HTML sanitization and structural defaulting of upstream records.
//!
//! Rich fields keep ammonia's default set of benign tags; plain fields keep
//! text only (with `<`, `>` and `&` escaped). URLs survive only as
//! `http(s)` or root-relative references. Missing or null strings become
//! `""` and missing or null lists become `[]`.

use std::collections::HashSet;

use serde_json::Map;
use serde_json::Value;
use staybook_protocol::Feature;
use staybook_protocol::Hotel;
use staybook_protocol::Location;
use staybook_protocol::ResourceId;
use staybook_protocol::Room;
use url::Url;

/// Keys whose string values keep benign markup in free-form records.
const RICH_KEYS: &[&str] = &["description", "details", "notes", "price", "policy"];

/// Keys whose string values are URLs in free-form records.
const URL_KEYS: &[&str] = &["image", "images", "photo", "photos", "thumbnail", "url", "link"];

pub fn rich(html: &str) -> String {
    ammonia::clean(html)
}

pub fn plain(text: &str) -> String {
    ammonia::Builder::empty()
        .clean_content_tags(HashSet::from(["script", "style"]))
        .clean(text)
        .to_string()
}

/// An `http`/`https` URL or a root-relative path; anything else becomes `""`.
pub fn url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty()
        || raw.contains(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | '\\'))
    {
        return String::new();
    }
    if raw.starts_with('/') {
        return if raw.starts_with("//") {
            String::new()
        } else {
            raw.to_string()
        };
    }
    match Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => raw.to_string(),
        _ => String::new(),
    }
}

/// Icon references are either URLs or CSS-style names such as `fa-wifi`.
/// Anything carrying a scheme separator is treated as a URL.
pub fn icon(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains(['/', ':']) {
        return url(raw);
    }
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
        .collect()
}

pub fn room(value: &Value) -> Room {
    Room {
        id: id(value),
        title: plain(&text(value, &["title", "name"])),
        description: rich(&text(value, &["description"])),
        price: rich(&text(value, &["price", "price_html"])),
        currency: plain(&text(value, &["currency"])),
        capacity: count(value, &["capacity", "max_guests", "guests"]),
        images: images(value),
        features: features(value, &["features", "amenities"]),
    }
}

pub fn hotel(value: &Value) -> Hotel {
    Hotel {
        id: id(value),
        name: plain(&text(value, &["name", "title"])),
        description: rich(&text(value, &["description"])),
        address: plain(&text(value, &["address"])),
        rating: value.get("rating").and_then(number),
        images: images(value),
        amenities: features(value, &["amenities", "features"]),
    }
}

pub fn location(value: &Value) -> Location {
    let name = plain(&text(value, &["name", "city"]));
    let label = plain(&text(value, &["label", "display_name"]));
    Location {
        id: id(value),
        label: if label.is_empty() { name.clone() } else { label },
        name,
    }
}

/// Sanitize every string in a free-form record (bookings, checkout
/// receipts). The key decides the treatment; everything else is plain text.
pub fn record(value: &Value) -> Value {
    sanitize_value(value, Treatment::Plain)
}

#[derive(Clone, Copy)]
enum Treatment {
    Plain,
    Rich,
    Url,
}

fn sanitize_value(value: &Value, treatment: Treatment) -> Value {
    match value {
        Value::String(s) => Value::String(match treatment {
            Treatment::Plain => plain(s),
            Treatment::Rich => rich(s),
            Treatment::Url => url(s),
        }),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_value(item, treatment))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (plain(key), sanitize_value(item, treatment_for(key))))
                .collect::<Map<_, _>>(),
        ),
        other => other.clone(),
    }
}

fn treatment_for(key: &str) -> Treatment {
    let key = key.to_ascii_lowercase();
    if URL_KEYS.contains(&key.as_str()) || key.ends_with("_url") {
        Treatment::Url
    } else if RICH_KEYS.contains(&key.as_str()) || key.ends_with("_html") {
        Treatment::Rich
    } else {
        Treatment::Plain
    }
}

fn id(value: &Value) -> Option<ResourceId> {
    match value.get("id")? {
        Value::Number(n) => n.as_i64().map(ResourceId::Int),
        Value::String(s) if !s.trim().is_empty() => Some(ResourceId::Text(plain(s.trim()))),
        _ => None,
    }
}

/// First present string (or number) under any of `keys`; `""` otherwise.
fn text(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match value.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn count(value: &Value, keys: &[&str]) -> u32 {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(number))
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.min(f64::from(u32::MAX)) as u32)
        .unwrap_or_default()
}

/// `images` as strings or `{url|src}` objects; unsafe URLs are dropped.
fn images(value: &Value) -> Vec<String> {
    let Some(Value::Array(items)) = value.get("images") else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(url(s)),
            Value::Object(_) => Some(url(&text(item, &["url", "src"]))),
            _ => None,
        })
        .filter(|u| !u.is_empty())
        .collect()
}

/// Features as strings or `{label|name, icon}` objects.
fn features(value: &Value, keys: &[&str]) -> Vec<Feature> {
    let Some(Value::Array(items)) = keys
        .iter()
        .find_map(|key| value.get(*key).filter(|v| !v.is_null()))
    else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let feature = match item {
                Value::String(s) => Feature {
                    label: plain(s),
                    icon: String::new(),
                },
                Value::Object(_) => Feature {
                    label: plain(&text(item, &["label", "name", "title"])),
                    icon: icon(&text(item, &["icon"])),
                },
                _ => return None,
            };
            (!feature.label.is_empty()).then_some(feature)
        })
        .collect()
}
