mod ranking;
mod thumbnail;

pub use ranking::rank_candidates;
pub use thumbnail::{ThumbnailField, ThumbnailVariant};

use serde_json::Value;

/// One search result. Built once from the search payload and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoCandidate {
    pub title: String,
    pub channel: String,
    pub url: String,
    pub view_count: u64,
    pub thumbnail: ThumbnailField,
}

impl VideoCandidate {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let channel = match obj.get("channel") {
            Some(Value::Object(channel)) => channel
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        };
        Some(Self {
            title: text("title"),
            channel,
            url: text("url"),
            view_count: parse_view_count(obj.get("viewCountInt")),
            thumbnail: ThumbnailField::from_value(obj.get("thumbnail")),
        })
    }
}

/// Candidates from a `{ "videos": [...] }` search payload, in response order.
pub fn candidates_from_search_payload(payload: &Value) -> Vec<VideoCandidate> {
    payload
        .get("videos")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(VideoCandidate::from_value).collect())
        .unwrap_or_default()
}

fn parse_view_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|raw| *raw > 0.0).map(|raw| raw as u64))
            .unwrap_or(0),
        Some(Value::String(raw)) => raw
            .trim()
            .replace(',', "")
            .parse::<u64>()
            .unwrap_or(0),
        _ => 0,
    }
}

/// `1234567` -> `"1,234,567"`.
pub fn format_views(views: u64) -> String {
    let digits = views.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
