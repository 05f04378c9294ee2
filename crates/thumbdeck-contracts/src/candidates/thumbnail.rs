use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThumbnailVariant {
    pub url: String,
    pub width: u64,
    pub height: u64,
}

impl ThumbnailVariant {
    pub fn area(&self) -> u64 {
        self.width.saturating_mul(self.height)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(url) => Some(Self {
                url: url.clone(),
                width: 0,
                height: 0,
            }),
            Value::Object(obj) => Some(Self {
                url: obj
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                width: parse_dimension(obj.get("width")),
                height: parse_dimension(obj.get("height")),
            }),
            _ => None,
        }
    }
}

/// Integer or float pixel count; anything else (or a non-positive float) is 0.
fn parse_dimension(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|raw| *raw > 0.0).map(|raw| raw as u64))
            .unwrap_or(0),
        _ => 0,
    }
}

/// The search API's `thumbnail` field, which arrives as a bare URL, a list of
/// sized variants, or a single object depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ThumbnailField {
    Url(String),
    Variants(Vec<ThumbnailVariant>),
    Single(ThumbnailVariant),
    #[default]
    Missing,
}

impl ThumbnailField {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(url)) => ThumbnailField::Url(url.clone()),
            Some(Value::Array(rows)) => ThumbnailField::Variants(
                rows.iter()
                    .filter_map(ThumbnailVariant::from_value)
                    .collect(),
            ),
            Some(value @ Value::Object(_)) => ThumbnailVariant::from_value(value)
                .map(ThumbnailField::Single)
                .unwrap_or_default(),
            _ => ThumbnailField::Missing,
        }
    }

    /// Highest-resolution URL, or `""` when no thumbnail is available.
    pub fn best_url(&self) -> &str {
        match self {
            ThumbnailField::Url(url) => url.as_str(),
            ThumbnailField::Variants(variants) => {
                let mut best: Option<&ThumbnailVariant> = None;
                for variant in variants {
                    if best.map_or(true, |current| variant.area() > current.area()) {
                        best = Some(variant);
                    }
                }
                best.map(|variant| variant.url.as_str()).unwrap_or_default()
            }
            ThumbnailField::Single(variant) => variant.url.as_str(),
            ThumbnailField::Missing => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ThumbnailField;

    fn best(value: serde_json::Value) -> String {
        ThumbnailField::from_value(Some(&value)).best_url().to_string()
    }

    #[test]
    fn resolver_picks_largest_variant_by_area() {
        let field = json!([
            {"url": "a", "width": 120, "height": 90},
            {"url": "b", "width": 640, "height": 360}
        ]);
        assert_eq!(best(field), "b");
    }

    #[test]
    fn float_dimensions_count_toward_area() {
        let field = json!([
            {"url": "small", "width": 120, "height": 90},
            {"url": "big", "width": 1280.0, "height": 720.0}
        ]);
        assert_eq!(best(field), "big");

        let negative = json!([
            {"url": "sized", "width": 2, "height": 2},
            {"url": "bogus", "width": -1280.0, "height": "720"}
        ]);
        assert_eq!(best(negative), "sized");
    }

    #[test]
    fn resolver_handles_every_field_shape() {
        assert_eq!(
            best(json!("https://i.ytimg.com/vi/x/hq.jpg")),
            "https://i.ytimg.com/vi/x/hq.jpg"
        );
        assert_eq!(best(json!([])), "");
        assert_eq!(best(json!({"url": "single"})), "single");
        assert_eq!(best(json!({"width": 10})), "");
        assert_eq!(best(json!(42)), "");
        assert_eq!(best(json!(null)), "");
        assert_eq!(ThumbnailField::from_value(None).best_url(), "");
    }

    #[test]
    fn resolver_treats_missing_dimensions_as_zero() {
        let field = json!([
            {"url": "no-dims"},
            "bare-string",
            {"url": "sized", "width": 1, "height": 1}
        ]);
        assert_eq!(best(field), "sized");
    }

    #[test]
    fn resolver_keeps_first_variant_on_area_ties() {
        let field = json!([
            {"url": "first", "width": 320, "height": 180},
            {"url": "second", "width": 180, "height": 320}
        ]);
        assert_eq!(best(field), "first");
    }

    #[test]
    fn resolver_skips_list_entries_of_unknown_shape() {
        let field = json!([7, null, {"url": "ok", "width": 2, "height": 2}]);
        assert_eq!(best(field), "ok");
    }
}
