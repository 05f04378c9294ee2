use serde::{Deserialize, Serialize};

use crate::candidates::VideoCandidate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub title: String,
    pub views: u64,
    pub channel: String,
    pub url: String,
}

impl ManifestEntry {
    pub fn for_candidate(path: impl Into<String>, candidate: &VideoCandidate) -> Self {
        Self {
            path: path.into(),
            title: candidate.title.clone(),
            views: candidate.view_count,
            channel: candidate.channel.clone(),
            url: candidate.url.clone(),
        }
    }
}

/// A candidate that was ranked but did not make it into the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedCandidate {
    pub rank: usize,
    pub title: String,
    pub reason: String,
}

/// Pretty JSON array with 2-space indentation.
pub fn manifest_to_json(entries: &[ManifestEntry]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(entries)?)
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::candidates::{ThumbnailField, VideoCandidate};

    use super::{manifest_to_json, ManifestEntry};

    #[test]
    fn manifest_json_uses_two_space_indent_and_expected_keys() -> anyhow::Result<()> {
        let candidate = VideoCandidate {
            title: "Agents explained".to_string(),
            channel: "Dev".to_string(),
            url: "https://youtube.com/watch?v=1".to_string(),
            view_count: 90_000,
            thumbnail: ThumbnailField::Missing,
        };
        let entries = vec![ManifestEntry::for_candidate(
            "youtube-thumbnails/examples/ai-agents-1.jpg",
            &candidate,
        )];
        let raw = manifest_to_json(&entries)?;
        assert!(raw.starts_with("[\n  {\n    \"path\""));

        let parsed: Value = serde_json::from_str(&raw)?;
        let row = &parsed[0];
        assert_eq!(row["views"], Value::from(90_000));
        assert_eq!(row["channel"], Value::from("Dev"));
        assert_eq!(
            row.as_object().map(|obj| obj.len()).unwrap_or_default(),
            5
        );
        Ok(())
    }

    #[test]
    fn empty_manifest_serializes_to_empty_array() -> anyhow::Result<()> {
        assert_eq!(manifest_to_json(&[])?, "[]");
        Ok(())
    }
}
