use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoCandidatesReason {
    /// The search endpoint returned no videos at all.
    EmptySearch,
    /// Videos came back but none reached the view threshold.
    BelowThreshold { min_views: u64, total: usize },
}

impl fmt::Display for NoCandidatesReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoCandidatesReason::EmptySearch => write!(f, "No videos found for this query."),
            NoCandidatesReason::BelowThreshold { min_views, total } => write!(
                f,
                "No videos found with >= {min_views} views ({total} returned, all below threshold)."
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{key} environment variable not set")]
    Configuration { key: String },
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("invalid image from {source_label}: {reason}")]
    InvalidImage {
        source_label: String,
        reason: String,
    },
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: String,
        status: u16,
        body: String,
    },
    #[error("{0}")]
    NoCandidates(NoCandidatesReason),
    #[error("failed to download any thumbnails ({attempted} attempted)")]
    AllDownloadsFailed { attempted: usize },
    #[error("no image was generated in the response{}", format_notes(notes))]
    NoImageGenerated { notes: String },
}

impl PipelineError {
    pub fn invalid_image(source_label: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::InvalidImage {
            source_label: source_label.into(),
            reason: reason.into(),
        }
    }
}

fn format_notes(notes: &str) -> String {
    let trimmed = notes.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(" (response text: {trimmed})")
    }
}

#[cfg(test)]
mod tests {
    use super::{NoCandidatesReason, PipelineError};

    #[test]
    fn no_candidates_messages_distinguish_empty_from_filtered() {
        let empty = PipelineError::NoCandidates(NoCandidatesReason::EmptySearch).to_string();
        let filtered = PipelineError::NoCandidates(NoCandidatesReason::BelowThreshold {
            min_views: 50_000,
            total: 5,
        })
        .to_string();
        assert_eq!(empty, "No videos found for this query.");
        assert!(filtered.contains(">= 50000 views"));
        assert_ne!(empty, filtered);
    }

    #[test]
    fn no_image_message_includes_model_notes_when_present() {
        let bare = PipelineError::NoImageGenerated {
            notes: "  ".to_string(),
        };
        assert_eq!(bare.to_string(), "no image was generated in the response");
        let noted = PipelineError::NoImageGenerated {
            notes: "blocked by policy".to_string(),
        };
        assert!(noted.to_string().ends_with("(response text: blocked by policy)"));
    }
}
