use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};
use serde_json::{json, Map, Value};
use thumbdeck_contracts::candidates::{format_views, rank_candidates, VideoCandidate};
use thumbdeck_contracts::error::PipelineError;
use thumbdeck_contracts::events::EventWriter;
use thumbdeck_contracts::manifest::{ManifestEntry, SkippedCandidate};
use thumbdeck_contracts::slug::slugify_default;

use crate::normalize::{normalize_bytes, CANONICAL_EXTENSION};
use crate::search::{ThumbnailFetcher, VideoSearch};

const FALLBACK_STEM: &str = "thumbnail";
const TITLE_LOG_CHARS: usize = 60;

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub top: usize,
    pub min_views: u64,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ManifestOutcome {
    pub entries: Vec<ManifestEntry>,
    pub skipped: Vec<SkippedCandidate>,
}

impl ManifestOutcome {
    pub fn attempted(&self) -> usize {
        self.entries.len() + self.skipped.len()
    }

    /// Entries, or `AllDownloadsFailed` when not a single candidate made it.
    pub fn into_entries(self) -> Result<Vec<ManifestEntry>, PipelineError> {
        if self.entries.is_empty() {
            return Err(PipelineError::AllDownloadsFailed {
                attempted: self.attempted(),
            });
        }
        Ok(self.entries)
    }
}

/// File stem shared by every thumbnail of one query.
pub fn query_stem(query: &str) -> String {
    let slug = slugify_default(query);
    if slug.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        slug
    }
}

/// `{stem}-{rank}.jpg`; `rank` is the 1-based position in the ranked list, so a
/// failed candidate leaves a gap rather than shifting later files.
pub fn thumbnail_path(output_dir: &Path, stem: &str, rank: usize) -> PathBuf {
    output_dir.join(format!("{stem}-{rank}.{CANONICAL_EXTENSION}"))
}

pub struct ManifestBuilder<'a> {
    fetcher: &'a dyn ThumbnailFetcher,
    events: EventWriter,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(fetcher: &'a dyn ThumbnailFetcher, events: EventWriter) -> Self {
        Self { fetcher, events }
    }

    /// Resolve, fetch and normalize every ranked candidate. Failures and repeats
    /// of an already-saved thumbnail URL are logged and folded into `skipped`;
    /// nothing here is fatal.
    pub fn build(
        &self,
        ranked: &[VideoCandidate],
        stem: &str,
        output_dir: &Path,
    ) -> Result<ManifestOutcome> {
        fs::create_dir_all(output_dir)?;
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let outcome = ranked.iter().enumerate().fold(
            ManifestOutcome::default(),
            |mut outcome, (idx, candidate)| {
                let rank = idx + 1;
                let url = candidate.thumbnail.best_url();
                let result = match seen.get(url) {
                    Some(first) if !url.is_empty() => Err(format!("duplicate of rank {first}")),
                    _ => self.process(candidate, rank, stem, output_dir),
                };
                match result {
                    Ok(entry) => {
                        seen.insert(url, rank);
                        self.emit(
                            "candidate_downloaded",
                            json!({ "rank": rank, "path": entry.path, "views": entry.views }),
                        );
                        outcome.entries.push(entry);
                    }
                    Err(reason) => {
                        warn!("Skipping video {rank}: {reason}");
                        self.emit(
                            "candidate_skipped",
                            json!({ "rank": rank, "title": candidate.title, "reason": reason }),
                        );
                        outcome.skipped.push(SkippedCandidate {
                            rank,
                            title: candidate.title.clone(),
                            reason,
                        });
                    }
                }
                outcome
            },
        );
        Ok(outcome)
    }

    fn process(
        &self,
        candidate: &VideoCandidate,
        rank: usize,
        stem: &str,
        output_dir: &Path,
    ) -> Result<ManifestEntry, String> {
        let url = candidate.thumbnail.best_url();
        if url.is_empty() {
            return Err("no thumbnail URL".to_string());
        }
        let output_path = thumbnail_path(output_dir, stem, rank);
        info!(
            "Downloading thumbnail {rank}: {}...",
            candidate.title.chars().take(TITLE_LOG_CHARS).collect::<String>()
        );
        let bytes = self
            .fetcher
            .fetch(url)
            .map_err(|err| format!("failed to download {url}: {err:#}"))?;
        normalize_bytes(&bytes, url, &output_path).map_err(|err| format!("{err:#}"))?;
        Ok(ManifestEntry::for_candidate(
            output_path.display().to_string(),
            candidate,
        ))
    }

    fn emit(&self, event_type: &str, payload: Value) {
        let payload = payload.as_object().cloned().unwrap_or_else(Map::new);
        if let Err(err) = self.events.emit(event_type, payload) {
            warn!("event trace write failed: {err:#}");
        }
    }
}

/// Search, rank, download and normalize; returns the manifest in rank order.
pub fn run_search_pipeline(
    request: &SearchRequest,
    search: &dyn VideoSearch,
    fetcher: &dyn ThumbnailFetcher,
    events: &EventWriter,
) -> Result<Vec<ManifestEntry>> {
    info!("Searching YouTube for: {}", request.query);
    let builder = ManifestBuilder::new(fetcher, events.clone());
    builder.emit(
        "search_started",
        json!({ "query": request.query, "provider": search.name() }),
    );

    let videos = search.search(&request.query)?;
    if !videos.is_empty() {
        info!("Found {} videos", videos.len());
    }
    builder.emit("search_completed", json!({ "count": videos.len() }));

    let ranked = rank_candidates(videos, request.min_views, request.top)?;
    info!("Top {} videos by views:", ranked.len());
    for (idx, candidate) in ranked.iter().enumerate() {
        let title = if candidate.title.is_empty() {
            "Untitled"
        } else {
            candidate.title.as_str()
        };
        info!(
            "  {}. [{} views] {}",
            idx + 1,
            format_views(candidate.view_count),
            title
        );
    }
    builder.emit(
        "candidates_ranked",
        json!({
            "min_views": request.min_views,
            "views": ranked.iter().map(|candidate| candidate.view_count).collect::<Vec<u64>>(),
        }),
    );

    let stem = query_stem(&request.query);
    let outcome = builder.build(&ranked, &stem, &request.output_dir)?;
    let skipped = outcome.skipped.len();
    let entries = outcome.into_entries()?;
    info!(
        "Downloaded {} thumbnails to {}/",
        entries.len(),
        request.output_dir.display()
    );
    builder.emit(
        "manifest_written",
        json!({ "entries": entries.len(), "skipped": skipped }),
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    use anyhow::{anyhow, Result};
    use serde_json::Value;
    use thumbdeck_contracts::candidates::{ThumbnailField, VideoCandidate};
    use thumbdeck_contracts::error::{NoCandidatesReason, PipelineError};
    use thumbdeck_contracts::events::EventWriter;

    use super::{query_stem, run_search_pipeline, thumbnail_path, ManifestBuilder, SearchRequest};
    use crate::normalize::fixtures::noisy_rgba_png;
    use crate::search::{ThumbnailFetcher, VideoSearch};

    struct FakeSearch(Vec<VideoCandidate>);

    impl VideoSearch for FakeSearch {
        fn name(&self) -> &str {
            "fake"
        }

        fn search(&self, _query: &str) -> Result<Vec<VideoCandidate>> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }
    }

    impl ThumbnailFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.requested.borrow_mut().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("404 for {url}"))
        }
    }

    fn video(title: &str, views: u64, thumb: &str) -> VideoCandidate {
        VideoCandidate {
            title: title.to_string(),
            channel: format!("{title} channel"),
            url: format!("https://youtube.com/watch?v={title}"),
            view_count: views,
            thumbnail: if thumb.is_empty() {
                ThumbnailField::Missing
            } else {
                ThumbnailField::Url(thumb.to_string())
            },
        }
    }

    fn html_page() -> Vec<u8> {
        let mut page = b"<!DOCTYPE html><html><title>Sign in</title></html>".to_vec();
        page.resize(2_048, b' ');
        page
    }

    #[test]
    fn html_thumbnail_is_skipped_and_later_candidates_continue() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fetcher = FakeFetcher::default()
            .serve("u1", html_page())
            .serve("u2", noisy_rgba_png(32, 18));
        let ranked = vec![video("first", 300, "u1"), video("second", 200, "u2")];

        let outcome = ManifestBuilder::new(&fetcher, EventWriter::disabled())
            .build(&ranked, "ai-agents", temp.path())?;

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].rank, 1);
        assert!(outcome.skipped[0].reason.contains("HTML"));
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].title, "second");
        assert!(outcome.entries[0].path.ends_with("ai-agents-2.jpg"));
        assert!(!temp.path().join("ai-agents-1.jpg").exists());
        assert!(temp.path().join("ai-agents-2.jpg").exists());
        Ok(())
    }

    #[test]
    fn candidates_without_thumbnail_are_not_fetched() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fetcher = FakeFetcher::default().serve("u2", noisy_rgba_png(16, 9));
        let ranked = vec![video("bare", 50, ""), video("ok", 40, "u2")];

        let outcome = ManifestBuilder::new(&fetcher, EventWriter::disabled())
            .build(&ranked, "q", temp.path())?;

        assert_eq!(fetcher.requested.borrow().as_slice(), ["u2".to_string()]);
        assert_eq!(outcome.skipped[0].reason, "no thumbnail URL");
        assert_eq!(outcome.attempted(), 2);
        Ok(())
    }

    #[test]
    fn repeated_thumbnail_url_is_saved_once() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fetcher = FakeFetcher::default().serve("same", noisy_rgba_png(16, 9));
        let ranked = vec![
            video("original", 900, "same"),
            video("reupload", 800, "same"),
            video("no-thumb", 700, ""),
        ];

        let outcome = ManifestBuilder::new(&fetcher, EventWriter::disabled())
            .build(&ranked, "q", temp.path())?;

        assert_eq!(fetcher.requested.borrow().len(), 1);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].title, "original");
        assert_eq!(outcome.skipped[0].rank, 2);
        assert_eq!(outcome.skipped[0].reason, "duplicate of rank 1");
        assert_eq!(outcome.skipped[1].reason, "no thumbnail URL");
        assert!(!temp.path().join("q-2.jpg").exists());
        Ok(())
    }

    #[test]
    fn all_failures_become_all_downloads_failed() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fetcher = FakeFetcher::default();
        let ranked = vec![video("a", 2, "missing-a"), video("b", 1, "missing-b")];
        let outcome = ManifestBuilder::new(&fetcher, EventWriter::disabled())
            .build(&ranked, "q", temp.path())?;
        let err = outcome.into_entries().unwrap_err();
        assert!(matches!(
            err,
            PipelineError::AllDownloadsFailed { attempted: 2 }
        ));
        Ok(())
    }

    #[test]
    fn pipeline_ranks_downloads_and_traces_events() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let events = EventWriter::new(&events_path, "run-test");
        let search = FakeSearch(vec![
            video("v10k", 10_000, "t0"),
            video("v60k", 60_000, "t1"),
            video("v200k", 200_000, "t2"),
            video("v5k", 5_000, "t3"),
            video("v90k", 90_000, "t4"),
        ]);
        let mut fetcher = FakeFetcher::default();
        for idx in 0..5 {
            fetcher = fetcher.serve(&format!("t{idx}"), noisy_rgba_png(40, 30));
        }
        let request = SearchRequest {
            query: "AI agents".to_string(),
            top: 3,
            min_views: 50_000,
            output_dir: temp.path().join("examples"),
        };

        let entries = run_search_pipeline(&request, &search, &fetcher, &events)?;

        let views = entries.iter().map(|entry| entry.views).collect::<Vec<u64>>();
        assert_eq!(views, vec![200_000, 90_000, 60_000]);
        assert!(entries[0].path.ends_with("ai-agents-1.jpg"));
        assert!(entries[2].path.ends_with("ai-agents-3.jpg"));
        assert_eq!(entries[1].channel, "v90k channel");
        assert_eq!(fetcher.requested.borrow().len(), 3);

        let types = std::fs::read_to_string(&events_path)?
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row["type"].as_str().map(str::to_string))
            .collect::<Vec<String>>();
        assert_eq!(types.first().map(String::as_str), Some("search_started"));
        assert_eq!(types.last().map(String::as_str), Some("manifest_written"));
        assert_eq!(
            types.iter().filter(|kind| *kind == "candidate_downloaded").count(),
            3
        );
        Ok(())
    }

    #[test]
    fn pipeline_surfaces_threshold_filtering() {
        let search = FakeSearch(vec![video("a", 10, "t")]);
        let fetcher = FakeFetcher::default();
        let request = SearchRequest {
            query: "rare".to_string(),
            top: 5,
            min_views: 1_000,
            output_dir: std::env::temp_dir().join("thumbdeck-unused"),
        };
        let err = run_search_pipeline(&request, &search, &fetcher, &EventWriter::disabled())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoCandidates(NoCandidatesReason::BelowThreshold { .. }))
        ));
    }

    #[test]
    fn file_names_follow_query_slug_and_rank() {
        assert_eq!(query_stem("Claude Code tutorial"), "claude-code-tutorial");
        assert_eq!(query_stem("日本語"), "thumbnail");
        assert_eq!(
            thumbnail_path(Path::new("out"), "ai-agents", 4),
            Path::new("out").join("ai-agents-4.jpg")
        );
    }
}
