//! Imaging, HTTP collaborators and pipeline orchestration behind the
//! `thumbdeck` binary.

pub mod config;
pub mod fonts;
pub mod grid;
pub mod http;
pub mod manifest;
pub mod normalize;
pub mod prompt;
pub mod providers;
pub mod search;

pub use grid::{combine_files, CombineRequest, GridComposer};
pub use manifest::{run_search_pipeline, SearchRequest};
pub use prompt::{assemble_prompt, PromptInputs, PromptPayload};
pub use providers::{provider_registry, run_generation, GenerateRequest, ImageProvider};
pub use search::{HttpThumbnailFetcher, ScrapeCreatorsSearch, ThumbnailFetcher, VideoSearch};
