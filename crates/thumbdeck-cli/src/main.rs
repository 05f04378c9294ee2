use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use thumbdeck_contracts::events::EventWriter;
use thumbdeck_contracts::manifest::manifest_to_json;
use thumbdeck_engine::config::{
    env_value, load_env_files, require_env, resolve_style_guide_path, GEMINI_API_KEY,
    SCRAPECREATORS_API_KEY,
};
use thumbdeck_engine::grid::DEFAULT_LABELS;
use thumbdeck_engine::prompt::load_style_guide;
use thumbdeck_engine::providers::{DEFAULT_ASPECT_RATIO, DEFAULT_GEMINI_MODEL};
use thumbdeck_engine::{
    assemble_prompt, combine_files, provider_registry, run_generation, run_search_pipeline,
    CombineRequest, GenerateRequest, GridComposer, HttpThumbnailFetcher, PromptInputs,
    ScrapeCreatorsSearch, SearchRequest,
};

#[derive(Debug, Parser)]
#[command(name = "thumbdeck", version, about = "YouTube thumbnail research and generation")]
struct Cli {
    /// Debug-level logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download the most-viewed thumbnails for a query and print a manifest.
    Search(SearchArgs),
    /// Arrange up to four images into a labelled 2x2 comparison grid.
    Combine(CombineArgs),
    /// Generate a thumbnail from headshots, references and style examples.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
struct SearchArgs {
    #[arg(long)]
    query: String,
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    top: u64,
    #[arg(long, default_value_t = 0)]
    min_views: u64,
    #[arg(long, default_value = "youtube-thumbnails/examples")]
    output_dir: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct CombineArgs {
    #[arg(long, required = true, num_args = 1..)]
    images: Vec<PathBuf>,
    #[arg(long)]
    output: PathBuf,
    #[arg(long, num_args = 1..)]
    labels: Vec<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long = "headshot", required = true, num_args = 1..)]
    headshots: Vec<PathBuf>,
    #[arg(long = "reference", num_args = 1..)]
    references: Vec<PathBuf>,
    #[arg(long, num_args = 1..)]
    examples: Vec<PathBuf>,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    output: PathBuf,
    #[arg(long)]
    no_style: bool,
    #[arg(long)]
    no_examples: bool,
    #[arg(long)]
    style_guide: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_ASPECT_RATIO)]
    aspect_ratio: String,
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
    model: String,
    #[arg(long, default_value = "gemini", value_parser = ["gemini", "dryrun"])]
    provider: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("thumbdeck error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(path) = load_env_files(None) {
        log::debug!("environment file: {}", path.display());
    }
    match cli.command {
        Command::Search(args) => run_search(args),
        Command::Combine(args) => run_combine(args),
        Command::Generate(args) => run_generate(args),
    }
}

fn init_logging(verbose: bool) {
    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
    );
    clog.init();
}

fn run_search(args: SearchArgs) -> Result<()> {
    let api_key = require_env(SCRAPECREATORS_API_KEY)?;
    let request = SearchRequest {
        query: args.query,
        top: usize::try_from(args.top).unwrap_or(usize::MAX),
        min_views: args.min_views,
        output_dir: args.output_dir,
    };
    let events = EventWriter::for_run(args.events);
    let search = ScrapeCreatorsSearch::new(api_key);
    let fetcher = HttpThumbnailFetcher::new();

    let entries = run_search_pipeline(&request, &search, &fetcher, &events)?;
    println!("{}", manifest_to_json(&entries)?);
    Ok(())
}

fn run_combine(args: CombineArgs) -> Result<()> {
    let labels = combine_labels(args.labels);
    let request = CombineRequest {
        images: args.images,
        labels,
        output: args.output,
    };
    let composer = GridComposer::with_system_fonts();
    let saved = combine_files(&request, &composer)?;
    info!("Grid saved to: {}", saved.display());
    println!("{}", saved.display());
    Ok(())
}

fn combine_labels(labels: Vec<String>) -> Vec<String> {
    if labels.is_empty() {
        DEFAULT_LABELS.iter().map(|label| label.to_string()).collect()
    } else {
        labels
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let style_guide = if args.no_style {
        None
    } else {
        let path = resolve_style_guide_path(args.style_guide.clone());
        let guide = load_style_guide(&path);
        if guide.is_none() {
            warn!("No style guide at {}; continuing without one", path.display());
        }
        guide
    };

    let inputs = PromptInputs {
        prompt: args.prompt,
        headshots: args.headshots,
        references: args.references,
        examples: args.examples,
        include_style_guide: !args.no_style,
        include_examples: !args.no_examples,
    };
    let payload = assemble_prompt(&inputs, style_guide.as_deref())?;

    let gemini_key = if args.provider == "gemini" {
        Some(require_env(GEMINI_API_KEY)?)
    } else {
        env_value(GEMINI_API_KEY)
    };
    let registry = provider_registry(gemini_key);
    let provider = registry
        .get(&args.provider)
        .ok_or_else(|| anyhow!("unknown provider '{}'", args.provider))?;

    let request = GenerateRequest {
        payload,
        model: args.model,
        aspect_ratio: args.aspect_ratio,
    };
    let events = EventWriter::for_run(args.events);
    let outcome = run_generation(provider, &request, &args.output, &events)?;

    println!("{}", outcome.path.display());
    let notes = outcome.notes.trim();
    if !notes.is_empty() {
        println!("Model notes: {notes}");
    }
    Ok(())
}
