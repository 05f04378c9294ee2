use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, Rgb, RgbImage};
use log::{info, warn};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use thumbdeck_contracts::error::PipelineError;
use thumbdeck_contracts::events::EventWriter;

use crate::grid::save_opaque;
use crate::http::{response_json_or_error, trimmed_base_url};
use crate::normalize::decode_checked;
use crate::prompt::PromptPayload;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const GEMINI_DEFAULT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub payload: PromptPayload,
    pub model: String,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub images: Vec<ImageBytes>,
    pub notes: String,
}

impl GenerateResponse {
    /// First image, or `NoImageGenerated` carrying whatever text came back.
    pub fn first_image(&self) -> Result<&ImageBytes, PipelineError> {
        self.images
            .first()
            .ok_or_else(|| PipelineError::NoImageGenerated {
                notes: self.notes.clone(),
            })
    }
}

pub trait ImageProvider {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Box<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Box::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<&dyn ImageProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

/// Offline provider: a solid image whose color is derived from the prompt text.
pub struct DryrunProvider {
    width: u32,
}

impl DryrunProvider {
    pub fn new() -> Self {
        Self { width: 1280 }
    }

    /// Height for an `W:H` ratio string; unparseable ratios fall back to 16:9.
    pub fn height_for(&self, aspect_ratio: &str) -> u32 {
        let parsed = aspect_ratio
            .split_once(':')
            .and_then(|(w, h)| Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?)))
            .filter(|(w, h)| *w > 0 && *h > 0);
        let (w, h) = parsed.unwrap_or((16, 9));
        ((u64::from(self.width) * u64::from(h) / u64::from(w)) as u32).max(1)
    }
}

impl Default for DryrunProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let (r, g, b) = color_from_prompt(&request.payload.text, request.payload.images.len());
        let height = self.height_for(&request.aspect_ratio);
        let image = RgbImage::from_pixel(self.width, height, Rgb([r, g, b]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(GenerateResponse {
            images: vec![ImageBytes {
                bytes,
                mime_type: Some("image/png".to_string()),
            }],
            notes: format!(
                "dryrun {} with {} attached image(s)",
                short_id(&request.payload.text),
                request.payload.images.len()
            ),
        })
    }
}

pub struct GeminiProvider {
    api_base: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: trimmed_base_url(env::var("GEMINI_API_BASE").ok(), GEMINI_DEFAULT_BASE),
            api_key: api_key.into(),
            http: HttpClient::new(),
        }
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Request body: prompt text part, then one inline part per image, in order.
    pub fn build_body(request: &GenerateRequest) -> Value {
        let mut parts = vec![json!({ "text": request.payload.text })];
        for image in &request.payload.images {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": BASE64.encode(&image.bytes),
                }
            }));
        }
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": request.aspect_ratio },
            },
        })
    }

    pub fn parse_response(payload: &Value) -> Result<GenerateResponse> {
        let parts = payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut response = GenerateResponse::default();
        for part in parts {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object);
            if let Some(inline) = inline {
                let data = inline
                    .get("data")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if data.is_empty() {
                    continue;
                }
                let bytes = BASE64
                    .decode(data.as_bytes())
                    .context("Gemini image base64 decode failed")?;
                let mime_type = inline
                    .get("mimeType")
                    .or_else(|| inline.get("mime_type"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                response.images.push(ImageBytes { bytes, mime_type });
            } else if let Some(text) = part.get("text").and_then(Value::as_str) {
                response.notes.push_str(text);
            }
        }
        Ok(response)
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let endpoint = self.endpoint_for_model(&request.model);
        let body = Self::build_body(request);
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .timeout(GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let payload = response_json_or_error("Gemini", response)?;
        Self::parse_response(&payload)
    }
}

/// Registry holding the dry-run provider and, when a key is supplied, Gemini.
pub fn provider_registry(gemini_api_key: Option<String>) -> ImageProviderRegistry {
    let mut registry = ImageProviderRegistry::new();
    registry.register(DryrunProvider::new());
    if let Some(key) = gemini_api_key {
        registry.register(GeminiProvider::new(key));
    }
    registry
}

/// Decode the first returned image and write it to `output`.
pub fn save_generated_image(response: &GenerateResponse, output: &Path) -> Result<PathBuf> {
    let first = response.first_image()?;
    let decoded = decode_checked(&first.bytes, "generated image")?;
    save_opaque(&decoded, output)?;
    Ok(output.to_path_buf())
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub path: PathBuf,
    pub notes: String,
}

/// Send one request through `provider` and persist the first image.
pub fn run_generation(
    provider: &dyn ImageProvider,
    request: &GenerateRequest,
    output: &Path,
    events: &EventWriter,
) -> Result<GenerationOutcome> {
    let summary = request_summary(request, provider.name());
    if let Err(err) = events.emit("prompt_assembled", summary) {
        warn!("event trace write failed: {err:#}");
    }
    info!(
        "Generating thumbnail with {} ({} attached image(s))",
        provider.name(),
        request.payload.images.len()
    );

    let response = provider.generate(request)?;
    let path = save_generated_image(&response, output)?;
    info!("Thumbnail saved to: {}", path.display());

    let finished = json!({
        "provider": provider.name(),
        "output": path.display().to_string(),
        "images_returned": response.images.len(),
        "notes_chars": response.notes.chars().count(),
    });
    if let Err(err) = events.emit(
        "generation_finished",
        finished.as_object().cloned().unwrap_or_default(),
    ) {
        warn!("event trace write failed: {err:#}");
    }
    Ok(GenerationOutcome {
        path,
        notes: response.notes,
    })
}

pub fn request_summary(request: &GenerateRequest, provider: &str) -> Map<String, Value> {
    let (headshots, references, examples) = request.payload.role_counts();
    json!({
        "provider": provider,
        "model": request.model,
        "aspect_ratio": request.aspect_ratio,
        "prompt_chars": request.payload.text.chars().count(),
        "headshots": headshots,
        "references": references,
        "examples": examples,
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

fn color_from_prompt(prompt: &str, image_count: usize) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update((image_count as u64).to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

fn short_id(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}
