use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use thumbdeck_contracts::prompt::{compose_prompt_text, ImageRole};

use crate::normalize::{decode_checked, encode_png, read_image_file};

pub const MAX_PROMPT_IMAGE_EDGE: u32 = 2048;

#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub prompt: String,
    pub headshots: Vec<PathBuf>,
    pub references: Vec<PathBuf>,
    pub examples: Vec<PathBuf>,
    pub include_style_guide: bool,
    pub include_examples: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptImage {
    pub role: ImageRole,
    pub source: PathBuf,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Text first, then images in attachment order. Prompt text may refer to
/// images by position ("Image 1", "Image 2", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub text: String,
    pub images: Vec<PromptImage>,
}

impl PromptPayload {
    pub fn role_counts(&self) -> (usize, usize, usize) {
        let count = |role: ImageRole| self.images.iter().filter(|image| image.role == role).count();
        (
            count(ImageRole::Headshot),
            count(ImageRole::Reference),
            count(ImageRole::StyleExample),
        )
    }
}

/// Read a style guide file; a missing or blank file means "no guide".
pub fn load_style_guide(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build the generation payload. Any unreadable or invalid image fails the
/// whole request.
pub fn assemble_prompt(inputs: &PromptInputs, style_guide: Option<&str>) -> Result<PromptPayload> {
    let examples: &[PathBuf] = if inputs.include_examples {
        &inputs.examples
    } else {
        &[]
    };
    let style_guide = style_guide.filter(|_| inputs.include_style_guide);
    let text = compose_prompt_text(&inputs.prompt, style_guide, !examples.is_empty());

    let groups = [
        (ImageRole::Headshot, inputs.headshots.as_slice()),
        (ImageRole::Reference, inputs.references.as_slice()),
        (ImageRole::StyleExample, examples),
    ];
    let mut images = Vec::new();
    for (role, paths) in groups {
        for path in paths {
            images.push(
                load_prompt_image(role, path)
                    .with_context(|| format!("{role} image {} rejected", path.display()))?,
            );
        }
    }
    Ok(PromptPayload { text, images })
}

fn load_prompt_image(role: ImageRole, path: &Path) -> Result<PromptImage> {
    let bytes = read_image_file(path)?;
    let decoded = decode_checked(&bytes, &path.display().to_string())?;
    let resized = cap_longest_edge(decoded, MAX_PROMPT_IMAGE_EDGE);
    Ok(PromptImage {
        role,
        source: path.to_path_buf(),
        mime_type: "image/png",
        bytes: encode_png(&resized)?,
        width: resized.width(),
        height: resized.height(),
    })
}

/// Downscale so neither side exceeds `max_edge`; smaller images pass through.
pub fn cap_longest_edge(image: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let longest = width.max(height);
    if longest <= max_edge {
        return image;
    }
    let ratio = f64::from(max_edge) / f64::from(longest);
    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    image.resize_exact(new_width, new_height, FilterType::Lanczos3)
}
