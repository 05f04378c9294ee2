use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use thumbdeck_contracts::error::PipelineError;

/// Smallest payload that can plausibly be a real image.
pub const MIN_IMAGE_BYTES: usize = 100;
/// Leading bytes scanned for an HTML document signature.
pub const HTML_SNIFF_BYTES: usize = 256;
pub const CANONICAL_JPEG_QUALITY: u8 = 90;
pub const CANONICAL_EXTENSION: &str = "jpg";

const HTML_SIGNATURES: [&[u8]; 2] = [b"<!doctype", b"<html"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes_written: usize,
}

/// Byte-level checks shared by every ingestion path: HTML pages served in
/// place of an image, and payloads too small to hold one.
pub fn inspect_payload(bytes: &[u8], source_label: &str) -> Result<(), PipelineError> {
    if looks_like_html(bytes) {
        return Err(PipelineError::invalid_image(
            source_label,
            "got an HTML page instead of image data",
        ));
    }
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PipelineError::invalid_image(
            source_label,
            format!("payload too small ({} bytes)", bytes.len()),
        ));
    }
    Ok(())
}

fn looks_like_html(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HTML_SNIFF_BYTES)];
    let lowered = head.to_ascii_lowercase();
    HTML_SIGNATURES.iter().any(|signature| {
        lowered
            .windows(signature.len())
            .any(|window| window == *signature)
    })
}

/// Validate and decode, without writing anything.
pub fn decode_checked(bytes: &[u8], source_label: &str) -> Result<DynamicImage, PipelineError> {
    inspect_payload(bytes, source_label)?;
    image::load_from_memory(bytes)
        .map_err(|err| PipelineError::invalid_image(source_label, format!("decode failed: {err}")))
}

pub fn read_image_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !path.is_file() {
        return Err(PipelineError::NotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(fs::read(path)?)
}

/// Re-encode arbitrary image bytes as the canonical JPEG at `output_path`.
pub fn normalize_bytes(
    bytes: &[u8],
    source_label: &str,
    output_path: &Path,
) -> anyhow::Result<NormalizedImage> {
    let decoded = decode_checked(bytes, source_label)?;
    let encoded = encode_canonical(&decoded)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, &encoded)?;
    Ok(NormalizedImage {
        path: output_path.to_path_buf(),
        width: decoded.width(),
        height: decoded.height(),
        bytes_written: encoded.len(),
    })
}

pub fn normalize_file(input: &Path, output_path: &Path) -> anyhow::Result<NormalizedImage> {
    let bytes = read_image_file(input)?;
    normalize_bytes(&bytes, &input.display().to_string(), output_path)
}

pub fn encode_canonical(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, CANONICAL_JPEG_QUALITY);
    encoder.encode_image(&flatten_on_white(image))?;
    Ok(bytes)
}

/// Composite any alpha channel onto white; JPEG cannot carry it.
pub fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            ((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    flattened
}

pub fn encode_png(image: &DynamicImage) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, image::ImageFormat::Png)?;
    Ok(cursor.into_inner())
}
