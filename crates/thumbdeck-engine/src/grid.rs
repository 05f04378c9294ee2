use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::warn;
use thumbdeck_contracts::error::PipelineError;

use crate::fonts::{blend_at, FontChain, LabelFont};
use crate::normalize::read_image_file;

pub const GRID_CELLS: usize = 4;
pub const GRID_GAP: u32 = 8;
pub const GRID_BACKGROUND: Rgba<u8> = Rgba([20, 20, 20, 255]);
pub const DEFAULT_LABELS: [&str; GRID_CELLS] = ["A", "B", "C", "D"];
pub const GRID_JPEG_QUALITY: u8 = 95;

const BADGE_MIN_FONT_PX: u32 = 28;
const BADGE_FONT_DIVISOR: u32 = 20;
const BADGE_PADDING: u32 = 12;
const BADGE_MARGIN: u32 = 16;
const BADGE_RADIUS: u32 = 8;
const BADGE_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeLayout {
    pub font_px: u32,
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

/// Font size for a cell of the given width: ~5% of it, never below 28px.
pub fn badge_font_px(cell_width: u32) -> u32 {
    (cell_width / BADGE_FONT_DIVISOR).max(BADGE_MIN_FONT_PX)
}

/// Quadrant origins in placement order: TL, TR, BL, BR.
pub fn quadrant_origins(cell_width: u32, cell_height: u32) -> [(u32, u32); GRID_CELLS] {
    [
        (0, 0),
        (cell_width + GRID_GAP, 0),
        (0, cell_height + GRID_GAP),
        (cell_width + GRID_GAP, cell_height + GRID_GAP),
    ]
}

pub struct GridComposer {
    font: LabelFont,
}

impl GridComposer {
    pub fn new(font: LabelFont) -> Self {
        Self { font }
    }

    pub fn with_system_fonts() -> Self {
        Self::new(FontChain::system_default().resolve())
    }

    /// Compose up to four images into one opaque 2×2 grid sized from the first.
    pub fn compose(&self, images: &[DynamicImage], labels: &[String]) -> Result<DynamicImage> {
        let Some(first) = images.first() else {
            return Err(PipelineError::invalid_image("grid", "no images to combine").into());
        };
        if images.len() != GRID_CELLS {
            warn!(
                "Expected {GRID_CELLS} images, got {}. Grid may look uneven.",
                images.len()
            );
        }
        let (cell_w, cell_h) = (first.width(), first.height());
        let mut canvas = RgbaImage::from_pixel(
            cell_w * 2 + GRID_GAP,
            cell_h * 2 + GRID_GAP,
            GRID_BACKGROUND,
        );

        let origins = quadrant_origins(cell_w, cell_h);
        for (idx, (image, origin)) in images.iter().zip(origins).enumerate() {
            let mut cell = if image.width() == cell_w && image.height() == cell_h {
                image.to_rgba8()
            } else {
                image
                    .resize_exact(cell_w, cell_h, FilterType::Lanczos3)
                    .to_rgba8()
            };
            if let Some(label) = labels.get(idx) {
                self.draw_badge(&mut cell, label);
            }
            imageops::replace(&mut canvas, &cell, i64::from(origin.0), i64::from(origin.1));
        }

        Ok(DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()))
    }

    pub fn badge_layout(&self, cell_width: u32, label: &str) -> BadgeLayout {
        let font_px = badge_font_px(cell_width);
        let extent = self.font.measure(label, font_px as f32);
        BadgeLayout {
            font_px,
            x0: BADGE_MARGIN,
            y0: BADGE_MARGIN,
            x1: BADGE_MARGIN + extent.width + BADGE_PADDING * 2,
            y1: BADGE_MARGIN + extent.height + BADGE_PADDING * 2,
        }
    }

    fn draw_badge(&self, cell: &mut RgbaImage, label: &str) {
        let layout = self.badge_layout(cell.width(), label);
        fill_rounded_rect(cell, layout, BADGE_RADIUS, BADGE_FILL);
        self.font.draw(
            cell,
            label,
            layout.font_px as f32,
            (layout.x0 + BADGE_PADDING) as i32,
            (layout.y0 + BADGE_PADDING) as i32,
            LABEL_COLOR,
        );
    }
}

/// Inclusive-coordinate rounded rectangle, clipped to the image.
fn fill_rounded_rect(image: &mut RgbaImage, layout: BadgeLayout, radius: u32, fill: Rgba<u8>) {
    let radius = radius
        .min((layout.x1 - layout.x0) / 2)
        .min((layout.y1 - layout.y0) / 2) as i64;
    let (x0, y0, x1, y1) = (
        i64::from(layout.x0),
        i64::from(layout.y0),
        i64::from(layout.x1),
        i64::from(layout.y1),
    );
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = (x0 + radius - x).max(x - (x1 - radius)).max(0);
            let dy = (y0 + radius - y).max(y - (y1 - radius)).max(0);
            if dx * dx + dy * dy <= radius * radius {
                blend_at(image, x as i32, y as i32, fill);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CombineRequest {
    pub images: Vec<PathBuf>,
    pub labels: Vec<String>,
    pub output: PathBuf,
}

/// Load, compose and save a comparison grid. Every input must exist.
pub fn combine_files(request: &CombineRequest, composer: &GridComposer) -> Result<PathBuf> {
    let mut images = Vec::with_capacity(request.images.len());
    for path in &request.images {
        let bytes = read_image_file(path)?;
        let image = image::load_from_memory(&bytes).map_err(|err| {
            PipelineError::invalid_image(
                path.display().to_string(),
                format!("decode failed: {err}"),
            )
        })?;
        images.push(image);
    }
    let grid = composer.compose(&images, &request.labels)?;
    save_opaque(&grid, &request.output)?;
    Ok(request.output.clone())
}

/// Save by extension; JPEG gets the grid quality setting.
pub fn save_opaque(image: &DynamicImage, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let rgb = image.to_rgb8();
    let format = ImageFormat::from_path(output).unwrap_or(ImageFormat::Png);
    if format == ImageFormat::Jpeg {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, GRID_JPEG_QUALITY).encode_image(&rgb)?;
        fs::write(output, bytes)
            .with_context(|| format!("failed to write {}", output.display()))?;
        return Ok(());
    }
    rgb.save_with_format(output, format)
        .with_context(|| format!("failed to save {}", output.display()))?;
    Ok(())
}
