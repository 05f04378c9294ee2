use std::env;
use std::fs;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use log::debug;
use rusttype::{point, Font, Scale};

const BITMAP_GLYPH_WIDTH: u32 = 5;
const BITMAP_GLYPH_HEIGHT: u32 = 7;
const BITMAP_ADVANCE: u32 = 6;
/// Nominal em size of the bitmap cell, used to map a pixel size to a scale.
const BITMAP_EM: f32 = 8.0;

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/Helvetica.ttc",
    "/System/Library/Fonts/SFNSMono.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Ink extent of a rendered string, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

pub enum LabelFont {
    Outline(Font<'static>),
    Bitmap,
}

impl LabelFont {
    pub fn is_bitmap(&self) -> bool {
        matches!(self, LabelFont::Bitmap)
    }

    pub fn measure(&self, text: &str, size_px: f32) -> TextExtent {
        match self {
            LabelFont::Outline(font) => match outline_ink_bounds(font, text, size_px) {
                Some((min_x, min_y, max_x, max_y)) => TextExtent {
                    width: (max_x - min_x).max(0) as u32,
                    height: (max_y - min_y).max(0) as u32,
                },
                None => TextExtent::default(),
            },
            LabelFont::Bitmap => {
                let glyphs = text.chars().count() as u32;
                if glyphs == 0 {
                    return TextExtent::default();
                }
                let scale = bitmap_scale(size_px);
                TextExtent {
                    width: ((glyphs - 1) * BITMAP_ADVANCE + BITMAP_GLYPH_WIDTH) * scale,
                    height: BITMAP_GLYPH_HEIGHT * scale,
                }
            }
        }
    }

    /// Draw `text` so the top-left of its ink lands at `(x, y)`.
    pub fn draw(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        size_px: f32,
        x: i32,
        y: i32,
        color: Rgba<u8>,
    ) {
        match self {
            LabelFont::Outline(font) => draw_outline_text(canvas, font, text, size_px, x, y, color),
            LabelFont::Bitmap => draw_bitmap_text(canvas, text, size_px, x, y, color),
        }
    }
}

pub trait FontProvider {
    fn name(&self) -> String;
    fn load(&self) -> Option<LabelFont>;
}

pub struct FontFile {
    path: PathBuf,
}

impl FontFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FontProvider for FontFile {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Option<LabelFont> {
        let bytes = fs::read(&self.path).ok()?;
        Font::try_from_vec_and_index(bytes, 0).map(LabelFont::Outline)
    }
}

pub struct BuiltinBitmapFont;

impl FontProvider for BuiltinBitmapFont {
    fn name(&self) -> String {
        "builtin-5x7".to_string()
    }

    fn load(&self) -> Option<LabelFont> {
        Some(LabelFont::Bitmap)
    }
}

/// Ordered font providers; the first one that loads wins and the built-in
/// bitmap font closes every chain.
pub struct FontChain {
    providers: Vec<Box<dyn FontProvider>>,
}

impl FontChain {
    pub fn new(mut providers: Vec<Box<dyn FontProvider>>) -> Self {
        providers.push(Box::new(BuiltinBitmapFont));
        Self { providers }
    }

    /// `THUMBDECK_LABEL_FONT` first, then well-known system fonts.
    pub fn system_default() -> Self {
        let mut providers: Vec<Box<dyn FontProvider>> = Vec::new();
        if let Some(path) = env::var_os("THUMBDECK_LABEL_FONT").filter(|value| !value.is_empty()) {
            providers.push(Box::new(FontFile::new(path)));
        }
        for candidate in SYSTEM_FONT_CANDIDATES {
            providers.push(Box::new(FontFile::new(*candidate)));
        }
        Self::new(providers)
    }

    pub fn resolve(&self) -> LabelFont {
        for provider in &self.providers {
            if let Some(font) = provider.load() {
                debug!("label font: {}", provider.name());
                return font;
            }
        }
        LabelFont::Bitmap
    }
}

fn outline_ink_bounds(
    font: &Font<'static>,
    text: &str,
    size_px: f32,
) -> Option<(i32, i32, i32, i32)> {
    let scale = Scale::uniform(size_px);
    let ascent = font.v_metrics(scale).ascent;
    font.layout(text, scale, point(0.0, ascent))
        .filter_map(|glyph| glyph.pixel_bounding_box())
        .fold(None, |acc, bb| {
            Some(match acc {
                None => (bb.min.x, bb.min.y, bb.max.x, bb.max.y),
                Some((min_x, min_y, max_x, max_y)) => (
                    min_x.min(bb.min.x),
                    min_y.min(bb.min.y),
                    max_x.max(bb.max.x),
                    max_y.max(bb.max.y),
                ),
            })
        })
}

fn draw_outline_text(
    canvas: &mut RgbaImage,
    font: &Font<'static>,
    text: &str,
    size_px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
) {
    let Some((min_x, min_y, _, _)) = outline_ink_bounds(font, text, size_px) else {
        return;
    };
    let scale = Scale::uniform(size_px);
    let ascent = font.v_metrics(scale).ascent;
    for glyph in font.layout(text, scale, point(0.0, ascent)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = x + bb.min.x - min_x + gx as i32;
            let py = y + bb.min.y - min_y + gy as i32;
            let alpha = (coverage * f32::from(color[3])).round() as u8;
            blend_at(canvas, px, py, Rgba([color[0], color[1], color[2], alpha]));
        });
    }
}

fn bitmap_scale(size_px: f32) -> u32 {
    ((size_px / BITMAP_EM).round() as u32).max(1)
}

fn draw_bitmap_text(
    canvas: &mut RgbaImage,
    text: &str,
    size_px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
) {
    let scale = bitmap_scale(size_px) as i32;
    for (idx, ch) in text.chars().enumerate() {
        let origin_x = x + idx as i32 * BITMAP_ADVANCE as i32 * scale;
        for (row, bits) in bitmap_glyph(ch).iter().enumerate() {
            for col in 0..BITMAP_GLYPH_WIDTH as i32 {
                if bits & (1 << (BITMAP_GLYPH_WIDTH as i32 - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        blend_at(
                            canvas,
                            origin_x + col * scale + dx,
                            y + row as i32 * scale + dy,
                            color,
                        );
                    }
                }
            }
        }
    }
}

pub(crate) fn blend_at(canvas: &mut RgbaImage, x: i32, y: i32, overlay: Rgba<u8>) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
    let alpha = u32::from(overlay[3]);
    if alpha == 0 {
        return;
    }
    for channel in 0..3 {
        let under = u32::from(pixel[channel]);
        let over = u32::from(overlay[channel]);
        pixel[channel] = ((over * alpha + under * (255 - alpha)) / 255) as u8;
    }
    let under_alpha = u32::from(pixel[3]);
    pixel[3] = (alpha + under_alpha * (255 - alpha) / 255).min(255) as u8;
}

/// 5x7 glyph rows, top to bottom; bit 4 is the leftmost column.
fn bitmap_glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        ' ' => [0; 7],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '#' => [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '/' => [0b00001, 0b00010, 0b00010, 0b00100, 0b01000, 0b01000, 0b10000],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
