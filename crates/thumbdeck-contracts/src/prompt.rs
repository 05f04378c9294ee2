use std::fmt;

pub const STYLE_GUIDE_HEADER: &str = "BRAND STYLE GUIDE (follow these rules):";

pub const EXAMPLES_DISCLAIMER: &str = "STYLE EXAMPLES:\n\
The final attached images are thumbnails from high-performing YouTube videos on this topic. \
Study their composition, color usage, text placement, and visual hierarchy, then apply those \
patterns to create an ORIGINAL thumbnail. Do NOT copy these thumbnails. Use them as \
inspiration for what works.";

/// Position group of an image in a generation request.
///
/// Variants are declared in attachment order; prompt text refers to images by
/// position, so that order is part of the request contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageRole {
    Headshot,
    Reference,
    StyleExample,
}

impl ImageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageRole::Headshot => "headshot",
            ImageRole::Reference => "reference",
            ImageRole::StyleExample => "style_example",
        }
    }
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final prompt text: caller text, then the style guide, then the examples note.
pub fn compose_prompt_text(prompt: &str, style_guide: Option<&str>, has_examples: bool) -> String {
    let mut text = prompt.to_string();
    if let Some(guide) = style_guide.map(str::trim).filter(|guide| !guide.is_empty()) {
        text.push_str("\n\n");
        text.push_str(STYLE_GUIDE_HEADER);
        text.push('\n');
        text.push_str(guide);
    }
    if has_examples {
        text.push_str("\n\n");
        text.push_str(EXAMPLES_DISCLAIMER);
    }
    text
}
