//! # Font Management
//!
//! Font metrics for layout, and font data for PDF embedding.
//!
//! The layout passes only ever talk to the [`FontService`] trait: an em-box,
//! a "how many characters fit" query and a "how wide is this string" query.
//! [`FontContext`] is the concrete service. It knows the Helvetica and
//! Courier base fonts out of the box and accepts TrueType/OpenType files
//! registered under a family name.

pub mod metrics;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use metrics::StandardFontMetrics;
use serde::{Deserialize, Serialize};

use crate::error::{FolioError, LayoutError};

/// Font ascent/descent in units of 1/1000 em.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmBox {
    pub ascent: f64,
    /// Negative below the baseline.
    pub descent: f64,
}

impl EmBox {
    /// Height of one line of text at `size` points.
    pub fn line_height(&self, size: f64) -> f64 {
        (self.ascent - self.descent).trunc() * size / 1000.0
    }

    /// Distance from the top of a line to its baseline at `size` points.
    pub fn baseline(&self, size: f64) -> f64 {
        self.ascent * size / 1000.0
    }
}

/// Read-only font queries used by measurement and line breaking.
///
/// Implementations must not mutate shared state while answering, so that a
/// single service can be queried from independent subtrees.
pub trait FontService: Send + Sync {
    /// The font's em-box.
    fn em_box(&self, font: &FontRef) -> Result<EmBox, LayoutError>;

    /// Number of leading characters of `text` whose combined advance fits
    /// within `width` at `size` points.
    fn chars_that_fit(
        &self,
        font: &FontRef,
        text: &str,
        width: f64,
        size: f64,
    ) -> Result<usize, LayoutError>;

    /// Advance width of `text` at `size` points.
    fn measure_width(&self, font: &FontRef, text: &str, size: f64) -> Result<f64, LayoutError>;
}

/// Style variant within a font family.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn is_bold(&self) -> bool {
        matches!(self, FontStyle::Bold | FontStyle::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FontStyle::Italic | FontStyle::BoldItalic)
    }
}

impl FromStr for FontStyle {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "regular" | "normal" => Ok(FontStyle::Regular),
            "bold" => Ok(FontStyle::Bold),
            "italic" => Ok(FontStyle::Italic),
            "bolditalic" => Ok(FontStyle::BoldItalic),
            other => Err(LayoutError::invariant(format!(
                "unknown font style '{}'",
                other
            ))),
        }
    }
}

/// Reference to a font: a family name plus a style.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontRef {
    pub family: String,
    pub style: FontStyle,
}

impl FontRef {
    pub fn new(family: &str, style: FontStyle) -> Self {
        Self {
            family: family.to_string(),
            style,
        }
    }

    pub fn regular(family: &str) -> Self {
        Self::new(family, FontStyle::Regular)
    }
}

impl fmt::Display for FontRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            FontStyle::Regular => write!(f, "{}", self.family),
            FontStyle::Bold => write!(f, "{}-Bold", self.family),
            FontStyle::Italic => write!(f, "{}-Italic", self.family),
            FontStyle::BoldItalic => write!(f, "{}-BoldItalic", self.family),
        }
    }
}

/// A font registry that maps family + style to font data.
pub struct FontRegistry {
    fonts: HashMap<FontRef, FontData>,
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType font that is embedded in the output.
    Custom {
        data: Vec<u8>,
        metrics: CustomFontMetrics,
    },
}

impl FontData {
    fn char_width(&self, ch: char, size: f64) -> f64 {
        match self {
            FontData::Standard(std_font) => std_font.metrics().char_width(ch, size),
            FontData::Custom { metrics, .. } => metrics.char_width(ch, size),
        }
    }

    fn em_box(&self) -> EmBox {
        match self {
            FontData::Standard(std_font) => std_font.metrics().em_box(),
            FontData::Custom { metrics, .. } => metrics.em_box(),
        }
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    /// Global bounding box, font units.
    pub y_min: i16,
    pub y_max: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Em-box from the global bounding box, scaled to 1000 units.
    pub fn em_box(&self) -> EmBox {
        let scale = 1000.0 / self.units_per_em as f64;
        EmBox {
            ascent: self.y_max as f64 * scale,
            descent: self.y_min as f64 * scale,
        }
    }

    /// Parse metrics from font data using ttf-parser.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();
        let bbox = face.global_bounding_box();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        let mut default_advance = 0u16;

        for code in 32u32..=0xFFFF {
            if let Some(ch) = char::from_u32(code) {
                if let Some(glyph_id) = face.glyph_index(ch) {
                    let advance = face.glyph_hor_advance(glyph_id).unwrap_or(0);
                    advance_widths.insert(ch, advance);
                    glyph_ids.insert(ch, glyph_id.0);
                    if ch == ' ' {
                        default_advance = advance;
                    }
                }
            }
        }

        if default_advance == 0 {
            default_advance = units_per_em / 2;
        }

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            y_min: bbox.y_min,
            y_max: bbox.y_max,
            glyph_ids,
        })
    }
}

/// The built-in standard PDF fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
            Self::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Self::Courier => "Courier",
            Self::CourierBold => "Courier-Bold",
            Self::CourierOblique => "Courier-Oblique",
            Self::CourierBoldOblique => "Courier-BoldOblique",
        }
    }

    pub fn metrics(&self) -> StandardFontMetrics {
        match self {
            Self::Helvetica | Self::HelveticaOblique => metrics::HELVETICA,
            Self::HelveticaBold | Self::HelveticaBoldOblique => metrics::HELVETICA_BOLD,
            Self::Courier | Self::CourierOblique => metrics::COURIER,
            Self::CourierBold | Self::CourierBoldOblique => metrics::COURIER_BOLD,
        }
    }
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();

        let standard_mappings = [
            (("Helvetica", FontStyle::Regular), StandardFont::Helvetica),
            (("Helvetica", FontStyle::Bold), StandardFont::HelveticaBold),
            (("Helvetica", FontStyle::Italic), StandardFont::HelveticaOblique),
            (("Helvetica", FontStyle::BoldItalic), StandardFont::HelveticaBoldOblique),
            (("Courier", FontStyle::Regular), StandardFont::Courier),
            (("Courier", FontStyle::Bold), StandardFont::CourierBold),
            (("Courier", FontStyle::Italic), StandardFont::CourierOblique),
            (("Courier", FontStyle::BoldItalic), StandardFont::CourierBoldOblique),
        ];

        for ((family, style), font) in standard_mappings {
            fonts.insert(FontRef::new(family, style), FontData::Standard(font));
        }

        Self { fonts }
    }

    /// Look up a font. Families and styles that were never registered are
    /// an error; there is no silent fallback.
    pub fn resolve(&self, font: &FontRef) -> Result<&FontData, LayoutError> {
        if let Some(data) = self.fonts.get(font) {
            return Ok(data);
        }
        let family_known = self.fonts.keys().any(|k| k.family == font.family);
        let reason = if family_known {
            format!("style {:?} is not registered for this family", font.style)
        } else {
            "no such font family".to_string()
        };
        Err(LayoutError::font(font, reason))
    }

    /// Register a custom font from raw TrueType/OpenType bytes.
    pub fn register(&mut self, font: FontRef, data: Vec<u8>) -> Result<(), FolioError> {
        let metrics = CustomFontMetrics::from_font_data(&data)
            .ok_or_else(|| FolioError::Font(format!("'{}' is not a usable TrueType font", font)))?;
        self.fonts.insert(font, FontData::Custom { data, metrics });
        Ok(())
    }
}

/// Shared font context used by layout and PDF serialization.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Load a font file and register it as `family` in `style`.
    pub fn load_font_file(
        &mut self,
        family: &str,
        style: FontStyle,
        path: &Path,
    ) -> Result<(), FolioError> {
        log::info!("Loading font {} ({:?}) from {}", family, style, path.display());
        let data = std::fs::read(path).map_err(|e| {
            FolioError::Font(format!("failed to read '{}': {}", path.display(), e))
        })?;
        self.registry.register(FontRef::new(family, style), data)
    }

    /// Resolve a font reference to its font data.
    pub fn resolve(&self, font: &FontRef) -> Result<&FontData, LayoutError> {
        self.registry.resolve(font)
    }
}

impl FontService for FontContext {
    fn em_box(&self, font: &FontRef) -> Result<EmBox, LayoutError> {
        Ok(self.resolve(font)?.em_box())
    }

    fn chars_that_fit(
        &self,
        font: &FontRef,
        text: &str,
        width: f64,
        size: f64,
    ) -> Result<usize, LayoutError> {
        let data = self.resolve(font)?;
        let mut used = 0.0;
        let mut count = 0;
        for ch in text.chars() {
            used += data.char_width(ch, size);
            if used > width {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    fn measure_width(&self, font: &FontRef, text: &str, size: f64) -> Result<f64, LayoutError> {
        let data = self.resolve(font)?;
        Ok(text.chars().map(|ch| data.char_width(ch, size)).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync + ?Sized>() {}

    #[test]
    fn test_font_service_is_shareable_across_threads() {
        assert_send_sync::<FontContext>();
        assert_send_sync::<dyn FontService>();
    }

    #[test]
    fn test_font_context_helvetica() {
        let ctx = FontContext::new();
        let w = ctx
            .measure_width(&FontRef::regular("Helvetica"), " ", 12.0)
            .unwrap();
        assert!((w - 3.336).abs() < 0.001);
    }

    #[test]
    fn test_font_context_bold_wider() {
        let ctx = FontContext::new();
        let regular = ctx
            .measure_width(&FontRef::regular("Helvetica"), "A", 12.0)
            .unwrap();
        let bold = ctx
            .measure_width(&FontRef::new("Helvetica", FontStyle::Bold), "A", 12.0)
            .unwrap();
        assert!(bold > regular, "Bold A should be wider than regular A");
    }

    #[test]
    fn test_unknown_family_is_an_error() {
        let ctx = FontContext::new();
        let err = ctx
            .measure_width(&FontRef::regular("Garamond"), "A", 12.0)
            .unwrap_err();
        match err {
            LayoutError::FontMetricsUnavailable { font, reason } => {
                assert_eq!(font, "Garamond");
                assert_eq!(reason, "no such font family");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_chars_that_fit_courier() {
        let ctx = FontContext::new();
        let courier = FontRef::regular("Courier");
        // 6pt per char at 10pt
        assert_eq!(ctx.chars_that_fit(&courier, "abcdefgh", 30.0, 10.0).unwrap(), 5);
        assert_eq!(ctx.chars_that_fit(&courier, "abcdefgh", 29.9, 10.0).unwrap(), 4);
        assert_eq!(ctx.chars_that_fit(&courier, "abc", 100.0, 10.0).unwrap(), 3);
        assert_eq!(ctx.chars_that_fit(&courier, "abc", 0.0, 10.0).unwrap(), 0);
    }

    #[test]
    fn test_em_box_line_height() {
        let ctx = FontContext::new();
        let em = ctx.em_box(&FontRef::regular("Courier")).unwrap();
        // (805 - -250) * 10 / 1000
        assert!((em.line_height(10.0) - 10.55).abs() < 1e-9);
        assert!((em.baseline(10.0) - 8.05).abs() < 1e-9);
    }

    #[test]
    fn test_register_rejects_garbage() {
        let mut registry = FontRegistry::new();
        let result = registry.register(FontRef::regular("Broken"), vec![0, 1, 2, 3]);
        assert!(result.is_err());
        assert!(registry.resolve(&FontRef::regular("Broken")).is_err());
    }

    #[test]
    fn test_font_ref_display() {
        assert_eq!(
            FontRef::new("Courier", FontStyle::BoldItalic).to_string(),
            "Courier-BoldItalic"
        );
        assert_eq!("bolditalic".parse::<FontStyle>().unwrap(), FontStyle::BoldItalic);
        assert!("heavy".parse::<FontStyle>().is_err());
    }
}
