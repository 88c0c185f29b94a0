//! Advance widths and bounding boxes for the built-in PDF base fonts.
//!
//! Values are the published AFM metrics, in units of 1/1000 em. Only the
//! printable ASCII range is tabulated; other characters use the font's
//! default advance.

use super::EmBox;

/// Metrics for one of the standard PDF fonts.
#[derive(Debug, Clone, Copy)]
pub struct StandardFontMetrics {
    /// Advances for chars 32..=126.
    widths: &'static [u16; 95],
    default_width: u16,
    /// FontBBox lower-left y.
    bbox_bottom: i16,
    /// FontBBox upper-right y.
    bbox_top: i16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in points at `font_size`.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let units = match ch as u32 {
            code @ 32..=126 => self.widths[(code - 32) as usize],
            _ => self.default_width,
        };
        units as f64 * font_size / 1000.0
    }

    /// Width of `text` in points at `font_size`.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }

    pub fn em_box(&self) -> EmBox {
        EmBox {
            ascent: self.bbox_top as f64,
            descent: self.bbox_bottom as f64,
        }
    }
}

#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    // space ! " # $ % & ' ( ) * + , - . /
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    // 0-9
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    // : ; < = > ? @
    278, 278, 584, 584, 584, 556, 1015,
    // A-Z
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    // [ \ ] ^ _ `
    278, 278, 278, 469, 556, 333,
    // a-z
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    // { | } ~
    334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

static COURIER_WIDTHS: [u16; 95] = [600; 95];

pub(super) const HELVETICA: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_WIDTHS,
    default_width: 556,
    bbox_bottom: -225,
    bbox_top: 931,
};

pub(super) const HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &HELVETICA_BOLD_WIDTHS,
    default_width: 556,
    bbox_bottom: -228,
    bbox_top: 962,
};

pub(super) const COURIER: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    default_width: 600,
    bbox_bottom: -250,
    bbox_top: 805,
};

pub(super) const COURIER_BOLD: StandardFontMetrics = StandardFontMetrics {
    widths: &COURIER_WIDTHS,
    default_width: 600,
    bbox_bottom: -250,
    bbox_top: 801,
};
