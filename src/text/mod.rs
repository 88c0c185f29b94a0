//! # Line Breaking
//!
//! Greedy, single-pass wrapping of a text run into lines that fit a width.
//!
//! Explicit newlines split the text into paragraphs first. Within a
//! paragraph the font service is asked how many leading characters fit. If
//! the whole remainder fits it becomes the last line of the paragraph.
//! Otherwise we look backward from the fitting boundary for the rightmost
//! break character (space or hyphen), including the character sitting right
//! on the boundary, and end the line just after it. A word with no break
//! character in reach is cut hard at the boundary.
//!
//! There is no look-ahead and no balancing between lines.

use std::str::Split;

use crate::error::LayoutError;
use crate::font::{FontRef, FontService};

/// Characters a line may end after.
pub const BREAK_CHARS: [char; 2] = [' ', '-'];

pub fn is_break_char(ch: char) -> bool {
    BREAK_CHARS.contains(&ch)
}

/// One line produced by the breaker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenLine<'a> {
    pub text: &'a str,
    /// The line ended because the paragraph did not fit, not because the
    /// paragraph ended.
    pub wrapped: bool,
}

/// Find where to end a line whose first `boundary` characters fit.
///
/// Returns the number of characters to keep on the line: one past the
/// rightmost break character at positions `1..=boundary`. Position 0 is
/// never a break point, so a line always keeps at least one character.
pub fn find_break(text: &str, boundary: usize) -> Option<usize> {
    let window: Vec<char> = text.chars().take(boundary + 1).collect();
    (1..window.len())
        .rev()
        .find(|&i| is_break_char(window[i]))
        .map(|i| i + 1)
}

/// Byte offset of the `n`th character of `text`.
fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Lazily produced lines of one text run. Consumed once.
///
/// Yields an error, then stops, if the font service fails.
pub struct Lines<'a, F: FontService + ?Sized> {
    fonts: &'a F,
    font: &'a FontRef,
    size: f64,
    width: f64,
    paragraphs: Split<'a, char>,
    remainder: Option<&'a str>,
    failed: bool,
}

/// Break `text` into lines no wider than `available_width`.
pub fn break_lines<'a, F: FontService + ?Sized>(
    fonts: &'a F,
    text: &'a str,
    available_width: f64,
    font: &'a FontRef,
    size: f64,
) -> Lines<'a, F> {
    Lines {
        fonts,
        font,
        size,
        width: available_width,
        paragraphs: text.split('\n'),
        remainder: None,
        failed: false,
    }
}

impl<'a, F: FontService + ?Sized> Lines<'a, F> {
    fn next_line(&self, rest: &'a str) -> Result<(BrokenLine<'a>, Option<&'a str>), LayoutError> {
        let fit = self
            .fonts
            .chars_that_fit(self.font, rest, self.width, self.size)?;
        if fit >= rest.chars().count() {
            return Ok((
                BrokenLine {
                    text: rest,
                    wrapped: false,
                },
                None,
            ));
        }

        let keep = find_break(rest, fit).unwrap_or_else(|| fit.max(1));
        let (line, tail) = rest.split_at(byte_offset(rest, keep));
        let tail = if tail.is_empty() { None } else { Some(tail) };
        Ok((
            BrokenLine {
                text: line,
                wrapped: true,
            },
            tail,
        ))
    }
}

impl<'a, F: FontService + ?Sized> Iterator for Lines<'a, F> {
    type Item = Result<BrokenLine<'a>, LayoutError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let rest = match self.remainder.take() {
            Some(rest) => rest,
            None => self.paragraphs.next()?,
        };
        match self.next_line(rest) {
            Ok((line, tail)) => {
                self.remainder = tail;
                Some(Ok(line))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
