use crate::error::Error;
use crate::fonts::FontBook;
use crate::style::{LineSpacing, ResolvedParagraph};
use crate::units::Length;

use super::Predecessor;
use super::line_breaker::{StyledText, split_lines};

/// Vertical metrics of a paragraph that has been broken into lines.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParagraphSizing {
    pub space_before: Length,
    pub lines: u32,
    pub line_height: Length,
    pub line_spacing: f64,
    pub space_after: Length,
}

impl ParagraphSizing {
    /// Distance between consecutive baselines.
    pub fn line_pitch(&self) -> Length {
        self.line_height.scale(self.line_spacing)
    }

    pub fn full_height(&self) -> Length {
        self.space_before
            + self.line_height.scale(self.line_spacing * self.lines as f64)
            + self.space_after
    }

    /// Height from the top of the box to the bottom of line `k` (1-based).
    pub fn height_through_line(&self, k: u32) -> Length {
        let k = k.max(1) as f64;
        self.space_before + self.line_height.scale((k - 1.0) * self.line_spacing + 1.0)
    }

    /// Height of `n` lines with both paragraph spacings.
    pub fn height_of_lines(&self, n: u32) -> Length {
        self.space_before + self.line_pitch() * n as i64 + self.space_after
    }

    /// Lines whose bottom edge lies within `available`.
    pub fn fitting_lines(&self, available: Length) -> u32 {
        (1..=self.lines)
            .take_while(|&k| self.height_through_line(k) <= available)
            .count() as u32
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizedParagraph {
    pub lines: Vec<String>,
    pub sizing: ParagraphSizing,
}

/// Effective space-before after collapsing with the previous paragraph's space-after.
fn collapsed_space_before(paragraph: &ResolvedParagraph, previous: Option<&Predecessor>) -> Length {
    match previous {
        Some(Predecessor::Paragraph(prev)) => {
            if paragraph.contextual_spacing && prev.style_id == paragraph.style_id {
                prev.space_after
            } else {
                (paragraph.space_before - prev.space_after).clamp_min_zero()
            }
        }
        _ => paragraph.space_before,
    }
}

/// Break `text` into lines within `max_width` and derive the paragraph's heights.
pub fn size_paragraph(
    paragraph: &ResolvedParagraph,
    text: &StyledText,
    previous: Option<&Predecessor>,
    max_width: Length,
    fonts: &FontBook,
) -> Result<SizedParagraph, Error> {
    let line_width = max_width - paragraph.left_indent - paragraph.right_indent;
    let lines = split_lines(
        text,
        &paragraph.font,
        line_width,
        paragraph.first_line_indent,
        fonts,
    );

    let line_height = fonts.line_height(&paragraph.font);
    let line_spacing = match paragraph.line_spacing {
        LineSpacing::Multiple(m) => m,
        LineSpacing::Exact(h) => h.as_emu() as f64 / line_height.as_emu().max(1) as f64,
        LineSpacing::AtLeast(_) => {
            return Err(Error::UnsupportedLineSpacing {
                style: paragraph.style_id.clone(),
            });
        }
    };

    let sizing = ParagraphSizing {
        space_before: collapsed_space_before(paragraph, previous),
        lines: lines.len() as u32,
        line_height,
        line_spacing,
        space_after: paragraph.space_after,
    };
    Ok(SizedParagraph { lines, sizing })
}
