use std::collections::BTreeSet;
use std::ops::Range;

use unicode_linebreak::{BreakOpportunity, linebreaks};

use crate::fonts::{FontBook, FontRequest};
use crate::units::Length;

/// Word narrows inter-word spaces of proportional fonts by this factor when fitting lines.
const SPACE_SQUEEZE: f64 = 0.83;
/// Hard-split chunks of proportional text are measured slightly wide.
const HARD_SPLIT_SLACK: f64 = 1.001;

/// Paragraph text flattened across runs, each byte range tagged with its font.
#[derive(Clone, Debug, Default)]
pub struct StyledText {
    text: String,
    spans: Vec<(Range<usize>, FontRequest)>,
}

impl StyledText {
    pub fn new() -> Self {
        StyledText::default()
    }

    pub fn push(&mut self, text: &str, font: FontRequest) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        self.spans.push((start..self.text.len(), font));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Width of a byte range, each overlapping span measured with its own font.
    pub fn width(&self, range: Range<usize>, fonts: &FontBook) -> Length {
        self.spans
            .iter()
            .filter_map(|(span, font)| {
                let start = span.start.max(range.start);
                let end = span.end.min(range.end);
                (start < end).then(|| fonts.measure_text(font, &self.text[start..end]))
            })
            .sum()
    }
}

/// Break positions: UAX #14 opportunities, minus the ones Word does not take.
fn break_positions(text: &str) -> (BTreeSet<usize>, BTreeSet<usize>) {
    let mut allowed = BTreeSet::new();
    let mut mandatory = BTreeSet::new();
    for (pos, opportunity) in linebreaks(text) {
        if pos >= text.len() {
            continue;
        }
        let before = text[..pos].chars().next_back();
        let after = text[pos..].chars().next();
        if before == Some('/') {
            continue;
        }
        if after == Some('$') && !matches!(before, Some(' ' | '-' | '\u{2014}' | '\u{2013}')) {
            continue;
        }
        match opportunity {
            BreakOpportunity::Mandatory => mandatory.insert(pos),
            BreakOpportunity::Allowed => allowed.insert(pos),
        };
    }
    (allowed, mandatory)
}

fn trailing_whitespace(s: &str) -> usize {
    s.chars().rev().take_while(|c| c.is_whitespace()).count()
}

/// Split paragraph text into the visual lines Word would produce.
///
/// `max_width` is the width of every line; `first_line_indent` is consumed
/// from the first line only. Lines come back right-trimmed.
pub fn split_lines(
    text: &StyledText,
    base_font: &FontRequest,
    max_width: Length,
    first_line_indent: Length,
    fonts: &FontBook,
) -> Vec<String> {
    let s = text.as_str();
    if s.is_empty() {
        return vec![String::new()];
    }

    let mono = fonts.is_monospace(base_font);
    let space = fonts.measure_text(base_font, " ");
    let space = if mono { space } else { space.scale(SPACE_SQUEEZE) };
    let slack = if mono { 1.0 } else { HARD_SPLIT_SLACK };

    let (allowed, mandatory) = break_positions(s);
    let mut bounds: Vec<usize> = allowed.union(&mandatory).copied().collect();
    bounds.push(s.len());

    let mut lines: Vec<String> = vec![String::new()];
    let mut line_width = first_line_indent;
    let mut start = 0usize;

    for end in bounds {
        if end <= start {
            continue;
        }
        let unit = &s[start..end];
        let spaces = trailing_whitespace(unit);
        let ink_end = end - unit.chars().rev().take(spaces).map(char::len_utf8).sum::<usize>();
        let no_space_width = text.width(start..ink_end, fonts);
        let width = no_space_width + space * spaces as i64;

        if no_space_width <= max_width - line_width {
            if let Some(last) = lines.last_mut() {
                last.push_str(unit);
            }
            line_width += width;
        } else if no_space_width > max_width {
            if lines.last().is_some_and(String::is_empty) {
                lines.pop();
            }
            let chars: Vec<(usize, char)> = unit.char_indices().collect();
            let mut i = 0usize;
            for j in 1..=chars.len() {
                let byte_j = chars.get(j).map_or(unit.len(), |&(b, _)| b);
                let byte_i = chars[i].0;
                let chunk = text.width(start + byte_i..start + byte_j, fonts).scale(slack);
                let limit = if lines.is_empty() {
                    max_width - first_line_indent
                } else {
                    max_width
                };
                if chunk > limit && j - 1 > i {
                    let byte_prev = chars[j - 1].0;
                    lines.push(unit[byte_i..byte_prev].to_string());
                    i = j - 1;
                }
            }
            let rest_start = chars[i].0;
            lines.push(unit[rest_start..].to_string());
            line_width = text.width(start + rest_start..end, fonts);
        } else {
            lines.push(unit.to_string());
            line_width = width;
        }

        if mandatory.contains(&end) {
            lines.push(String::new());
            line_width = Length::ZERO;
        }
        start = end;
    }

    for line in &mut lines {
        let trimmed = line.trim_end().len();
        line.truncate(trimmed);
    }
    lines
}
