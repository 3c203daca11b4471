//! Page cursor tracking and the knobs of the page-break policy.

pub mod line_breaker;
pub mod paragraph;

use crate::style::ResolvedParagraph;
use crate::units::Length;

pub use line_breaker::{StyledText, split_lines};
pub use paragraph::{ParagraphSizing, SizedParagraph, size_paragraph};

#[derive(Clone, Debug, PartialEq)]
pub struct PageGeometry {
    pub page_width: Length,
    pub page_height: Length,
    pub margin_top: Length,
    pub margin_bottom: Length,
    pub margin_left: Length,
    pub margin_right: Length,
    pub header: Length,
    pub footer: Length,
}

impl PageGeometry {
    /// A4 portrait with binding margin on the left.
    pub fn a4() -> Self {
        PageGeometry {
            page_width: Length::mm(210.0),
            page_height: Length::mm(297.0),
            margin_top: Length::mm(20.0),
            margin_bottom: Length::mm(20.0),
            margin_left: Length::mm(30.0),
            margin_right: Length::mm(15.0),
            header: Length::mm(12.5),
            footer: Length::mm(12.5),
        }
    }

    pub fn max_height(&self) -> Length {
        self.page_height - self.margin_top - self.margin_bottom
    }

    pub fn max_width(&self) -> Length {
        self.page_width - self.margin_left - self.margin_right
    }
}

/// The block emitted right before the one being laid out; drives spacing collapse.
#[derive(Clone, Debug, PartialEq)]
pub enum Predecessor {
    Paragraph(ResolvedParagraph),
    Table,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutState {
    page: u32,
    current_page_height: Length,
    max_height: Length,
    max_width: Length,
}

impl LayoutState {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn current_page_height(&self) -> Length {
        self.current_page_height
    }

    pub fn max_height(&self) -> Length {
        self.max_height
    }

    pub fn max_width(&self) -> Length {
        self.max_width
    }

    pub fn remaining_height(&self) -> Length {
        self.max_height - self.current_page_height
    }

    /// Nothing has been placed on the current page yet.
    pub fn at_page_top(&self) -> bool {
        self.current_page_height == Length::ZERO
    }
}

/// Owner of the vertical cursor. Block renderers work on clones and the
/// pipeline folds their fragment heights into the real one.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutTracker {
    state: LayoutState,
}

impl LayoutTracker {
    pub fn new(geometry: &PageGeometry) -> Self {
        let max_height = geometry.max_height().max(Length::pt(1.0));
        let max_width = geometry.max_width().max(Length::pt(1.0));
        LayoutTracker {
            state: LayoutState {
                page: 1,
                current_page_height: Length::ZERO,
                max_height,
                max_width,
            },
        }
    }

    pub fn state(&self) -> &LayoutState {
        &self.state
    }

    pub fn page(&self) -> u32 {
        self.state.page
    }

    pub fn current_page_height(&self) -> Length {
        self.state.current_page_height
    }

    pub fn max_height(&self) -> Length {
        self.state.max_height
    }

    pub fn max_width(&self) -> Length {
        self.state.max_width
    }

    pub fn remaining_height(&self) -> Length {
        self.state.remaining_height()
    }

    pub fn at_page_top(&self) -> bool {
        self.state.at_page_top()
    }

    /// Advance the cursor, rolling over as many pages as the height spans.
    pub fn add_height(&mut self, height: Length) {
        if !height.is_positive() {
            return;
        }
        self.state.current_page_height += height;
        while self.state.current_page_height > self.state.max_height {
            self.state.current_page_height -= self.state.max_height;
            self.state.page += 1;
        }
    }

    /// Start a fresh page regardless of the cursor position.
    pub fn break_page(&mut self) {
        self.state.page += 1;
        self.state.current_page_height = Length::ZERO;
    }
}

/// Empirically tuned thresholds of the page-break policy.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginationRules {
    /// Lines of following content a caption above a block needs on its page.
    pub caption_context_lines: u32,
    /// Smallest fraction of its height an image may be shrunk to instead of moving.
    pub image_min_scale: f64,
    /// Lines carried to the next page when only one would be left over.
    pub widow_carry_lines: u32,
    /// Body lines that must fit below a heading for it to stay on the page.
    pub heading_keep_lines: u32,
    /// Space before a paragraph that directly follows a table.
    pub gap_after_table: Length,
    /// Space before a caption that directly follows a table.
    pub caption_gap_after_table: Length,
}

impl Default for PaginationRules {
    fn default() -> Self {
        PaginationRules {
            caption_context_lines: 3,
            image_min_scale: 0.7,
            widow_carry_lines: 2,
            heading_keep_lines: 2,
            gap_after_table: Length::cm(0.35),
            caption_gap_after_table: Length::cm(0.45),
        }
    }
}
