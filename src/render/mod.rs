//! Per-block sizing and rendering.
//!
//! Every block renders against a borrowed [`LayoutTracker`] and returns the
//! fragments it produced together with the height each consumed; nothing here
//! touches the real cursor.

mod caption;
mod equation;
mod image;
mod list;
mod paragraph;
mod table;
mod toc;

use crate::error::Error;
use crate::fonts::FontBook;
use crate::layout::{LayoutTracker, PageGeometry, PaginationRules, Predecessor, StyledText};
use crate::model::{Inline, Renderable};
use crate::sink::{Link, OutputBlock, OutputParagraph, OutputRun, RunFormat};
use crate::style::{ResolvedParagraph, StyleSheet};
use crate::units::Length;

pub use paragraph::{Placement, place_sized};

const UNSUPPORTED_COLOR: [u8; 3] = [0xFF, 0x00, 0x00];

/// User-facing words inserted into the document.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptionLabels {
    pub figure: String,
    pub table: String,
    pub listing: String,
    pub listing_continuation: String,
    pub contents: String,
}

impl Default for CaptionLabels {
    fn default() -> Self {
        CaptionLabels {
            figure: "Figure".into(),
            table: "Table".into(),
            listing: "Listing".into(),
            listing_continuation: "Continuation of listing".into(),
            contents: "Contents".into(),
        }
    }
}

/// Read-only collaborators shared by all block renderers.
pub struct RenderContext<'a> {
    pub fonts: &'a FontBook,
    pub styles: &'a StyleSheet,
    pub rules: &'a PaginationRules,
    pub labels: &'a CaptionLabels,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedFragment {
    pub block: OutputBlock,
    /// Vertical space consumed, including filler skipped to reach a new page.
    pub height: Length,
    /// Content begins on the page after the cursor's current one.
    pub starts_next_page: bool,
    pub predecessor: Predecessor,
    /// Index of the TOC entry this fragment holds.
    pub toc_entry: Option<usize>,
}

impl RenderedFragment {
    fn paragraph(paragraph: OutputParagraph, resolved: ResolvedParagraph, height: Length) -> Self {
        RenderedFragment {
            block: OutputBlock::Paragraph(paragraph),
            height,
            starts_next_page: false,
            predecessor: Predecessor::Paragraph(resolved),
            toc_entry: None,
        }
    }
}

/// Scratch cursor for blocks that emit several fragments in a row.
struct FragmentRun {
    scratch: LayoutTracker,
    previous: Option<Predecessor>,
    fragments: Vec<RenderedFragment>,
}

impl FragmentRun {
    fn new(tracker: &LayoutTracker, previous: Option<&Predecessor>) -> Self {
        FragmentRun {
            scratch: tracker.clone(),
            previous: previous.cloned(),
            fragments: Vec::new(),
        }
    }

    fn push(&mut self, fragment: RenderedFragment) {
        self.scratch.add_height(fragment.height);
        self.previous = Some(fragment.predecessor.clone());
        self.fragments.push(fragment);
    }

    fn finish(self) -> Vec<RenderedFragment> {
        self.fragments
    }
}

fn text_format(style: &crate::model::TextStyle) -> RunFormat {
    let mut format = RunFormat::default();
    if style.bold {
        format.character.bold = Some(true);
    }
    if style.italic {
        format.character.italic = Some(true);
    }
    if style.strike {
        format.character.strike = Some(true);
    }
    format
}

/// Append inline content as runs; hyphens in body text never break.
pub(crate) fn push_inlines(paragraph: &mut OutputParagraph, inlines: &[Inline], link: Option<&Link>) {
    for inline in inlines {
        let mut base = RunFormat {
            link: link.cloned(),
            style: link.map(|_| "Hyperlink".to_string()),
            ..Default::default()
        };
        match inline {
            Inline::Text { text, style } => {
                let mut format = text_format(style);
                format.link = base.link.take();
                format.style = base.style.take();
                paragraph.push_text_keep_hyphens(text, format);
            }
            Inline::Code(code) | Inline::Math(code) => {
                base.character.italic = Some(true);
                paragraph.push_text_keep_hyphens(code, base);
            }
            Inline::Link { url, children } => {
                push_inlines(paragraph, children, Some(&Link::Url(url.clone())));
            }
            Inline::Reference(reference) => {
                paragraph.push_field(
                    format!("REF {} \\h", reference.name),
                    reference.display(),
                    base,
                );
            }
            Inline::Unsupported(text) => {
                base.character.color = Some(UNSUPPORTED_COLOR);
                paragraph.push_text(text, base);
            }
        }
    }
}

/// Text of a paragraph tagged with the font every run is measured in.
pub(crate) fn styled_text(
    paragraph: &OutputParagraph,
    resolved: &ResolvedParagraph,
    styles: &StyleSheet,
) -> StyledText {
    let mut text = StyledText::new();
    for run in &paragraph.runs {
        match run {
            OutputRun::Text { text: t, format } | OutputRun::Field { text: t, format, .. } => {
                text.push(t, styles.run_font(resolved, &format.character));
            }
            OutputRun::NoBreakHyphen { format } => {
                text.push("\u{2011}", styles.run_font(resolved, &format.character));
            }
            OutputRun::Tab => text.push("\t", resolved.font.clone()),
            _ => {}
        }
    }
    text
}

impl Renderable {
    /// Lay the block out at the tracker's position.
    pub fn render(
        &self,
        previous: Option<&Predecessor>,
        tracker: &LayoutTracker,
        ctx: &RenderContext,
    ) -> Result<Vec<RenderedFragment>, Error> {
        match self {
            Renderable::Paragraph(p) => paragraph::render_paragraph(p, previous, tracker, ctx),
            Renderable::Heading(h) => paragraph::render_heading(h, previous, tracker, ctx),
            Renderable::Image(img) => image::render_image(img, tracker, ctx),
            Renderable::Table(t) => table::render_table(t, previous, tracker, ctx),
            Renderable::Listing(l) => table::render_listing(l, previous, tracker, ctx),
            Renderable::Equation(e) => equation::render_equation(e, previous, tracker, ctx),
            Renderable::List(l) => list::render_list(l, previous, tracker, ctx),
            Renderable::Caption(c) => {
                caption::render_caption(c, previous, tracker, ctx).map(|f| vec![f])
            }
            Renderable::TableOfContents(t) => toc::render_toc(t, previous, tracker, ctx),
            Renderable::PageBreak => paragraph::render_page_break(tracker, ctx),
            Renderable::Unsupported { kind } => {
                paragraph::render_unsupported(kind, previous, tracker, ctx)
            }
        }
    }

    /// Natural height of the block on a page tall enough to hold it whole.
    pub fn size(
        &self,
        previous: Option<&Predecessor>,
        max_width: Length,
        ctx: &RenderContext,
    ) -> Result<Length, Error> {
        let geometry = PageGeometry {
            page_width: max_width,
            page_height: Length::inches(10_000.0),
            margin_top: Length::ZERO,
            margin_bottom: Length::ZERO,
            margin_left: Length::ZERO,
            margin_right: Length::ZERO,
            header: Length::ZERO,
            footer: Length::ZERO,
        };
        let tracker = LayoutTracker::new(&geometry);
        Ok(self
            .render(previous, &tracker, ctx)?
            .iter()
            .map(|f| f.height)
            .sum())
    }
}
