use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor, size_paragraph};
use crate::model::{Caption, Category};
use crate::sink::{OutputBlock, OutputParagraph, OutputRun, RunFormat};
use crate::units::Length;

use super::{RenderContext, RenderedFragment, styled_text};

impl Caption {
    pub(super) fn numbered(
        category: Category,
        number: Option<u32>,
        label: Option<&str>,
        text: Option<&str>,
        above: bool,
    ) -> Self {
        Caption {
            category: Some(category),
            number,
            label: label.map(str::to_string),
            text: text.map(str::to_string),
            above,
        }
    }
}

fn category_label<'a>(category: Category, ctx: &'a RenderContext) -> &'a str {
    match category {
        Category::Figure => &ctx.labels.figure,
        Category::Table => &ctx.labels.table,
        Category::Listing => &ctx.labels.listing,
        Category::Equation => "",
    }
}

/// "Figure 3 – text", the number being a SEQ field wrapped in the label's bookmark.
fn caption_paragraph(caption: &Caption, ctx: &RenderContext) -> OutputParagraph {
    let mut out = OutputParagraph::new("Caption");
    let Some(category) = caption.category else {
        if let Some(text) = &caption.text {
            out.push_text(text, RunFormat::default());
        }
        return out;
    };

    out.push_text(
        &format!("{} ", category_label(category, ctx)),
        RunFormat::default(),
    );
    if let Some(label) = &caption.label {
        out.runs.push(OutputRun::BookmarkStart {
            name: label.clone(),
        });
    }
    out.push_field(
        format!("SEQ {} \\* ARABIC", category.name()),
        caption
            .number
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        RunFormat::default(),
    );
    if let Some(label) = &caption.label {
        out.runs.push(OutputRun::BookmarkEnd {
            name: label.clone(),
        });
    }
    if let Some(text) = caption.text.as_deref().filter(|t| !t.is_empty()) {
        out.push_text(&format!(" \u{2013} {text}"), RunFormat::default());
    }
    out
}

/// Captions are never split. One above its content moves to the next page
/// unless it fits together with a few lines of that content.
pub(super) fn render_caption(
    caption: &Caption,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<RenderedFragment, Error> {
    let mut paragraph = caption_paragraph(caption, ctx);
    paragraph.format.space_before = match previous {
        Some(Predecessor::Table) if !tracker.at_page_top() => {
            Some(ctx.rules.caption_gap_after_table)
        }
        _ => None,
    };

    let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);
    let text = styled_text(&paragraph, &resolved, ctx.styles);
    let sized = size_paragraph(&resolved, &text, previous, tracker.max_width(), ctx.fonts)?;
    let sizing = sized.sizing;

    let remaining = tracker.remaining_height();
    let context_lines = sizing.lines + ctx.rules.caption_context_lines;
    let needed = sizing
        .line_height
        .scale((context_lines - 1) as f64 * sizing.line_spacing + 1.0);

    if caption.above && needed > remaining && !tracker.at_page_top() {
        paragraph.format.page_break_before = Some(true);
        paragraph.format.space_before = None;
        let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);
        let text = styled_text(&paragraph, &resolved, ctx.styles);
        let mut sized = size_paragraph(&resolved, &text, None, tracker.max_width(), ctx.fonts)?;
        sized.sizing.space_before = Length::ZERO;
        log::debug!("caption moved to page {}", tracker.page() + 1);
        return Ok(RenderedFragment {
            block: OutputBlock::Paragraph(paragraph),
            height: remaining + sized.sizing.full_height(),
            starts_next_page: true,
            predecessor: Predecessor::Paragraph(resolved),
            toc_entry: None,
        });
    }

    Ok(RenderedFragment::paragraph(
        paragraph,
        resolved,
        sizing.full_height(),
    ))
}
