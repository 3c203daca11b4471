use crate::error::Error;
use crate::layout::{
    LayoutTracker, PaginationRules, ParagraphSizing, Predecessor, SizedParagraph, size_paragraph,
};
use crate::model::{Heading, Paragraph};
use crate::sink::{OutputParagraph, OutputRun, RunFormat};
use crate::style::{LineSpacing, ParagraphFormat};
use crate::toc::format_heading_number;
use crate::units::Length;

use super::{RenderContext, RenderedFragment, UNSUPPORTED_COLOR, push_inlines, styled_text};

/// Where a paragraph goes relative to the bottom of the current page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Placement {
    Whole,
    MoveToNextPage,
    /// Split at the last fitting line; `carried` lines continue on the next page.
    Split { carried: u32 },
}

/// Page-break decision for a sized paragraph and the height it consumes,
/// filler up to the page end included.
pub fn place_sized(
    sizing: &ParagraphSizing,
    remaining: Length,
    rules: &PaginationRules,
) -> (Placement, Length) {
    let lines = sizing.lines;
    let fitting = sizing.fitting_lines(remaining);

    if fitting >= lines {
        return (Placement::Whole, sizing.full_height().min(remaining));
    }
    let left_over = lines - fitting;
    if fitting <= 1 || (left_over == 1 && lines == 3) {
        return (
            Placement::MoveToNextPage,
            remaining + sizing.full_height(),
        );
    }
    let carried = if left_over == 1 {
        rules.widow_carry_lines
    } else {
        left_over
    };
    (
        Placement::Split { carried },
        remaining + sizing.height_of_lines(carried),
    )
}

pub(super) struct PlacedParagraph {
    pub(super) fragment: RenderedFragment,
    pub(super) sized: SizedParagraph,
    pub(super) placement: Placement,
}

/// Size `paragraph` against the tracker and apply the page-break policy.
pub(super) fn place_paragraph(
    mut paragraph: OutputParagraph,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
    max_width: Length,
) -> Result<PlacedParagraph, Error> {
    if matches!(previous, Some(Predecessor::Table)) && paragraph.format.space_before.is_none() {
        paragraph.format.space_before = Some(ctx.rules.gap_after_table);
    }
    let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);

    let mut scratch = tracker.clone();
    let mut skip = Length::ZERO;
    let mut moved = false;
    if resolved.page_break_before && !scratch.at_page_top() {
        skip = scratch.remaining_height();
        scratch.break_page();
        moved = true;
    }

    let text = styled_text(&paragraph, &resolved, ctx.styles);
    let mut sized = size_paragraph(&resolved, &text, previous, max_width, ctx.fonts)?;
    if scratch.at_page_top() && scratch.page() > 1 {
        sized.sizing.space_before = Length::ZERO;
    }

    let (placement, height) = place_sized(&sized.sizing, scratch.remaining_height(), ctx.rules);
    moved |= placement == Placement::MoveToNextPage;
    log::debug!(
        "paragraph {:?}: {} lines, {:?}, height {} on page {}",
        paragraph.style,
        sized.sizing.lines,
        placement,
        skip + height,
        scratch.page(),
    );

    let mut fragment = RenderedFragment::paragraph(paragraph, resolved, skip + height);
    fragment.starts_next_page = moved;
    Ok(PlacedParagraph {
        fragment,
        sized,
        placement,
    })
}

pub(super) fn render_paragraph(
    paragraph: &Paragraph,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut out = OutputParagraph::new("Normal");
    push_inlines(&mut out, &paragraph.inlines, None);
    let placed = place_paragraph(out, previous, tracker, ctx, tracker.max_width())?;
    Ok(vec![placed.fragment])
}

pub(super) fn render_heading(
    heading: &Heading,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let style = format!("Heading{}", heading.level.clamp(1, 9));
    let mut out = OutputParagraph::new(&style);
    if let Some(anchor) = &heading.anchor {
        out.runs.push(OutputRun::BookmarkStart {
            name: anchor.clone(),
        });
    }
    if let Some(number) = heading.number.as_deref().filter(|_| heading.numbered) {
        out.push_text(&format_heading_number(number), RunFormat::default());
    }
    push_inlines(&mut out, &heading.inlines, None);
    if let Some(anchor) = &heading.anchor {
        out.runs.push(OutputRun::BookmarkEnd {
            name: anchor.clone(),
        });
    }

    let mut placed = place_paragraph(out, previous, tracker, ctx, tracker.max_width())?;
    if placed.placement == Placement::Whole && !placed.fragment.starts_next_page {
        // A heading needs room for the first lines of what follows it.
        let body = ctx.styles.resolve("Normal", &ParagraphFormat::default());
        let pitch = match body.line_spacing {
            LineSpacing::Multiple(m) => ctx.fonts.line_height(&body.font).scale(m),
            LineSpacing::Exact(h) | LineSpacing::AtLeast(h) => h,
        };
        let needed = placed.sized.sizing.full_height()
            + pitch * ctx.rules.heading_keep_lines as i64;
        let remaining = tracker.remaining_height();
        if needed > remaining && !tracker.at_page_top() {
            log::debug!(
                "heading {:?} kept with next, moved to page {}",
                heading.text(),
                tracker.page() + 1
            );
            placed.fragment.height = remaining + placed.sized.sizing.full_height();
            placed.fragment.starts_next_page = true;
        }
    }
    Ok(vec![placed.fragment])
}

/// Explicit page break: the break run ends the page and the paragraph mark
/// takes one line on the next.
pub(super) fn render_page_break(
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut out = OutputParagraph::new("Normal");
    out.format.first_line_indent = Some(Length::ZERO);
    out.runs.push(OutputRun::PageBreak);

    let resolved = ctx.styles.resolve(&out.style, &out.format);
    let empty = crate::layout::StyledText::new();
    let mut sized = size_paragraph(&resolved, &empty, None, tracker.max_width(), ctx.fonts)?;
    sized.sizing.space_before = Length::ZERO;

    let height = tracker.remaining_height() + sized.sizing.full_height();
    Ok(vec![RenderedFragment::paragraph(out, resolved, height)])
}

pub(super) fn render_unsupported(
    kind: &str,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut out = OutputParagraph::new("Normal");
    out.push_text(
        &format!("{kind} is not supported"),
        RunFormat::colored(UNSUPPORTED_COLOR),
    );
    let placed = place_paragraph(out, previous, tracker, ctx, tracker.max_width())?;
    Ok(vec![placed.fragment])
}
