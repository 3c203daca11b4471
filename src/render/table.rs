use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor, size_paragraph};
use crate::model::{Caption, Category, Listing, Table};
use crate::sink::{
    CellMargins, OutputBlock, OutputCell, OutputParagraph, OutputRow, OutputTable, RunFormat,
};
use crate::style::Alignment;
use crate::units::Length;

use super::caption::render_caption;
use super::paragraph::{Placement, place_paragraph};
use super::{FragmentRun, RenderContext, RenderedFragment, push_inlines, styled_text};

const TAB_WIDTH: usize = 4;

/// Widen columns to their longest unbreakable word, taking the space from
/// columns that have slack and keeping the total width.
fn auto_fit_columns(mut widths: Vec<Length>, min_widths: &[Length]) -> Vec<Length> {
    let total: Length = widths.iter().copied().sum();
    let mut extra_needed = Length::ZERO;
    let mut shrinkable = Length::ZERO;
    for (w, &min) in widths.iter_mut().zip(min_widths) {
        if min > *w {
            extra_needed += min - *w;
            *w = min;
        } else {
            shrinkable += *w - min;
        }
    }

    if extra_needed.is_positive() && shrinkable.is_positive() {
        let factor = extra_needed.min(shrinkable).as_emu() as f64 / shrinkable.as_emu() as f64;
        for (w, &min) in widths.iter_mut().zip(min_widths) {
            if *w > min {
                *w -= (*w - min).scale(factor);
            }
        }
    }

    let new_total: Length = widths.iter().copied().sum();
    if new_total != total && new_total.is_positive() {
        let ratio = total.as_emu() as f64 / new_total.as_emu() as f64;
        for w in widths.iter_mut() {
            *w = w.scale(ratio);
        }
        let rounded: Length = widths.iter().copied().sum();
        if let Some(last) = widths.last_mut() {
            *last += total - rounded;
        }
    }
    widths
}

fn longest_word(paragraph: &OutputParagraph, ctx: &RenderContext) -> Length {
    let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);
    let text = styled_text(paragraph, &resolved, ctx.styles);
    text.as_str()
        .split_whitespace()
        .map(|word| ctx.fonts.measure_text(&resolved.font, word))
        .max()
        .unwrap_or(Length::ZERO)
}

fn cell_paragraph(inlines: &[crate::model::Inline], alignment: Alignment) -> OutputParagraph {
    let mut out = OutputParagraph::new("TableText");
    out.format.alignment = Some(alignment);
    push_inlines(&mut out, inlines, None);
    out
}

/// Height of a cell's paragraphs stacked in a column of `width`.
fn cell_height(
    paragraphs: &[OutputParagraph],
    width: Length,
    margins: &CellMargins,
    ctx: &RenderContext,
) -> Result<Length, Error> {
    let inner = width - margins.left - margins.right;
    let mut height = margins.top + margins.bottom;
    let mut previous = None;
    for paragraph in paragraphs {
        let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);
        let text = styled_text(paragraph, &resolved, ctx.styles);
        let sized = size_paragraph(&resolved, &text, previous.as_ref(), inner, ctx.fonts)?;
        height += sized.sizing.full_height();
        previous = Some(Predecessor::Paragraph(resolved));
    }
    Ok(height)
}

/// Caption above, then rows placed one by one. Rows never split; a row that
/// does not fit starts the next page under a repeated header row.
pub(super) fn render_table(
    table: &Table,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut run = FragmentRun::new(tracker, previous);
    let caption = Caption::numbered(
        Category::Table,
        table.number,
        table.caption.label.as_deref(),
        table.caption.text.as_deref(),
        true,
    );
    let fragment = render_caption(&caption, run.previous.as_ref(), &run.scratch, ctx)?;
    run.push(fragment);

    let columns = table.columns();
    if columns == 0 {
        return Ok(run.finish());
    }

    let margins = CellMargins::default();
    let rows: Vec<OutputRow> = table
        .rows
        .iter()
        .map(|row| OutputRow {
            cells: (0..columns)
                .map(|i| {
                    let alignment = table.alignments.get(i).copied().unwrap_or(Alignment::Left);
                    let inlines = row.cells.get(i).map(Vec::as_slice).unwrap_or(&[]);
                    OutputCell {
                        paragraphs: vec![cell_paragraph(inlines, alignment)],
                    }
                })
                .collect(),
            header: row.header,
            cant_split: true,
        })
        .collect();

    let max_width = tracker.max_width();
    let equal = Length::emu(max_width.as_emu() / columns as i64);
    let mut min_widths = vec![Length::ZERO; columns];
    for row in &rows {
        for (i, cell) in row.cells.iter().enumerate() {
            for paragraph in &cell.paragraphs {
                let word = longest_word(paragraph, ctx) + margins.left + margins.right;
                min_widths[i] = min_widths[i].max(word);
            }
        }
    }
    let mut widths = vec![equal; columns];
    if let Some(last) = widths.last_mut() {
        *last += max_width - equal * columns as i64;
    }
    let widths = auto_fit_columns(widths, &min_widths);

    let mut row_heights = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut height = Length::ZERO;
        for (cell, &width) in row.cells.iter().zip(&widths) {
            height = height.max(cell_height(&cell.paragraphs, width, &margins, ctx)?);
        }
        row_heights.push(height);
    }
    let header_height: Length = rows
        .iter()
        .zip(&row_heights)
        .take_while(|(r, _)| r.header)
        .map(|(_, &h)| h)
        .sum();
    let header_rows = rows.iter().take_while(|r| r.header).count();

    let mut cursor = run.scratch.clone();
    let mut consumed = Length::ZERO;
    let mut starts_next_page = false;
    for (i, &height) in row_heights.iter().enumerate() {
        if height > cursor.remaining_height() && !cursor.at_page_top() {
            consumed += cursor.remaining_height();
            cursor.break_page();
            if i == 0 {
                starts_next_page = true;
            } else if i >= header_rows {
                consumed += header_height;
                cursor.add_height(header_height);
            }
        }
        cursor.add_height(height);
        consumed += height;
    }
    log::debug!(
        "table: {} rows, {} columns, height {}, ends on page {}",
        rows.len(),
        columns,
        consumed,
        cursor.page()
    );

    run.push(RenderedFragment {
        block: OutputBlock::Table(OutputTable {
            column_widths: widths,
            rows,
            borders: true,
            cell_margins: margins,
        }),
        height: consumed,
        starts_next_page,
        predecessor: Predecessor::Table,
        toc_entry: None,
    });
    Ok(run.finish())
}

fn listing_table(paragraphs: Vec<OutputParagraph>, width: Length, height: Length) -> RenderedFragment {
    RenderedFragment {
        block: OutputBlock::Table(OutputTable {
            column_widths: vec![width],
            rows: vec![OutputRow {
                cells: vec![OutputCell { paragraphs }],
                header: false,
                cant_split: true,
            }],
            borders: true,
            cell_margins: CellMargins::default(),
        }),
        height,
        starts_next_page: false,
        predecessor: Predecessor::Table,
        toc_entry: None,
    }
}

fn code_paragraph(line: &str) -> OutputParagraph {
    let mut out = OutputParagraph::new("Code");
    out.push_text(&line.replace('\t', &" ".repeat(TAB_WIDTH)), RunFormat::default());
    out
}

/// Code in a bordered single-cell table, one table per page. Every page the
/// listing continues on starts with a continuation caption.
pub(super) fn render_listing(
    listing: &Listing,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut run = FragmentRun::new(tracker, previous);
    let caption = Caption::numbered(
        Category::Listing,
        listing.number,
        listing.caption.label.as_deref(),
        listing.caption.text.as_deref(),
        true,
    );
    let fragment = render_caption(&caption, run.previous.as_ref(), &run.scratch, ctx)?;
    run.push(fragment);

    let margins = CellMargins::default();
    let width = tracker.max_width();
    let inner = width - margins.left - margins.right;
    let code = listing.code.trim_end_matches('\n');
    let lines: Vec<&str> = if code.is_empty() { vec![""] } else { code.split('\n').collect() };

    let mut cursor = run.scratch.clone();
    let mut cell: Vec<OutputParagraph> = Vec::new();
    let mut used = Length::ZERO;
    let mut lead = Length::ZERO;
    let mut cell_previous: Option<Predecessor> = None;

    for line in lines {
        let paragraph = code_paragraph(line.trim_end_matches('\r'));
        let mut placed =
            place_paragraph(paragraph.clone(), cell_previous.as_ref(), &cursor, ctx, inner)?;

        if placed.placement != Placement::Whole && !cursor.at_page_top() {
            let filler = cursor.remaining_height();
            if cell.is_empty() {
                lead += filler;
                cursor.break_page();
            } else {
                let table = listing_table(std::mem::take(&mut cell), width, lead + used + filler);
                run.push(table);
                lead = Length::ZERO;
                used = Length::ZERO;

                let mut continuation = OutputParagraph::new("Caption");
                continuation.format.alignment = Some(Alignment::Left);
                continuation.format.page_break_before = Some(true);
                continuation.push_text(
                    &format!(
                        "{} {}",
                        ctx.labels.listing_continuation,
                        listing.number.map_or_else(|| "?".to_string(), |n| n.to_string())
                    ),
                    RunFormat::default(),
                );
                let placed_caption =
                    place_paragraph(continuation, run.previous.as_ref(), &run.scratch, ctx, width)?;
                run.push(placed_caption.fragment);
                cursor = run.scratch.clone();
            }
            placed = place_paragraph(paragraph.clone(), None, &cursor, ctx, inner)?;
        }

        cursor.add_height(placed.fragment.height);
        used += placed.fragment.height;
        cell_previous = Some(placed.fragment.predecessor);
        cell.push(paragraph);
    }

    if !cell.is_empty() {
        run.push(listing_table(cell, width, lead + used));
    }
    Ok(run.finish())
}
