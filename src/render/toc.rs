use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor};
use crate::model::{TableOfContents, TocEntry};
use crate::sink::{Link, OutputParagraph, OutputRun, RunFormat};
use crate::style::{Alignment, TabAlignment, TabStop};
use crate::toc::format_heading_number;
use crate::units::Length;

use super::paragraph::place_paragraph;
use super::{FragmentRun, RenderContext, RenderedFragment};

const LEVEL_INDENT: &str = "    ";

fn entry_paragraph(entry: &TocEntry, width: Length) -> OutputParagraph {
    let mut out = OutputParagraph::new("Normal");
    out.format.first_line_indent = Some(Length::ZERO);
    out.format.alignment = Some(Alignment::Left);
    out.tab_stops = vec![TabStop {
        position: width,
        alignment: TabAlignment::Right,
        leader: Some('.'),
    }];

    let link = RunFormat {
        link: Some(Link::Anchor(entry.anchor.clone())),
        ..Default::default()
    };
    out.push_text(
        &LEVEL_INDENT.repeat(entry.level.max(1) as usize - 1),
        link.clone(),
    );
    if entry.numbered {
        out.push_text(&format_heading_number(&entry.number), link.clone());
    }
    out.push_text(&entry.text, link.clone());
    out.runs.push(OutputRun::Tab);
    out.push_field(
        format!("PAGEREF {} \\h", entry.anchor),
        entry.page.map_or_else(|| "?".to_string(), |p| p.to_string()),
        link,
    );
    out
}

/// Title followed by one dot-leadered line per heading; page numbers are
/// placeholders until the layout pass has run.
pub(super) fn render_toc(
    toc: &TableOfContents,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let width = tracker.max_width();
    let mut run = FragmentRun::new(tracker, previous);

    let mut title = OutputParagraph::new("TOCHeading");
    title.push_text(&ctx.labels.contents, RunFormat::default());
    let placed = place_paragraph(title, run.previous.as_ref(), &run.scratch, ctx, width)?;
    run.push(placed.fragment);

    for (i, entry) in toc.entries.iter().enumerate() {
        let placed = place_paragraph(
            entry_paragraph(entry, width),
            run.previous.as_ref(),
            &run.scratch,
            ctx,
            width,
        )?;
        let mut fragment = placed.fragment;
        fragment.toc_entry = Some(i);
        run.push(fragment);
    }
    Ok(run.finish())
}
