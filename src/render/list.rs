use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor};
use crate::model::{List, ListItem};
use crate::sink::{OutputParagraph, RunFormat};
use crate::units::Length;

use super::image::render_image;
use super::paragraph::place_paragraph;
use super::{FragmentRun, RenderContext, RenderedFragment, push_inlines};

const BULLET: &str = "\u{2013}";

fn level_indent() -> Length {
    Length::mm(12.5)
}

fn marker(item: &ListItem) -> String {
    if item.ordered {
        format!("{}.", item.index)
    } else {
        BULLET.to_string()
    }
}

fn item_paragraph(item: &ListItem) -> OutputParagraph {
    let mut out = OutputParagraph::new("ListParagraph");
    out.format.left_indent = Some(level_indent() * (item.level.max(1) as i64 - 1));
    out.push_text(&format!("{} ", marker(item)), RunFormat::default());
    push_inlines(&mut out, &item.inlines, None);
    out
}

/// Items as marker-prefixed paragraphs, each followed by its figures.
pub(super) fn render_list(
    list: &List,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let mut run = FragmentRun::new(tracker, previous);
    for item in &list.items {
        let placed = place_paragraph(
            item_paragraph(item),
            run.previous.as_ref(),
            &run.scratch,
            ctx,
            tracker.max_width(),
        )?;
        run.push(placed.fragment);

        for image in &item.images {
            for fragment in render_image(image, &run.scratch, ctx)? {
                run.push(fragment);
            }
        }
    }
    Ok(run.finish())
}
