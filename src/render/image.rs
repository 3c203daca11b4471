use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor};
use crate::model::{Caption, Image};
use crate::sink::{ImagePlacement, OutputBlock, OutputParagraph, OutputRun};
use crate::style::{Alignment, LineSpacing, ParagraphFormat};
use crate::units::Length;

use super::caption::render_caption;
use super::{RenderContext, RenderedFragment};

/// Fit `(width, height)` into the box, keeping the aspect ratio.
pub(crate) fn fit_image(
    width: Length,
    height: Length,
    max_width: Length,
    max_height: Length,
) -> (Length, Length) {
    let (mut w, mut h) = (width, height);
    if w > max_width && w.is_positive() {
        h = h.scale(max_width.as_emu() as f64 / w.as_emu() as f64);
        w = max_width;
    }
    if h > max_height && h.is_positive() {
        w = w.scale(max_height.as_emu() as f64 / h.as_emu() as f64);
        h = max_height;
    }
    (w, h)
}

fn image_paragraph(image: &Image, width: Length, height: Length) -> OutputParagraph {
    let mut out = OutputParagraph::new("Normal");
    out.format = ParagraphFormat {
        space_before: Some(Length::ZERO),
        space_after: Some(Length::ZERO),
        line_spacing: Some(LineSpacing::Multiple(1.0)),
        first_line_indent: Some(Length::ZERO),
        alignment: Some(Alignment::Center),
        keep_next: Some(true),
        ..Default::default()
    };
    out.runs.push(OutputRun::Image(ImagePlacement {
        path: image.path.clone(),
        data: image.data.clone(),
        width,
        height,
        description: image.caption.text.clone().unwrap_or_default(),
    }));
    out
}

/// Image paragraph followed by its caption. When both do not fit, the image
/// shrinks if enough of it survives, otherwise it starts the next page.
pub(super) fn render_image(
    image: &Image,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let (mut width, mut height) = fit_image(
        image.width,
        image.height,
        tracker.max_width(),
        tracker.max_height(),
    );

    let image_format = image_paragraph(image, width, height).format;
    let image_pred = Predecessor::Paragraph(ctx.styles.resolve("Normal", &image_format));
    let caption = Caption::numbered(
        crate::model::Category::Figure,
        image.number,
        image.caption.label.as_deref(),
        image.caption.text.as_deref(),
        false,
    );
    let caption_fragment = render_caption(&caption, Some(&image_pred), tracker, ctx)?;
    let caption_height = caption_fragment.height;

    let remaining = tracker.remaining_height();
    let mut skip = Length::ZERO;
    let mut page_break = false;
    if height + caption_height > remaining {
        let room = remaining - caption_height;
        if height.scale(ctx.rules.image_min_scale) <= room && room.is_positive() {
            let factor = room.as_emu() as f64 / height.as_emu().max(1) as f64;
            width = width.scale(factor);
            height = room;
            log::debug!("image {} shrunk to {:.0}%", image.path.display(), factor * 100.0);
        } else if !tracker.at_page_top() {
            skip = remaining;
            page_break = true;
        }
    }

    let mut paragraph = image_paragraph(image, width, height);
    if page_break {
        paragraph.format.page_break_before = Some(true);
    }
    let resolved = ctx.styles.resolve(&paragraph.style, &paragraph.format);
    let image_fragment = RenderedFragment {
        block: OutputBlock::Paragraph(paragraph),
        height: skip + height,
        starts_next_page: page_break,
        predecessor: Predecessor::Paragraph(resolved),
        toc_entry: None,
    };
    Ok(vec![image_fragment, caption_fragment])
}
