use markpage::Error;
use markpage::fonts::FontBook;
use markpage::layout::{
    LayoutTracker, PageGeometry, PaginationRules, Predecessor, StyledText, size_paragraph,
};
use markpage::model::Renderable;
use markpage::render::{CaptionLabels, RenderContext};
use markpage::style::{LineSpacing, ParagraphFormat, ResolvedParagraph, StyleSheet};
use markpage::units::Length;

fn spaced(style: &str, before: f64, after: f64) -> ResolvedParagraph {
    StyleSheet::builtin().resolve(
        style,
        &ParagraphFormat {
            space_before: Some(Length::pt(before)),
            space_after: Some(Length::pt(after)),
            ..Default::default()
        },
    )
}

fn text(paragraph: &ResolvedParagraph) -> StyledText {
    let mut text = StyledText::new();
    text.push("Text.", paragraph.font.clone());
    text
}

fn space_before(paragraph: &ResolvedParagraph, previous: Option<Predecessor>) -> Length {
    let fonts = FontBook::builtin();
    size_paragraph(paragraph, &text(paragraph), previous.as_ref(), Length::mm(165.0), &fonts)
        .expect("size")
        .sizing
        .space_before
}

#[test]
fn space_before_collapses_with_previous_space_after() {
    let paragraph = spaced("Normal", 12.0, 0.0);
    assert_eq!(space_before(&paragraph, None), Length::pt(12.0));

    let previous = Predecessor::Paragraph(spaced("Normal", 0.0, 5.0));
    assert_eq!(space_before(&paragraph, Some(previous)), Length::pt(7.0));

    let previous = Predecessor::Paragraph(spaced("Normal", 0.0, 20.0));
    assert_eq!(space_before(&paragraph, Some(previous)), Length::ZERO);

    assert_eq!(
        space_before(&paragraph, Some(Predecessor::Table)),
        Length::pt(12.0)
    );
}

#[test]
fn contextual_spacing_uses_previous_space_after() {
    let styles = StyleSheet::builtin();
    let format = ParagraphFormat {
        space_before: Some(Length::pt(12.0)),
        space_after: Some(Length::pt(5.0)),
        contextual_spacing: Some(true),
        ..Default::default()
    };
    let item = styles.resolve("ListParagraph", &format);
    assert!(item.contextual_spacing);

    let previous = Predecessor::Paragraph(item.clone());
    assert_eq!(space_before(&item, Some(previous)), Length::pt(5.0));

    // Another style in between falls back to the ordinary collapse.
    let previous = Predecessor::Paragraph(spaced("Normal", 0.0, 5.0));
    assert_eq!(space_before(&item, Some(previous)), Length::pt(7.0));
}

#[test]
fn space_before_is_dropped_at_the_top_of_later_pages() {
    let fonts = FontBook::builtin();
    let mut styles = StyleSheet::builtin();
    if let Some(normal) = styles.get_mut("Normal") {
        normal.paragraph.space_before = Some(Length::pt(12.0));
    }
    let rules = PaginationRules::default();
    let labels = CaptionLabels::default();
    let ctx = RenderContext {
        fonts: &fonts,
        styles: &styles,
        rules: &rules,
        labels: &labels,
    };

    let block = Renderable::paragraph("Text.");
    let mut tracker = LayoutTracker::new(&PageGeometry::a4());
    let first = block.render(None, &tracker, &ctx).expect("render")[0].height;

    tracker.break_page();
    assert!(tracker.at_page_top());
    let later = block.render(None, &tracker, &ctx).expect("render")[0].height;

    assert_eq!(first - later, Length::pt(12.0));
}

#[test]
fn exact_line_spacing_becomes_a_multiplier() {
    let fonts = FontBook::builtin();
    let paragraph = StyleSheet::builtin().resolve(
        "Normal",
        &ParagraphFormat {
            line_spacing: Some(LineSpacing::Exact(Length::pt(24.0))),
            ..Default::default()
        },
    );
    let sizing = size_paragraph(&paragraph, &text(&paragraph), None, Length::mm(165.0), &fonts)
        .expect("size")
        .sizing;

    let line_height = fonts.line_height(&paragraph.font);
    assert_eq!(sizing.line_height, line_height);
    let expected = Length::pt(24.0).as_emu() as f64 / line_height.as_emu() as f64;
    assert!((sizing.line_spacing - expected).abs() < 1e-9);
    assert!((sizing.line_pitch().as_emu() - Length::pt(24.0).as_emu()).abs() <= 1);
}

#[test]
fn at_least_line_spacing_is_rejected() {
    let fonts = FontBook::builtin();
    let paragraph = StyleSheet::builtin().resolve(
        "Normal",
        &ParagraphFormat {
            line_spacing: Some(LineSpacing::AtLeast(Length::pt(18.0))),
            ..Default::default()
        },
    );
    let err = size_paragraph(&paragraph, &text(&paragraph), None, Length::mm(165.0), &fonts)
        .unwrap_err();
    assert!(matches!(&err, Error::UnsupportedLineSpacing { style } if style == "Normal"));
    assert_eq!(err.exit_code(), 5);
}
