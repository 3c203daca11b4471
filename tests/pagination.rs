mod common;

use common::Fixture;
use markpage::layout::{
    LayoutTracker, PageGeometry, PaginationRules, ParagraphSizing, StyledText, size_paragraph,
};
use markpage::model::{
    Caption, CaptionInfo, Category, Heading, Image, Inline, Listing, Renderable, Table, TableRow,
};
use markpage::render::{Placement, RenderedFragment, place_sized};
use markpage::sink::{OutputBlock, OutputRun, OutputTable};
use markpage::style::ParagraphFormat;
use markpage::units::Length;

fn sizing(lines: u32) -> ParagraphSizing {
    ParagraphSizing {
        space_before: Length::ZERO,
        lines,
        line_height: Length::pt(16.0),
        line_spacing: 1.5,
        space_after: Length::ZERO,
    }
}

#[test]
fn paragraph_that_fits_is_placed_whole() {
    let rules = PaginationRules::default();
    let s = sizing(5);
    let (placement, height) = place_sized(&s, s.full_height() + Length::pt(10.0), &rules);
    assert_eq!(placement, Placement::Whole);
    assert_eq!(height, s.full_height());
}

#[test]
fn single_leftover_line_carries_two() {
    let rules = PaginationRules::default();
    let s = sizing(6);
    // Room for exactly five lines.
    let remaining = s.height_through_line(5);
    assert_eq!(s.fitting_lines(remaining), 5);

    let (placement, height) = place_sized(&s, remaining, &rules);
    assert_eq!(placement, Placement::Split { carried: 2 });
    assert_eq!(height, remaining + s.height_of_lines(2));
}

#[test]
fn several_leftover_lines_carry_as_they_are() {
    let rules = PaginationRules::default();
    let s = sizing(8);
    let remaining = s.height_through_line(4);
    let (placement, _) = place_sized(&s, remaining, &rules);
    assert_eq!(placement, Placement::Split { carried: 4 });
}

#[test]
fn one_fitting_line_moves_the_paragraph() {
    let rules = PaginationRules::default();
    let s = sizing(4);
    let remaining = s.height_through_line(1);
    let (placement, height) = place_sized(&s, remaining, &rules);
    assert_eq!(placement, Placement::MoveToNextPage);
    assert_eq!(height, remaining + s.full_height());
}

#[test]
fn three_line_paragraph_is_never_split_two_one() {
    let rules = PaginationRules::default();
    let s = sizing(3);
    let remaining = s.height_through_line(2);
    let (placement, _) = place_sized(&s, remaining, &rules);
    assert_eq!(placement, Placement::MoveToNextPage);
}

#[test]
fn carried_lines_follow_the_rules() {
    let rules = PaginationRules {
        widow_carry_lines: 3,
        ..Default::default()
    };
    let s = sizing(10);
    let (placement, _) = place_sized(&s, s.height_through_line(9), &rules);
    assert_eq!(placement, Placement::Split { carried: 3 });
}

#[test]
fn tracker_rolls_over_pages() {
    let geometry = PageGeometry::a4();
    let mut tracker = LayoutTracker::new(&geometry);
    assert_eq!(tracker.page(), 1);
    assert!(tracker.at_page_top());

    tracker.add_height(geometry.max_height());
    assert_eq!(tracker.page(), 1);
    assert_eq!(tracker.remaining_height(), Length::ZERO);

    tracker.add_height(Length::pt(10.0));
    assert_eq!(tracker.page(), 2);
    assert_eq!(tracker.current_page_height(), Length::pt(10.0));

    tracker.add_height(Length::ZERO);
    assert_eq!(tracker.page(), 2);

    tracker.break_page();
    assert_eq!(tracker.page(), 3);
    assert!(tracker.at_page_top());
}

#[test]
fn paragraph_height_grows_with_font_size() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let mut previous = Length::ZERO;
    for size in [10.0, 12.0, 14.0, 20.0] {
        let mut styles = fixture.styles.clone();
        if let Some(normal) = styles.get_mut("Normal") {
            normal.character.size = Some(size);
        }
        let ctx = markpage::render::RenderContext {
            styles: &styles,
            ..ctx
        };
        let height = Renderable::paragraph(common::LOREM)
            .size(None, Length::mm(165.0), &ctx)
            .expect("size");
        assert!(height >= previous, "{size}pt: {height} < {previous}");
        previous = height;
    }
}

#[test]
fn long_document_spans_pages_in_order() {
    let fixture = Fixture::builtin();
    let mut blocks = vec![Renderable::Heading(Heading::new(1, "Introduction"))];
    for _ in 0..12 {
        blocks.push(Renderable::paragraph(common::LOREM));
    }
    blocks.push(Renderable::Heading(Heading::new(1, "Results")));
    blocks.push(Renderable::paragraph("Closing words."));

    let (blocks, body, report) = fixture.run(blocks, 0);
    assert!(report.pages >= 3, "{} pages", report.pages);
    assert_eq!(body.blocks().len(), blocks.len());

    let pages: Vec<u32> = blocks
        .iter()
        .filter_map(|b| match b {
            Renderable::Heading(h) => h.rendered_page,
            _ => None,
        })
        .collect();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0], 1);
    assert!(pages[1] > pages[0]);
    assert!(pages[1] <= report.pages);
}

/// Tracker on page 1 with exactly `remaining` left.
fn tracker_with(remaining: Length) -> LayoutTracker {
    let geometry = PageGeometry::a4();
    let mut tracker = LayoutTracker::new(&geometry);
    tracker.add_height(geometry.max_height() - remaining);
    tracker
}

fn figure(height: Length) -> Image {
    Image {
        path: "chart.png".into(),
        data: None,
        width: Length::pt(200.0),
        height,
        caption: CaptionInfo {
            label: None,
            text: Some("Chart".into()),
        },
        number: Some(1),
    }
}

fn image_size(fragment: &RenderedFragment) -> (Length, Length) {
    fragment
        .block
        .as_paragraph()
        .and_then(|p| {
            p.runs.iter().find_map(|run| match run {
                OutputRun::Image(image) => Some((image.width, image.height)),
                _ => None,
            })
        })
        .expect("image run")
}

fn as_table(fragment: &RenderedFragment) -> &OutputTable {
    match &fragment.block {
        OutputBlock::Table(table) => table,
        OutputBlock::Paragraph(p) => panic!("expected a table, got {:?}", p.plain_text()),
    }
}

#[test]
fn caption_above_needs_room_for_three_more_lines() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let caption = Renderable::Caption(Caption {
        category: Some(Category::Listing),
        number: Some(1),
        label: None,
        text: Some("Short".into()),
        above: true,
    });

    let style = fixture.styles.resolve("Caption", &ParagraphFormat::default());
    let line_height = fixture.fonts.line_height(&style.font);
    // One caption line plus three content lines at 1.5 spacing.
    let needed = line_height.scale(3.0 * 1.5 + 1.0);

    let stays = caption
        .render(None, &tracker_with(needed + Length::pt(2.0)), &ctx)
        .expect("render");
    assert!(!stays[0].starts_next_page);

    let remaining = needed - Length::pt(2.0);
    let moved = caption
        .render(None, &tracker_with(remaining), &ctx)
        .expect("render");
    assert!(moved[0].starts_next_page);
    assert!(moved[0].height > remaining);
    let paragraph = moved[0].block.as_paragraph().expect("caption paragraph");
    assert_eq!(paragraph.format.page_break_before, Some(true));
    assert_eq!(paragraph.plain_text(), "Listing 1 \u{2013} Short");
}

#[test]
fn image_shrinks_when_most_of_it_fits() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let image = Renderable::Image(figure(Length::pt(400.0)));

    let top = LayoutTracker::new(&PageGeometry::a4());
    let natural = image.render(None, &top, &ctx).expect("render");
    assert_eq!(image_size(&natural[0]), (Length::pt(200.0), Length::pt(400.0)));
    let caption = natural[1].height;

    // Room for 80% of the image above its caption.
    let fragments = image
        .render(None, &tracker_with(caption + Length::pt(320.0)), &ctx)
        .expect("render");
    assert!(!fragments[0].starts_next_page);
    assert_eq!(fragments[0].height, Length::pt(320.0));
    let (width, height) = image_size(&fragments[0]);
    assert_eq!(height, Length::pt(320.0));
    assert!((width.as_emu() - Length::pt(160.0).as_emu()).abs() <= 1);
}

#[test]
fn image_moves_when_too_little_of_it_fits() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let image = Renderable::Image(figure(Length::pt(400.0)));

    let top = LayoutTracker::new(&PageGeometry::a4());
    let caption = image.render(None, &top, &ctx).expect("render")[1].height;

    // Only half of the image would fit.
    let remaining = caption + Length::pt(200.0);
    let fragments = image
        .render(None, &tracker_with(remaining), &ctx)
        .expect("render");
    assert!(fragments[0].starts_next_page);
    assert_eq!(fragments[0].height, remaining + Length::pt(400.0));
    assert_eq!(image_size(&fragments[0]), (Length::pt(200.0), Length::pt(400.0)));
    let paragraph = fragments[0].block.as_paragraph().expect("image paragraph");
    assert_eq!(paragraph.format.page_break_before, Some(true));
}

#[test]
fn long_listing_continues_under_a_continuation_caption() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let code: String = (1..=100).map(|i| format!("line {i}\n")).collect();
    let listing = Renderable::Listing(Listing {
        language: None,
        code,
        caption: CaptionInfo {
            label: None,
            text: Some("Long".into()),
        },
        number: Some(1),
    });

    let top = LayoutTracker::new(&PageGeometry::a4());
    let fragments = listing.render(None, &top, &ctx).expect("render");
    assert_eq!(fragments.len(), 4);

    let first = as_table(&fragments[1]);
    let second = as_table(&fragments[3]);
    let lines = |table: &OutputTable| table.rows[0].cells[0].paragraphs.len();
    assert!(lines(first) > 0 && lines(second) > 0);
    assert_eq!(lines(first) + lines(second), 100);

    let continuation = fragments[2].block.as_paragraph().expect("continuation caption");
    assert_eq!(continuation.style, "Caption");
    assert_eq!(continuation.plain_text(), "Continuation of listing 1");
    assert_eq!(continuation.format.page_break_before, Some(true));
    assert!(fragments[2].starts_next_page);
}

#[test]
fn header_row_is_repeated_on_the_next_page() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let row = |text: &str, header: bool| TableRow {
        cells: vec![vec![Inline::text(text)], vec![Inline::text(text)]],
        header,
    };
    let table = |rows: Vec<TableRow>| {
        Renderable::Table(Table {
            rows,
            alignments: Vec::new(),
            caption: CaptionInfo::default(),
            number: Some(1),
        })
    };
    let top = LayoutTracker::new(&PageGeometry::a4());

    let row_height = table(vec![row("x", false)])
        .render(None, &top, &ctx)
        .expect("render")[1]
        .height;
    assert!(row_height.is_positive());

    // Enough rows to run a few onto page 2.
    let count = (top.max_height().as_emu() / row_height.as_emu()) as usize + 5;
    let mut headed = vec![row("Name", true)];
    headed.extend((1..count).map(|_| row("x", false)));
    let plain: Vec<TableRow> = headed
        .iter()
        .map(|r| TableRow {
            header: false,
            ..r.clone()
        })
        .collect();

    let with_header = table(headed).render(None, &top, &ctx).expect("render");
    let without = table(plain).render(None, &top, &ctx).expect("render");

    let rows = &as_table(&with_header[1]).rows;
    assert!(rows[0].header);
    assert!(rows[1..].iter().all(|r| !r.header));
    assert_eq!(with_header[1].height - without[1].height, row_height);
}

#[test]
fn paragraph_with_one_line_left_over_carries_two() {
    let fixture = Fixture::builtin();
    let ctx = fixture.ctx();
    let geometry = PageGeometry::a4();

    let normal = fixture.styles.resolve("Normal", &ParagraphFormat::default());
    let mut text = StyledText::new();
    text.push(common::LOREM, normal.font.clone());
    let sizing = size_paragraph(&normal, &text, None, geometry.max_width(), &fixture.fonts)
        .expect("size")
        .sizing;
    assert!(sizing.lines > 3);

    // All but the last line fit on page 1.
    let remaining = sizing.height_through_line(sizing.lines - 1) + Length::pt(5.0);
    assert!(remaining < sizing.height_through_line(sizing.lines));

    // A figure fills the page down to that point.
    let top = LayoutTracker::new(&geometry);
    let caption = Renderable::Image(figure(Length::pt(100.0)))
        .render(None, &top, &ctx)
        .expect("render")[1]
        .height;
    let image_height = geometry.max_height() - caption - remaining;

    let fragment = Renderable::paragraph(common::LOREM)
        .render(None, &tracker_with(remaining), &ctx)
        .expect("render")
        .remove(0);
    assert!(!fragment.starts_next_page);
    assert_eq!(fragment.height, remaining + sizing.height_of_lines(2));

    let blocks = vec![
        Renderable::Image(figure(image_height)),
        Renderable::paragraph(common::LOREM),
        Renderable::Heading(Heading::new(2, "Next")),
    ];
    let (blocks, _, report) = fixture.run(blocks, 0);
    let heading = blocks.iter().find_map(|b| match b {
        Renderable::Heading(h) => Some(h.rendered_page),
        _ => None,
    });
    assert_eq!(heading, Some(Some(2)));
    assert_eq!(report.pages, 2);
}
