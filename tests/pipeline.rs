mod common;

use common::Fixture;
use markpage::Warning;
use markpage::layout::PageGeometry;
use markpage::model::{
    CaptionInfo, Equation, Heading, Inline, List, ListItem, Listing, Paragraph, Reference,
    Renderable, TableOfContents,
};
use markpage::pipeline::{Pipeline, Stage};
use markpage::sink::{Body, OutputBlock};

fn sample() -> Vec<Renderable> {
    vec![
        Renderable::TableOfContents(TableOfContents::default()),
        Renderable::Heading(Heading::new(1, "Method")),
        Renderable::paragraph(common::LOREM),
        Renderable::Equation(Equation {
            formula: "E = mc^2".into(),
            label: Some("eq:energy".into()),
            number: None,
        }),
        Renderable::Paragraph(Paragraph {
            inlines: vec![
                Inline::text("By "),
                Inline::Reference(Reference::new("eq:energy")),
                Inline::text(" and "),
                Inline::Reference(Reference::new("eq:nowhere")),
            ],
        }),
        Renderable::Listing(Listing {
            language: Some("rust".into()),
            code: "fn main() {\n    println!(\"hi\");\n}\n".into(),
            caption: CaptionInfo {
                label: None,
                text: Some("Entry point".into()),
            },
            number: None,
        }),
        Renderable::List(List {
            items: vec![
                ListItem {
                    level: 1,
                    ordered: false,
                    index: 1,
                    inlines: vec![Inline::text("first")],
                    images: Vec::new(),
                },
                ListItem {
                    level: 2,
                    ordered: true,
                    index: 1,
                    inlines: vec![Inline::text("nested")],
                    images: Vec::new(),
                },
            ],
        }),
        Renderable::PageBreak,
        Renderable::Heading(Heading::new(2, "Notes")),
        Renderable::Unsupported {
            kind: "Block quote".into(),
        },
    ]
}

#[test]
fn rerun_is_deterministic() {
    let fixture = Fixture::builtin();
    let (blocks_a, body_a, report_a) = fixture.run(sample(), 1);
    let (blocks_b, body_b, report_b) = fixture.run(sample(), 1);
    assert_eq!(blocks_a, blocks_b);
    assert_eq!(body_a.blocks(), body_b.blocks());
    assert_eq!(report_a, report_b);

    // Running the same pipeline again gives the same document.
    let mut pipeline = Pipeline::new(sample(), &fixture.fonts, &fixture.styles);
    let mut first = Body::new(PageGeometry::a4());
    let mut second = Body::new(PageGeometry::a4());
    let r1 = pipeline.run(&mut first).expect("first run");
    let r2 = pipeline.run(&mut second).expect("second run");
    assert_eq!(r1, r2);
    assert_eq!(first.blocks(), second.blocks());
    assert_eq!(pipeline.stage(), Stage::Done);
}

#[test]
fn warnings_are_collected_in_the_report() {
    let fixture = Fixture::builtin();
    let (_, _, report) = fixture.run(sample(), 0);
    assert_eq!(
        report.warnings,
        vec![Warning::UnresolvedReference("eq:nowhere".into())]
    );
}

#[test]
fn blocks_render_in_document_order() {
    let fixture = Fixture::builtin();
    let (blocks, body, report) = fixture.run(sample(), 0);

    let texts: Vec<String> = body
        .blocks()
        .iter()
        .filter_map(OutputBlock::as_paragraph)
        .map(|p| p.plain_text())
        .collect();
    let position = |needle: &str| {
        texts
            .iter()
            .position(|t| t.contains(needle))
            .unwrap_or_else(|| panic!("{needle:?} not in {texts:#?}"))
    };
    // Heading paragraphs hold exactly their numbered text; TOC entries add a tab and page.
    let heading = |text: &str| {
        texts
            .iter()
            .position(|t| t == text)
            .unwrap_or_else(|| panic!("{text:?} not in {texts:#?}"))
    };
    assert!(position("Contents") < position("1. Method\t"));
    assert!(position("1. Method\t") < heading("1. Method"));
    assert!(heading("1. Method") < position("Lorem ipsum"));
    assert!(position("E = mc^2") < position("By 1 and ?"));
    assert!(position("Listing 1 \u{2013} Entry point") < position("first"));
    assert!(position("nested") < heading("1.1. Notes"));
    assert!(heading("1.1. Notes") < position("Block quote is not supported"));

    let equation = &texts[position("E = mc^2")];
    assert!(equation.ends_with("(1)"), "{equation:?}");

    // The explicit break moves the second heading past the first page of content.
    let method_page = blocks.iter().find_map(|b| match b {
        Renderable::Heading(h) if h.level == 1 => h.rendered_page,
        _ => None,
    });
    let notes_page = blocks.iter().find_map(|b| match b {
        Renderable::Heading(h) if h.level == 2 => h.rendered_page,
        _ => None,
    });
    assert_eq!(method_page, Some(2));
    assert!(notes_page > method_page);
    assert_eq!(notes_page, Some(report.pages));

    let tables = body
        .blocks()
        .iter()
        .filter(|b| matches!(b, OutputBlock::Table(_)))
        .count();
    assert_eq!(tables, 1);
}
