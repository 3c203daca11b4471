mod common;

use std::io::Cursor;
use std::path::Path;

use markpage::Warning;
use markpage::markdown::parse;
use markpage::model::{Inline, Renderable};
use markpage::units::Length;

fn blocks(markdown: &str) -> Vec<Renderable> {
    parse(markdown, Path::new(".")).blocks
}

#[test]
fn headings_keep_anchor_and_numbering_flag() {
    let parsed = blocks("# Introduction {#intro}\n\n## Appendix {-}\n\n### Plain\n");
    let headings: Vec<(u8, String, Option<String>, bool)> = parsed
        .iter()
        .filter_map(|b| match b {
            Renderable::Heading(h) => Some((h.level, h.text(), h.anchor.clone(), h.numbered)),
            _ => None,
        })
        .collect();
    assert_eq!(
        headings,
        vec![
            (1, "Introduction".to_string(), Some("intro".to_string()), true),
            (2, "Appendix".to_string(), None, false),
            (3, "Plain".to_string(), None, true),
        ]
    );
}

#[test]
fn toc_marker_and_page_break() {
    let parsed = blocks("[TOC]\n\nBefore\n\n<!-- pagebreak -->\n\nAfter\n\n---\n");
    assert_eq!(parsed.len(), 4);
    assert!(matches!(parsed[0], Renderable::TableOfContents(_)));
    assert!(matches!(parsed[1], Renderable::Paragraph(_)));
    assert!(matches!(parsed[2], Renderable::PageBreak));
    assert!(matches!(parsed[3], Renderable::Paragraph(_)));
}

#[test]
fn caption_line_attaches_to_the_next_listing() {
    let parsed = blocks("% Hello world {#lst:hello}\n\n```rust\nfn main() {}\n```\n");
    assert_eq!(parsed.len(), 1);
    let Renderable::Listing(listing) = &parsed[0] else {
        panic!("expected a listing, got {parsed:?}");
    };
    assert_eq!(listing.language.as_deref(), Some("rust"));
    assert_eq!(listing.code, "fn main() {}\n");
    assert_eq!(listing.caption.label.as_deref(), Some("lst:hello"));
    assert_eq!(listing.caption.text.as_deref(), Some("Hello world"));
}

#[test]
fn display_math_becomes_an_equation() {
    let parsed = blocks("$$x^2 + y^2 = z^2$$\n");
    assert_eq!(parsed.len(), 1);
    let Renderable::Equation(eq) = &parsed[0] else {
        panic!("expected an equation, got {parsed:?}");
    };
    assert_eq!(eq.formula, "x^2 + y^2 = z^2");
    assert_eq!(eq.number, None);
}

#[test]
fn references_and_inline_styles() {
    let parsed = blocks("See @fig:plot and **bold** `code`.\n");
    let Renderable::Paragraph(p) = &parsed[0] else {
        panic!("expected a paragraph, got {parsed:?}");
    };
    assert!(
        p.inlines
            .iter()
            .any(|i| matches!(i, Inline::Reference(r) if r.name == "fig:plot"))
    );
    assert!(
        p.inlines
            .iter()
            .any(|i| matches!(i, Inline::Text { text, style } if text == "bold" && style.bold))
    );
    assert!(p.inlines.iter().any(|i| matches!(i, Inline::Code(c) if c == "code")));
}

#[test]
fn tables_and_lists() {
    let parsed = blocks("| a | b |\n|---|--:|\n| 1 | 2 |\n\n- one\n- two\n  1. nested\n");
    assert_eq!(parsed.len(), 2);

    let Renderable::Table(table) = &parsed[0] else {
        panic!("expected a table, got {parsed:?}");
    };
    assert_eq!(table.rows.len(), 2);
    assert!(table.rows[0].header);
    assert!(!table.rows[1].header);
    assert_eq!(table.columns(), 2);
    assert_eq!(table.alignments[1], markpage::style::Alignment::Right);

    let Renderable::List(list) = &parsed[1] else {
        panic!("expected a list, got {parsed:?}");
    };
    let shape: Vec<(u8, bool, u32)> = list
        .items
        .iter()
        .map(|i| (i.level, i.ordered, i.index))
        .collect();
    assert_eq!(shape, vec![(1, false, 1), (1, false, 2), (2, true, 1)]);
}

#[test]
fn missing_and_unreachable_images_are_dropped() {
    let dir = common::scratch_dir("missing-images");
    let url = format!("http://127.0.0.1:{}/a.png", common::closed_port());
    let parsed = parse(&format!("![Local](nowhere.png)\n\n![Remote]({url})\n"), &dir);
    assert!(parsed.blocks.is_empty(), "{:?}", parsed.blocks);
    assert_eq!(
        parsed.warnings,
        vec![
            Warning::MissingImage(dir.join("nowhere.png")),
            Warning::RemoteImage(url),
        ]
    );
}

#[test]
fn remote_image_is_downloaded() {
    let mut png = Vec::new();
    image::RgbImage::new(30, 10)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");
    let url = format!("http://127.0.0.1:{}/chart.png", common::serve_once(png.clone()));

    let parsed = parse(&format!("![Served chart]({url})\n"), Path::new("."));
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    let [Renderable::Image(img)] = parsed.blocks.as_slice() else {
        panic!("expected one image, got {:?}", parsed.blocks);
    };
    assert_eq!(img.data.as_deref(), Some(png.as_slice()));
    assert_eq!(img.width, Length::pt(30.0));
    assert_eq!(img.height, Length::pt(10.0));
    assert_eq!(img.caption.text.as_deref(), Some("Served chart"));
}

#[test]
fn local_image_gets_size_and_caption() {
    let dir = common::scratch_dir("local-image");
    image::RgbImage::new(40, 20)
        .save(dir.join("box.png"))
        .expect("write png");

    let parsed = parse("![A small box](box.png)\n", &dir);
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    let [Renderable::Image(img)] = parsed.blocks.as_slice() else {
        panic!("expected one image, got {:?}", parsed.blocks);
    };
    assert_eq!(img.path, dir.join("box.png"));
    assert_eq!(img.width, Length::pt(40.0));
    assert_eq!(img.height, Length::pt(20.0));
    assert_eq!(img.caption.text.as_deref(), Some("A small box"));
}

#[test]
fn unsupported_blocks_warn() {
    let parsed = parse("> quoted\n", Path::new("."));
    assert_eq!(parsed.blocks.len(), 1);
    assert!(matches!(&parsed.blocks[0], Renderable::Unsupported { kind } if kind == "Block quote"));
    assert_eq!(
        parsed.warnings,
        vec![Warning::UnsupportedBlock("Block quote".into())]
    );
}
