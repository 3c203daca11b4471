mod common;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use markpage::{ConvertOptions, Error, convert};

const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const SOURCE: &str = "\
[TOC]

# Introduction {#intro}

Body text with a non-breaking well-known hyphen, see @lst:hello.

% Hello program {#lst:hello}

```rust
fn main() {}
```

| Name | Value |
|------|-------|
| a    | 1     |

# Summary

Final words.
";

fn read_part(docx: &Path, name: &str) -> String {
    let mut zip = zip::ZipArchive::new(File::open(docx).expect("open docx")).expect("zip");
    let mut content = String::new();
    zip.by_name(name)
        .unwrap_or_else(|e| panic!("{name}: {e}"))
        .read_to_string(&mut content)
        .expect("read part");
    content
}

fn options() -> ConvertOptions {
    ConvertOptions {
        system_fonts: false,
        ..Default::default()
    }
}

#[test]
fn converts_markdown_to_a_word_package() {
    let _ = env_logger::try_init();
    let dir = common::scratch_dir("convert");
    let input = common::write_file(&dir, "report.md", SOURCE);
    let output = dir.join("report.docx");

    let report = convert(&[input], &output, &options()).expect("convert");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.pages, 3);

    let mut zip = zip::ZipArchive::new(File::open(&output).expect("open")).expect("zip");
    for part in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/document.xml",
        "word/styles.xml",
        "word/settings.xml",
        "word/footer1.xml",
        "word/_rels/document.xml.rels",
        "docProps/core.xml",
        "docProps/app.xml",
    ] {
        assert!(zip.by_name(part).is_ok(), "missing {part}");
    }

    let xml = read_part(&output, "word/document.xml");
    let doc = roxmltree::Document::parse(&xml).expect("document.xml is well-formed");

    let instructions: Vec<String> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "instrText")))
        .filter_map(|n| n.text())
        .map(|t| t.trim().to_string())
        .collect();
    assert!(instructions.iter().any(|i| i == "PAGEREF intro \\h"), "{instructions:?}");
    assert!(instructions.iter().any(|i| i.starts_with("SEQ Listing")));
    assert!(instructions.iter().any(|i| i.starts_with("SEQ Table")));
    assert!(instructions.iter().any(|i| i == "REF lst:hello \\h"));

    let bookmarks: Vec<&str> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "bookmarkStart")))
        .filter_map(|n| n.attribute((W, "name")))
        .collect();
    assert!(bookmarks.contains(&"intro"));
    assert!(bookmarks.contains(&"lst:hello"));

    assert!(
        doc.descendants()
            .any(|n| n.has_tag_name((W, "noBreakHyphen")))
    );
    assert!(doc.descendants().any(|n| n.has_tag_name((W, "tblHeader"))));
    assert!(doc.descendants().any(|n| n.has_tag_name((W, "cantSplit"))));

    let texts: String = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "t")))
        .filter_map(|n| n.text())
        .collect();
    assert!(texts.contains("Contents"));
    assert!(texts.contains("Final words."));

    // TOC page results are filled in: Introduction on page 2, Summary on page 3.
    let toc_pages: Vec<String> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "hyperlink")) && n.attribute((W, "anchor")).is_some())
        .map(|link| {
            let runs: Vec<String> = link
                .descendants()
                .filter(|n| n.has_tag_name((W, "t")))
                .filter_map(|n| n.text().map(str::to_string))
                .collect();
            runs.last().cloned().unwrap_or_default()
        })
        .collect();
    assert_eq!(toc_pages, vec!["2".to_string(), "3".to_string()]);

    let styles = read_part(&output, "word/styles.xml");
    let styles = roxmltree::Document::parse(&styles).expect("styles.xml is well-formed");
    let ids: Vec<&str> = styles
        .descendants()
        .filter(|n| n.has_tag_name((W, "style")))
        .filter_map(|n| n.attribute((W, "styleId")))
        .collect();
    for id in ["Normal", "Heading1", "Caption", "Code", "TOCHeading"] {
        assert!(ids.contains(&id), "style {id} missing from {ids:?}");
    }

    let footer = read_part(&output, "word/footer1.xml");
    assert!(footer.contains(" PAGE "));
}

#[test]
fn rejects_bad_paths() {
    let dir = common::scratch_dir("bad-paths");
    let md = common::write_file(&dir, "ok.md", "Text.\n");
    let txt = common::write_file(&dir, "notes.txt", "Text.\n");

    let err = convert(&[dir.join("absent.md")], &dir.join("out.docx"), &options()).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
    assert_eq!(err.exit_code(), 2);

    let err = convert(&[txt], &dir.join("out.docx"), &options()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedInput(_)));
    assert_eq!(err.exit_code(), 3);

    let err = convert(std::slice::from_ref(&md), &dir.join("out.pdf"), &options()).unwrap_err();
    assert!(matches!(err, Error::OutputExtension(_)));
    assert_eq!(err.exit_code(), 4);

    let err = convert(&[], &dir.join("out.docx"), &options()).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));

    assert!(!dir.join("out.docx").exists());
}

#[test]
fn unreadable_template_is_fatal() {
    let dir = common::scratch_dir("bad-template");
    let md = common::write_file(&dir, "doc.md", "Text.\n");
    let template = common::write_file(&dir, "template.docx", "not a zip");
    let options = ConvertOptions {
        template: Some(template),
        ..options()
    };
    let err = convert(&[md], &dir.join("out.docx"), &options).unwrap_err();
    assert!(matches!(err, Error::InvalidTemplate(_)));
    assert_eq!(err.exit_code(), 6);
}

#[test]
fn template_and_title_round_trip() {
    let dir = common::scratch_dir("template-title");
    let md = common::write_file(&dir, "doc.md", "[TOC]\n\n# Chapter\n\nText.\n");
    let first = dir.join("first.docx");
    convert(std::slice::from_ref(&md), &first, &options()).expect("first conversion");

    // A produced document works as both the template and the title page.
    let output = dir.join("second.docx");
    let report = convert(
        &[md],
        &output,
        &ConvertOptions {
            template: Some(first.clone()),
            title: Some(first),
            title_pages: 2,
            ..options()
        },
    )
    .expect("second conversion");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let xml = read_part(&output, "word/document.xml");
    let doc = roxmltree::Document::parse(&xml).expect("document.xml is well-formed");
    let start = doc
        .descendants()
        .find(|n| n.has_tag_name((W, "pgNumType")))
        .and_then(|n| n.attribute((W, "start")));
    assert_eq!(start, Some("3"));

    // Two sections: the title's and the content's.
    let sections = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "sectPr")))
        .count();
    assert_eq!(sections, 2);

    // Chapter lands on page 2 of the content, after two title pages.
    let pagerefs: Vec<String> = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "hyperlink")) && n.attribute((W, "anchor")).is_some())
        .filter_map(|link| {
            link.descendants()
                .filter(|n| n.has_tag_name((W, "t")))
                .filter_map(|n| n.text())
                .last()
                .map(str::to_string)
        })
        .collect();
    assert!(pagerefs.contains(&"4".to_string()), "{pagerefs:?}");
}

#[test]
fn markup_characters_in_text_are_escaped() {
    let dir = common::scratch_dir("escaping");
    let input = common::write_file(
        &dir,
        "escape.md",
        "# R&D > plans {#rnd}\n\nAT&T says a < b and \"quotes\" > 'apostrophes'.\n\n[Q&A](https://example.com/?a=1&b=2)\n",
    );
    let output = dir.join("escape.docx");
    convert(&[input], &output, &options()).expect("convert");

    let xml = read_part(&output, "word/document.xml");
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
    assert!(!xml.contains("AT&T"));
    let doc = roxmltree::Document::parse(&xml).expect("document.xml is well-formed");
    let texts: String = doc
        .descendants()
        .filter(|n| n.has_tag_name((W, "t")))
        .filter_map(|n| n.text())
        .collect();
    assert!(texts.contains("R&D > plans"), "{texts}");
    assert!(texts.contains("AT&T says a < b and \"quotes\" > 'apostrophes'."), "{texts}");

    let rels = read_part(&output, "word/_rels/document.xml.rels");
    let rels = roxmltree::Document::parse(&rels).expect("rels are well-formed");
    let targets: Vec<&str> = rels
        .descendants()
        .filter_map(|n| n.attribute("Target"))
        .collect();
    assert!(targets.contains(&"https://example.com/?a=1&b=2"), "{targets:?}");
}

#[test]
fn downloaded_image_is_embedded() {
    let mut png = Vec::new();
    image::RgbImage::new(60, 30)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");
    let url = format!("http://127.0.0.1:{}/plot", common::serve_once(png.clone()));

    let dir = common::scratch_dir("remote-image");
    let input = common::write_file(&dir, "plot.md", &format!("![Plot]({url})\n"));
    let output = dir.join("plot.docx");
    let report = convert(&[input], &output, &options()).expect("convert");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let mut zip = zip::ZipArchive::new(File::open(&output).expect("open")).expect("zip");
    let mut embedded = Vec::new();
    zip.by_name("word/media/image1.png")
        .expect("media part")
        .read_to_end(&mut embedded)
        .expect("read media");
    assert_eq!(embedded, png);
}
