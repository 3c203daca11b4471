//! DOCX on both ends of a conversion: reading a template's styles and page
//! setup or a title document's body, and writing the converted document.

mod styles;
pub mod writer;

use std::io::Read;
use std::path::Path;

use crate::error::{Error, Warning};
use crate::layout::PageGeometry;
use crate::style::StyleSheet;
use crate::units::Length;

pub use writer::write_docx;

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Parse a WML boolean toggle element (e.g., w:b, w:i, w:keepNext).
/// Present with no val or val != "0"/"false" means true.
pub(crate) fn wml_bool(parent: roxmltree::Node, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attribute((WML_NS, "val"))
            .is_none_or(|v| v != "0" && v != "false")
    })
}

pub(crate) fn wml<'a>(
    node: roxmltree::Node<'a, 'a>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(crate) fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<Length> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| Length::twips(v.round() as i64))
}

pub(crate) fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val == "auto" || val.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

pub(crate) fn read_zip_text(
    zip: &mut zip::ZipArchive<std::fs::File>,
    name: &str,
) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn open_archive(path: &Path) -> Result<zip::ZipArchive<std::fs::File>, Error> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::InvalidTemplate(format!("{}: {e}", path.display())))?;
    zip::ZipArchive::new(file)
        .map_err(|_| Error::InvalidTemplate(format!("{}: not a ZIP archive", path.display())))
}

/// Page setup of a `w:sectPr`; anything it leaves out keeps the A4 default.
fn parse_section_properties(sect: roxmltree::Node) -> PageGeometry {
    let defaults = PageGeometry::a4();
    let pg_sz = wml(sect, "pgSz");
    let pg_mar = wml(sect, "pgMar");
    let size = |attr: &str, fallback: Length| {
        pg_sz.and_then(|n| twips_attr(n, attr)).unwrap_or(fallback)
    };
    let margin = |attr: &str, fallback: Length| {
        pg_mar.and_then(|n| twips_attr(n, attr)).unwrap_or(fallback)
    };

    PageGeometry {
        page_width: size("w", defaults.page_width),
        page_height: size("h", defaults.page_height),
        margin_top: margin("top", defaults.margin_top),
        margin_bottom: margin("bottom", defaults.margin_bottom),
        margin_left: margin("left", defaults.margin_left),
        margin_right: margin("right", defaults.margin_right),
        header: margin("header", defaults.header),
        footer: margin("footer", defaults.footer),
    }
}

fn body_section(xml: &roxmltree::Document) -> Option<PageGeometry> {
    let body = wml(xml.root_element(), "body")?;
    wml(body, "sectPr").map(parse_section_properties)
}

/// Styles and page setup taken from a user's document.
#[derive(Clone, Debug)]
pub struct Template {
    pub styles: StyleSheet,
    pub geometry: PageGeometry,
}

impl Template {
    /// Built-in styles on A4.
    pub fn builtin() -> Self {
        Template {
            styles: StyleSheet::builtin(),
            geometry: PageGeometry::a4(),
        }
    }

    /// Read `word/styles.xml` and the body's final section of a `.docx`.
    /// Styles the template does not define keep their built-in definition.
    pub fn read(path: &Path) -> Result<Self, Error> {
        let t0 = std::time::Instant::now();
        let mut zip = open_archive(path)?;

        let theme = styles::parse_theme(&mut zip);
        let styles_xml = read_zip_text(&mut zip, "word/styles.xml").ok_or_else(|| {
            Error::InvalidTemplate(format!("{}: no word/styles.xml", path.display()))
        })?;
        let mut sheet = StyleSheet::builtin();
        styles::parse_styles(&roxmltree::Document::parse(&styles_xml)?, &theme, &mut sheet);

        let geometry = match read_zip_text(&mut zip, "word/document.xml") {
            Some(text) => body_section(&roxmltree::Document::parse(&text)?),
            None => None,
        }
        .unwrap_or_else(PageGeometry::a4);

        log::info!(
            "template: {} styles from {} in {:.1}ms",
            sheet.iter().count(),
            path.display(),
            t0.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Template {
            styles: sheet,
            geometry,
        })
    }
}

/// Body of a title document, ready to be placed in front of the content.
#[derive(Clone, Debug)]
pub struct TitleDocument {
    /// Serialized body children, final `w:sectPr` excluded.
    pub body_xml: String,
    /// Namespace declarations the copied markup relies on.
    pub namespaces: Vec<(String, String)>,
    pub geometry: PageGeometry,
    /// Pages the title occupies; content page numbers continue after them.
    pub pages: u32,
}

/// Elements that reference parts of the title package that are not copied.
fn dropped_element(node: roxmltree::Node) -> Option<&'static str> {
    if node.tag_name().namespace() != Some(WML_NS) {
        return None;
    }
    match node.tag_name().name() {
        "drawing" | "pict" => Some("drawing"),
        "object" => Some("embedded object"),
        "footnoteReference" | "endnoteReference" => Some("note reference"),
        _ => None,
    }
}

/// Copy `node` verbatim from `src`, leaving out dropped elements and
/// unwrapping relationship-bound hyperlinks.
fn copy_node(node: roxmltree::Node, src: &str, out: &mut String, warnings: &mut Vec<Warning>) {
    if node.is_text() {
        out.push_str(&src[node.range()]);
        return;
    }
    if !node.is_element() || matches!(node.tag_name().name(), "headerReference" | "footerReference") {
        return;
    }
    if let Some(what) = dropped_element(node) {
        log::warn!("title document: {what} dropped");
        let warning = Warning::DroppedTitleContent(what.to_string());
        if !warnings.contains(&warning) {
            warnings.push(warning);
        }
        return;
    }

    let unwrap = node.tag_name().name() == "hyperlink" && node.attribute((REL_NS, "id")).is_some();
    let range = node.range();
    let (Some(first), Some(last)) = (node.first_child(), node.last_child()) else {
        if !unwrap {
            out.push_str(&src[range]);
        }
        return;
    };
    if !unwrap {
        out.push_str(&src[range.start..first.range().start]);
    }
    for child in node.children() {
        copy_node(child, src, out, warnings);
    }
    if !unwrap {
        out.push_str(&src[last.range().end..range.end]);
    }
}

impl TitleDocument {
    pub fn read(path: &Path, pages: u32) -> Result<(Self, Vec<Warning>), Error> {
        let mut zip = open_archive(path)?;
        let text = read_zip_text(&mut zip, "word/document.xml").ok_or_else(|| {
            Error::InvalidTemplate(format!("{}: no word/document.xml", path.display()))
        })?;
        let xml = roxmltree::Document::parse(&text)?;
        let root = xml.root_element();
        let body = wml(root, "body")
            .ok_or_else(|| Error::InvalidTemplate(format!("{}: no w:body", path.display())))?;

        let mut warnings = Vec::new();
        let mut body_xml = String::new();
        for child in body.children() {
            if child.tag_name().name() == "sectPr" {
                continue;
            }
            copy_node(child, &text, &mut body_xml, &mut warnings);
        }

        let namespaces = root
            .namespaces()
            .filter_map(|ns| Some((ns.name()?.to_string(), ns.uri().to_string())))
            .collect();
        let geometry = body_section(&xml).unwrap_or_else(PageGeometry::a4);
        Ok((
            TitleDocument {
                body_xml,
                namespaces,
                geometry,
                pages,
            },
            warnings,
        ))
    }
}
