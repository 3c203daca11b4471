use crate::style::{
    Alignment, CharFormat, LineSpacing, ParagraphFormat, StyleDef, StyleKind, StyleSheet,
};
use crate::units::Length;

use super::{DML_NS, WML_NS, parse_hex_color, read_zip_text, twips_attr, wml, wml_attr, wml_bool};

fn dml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn latin_typeface<'a>(node: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    dml(node, "latin")
        .and_then(|n| n.attribute("typeface"))
        .filter(|tf| !tf.is_empty())
}

#[derive(Debug, Default)]
pub(super) struct ThemeFonts {
    pub(super) major: Option<String>,
    pub(super) minor: Option<String>,
}

pub(super) fn parse_alignment(val: &str) -> Alignment {
    match val {
        "center" => Alignment::Center,
        "right" | "end" => Alignment::Right,
        "both" | "distribute" => Alignment::Justify,
        _ => Alignment::Left,
    }
}

pub(super) fn parse_theme(zip: &mut zip::ZipArchive<std::fs::File>) -> ThemeFonts {
    let mut fonts = ThemeFonts::default();

    let names: Vec<String> = zip.file_names().map(|s| s.to_string()).collect();
    let theme_name = names
        .iter()
        .find(|n| n.starts_with("word/theme/") && n.ends_with(".xml"));
    let Some(xml_content) = theme_name.and_then(|name| read_zip_text(zip, name)) else {
        return fonts;
    };
    let Ok(xml) = roxmltree::Document::parse(&xml_content) else {
        return fonts;
    };

    for node in xml.descendants() {
        if node.tag_name().namespace() != Some(DML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "majorFont" => fonts.major = latin_typeface(node).map(str::to_string),
            "minorFont" => fonts.minor = latin_typeface(node).map(str::to_string),
            _ => {}
        }
    }
    fonts
}

/// Family named by `w:rFonts`, following theme references.
fn resolve_font(rfonts: roxmltree::Node, theme: &ThemeFonts) -> Option<String> {
    if let Some(f) = rfonts.attribute((WML_NS, "ascii")) {
        return Some(f.to_string());
    }
    match rfonts.attribute((WML_NS, "asciiTheme")) {
        Some("majorHAnsi" | "majorAscii") => theme.major.clone(),
        Some("minorHAnsi" | "minorAscii") => theme.minor.clone(),
        _ => None,
    }
}

fn parse_line_spacing(spacing: roxmltree::Node) -> Option<LineSpacing> {
    let line = spacing
        .attribute((WML_NS, "line"))
        .and_then(|v| v.parse::<f64>().ok())?;
    Some(match spacing.attribute((WML_NS, "lineRule")) {
        Some("exact") => LineSpacing::Exact(Length::twips(line.round() as i64)),
        Some("atLeast") => LineSpacing::AtLeast(Length::twips(line.round() as i64)),
        _ => LineSpacing::Multiple(line / 240.0),
    })
}

fn parse_paragraph_format(ppr: roxmltree::Node) -> ParagraphFormat {
    let spacing = wml(ppr, "spacing");
    let ind = wml(ppr, "ind");
    let first_line_indent = ind.and_then(|n| {
        twips_attr(n, "firstLine").or_else(|| twips_attr(n, "hanging").map(|h| -h))
    });
    ParagraphFormat {
        space_before: spacing.and_then(|n| twips_attr(n, "before")),
        space_after: spacing.and_then(|n| twips_attr(n, "after")),
        line_spacing: spacing.and_then(parse_line_spacing),
        first_line_indent,
        left_indent: ind.and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start"))),
        right_indent: ind.and_then(|n| twips_attr(n, "right").or_else(|| twips_attr(n, "end"))),
        alignment: wml_attr(ppr, "jc").map(parse_alignment),
        contextual_spacing: wml_bool(ppr, "contextualSpacing"),
        page_break_before: wml_bool(ppr, "pageBreakBefore"),
        keep_next: wml_bool(ppr, "keepNext"),
    }
}

fn parse_char_format(rpr: roxmltree::Node, theme: &ThemeFonts) -> CharFormat {
    CharFormat {
        font: wml(rpr, "rFonts").and_then(|n| resolve_font(n, theme)),
        size: wml_attr(rpr, "sz")
            .and_then(|v| v.parse::<f64>().ok())
            .map(|hp| hp / 2.0),
        bold: wml_bool(rpr, "b"),
        italic: wml_bool(rpr, "i"),
        underline: wml(rpr, "u")
            .and_then(|n| n.attribute((WML_NS, "val")))
            .map(|v| v != "none"),
        strike: wml_bool(rpr, "strike"),
        color: wml_attr(rpr, "color").and_then(parse_hex_color),
    }
}

/// Overlay the document defaults and paragraph/character styles of a
/// `styles.xml` onto `sheet`.
pub(super) fn parse_styles(xml: &roxmltree::Document, theme: &ThemeFonts, sheet: &mut StyleSheet) {
    let root = xml.root_element();

    if let Some(doc_defaults) = wml(root, "docDefaults") {
        if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
            let chr = parse_char_format(rpr, theme);
            sheet.default_character.overlay(&chr);
        }
        if let Some(ppr) = wml(doc_defaults, "pPrDefault").and_then(|n| wml(n, "pPr")) {
            let para = parse_paragraph_format(ppr);
            sheet.default_paragraph.overlay(&para);
        }
    }

    for style_node in root.children() {
        if style_node.tag_name().name() != "style"
            || style_node.tag_name().namespace() != Some(WML_NS)
        {
            continue;
        }
        let kind = match style_node.attribute((WML_NS, "type")) {
            Some("paragraph") => StyleKind::Paragraph,
            Some("character") => StyleKind::Character,
            _ => continue,
        };
        let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
            continue;
        };

        let name = wml_attr(style_node, "name").unwrap_or(style_id);
        let based_on = wml_attr(style_node, "basedOn").map(str::to_string);
        let paragraph = wml(style_node, "pPr")
            .map(parse_paragraph_format)
            .unwrap_or_default();
        let character = wml(style_node, "rPr")
            .map(|rpr| parse_char_format(rpr, theme))
            .unwrap_or_default();

        log::debug!("template style {style_id:?} ({kind:?}) based on {based_on:?}");
        sheet.insert(StyleDef {
            id: style_id.to_string(),
            name: name.to_string(),
            kind,
            based_on,
            paragraph,
            character,
        });
    }
}
