use std::collections::HashMap;

use crate::fonts::FontRequest;
use crate::units::Length;

/// Longest `basedOn` chain followed before giving up.
const MAX_STYLE_DEPTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TabAlignment {
    Left,
    Center,
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TabStop {
    pub position: Length,
    pub alignment: TabAlignment,
    pub leader: Option<char>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LineSpacing {
    /// Multiplier of the font's natural line height (1.0 = single).
    Multiple(f64),
    Exact(Length),
    AtLeast(Length),
}

/// Paragraph properties as written in a style or directly on a paragraph.
/// `None` means "inherit".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParagraphFormat {
    pub space_before: Option<Length>,
    pub space_after: Option<Length>,
    pub line_spacing: Option<LineSpacing>,
    pub first_line_indent: Option<Length>,
    pub left_indent: Option<Length>,
    pub right_indent: Option<Length>,
    pub alignment: Option<Alignment>,
    pub contextual_spacing: Option<bool>,
    pub page_break_before: Option<bool>,
    pub keep_next: Option<bool>,
}

/// Character properties of a style or a run. `None` means "inherit".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CharFormat {
    pub font: Option<String>,
    pub size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike: Option<bool>,
    pub color: Option<[u8; 3]>,
}

macro_rules! inherit {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field.clone();
            }
        )+
    };
}

impl ParagraphFormat {
    /// Overwrite every field that `other` sets.
    pub fn overlay(&mut self, other: &ParagraphFormat) {
        inherit!(
            self,
            other,
            space_before,
            space_after,
            line_spacing,
            first_line_indent,
            left_indent,
            right_indent,
            alignment,
            contextual_spacing,
            page_break_before,
            keep_next
        );
    }
}

impl CharFormat {
    pub fn overlay(&mut self, other: &CharFormat) {
        inherit!(self, other, font, size, bold, italic, underline, strike, color);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StyleKind {
    Paragraph,
    Character,
}

#[derive(Clone, Debug)]
pub struct StyleDef {
    pub id: String,
    pub name: String,
    pub kind: StyleKind,
    pub based_on: Option<String>,
    pub paragraph: ParagraphFormat,
    pub character: CharFormat,
}

impl StyleDef {
    pub fn paragraph(id: &str, name: &str, based_on: Option<&str>) -> Self {
        StyleDef {
            id: id.to_string(),
            name: name.to_string(),
            kind: StyleKind::Paragraph,
            based_on: based_on.map(str::to_string),
            paragraph: ParagraphFormat::default(),
            character: CharFormat::default(),
        }
    }
}

/// A paragraph style with its whole inheritance chain applied.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedParagraph {
    pub style_id: String,
    pub font: FontRequest,
    pub space_before: Length,
    pub space_after: Length,
    pub line_spacing: LineSpacing,
    pub first_line_indent: Length,
    pub left_indent: Length,
    pub right_indent: Length,
    pub alignment: Alignment,
    pub contextual_spacing: bool,
    pub page_break_before: bool,
    pub keep_next: bool,
}

#[derive(Clone, Debug)]
pub struct StyleSheet {
    pub default_paragraph: ParagraphFormat,
    pub default_character: CharFormat,
    styles: HashMap<String, StyleDef>,
    order: Vec<String>,
}

impl StyleSheet {
    pub fn new(default_paragraph: ParagraphFormat, default_character: CharFormat) -> Self {
        StyleSheet {
            default_paragraph,
            default_character,
            styles: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn insert(&mut self, style: StyleDef) {
        if !self.styles.contains_key(&style.id) {
            self.order.push(style.id.clone());
        }
        self.styles.insert(style.id.clone(), style);
    }

    pub fn get(&self, id: &str) -> Option<&StyleDef> {
        self.styles.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut StyleDef> {
        self.styles.get_mut(id)
    }

    /// Styles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &StyleDef> {
        self.order.iter().filter_map(|id| self.styles.get(id))
    }

    /// Style ids from `id` up to the root, closest first.
    fn chain(&self, id: &str) -> Vec<&StyleDef> {
        let mut chain: Vec<&StyleDef> = Vec::new();
        let mut current = self.styles.get(id).or_else(|| {
            log::debug!("Unknown style {id:?}, using Normal");
            self.styles.get("Normal")
        });
        while let Some(style) = current {
            if chain.len() >= MAX_STYLE_DEPTH || chain.iter().any(|s| s.id == style.id) {
                log::warn!("Style chain of {id:?} is cyclic or too deep, truncated");
                break;
            }
            chain.push(style);
            current = style.based_on.as_deref().and_then(|b| self.styles.get(b));
        }
        chain
    }

    /// Effective paragraph + character properties of a style, document defaults included.
    pub fn effective(&self, id: &str) -> (ParagraphFormat, CharFormat) {
        let mut para = self.default_paragraph.clone();
        let mut chr = self.default_character.clone();
        for style in self.chain(id).iter().rev() {
            para.overlay(&style.paragraph);
            chr.overlay(&style.character);
        }
        (para, chr)
    }

    pub fn resolve(&self, id: &str, direct: &ParagraphFormat) -> ResolvedParagraph {
        let (mut para, chr) = self.effective(id);
        para.overlay(direct);
        ResolvedParagraph {
            style_id: id.to_string(),
            font: FontRequest {
                family: chr.font.unwrap_or_else(|| "Times New Roman".to_string()),
                bold: chr.bold.unwrap_or(false),
                italic: chr.italic.unwrap_or(false),
                size: chr.size.unwrap_or(12.0),
            },
            space_before: para.space_before.unwrap_or(Length::ZERO),
            space_after: para.space_after.unwrap_or(Length::ZERO),
            line_spacing: para.line_spacing.unwrap_or(LineSpacing::Multiple(1.0)),
            first_line_indent: para.first_line_indent.unwrap_or(Length::ZERO),
            left_indent: para.left_indent.unwrap_or(Length::ZERO),
            right_indent: para.right_indent.unwrap_or(Length::ZERO),
            alignment: para.alignment.unwrap_or(Alignment::Left),
            contextual_spacing: para.contextual_spacing.unwrap_or(false),
            page_break_before: para.page_break_before.unwrap_or(false),
            keep_next: para.keep_next.unwrap_or(false),
        }
    }

    /// Font of a run inside a paragraph of the given resolved style.
    pub fn run_font(&self, paragraph: &ResolvedParagraph, run: &CharFormat) -> FontRequest {
        let chr = run.clone();
        FontRequest {
            family: chr.font.unwrap_or_else(|| paragraph.font.family.clone()),
            bold: chr.bold.unwrap_or(false) || paragraph.font.bold,
            italic: chr.italic.unwrap_or(false) || paragraph.font.italic,
            size: chr.size.unwrap_or(paragraph.font.size),
        }
    }

    /// The A4 report layout used when no template is given.
    pub fn builtin() -> Self {
        let mut sheet = StyleSheet::new(
            ParagraphFormat {
                space_before: Some(Length::ZERO),
                space_after: Some(Length::ZERO),
                line_spacing: Some(LineSpacing::Multiple(1.0)),
                ..Default::default()
            },
            CharFormat {
                font: Some("Times New Roman".into()),
                size: Some(14.0),
                ..Default::default()
            },
        );

        let mut normal = StyleDef::paragraph("Normal", "Normal", None);
        normal.paragraph = ParagraphFormat {
            line_spacing: Some(LineSpacing::Multiple(1.5)),
            first_line_indent: Some(Length::mm(12.5)),
            alignment: Some(Alignment::Justify),
            ..Default::default()
        };
        sheet.insert(normal);

        for (level, size, before, after) in [(1, 16.0, 0.0, 12.0), (2, 14.0, 12.0, 6.0), (3, 14.0, 6.0, 6.0)] {
            let mut h = StyleDef::paragraph(
                &format!("Heading{level}"),
                &format!("heading {level}"),
                Some("Normal"),
            );
            h.paragraph = ParagraphFormat {
                space_before: Some(Length::pt(before)),
                space_after: Some(Length::pt(after)),
                alignment: Some(Alignment::Left),
                keep_next: Some(true),
                page_break_before: Some(level == 1),
                ..Default::default()
            };
            h.character = CharFormat {
                size: Some(size),
                bold: Some(true),
                ..Default::default()
            };
            sheet.insert(h);
        }

        let mut toc_heading = StyleDef::paragraph("TOCHeading", "TOC Heading", Some("Heading1"));
        toc_heading.paragraph = ParagraphFormat {
            alignment: Some(Alignment::Center),
            page_break_before: Some(false),
            first_line_indent: Some(Length::ZERO),
            ..Default::default()
        };
        sheet.insert(toc_heading);

        let mut caption = StyleDef::paragraph("Caption", "caption", Some("Normal"));
        caption.paragraph = ParagraphFormat {
            first_line_indent: Some(Length::ZERO),
            alignment: Some(Alignment::Center),
            ..Default::default()
        };
        sheet.insert(caption);

        let mut code = StyleDef::paragraph("Code", "Code", Some("Normal"));
        code.paragraph = ParagraphFormat {
            line_spacing: Some(LineSpacing::Multiple(1.0)),
            first_line_indent: Some(Length::ZERO),
            alignment: Some(Alignment::Left),
            ..Default::default()
        };
        code.character = CharFormat {
            font: Some("Courier New".into()),
            size: Some(12.0),
            ..Default::default()
        };
        sheet.insert(code);

        let mut table_text = StyleDef::paragraph("TableText", "Table Text", Some("Normal"));
        table_text.paragraph = ParagraphFormat {
            line_spacing: Some(LineSpacing::Multiple(1.0)),
            first_line_indent: Some(Length::ZERO),
            alignment: Some(Alignment::Left),
            ..Default::default()
        };
        table_text.character.size = Some(12.0);
        sheet.insert(table_text);

        let mut list = StyleDef::paragraph("ListParagraph", "List Paragraph", Some("Normal"));
        list.paragraph.contextual_spacing = Some(true);
        sheet.insert(list);

        let mut equation = StyleDef::paragraph("Equation", "Equation", Some("Normal"));
        equation.paragraph = ParagraphFormat {
            first_line_indent: Some(Length::ZERO),
            alignment: Some(Alignment::Left),
            ..Default::default()
        };
        sheet.insert(equation);

        sheet.insert(StyleDef {
            id: "Hyperlink".into(),
            name: "Hyperlink".into(),
            kind: StyleKind::Character,
            based_on: None,
            paragraph: ParagraphFormat::default(),
            character: CharFormat {
                underline: Some(true),
                color: Some([0x05, 0x63, 0xC1]),
                ..Default::default()
            },
        });

        sheet
    }
}
