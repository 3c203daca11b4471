use std::path::PathBuf;
use std::sync::Arc;

use crate::sink::BlockId;
use crate::style::Alignment;
use crate::units::Length;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
}

/// A `@label` cross-reference to a numbered block.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    pub name: String,
    pub number: Option<u32>,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Reference {
            name: name.into(),
            number: None,
        }
    }

    /// Text shown in the output; `?` until resolved.
    pub fn display(&self) -> String {
        self.number.map_or_else(|| "?".to_string(), |n| n.to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inline {
    Text { text: String, style: TextStyle },
    Code(String),
    Math(String),
    Link { url: String, children: Vec<Inline> },
    Reference(Reference),
    /// Source element with no mapping; rendered in red.
    Unsupported(String),
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            style: TextStyle::default(),
        }
    }
}

/// Concatenated text of inline content, references shown as resolved.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text { text, .. }
            | Inline::Code(text)
            | Inline::Math(text)
            | Inline::Unsupported(text) => out.push_str(text),
            Inline::Link { children, .. } => out.push_str(&plain_text(children)),
            Inline::Reference(r) => out.push_str(&r.display()),
        }
    }
    out
}

fn references_in<'a>(inlines: &'a mut [Inline], out: &mut Vec<&'a mut Reference>) {
    for inline in inlines {
        match inline {
            Inline::Reference(r) => out.push(r),
            Inline::Link { children, .. } => references_in(children, out),
            _ => {}
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Figure,
    Table,
    Listing,
    Equation,
}

impl Category {
    /// Sequence identifier used in `SEQ` fields.
    pub fn name(self) -> &'static str {
        match self {
            Category::Figure => "Figure",
            Category::Table => "Table",
            Category::Listing => "Listing",
            Category::Equation => "Equation",
        }
    }
}

/// Caption text and label collected by the parser for the next block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptionInfo {
    pub label: Option<String>,
    pub text: Option<String>,
}

/// Blocks that take a number from a [`Category`] sequence.
pub trait Numbered {
    fn category(&self) -> Category;
    fn label(&self) -> Option<&str>;
    fn set_number(&mut self, number: u32);
}

#[derive(Clone, Debug, PartialEq)]
pub struct Paragraph {
    pub inlines: Vec<Inline>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub inlines: Vec<Inline>,
    pub numbered: bool,
    pub anchor: Option<String>,
    /// Hierarchical number, assigned by the numbering pass.
    pub number: Option<Vec<u32>>,
    /// Page the heading landed on, recorded during layout.
    pub rendered_page: Option<u32>,
}

impl Heading {
    pub fn new(level: u8, text: &str) -> Self {
        Heading {
            level,
            inlines: vec![Inline::text(text)],
            numbered: true,
            anchor: None,
            number: None,
            rendered_page: None,
        }
    }

    pub fn text(&self) -> String {
        plain_text(&self.inlines)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub path: PathBuf,
    /// Bytes of a downloaded image; local images are read from `path`.
    pub data: Option<Arc<[u8]>>,
    /// Natural display size.
    pub width: Length,
    pub height: Length,
    pub caption: CaptionInfo,
    pub number: Option<u32>,
}

impl Numbered for Image {
    fn category(&self) -> Category {
        Category::Figure
    }
    fn label(&self) -> Option<&str> {
        self.caption.label.as_deref()
    }
    fn set_number(&mut self, number: u32) {
        self.number = Some(number);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub cells: Vec<Vec<Inline>>,
    pub header: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub rows: Vec<TableRow>,
    pub alignments: Vec<Alignment>,
    pub caption: CaptionInfo,
    pub number: Option<u32>,
}

impl Table {
    pub fn columns(&self) -> usize {
        self.rows.iter().map(|r| r.cells.len()).max().unwrap_or(0)
    }
}

impl Numbered for Table {
    fn category(&self) -> Category {
        Category::Table
    }
    fn label(&self) -> Option<&str> {
        self.caption.label.as_deref()
    }
    fn set_number(&mut self, number: u32) {
        self.number = Some(number);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    pub language: Option<String>,
    pub code: String,
    pub caption: CaptionInfo,
    pub number: Option<u32>,
}

impl Numbered for Listing {
    fn category(&self) -> Category {
        Category::Listing
    }
    fn label(&self) -> Option<&str> {
        self.caption.label.as_deref()
    }
    fn set_number(&mut self, number: u32) {
        self.number = Some(number);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub formula: String,
    pub label: Option<String>,
    pub number: Option<u32>,
}

impl Numbered for Equation {
    fn category(&self) -> Category {
        Category::Equation
    }
    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
    fn set_number(&mut self, number: u32) {
        self.number = Some(number);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListItem {
    /// Nesting depth, 1 for top-level items.
    pub level: u8,
    pub ordered: bool,
    /// Ordinal within its own list.
    pub index: u32,
    pub inlines: Vec<Inline>,
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct List {
    pub items: Vec<ListItem>,
}

/// A caption that is not attached to any block.
#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    pub category: Option<Category>,
    pub number: Option<u32>,
    pub label: Option<String>,
    pub text: Option<String>,
    /// Placed above the content it describes.
    pub above: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    pub numbered: bool,
    pub number: Vec<u32>,
    pub anchor: String,
    /// Index of the heading in the block sequence.
    pub heading: usize,
    pub page: Option<u32>,
    /// Output block holding the entry, once emitted.
    pub block: Option<BlockId>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableOfContents {
    pub entries: Vec<TocEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Renderable {
    Paragraph(Paragraph),
    Heading(Heading),
    Image(Image),
    Table(Table),
    Listing(Listing),
    Equation(Equation),
    List(List),
    Caption(Caption),
    TableOfContents(TableOfContents),
    PageBreak,
    Unsupported { kind: String },
}

impl Renderable {
    pub fn paragraph(text: &str) -> Self {
        Renderable::Paragraph(Paragraph {
            inlines: vec![Inline::text(text)],
        })
    }

    /// Visit every numbered block in document order, list figures included.
    pub fn for_each_numbered(&mut self, f: &mut dyn FnMut(&mut dyn Numbered)) {
        match self {
            Renderable::Image(image) => f(image),
            Renderable::Table(table) => f(table),
            Renderable::Listing(listing) => f(listing),
            Renderable::Equation(equation) => f(equation),
            Renderable::List(list) => {
                for image in list.items.iter_mut().flat_map(|i| i.images.iter_mut()) {
                    f(image);
                }
            }
            _ => {}
        }
    }

    /// Every cross-reference embedded in paragraph-like content.
    pub fn references_mut(&mut self) -> Vec<&mut Reference> {
        let mut out = Vec::new();
        match self {
            Renderable::Paragraph(p) => references_in(&mut p.inlines, &mut out),
            Renderable::Heading(h) => references_in(&mut h.inlines, &mut out),
            Renderable::List(list) => {
                for item in &mut list.items {
                    references_in(&mut item.inlines, &mut out);
                }
            }
            Renderable::Table(table) => {
                for cell in table.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    references_in(cell, &mut out);
                }
            }
            _ => {}
        }
        out
    }
}
