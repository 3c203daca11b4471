//! Markdown to [`Renderable`] blocks.
//!
//! Besides CommonMark with tables, strikethrough and dollar math this
//! understands a few conventions of report writing:
//!
//! * `[TOC]` on its own line places the table of contents;
//! * `% text {#label}` captions the block that follows;
//! * `{#anchor}`, `{-}` and `{.unnumbered}` after a heading;
//! * `{#label}` after an image or a display equation;
//! * `@label` refers to a numbered block;
//! * `<!-- pagebreak -->` forces a new page.

use std::error::Error as StdError;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use comrak::nodes::{AstNode, ListType, NodeValue, TableAlignment};
use comrak::{Arena, Options, parse_document};

use crate::error::Warning;
use crate::model::{
    CaptionInfo, Caption, Equation, Heading, Image, Inline, List, ListItem, Listing, Paragraph,
    Reference, Renderable, Table, TableOfContents, TableRow, TextStyle, plain_text,
};
use crate::style::Alignment;
use crate::units::Length;

const TOC_MARKER: &str = "[TOC]";
const PAGE_BREAK_MARKER: &str = "<!-- pagebreak -->";
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
pub struct Parsed {
    pub blocks: Vec<Renderable>,
    pub warnings: Vec<Warning>,
}

/// Trailing `{#id .class -}` attribute block.
#[derive(Debug, Default, PartialEq)]
struct Attributes {
    id: Option<String>,
    unnumbered: bool,
}

/// Split `"text {#id}"` into the text and its attributes.
fn split_attributes(text: &str) -> (&str, Option<Attributes>) {
    let trimmed = text.trim_end();
    let Some(body) = trimmed.strip_suffix('}') else {
        return (text, None);
    };
    let Some(open) = body.rfind('{') else {
        return (text, None);
    };
    let mut attrs = Attributes::default();
    for token in body[open + 1..].split_whitespace() {
        match token {
            "-" | ".unnumbered" => attrs.unnumbered = true,
            t if t.starts_with('#') && t.len() > 1 => attrs.id = Some(t[1..].to_string()),
            t if t.starts_with('.') => {}
            _ => return (text, None),
        }
    }
    (trimmed[..open].trim_end(), Some(attrs))
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

/// Cut `@label` references out of plain text.
fn split_references(text: &str, style: TextStyle, out: &mut Vec<Inline>) {
    let mut rest = text;
    let mut plain = String::new();
    while let Some(at) = rest.find('@') {
        let before = &rest[..at];
        let after = &rest[at + 1..];
        let glued = before.chars().next_back().is_some_and(char::is_alphanumeric);
        let len: usize = after
            .chars()
            .take_while(|&c| is_label_char(c))
            .map(char::len_utf8)
            .sum();
        // Sentence punctuation after a label is not part of it.
        let name = after[..len].trim_end_matches(['.', ':', '-']);
        plain.push_str(before);
        if glued || name.is_empty() {
            plain.push('@');
            rest = after;
            continue;
        }
        if !plain.is_empty() {
            out.push(Inline::Text {
                text: std::mem::take(&mut plain),
                style,
            });
        }
        out.push(Inline::Reference(Reference::new(name)));
        rest = &after[name.len()..];
    }
    plain.push_str(rest);
    if !plain.is_empty() {
        out.push(Inline::Text { text: plain, style });
    }
}

/// Join adjacent text runs of the same style; comrak splits text at every
/// punctuation character it might treat specially.
fn merge_text(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::with_capacity(inlines.len());
    for inline in inlines {
        if let Inline::Text { text, style } = &inline
            && let Some(Inline::Text {
                text: last,
                style: last_style,
            }) = out.last_mut()
            && last_style == style
        {
            last.push_str(text);
            continue;
        }
        out.push(inline);
    }
    out
}

fn with_references(inlines: Vec<Inline>) -> Vec<Inline> {
    let mut out = Vec::with_capacity(inlines.len());
    for inline in inlines {
        match inline {
            Inline::Text { text, style } => split_references(&text, style, &mut out),
            Inline::Link { url, children } => out.push(Inline::Link {
                url,
                children: with_references(children),
            }),
            other => out.push(other),
        }
    }
    out
}

/// Remove a trailing attribute block from the last text run.
fn take_attributes(inlines: &mut Vec<Inline>) -> Option<Attributes> {
    let Some(Inline::Text { text, .. }) = inlines.last_mut() else {
        return None;
    };
    let (kept, attrs) = split_attributes(text);
    let attrs = attrs?;
    let kept = kept.to_string();
    if kept.trim().is_empty() {
        inlines.pop();
    } else {
        *text = kept;
    }
    Some(attrs)
}

fn is_remote(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("ftp://")
}

/// Download an image and read its pixel size from the header.
fn fetch_image(url: &str) -> Result<(Arc<[u8]>, (u32, u32)), Box<dyn StdError + Send + Sync>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let bytes = client.get(url).send()?.error_for_status()?.bytes()?;
    let size = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    Ok((Arc::from(&bytes[..]), size))
}

fn table_alignment(a: &TableAlignment) -> Alignment {
    match a {
        TableAlignment::Center => Alignment::Center,
        TableAlignment::Right => Alignment::Right,
        TableAlignment::Left | TableAlignment::None => Alignment::Left,
    }
}

struct Parser<'p> {
    base_dir: &'p Path,
    blocks: Vec<Renderable>,
    warnings: Vec<Warning>,
    pending_caption: Option<CaptionInfo>,
}

impl<'p> Parser<'p> {
    fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn unsupported(&mut self, kind: &str) {
        self.warn(Warning::UnsupportedBlock(kind.to_string()));
        self.push(Renderable::Unsupported {
            kind: kind.to_string(),
        });
    }

    /// Append a block; a caption nobody claimed becomes a block of its own.
    fn push(&mut self, block: Renderable) {
        if let Some(caption) = self.pending_caption.take() {
            self.blocks.push(Renderable::Caption(Caption {
                category: None,
                number: None,
                label: caption.label,
                text: caption.text,
                above: false,
            }));
        }
        self.blocks.push(block);
    }

    fn take_caption(&mut self) -> CaptionInfo {
        self.pending_caption.take().unwrap_or_default()
    }

    fn inlines<'a>(&mut self, node: &'a AstNode<'a>, style: TextStyle, out: &mut Vec<Inline>) {
        for child in node.children() {
            match &child.data.borrow().value {
                NodeValue::Text(text) => out.push(Inline::Text {
                    text: text.to_string(),
                    style,
                }),
                NodeValue::SoftBreak => out.push(Inline::Text {
                    text: " ".into(),
                    style,
                }),
                NodeValue::LineBreak => out.push(Inline::Text {
                    text: "\n".into(),
                    style,
                }),
                NodeValue::Code(code) => out.push(Inline::Code(code.literal.clone())),
                NodeValue::Math(math) => out.push(Inline::Math(math.literal.clone())),
                NodeValue::Emph => self.inlines(child, TextStyle { italic: true, ..style }, out),
                NodeValue::Strong => self.inlines(child, TextStyle { bold: true, ..style }, out),
                NodeValue::Strikethrough => {
                    self.inlines(child, TextStyle { strike: true, ..style }, out)
                }
                NodeValue::Link(link) => {
                    let mut children = Vec::new();
                    self.inlines(child, style, &mut children);
                    out.push(Inline::Link {
                        url: link.url.clone(),
                        children: merge_text(children),
                    });
                }
                NodeValue::HtmlInline(html) => {
                    self.warn(Warning::UnsupportedBlock("inline HTML".into()));
                    out.push(Inline::Unsupported(html.clone()));
                }
                // Images are lifted out of the paragraph by the caller.
                NodeValue::Image(_) => {}
                _ => self.inlines(child, style, out),
            }
        }
    }

    fn collect_inlines<'a>(&mut self, node: &'a AstNode<'a>) -> Vec<Inline> {
        let mut raw = Vec::new();
        self.inlines(node, TextStyle::default(), &mut raw);
        merge_text(raw)
    }

    /// Load an image's natural size; `None` drops the image.
    fn image<'a>(&mut self, node: &'a AstNode<'a>, url: &str, label: Option<String>) -> Option<Image> {
        let (path, data, (w, h)) = if is_remote(url) {
            match fetch_image(url) {
                Ok((data, size)) => {
                    log::debug!("fetched {url}: {} bytes", data.len());
                    (PathBuf::from(url), Some(data), size)
                }
                Err(e) => {
                    log::debug!("image {url}: {e}");
                    self.warn(Warning::RemoteImage(url.to_string()));
                    return None;
                }
            }
        } else {
            let path: PathBuf = self.base_dir.join(url);
            match image::image_dimensions(&path) {
                Ok(size) => (path, None, size),
                Err(e) => {
                    log::debug!("image {}: {e}", path.display());
                    self.warn(Warning::MissingImage(path));
                    return None;
                }
            }
        };

        let alt = plain_text(&self.collect_inlines(node));
        let mut caption = self.take_caption();
        if caption.text.is_none() && !alt.trim().is_empty() {
            caption.text = Some(alt.trim().to_string());
        }
        if label.is_some() {
            caption.label = label;
        }
        Some(Image {
            path,
            data,
            width: Length::pt(w as f64),
            height: Length::pt(h as f64),
            caption,
            number: None,
        })
    }

    /// Images of a paragraph, each with the `{#label}` that directly follows it.
    fn paragraph_images<'a>(&mut self, node: &'a AstNode<'a>) -> Vec<Image> {
        let mut images = Vec::new();
        let mut children = node.children().peekable();
        while let Some(child) = children.next() {
            let url = match &child.data.borrow().value {
                NodeValue::Image(link) => link.url.clone(),
                _ => continue,
            };
            let label = children.peek().and_then(|next| match &next.data.borrow().value {
                NodeValue::Text(t) => split_attributes(t.trim_start())
                    .1
                    .filter(|_| t.trim_start().starts_with('{'))
                    .and_then(|a| a.id),
                _ => None,
            });
            if let Some(image) = self.image(child, &url, label) {
                images.push(image);
            }
        }
        images
    }

    /// A paragraph holding nothing but `$$formula$$` and an optional `{#label}`.
    fn display_equation<'a>(&self, node: &'a AstNode<'a>) -> Option<Equation> {
        let mut formula = None;
        let mut label = None;
        for child in node.children() {
            match &child.data.borrow().value {
                NodeValue::Math(math) if math.display_math && formula.is_none() => {
                    formula = Some(math.literal.clone());
                }
                NodeValue::SoftBreak | NodeValue::LineBreak => {}
                NodeValue::Text(t) if t.trim().is_empty() => {}
                NodeValue::Text(t) => {
                    let (rest, attrs) = split_attributes(t);
                    if !rest.trim().is_empty() || label.is_some() {
                        return None;
                    }
                    label = attrs?.id;
                }
                _ => return None,
            }
        }
        Some(Equation {
            formula: formula?,
            label,
            number: None,
        })
    }

    fn paragraph<'a>(&mut self, node: &'a AstNode<'a>) {
        if let Some(mut equation) = self.display_equation(node) {
            if equation.label.is_none() {
                equation.label = self.take_caption().label;
            }
            self.push(Renderable::Equation(equation));
            return;
        }

        let mut inlines = self.collect_inlines(node);
        let text = plain_text(&inlines);
        let trimmed = text.trim();
        if trimmed == TOC_MARKER {
            self.push(Renderable::TableOfContents(TableOfContents::default()));
            return;
        }
        if let Some(caption) = trimmed.strip_prefix('%') {
            let (caption_text, attrs) = split_attributes(caption.trim());
            self.pending_caption = Some(CaptionInfo {
                label: attrs.and_then(|a| a.id),
                text: Some(caption_text.trim().to_string()).filter(|t| !t.is_empty()),
            });
            return;
        }

        let images = self.paragraph_images(node);
        if !images.is_empty() {
            // Labels that followed images were consumed with them.
            if let Some(Inline::Text { text, .. }) = inlines.last_mut() {
                let (kept, attrs) = split_attributes(text);
                if attrs.is_some() {
                    *text = kept.to_string();
                }
            }
        }
        let has_text = inlines.iter().any(|i| match i {
            Inline::Text { text, .. } => !text.trim().is_empty(),
            _ => true,
        });
        if has_text {
            self.push(Renderable::Paragraph(Paragraph {
                inlines: with_references(inlines),
            }));
        }
        for image in images {
            self.push(Renderable::Image(image));
        }
    }

    fn heading<'a>(&mut self, node: &'a AstNode<'a>, level: u8) {
        let mut inlines = self.collect_inlines(node);
        let attrs = take_attributes(&mut inlines).unwrap_or_default();
        self.push(Renderable::Heading(Heading {
            level,
            inlines: with_references(inlines),
            numbered: !attrs.unnumbered,
            anchor: attrs.id,
            number: None,
            rendered_page: None,
        }));
    }

    fn table<'a>(&mut self, node: &'a AstNode<'a>, alignments: &[TableAlignment]) {
        let mut rows = Vec::new();
        for row in node.children() {
            let header = match row.data.borrow().value {
                NodeValue::TableRow(header) => header,
                _ => continue,
            };
            let cells = row
                .children()
                .map(|cell| with_references(self.collect_inlines(cell)))
                .collect();
            rows.push(TableRow { cells, header });
        }
        let caption = self.take_caption();
        self.push(Renderable::Table(Table {
            rows,
            alignments: alignments.iter().map(table_alignment).collect(),
            caption,
            number: None,
        }));
    }

    fn list_items<'a>(&mut self, node: &'a AstNode<'a>, level: u8, items: &mut Vec<ListItem>) {
        let (ordered, start) = match &node.data.borrow().value {
            NodeValue::List(list) => (list.list_type == ListType::Ordered, list.start as u32),
            _ => return,
        };
        for (i, item) in node.children().enumerate() {
            let mut inlines = Vec::new();
            let mut images = Vec::new();
            let mut nested = Vec::new();
            for child in item.children() {
                let value = child.data.borrow().value.clone();
                match value {
                    NodeValue::Paragraph => {
                        if !inlines.is_empty() {
                            inlines.push(Inline::text(" "));
                        }
                        inlines.extend(self.collect_inlines(child));
                        images.extend(self.paragraph_images(child));
                    }
                    NodeValue::List(_) => self.list_items(child, level + 1, &mut nested),
                    NodeValue::CodeBlock(code) => {
                        self.warn(Warning::UnsupportedBlock("code block in a list".into()));
                        inlines.push(Inline::Unsupported(code.literal.trim_end().to_string()));
                    }
                    _ => {
                        self.warn(Warning::UnsupportedBlock("block in a list".into()));
                    }
                }
            }
            items.push(ListItem {
                level,
                ordered,
                index: if ordered { start + i as u32 } else { i as u32 + 1 },
                inlines: with_references(merge_text(inlines)),
                images,
            });
            items.append(&mut nested);
        }
    }

    fn block<'a>(&mut self, node: &'a AstNode<'a>) {
        let value = node.data.borrow().value.clone();
        match value {
            NodeValue::Paragraph => self.paragraph(node),
            NodeValue::Heading(h) => self.heading(node, h.level),
            NodeValue::CodeBlock(code) => {
                let caption = self.take_caption();
                let language = code
                    .info
                    .split_whitespace()
                    .next()
                    .map(str::to_string);
                self.push(Renderable::Listing(Listing {
                    language,
                    code: code.literal,
                    caption,
                    number: None,
                }));
            }
            NodeValue::Table(table) => self.table(node, &table.alignments),
            NodeValue::List(_) => {
                let mut items = Vec::new();
                self.list_items(node, 1, &mut items);
                self.push(Renderable::List(List { items }));
            }
            NodeValue::HtmlBlock(html) if html.literal.trim() == PAGE_BREAK_MARKER => {
                self.push(Renderable::PageBreak);
            }
            NodeValue::HtmlBlock(_) => self.unsupported("HTML block"),
            NodeValue::ThematicBreak | NodeValue::FrontMatter(_) => {}
            NodeValue::BlockQuote => self.unsupported("Block quote"),
            NodeValue::FootnoteDefinition(_) => self.unsupported("Footnote"),
            other => {
                log::debug!("unmapped block {other:?}");
                self.unsupported("Element");
            }
        }
    }
}

/// Parse one Markdown source. Relative image paths resolve against `base_dir`.
pub fn parse(markdown: &str, base_dir: &Path) -> Parsed {
    let arena = Arena::new();
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.math_dollars = true;
    let root = parse_document(&arena, markdown, &options);

    let mut parser = Parser {
        base_dir,
        blocks: Vec::new(),
        warnings: Vec::new(),
        pending_caption: None,
    };
    for node in root.children() {
        parser.block(node);
    }
    if let Some(caption) = parser.pending_caption.take() {
        log::warn!("caption {:?} has nothing to describe", caption.text);
    }
    Parsed {
        blocks: parser.blocks,
        warnings: parser.warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_block_is_split_off() {
        let (text, attrs) = split_attributes("Intro {#intro}");
        assert_eq!(text, "Intro");
        assert_eq!(attrs.and_then(|a| a.id).as_deref(), Some("intro"));

        let (text, attrs) = split_attributes("Preface {-}");
        assert_eq!(text, "Preface");
        assert!(attrs.is_some_and(|a| a.unnumbered));

        assert!(split_attributes("set {a, b}").1.is_none());
    }

    #[test]
    fn references_skip_email_addresses() {
        let mut out = Vec::new();
        split_references("see @fig:a. mail me@host", TextStyle::default(), &mut out);
        assert_eq!(out.len(), 3);
        assert!(matches!(&out[1], Inline::Reference(r) if r.name == "fig:a"));
        assert!(matches!(&out[2], Inline::Text { text, .. } if text == ". mail me@host"));
    }
}
