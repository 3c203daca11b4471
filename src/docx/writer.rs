//! WordprocessingML package serialization of a laid-out [`Body`].

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::layout::PageGeometry;
use crate::sink::{
    Body, ImagePlacement, Link, OutputBlock, OutputParagraph, OutputRun, OutputSink, OutputTable,
    RunFormat,
};
use crate::style::{
    Alignment, CharFormat, LineSpacing, ParagraphFormat, StyleKind, StyleSheet, TabAlignment,
    TabStop,
};
use crate::units::Length;

use super::{REL_NS, TitleDocument, WML_NS};

const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const DOC_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const FOOTER_REL_ID: &str = "rId3";

type XmlWriter = Writer<Vec<u8>>;

/// Element shorthands over a `quick_xml` writer; attribute values and text are escaped.
trait WmlWriter {
    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), Error>;
    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), Error>;
    fn close(&mut self, tag: &str) -> Result<(), Error>;
    fn text(&mut self, text: &str) -> Result<(), Error>;
    /// Already serialized markup, written as is.
    fn raw(&mut self, markup: &str) -> Result<(), Error>;

    fn val(&mut self, tag: &str, value: &str) -> Result<(), Error> {
        self.empty(tag, &[("w:val", value)])
    }

    fn toggle(&mut self, tag: &str, value: Option<bool>) -> Result<(), Error> {
        match value {
            Some(true) => self.empty(tag, &[]),
            Some(false) => self.val(tag, "0"),
            None => Ok(()),
        }
    }
}

impl<W: Write> WmlWriter for Writer<W> {
    fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let start = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.write_event(Event::Start(start))?;
        Ok(())
    }

    fn empty(&mut self, tag: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        let start = BytesStart::new(tag).with_attributes(attrs.iter().copied());
        self.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn close(&mut self, tag: &str) -> Result<(), Error> {
        self.write_event(Event::End(BytesEnd::new(tag)))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), Error> {
        self.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn raw(&mut self, markup: &str) -> Result<(), Error> {
        self.write_event(Event::Text(BytesText::from_escaped(markup)))?;
        Ok(())
    }
}

/// A standalone XML part: declaration followed by whatever `build` writes.
fn xml_part(build: impl FnOnce(&mut XmlWriter) -> Result<(), Error>) -> Result<Vec<u8>, Error> {
    let mut xml = Writer::new(Vec::new());
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    build(&mut xml)?;
    Ok(xml.into_inner())
}

struct Relationship {
    id: String,
    kind: &'static str,
    target: String,
    external: bool,
}

/// State shared by everything written into `document.xml`.
struct DocumentParts {
    xml: XmlWriter,
    relationships: Vec<Relationship>,
    media: Vec<(String, Vec<u8>)>,
    media_by_path: HashMap<std::path::PathBuf, String>,
    hyperlinks: HashMap<String, String>,
    bookmarks: HashMap<String, u32>,
    next_drawing: u32,
}

fn alignment_val(a: Alignment) -> &'static str {
    match a {
        Alignment::Left => "left",
        Alignment::Center => "center",
        Alignment::Right => "right",
        Alignment::Justify => "both",
    }
}

fn tab_val(a: TabAlignment) -> &'static str {
    match a {
        TabAlignment::Left => "left",
        TabAlignment::Center => "center",
        TabAlignment::Right => "right",
    }
}

fn leader_val(c: char) -> &'static str {
    match c {
        '.' => "dot",
        '-' => "hyphen",
        '_' => "underscore",
        _ => "middleDot",
    }
}

fn twips(l: Length) -> String {
    l.as_twips().to_string()
}

/// `w:pPr` children for `format` in schema order, after `w:pStyle`.
fn write_paragraph_format(
    xml: &mut XmlWriter,
    format: &ParagraphFormat,
    tabs: &[TabStop],
    outline_level: Option<u8>,
) -> Result<(), Error> {
    xml.toggle("w:keepNext", format.keep_next)?;
    xml.toggle("w:pageBreakBefore", format.page_break_before)?;
    if !tabs.is_empty() {
        xml.open("w:tabs", &[])?;
        for tab in tabs {
            let pos = twips(tab.position);
            let mut attrs = vec![("w:val", tab_val(tab.alignment))];
            if let Some(leader) = tab.leader {
                attrs.push(("w:leader", leader_val(leader)));
            }
            attrs.push(("w:pos", pos.as_str()));
            xml.empty("w:tab", &attrs)?;
        }
        xml.close("w:tabs")?;
    }

    let before = format.space_before.map(twips);
    let after = format.space_after.map(twips);
    let line = format.line_spacing.map(|ls| match ls {
        LineSpacing::Multiple(m) => (((m * 240.0).round() as i64).to_string(), "auto"),
        LineSpacing::Exact(l) => (twips(l), "exact"),
        LineSpacing::AtLeast(l) => (twips(l), "atLeast"),
    });
    if before.is_some() || after.is_some() || line.is_some() {
        let mut attrs = Vec::new();
        if let Some(b) = &before {
            attrs.push(("w:before", b.as_str()));
        }
        if let Some(a) = &after {
            attrs.push(("w:after", a.as_str()));
        }
        if let Some((l, rule)) = &line {
            attrs.push(("w:line", l.as_str()));
            attrs.push(("w:lineRule", *rule));
        }
        xml.empty("w:spacing", &attrs)?;
    }

    let first = format.first_line_indent;
    let first_val = first.map(|f| twips(if f < Length::ZERO { -f } else { f }));
    let left = format.left_indent.map(twips);
    let right = format.right_indent.map(twips);
    if first.is_some() || left.is_some() || right.is_some() {
        let mut attrs = Vec::new();
        if let Some(l) = &left {
            attrs.push(("w:left", l.as_str()));
        }
        if let Some(r) = &right {
            attrs.push(("w:right", r.as_str()));
        }
        if let (Some(f), Some(v)) = (first, &first_val) {
            let name = if f < Length::ZERO { "w:hanging" } else { "w:firstLine" };
            attrs.push((name, v.as_str()));
        }
        xml.empty("w:ind", &attrs)?;
    }
    xml.toggle("w:contextualSpacing", format.contextual_spacing)?;
    if let Some(a) = format.alignment {
        xml.val("w:jc", alignment_val(a))?;
    }
    if let Some(level) = outline_level {
        xml.val("w:outlineLvl", &level.to_string())?;
    }
    Ok(())
}

fn write_char_format(
    xml: &mut XmlWriter,
    style: Option<&str>,
    format: &CharFormat,
) -> Result<(), Error> {
    if let Some(style) = style {
        xml.val("w:rStyle", style)?;
    }
    if let Some(font) = &format.font {
        xml.empty(
            "w:rFonts",
            &[
                ("w:ascii", font.as_str()),
                ("w:hAnsi", font.as_str()),
                ("w:cs", font.as_str()),
                ("w:eastAsia", font.as_str()),
            ],
        )?;
    }
    xml.toggle("w:b", format.bold)?;
    xml.toggle("w:i", format.italic)?;
    xml.toggle("w:strike", format.strike)?;
    if let Some([r, g, b]) = format.color {
        xml.val("w:color", &format!("{r:02X}{g:02X}{b:02X}"))?;
    }
    if let Some(size) = format.size {
        let hp = ((size * 2.0).round() as i64).to_string();
        xml.val("w:sz", &hp)?;
        xml.val("w:szCs", &hp)?;
    }
    match format.underline {
        Some(true) => xml.val("w:u", "single"),
        Some(false) => xml.val("w:u", "none"),
        None => Ok(()),
    }
}

fn is_plain(format: &RunFormat) -> bool {
    format.style.is_none() && format.character == CharFormat::default()
}

fn run_properties(xml: &mut XmlWriter, format: &RunFormat) -> Result<(), Error> {
    if is_plain(format) {
        return Ok(());
    }
    xml.open("w:rPr", &[])?;
    write_char_format(xml, format.style.as_deref(), &format.character)?;
    xml.close("w:rPr")
}

/// `w:t` runs for `text`, with tabs and line breaks as their own elements.
fn text_run(xml: &mut XmlWriter, text: &str, format: &RunFormat) -> Result<(), Error> {
    xml.open("w:r", &[])?;
    run_properties(xml, format)?;
    let mut first = true;
    for line in text.split('\n') {
        if !first {
            xml.empty("w:br", &[])?;
        }
        first = false;
        let mut first_part = true;
        for part in line.split('\t') {
            if !first_part {
                xml.empty("w:tab", &[])?;
            }
            first_part = false;
            if !part.is_empty() {
                xml.open("w:t", &[("xml:space", "preserve")])?;
                xml.text(part)?;
                xml.close("w:t")?;
            }
        }
    }
    xml.close("w:r")
}

fn field_char(xml: &mut XmlWriter, kind: &str, format: &RunFormat) -> Result<(), Error> {
    xml.open("w:r", &[])?;
    run_properties(xml, format)?;
    xml.empty("w:fldChar", &[("w:fldCharType", kind)])?;
    xml.close("w:r")
}

/// Link target of a run; `None` for runs that do not interrupt a link.
fn run_link(run: &OutputRun) -> Option<Option<&Link>> {
    match run {
        OutputRun::Text { format, .. }
        | OutputRun::NoBreakHyphen { format }
        | OutputRun::Field { format, .. } => Some(format.link.as_ref()),
        _ => None,
    }
}

impl DocumentParts {
    fn new() -> Self {
        DocumentParts {
            xml: Writer::new(Vec::new()),
            relationships: vec![
                Relationship {
                    id: "rId1".into(),
                    kind: "styles",
                    target: "styles.xml".into(),
                    external: false,
                },
                Relationship {
                    id: "rId2".into(),
                    kind: "settings",
                    target: "settings.xml".into(),
                    external: false,
                },
                Relationship {
                    id: FOOTER_REL_ID.into(),
                    kind: "footer",
                    target: "footer1.xml".into(),
                    external: false,
                },
            ],
            media: Vec::new(),
            media_by_path: HashMap::new(),
            hyperlinks: HashMap::new(),
            bookmarks: HashMap::new(),
            next_drawing: 1,
        }
    }

    fn add_relationship(&mut self, kind: &'static str, target: String, external: bool) -> String {
        let id = format!("rId{}", self.relationships.len() + 1);
        self.relationships.push(Relationship {
            id: id.clone(),
            kind,
            target,
            external,
        });
        id
    }

    fn hyperlink_id(&mut self, url: &str) -> String {
        if let Some(id) = self.hyperlinks.get(url) {
            return id.clone();
        }
        let id = self.add_relationship("hyperlink", url.to_string(), true);
        self.hyperlinks.insert(url.to_string(), id.clone());
        id
    }

    fn image_id(&mut self, image: &ImagePlacement) -> Result<String, Error> {
        if let Some(id) = self.media_by_path.get(&image.path) {
            return Ok(id.clone());
        }
        let data = match &image.data {
            Some(data) => data.to_vec(),
            None => std::fs::read(&image.path)?,
        };
        let ext = match image::guess_format(&data) {
            Ok(image::ImageFormat::Png) => "png".to_string(),
            Ok(image::ImageFormat::Jpeg) => "jpeg".to_string(),
            Ok(image::ImageFormat::Gif) => "gif".to_string(),
            _ => image
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "png".to_string()),
        };
        let name = format!("image{}.{ext}", self.media.len() + 1);
        let id = self.add_relationship("image", format!("media/{name}"), false);
        self.media.push((name, data));
        self.media_by_path.insert(image.path.clone(), id.clone());
        Ok(id)
    }

    fn bookmark_id(&mut self, name: &str) -> String {
        let next = self.bookmarks.len() as u32;
        self.bookmarks.entry(name.to_string()).or_insert(next).to_string()
    }

    fn drawing(&mut self, image: &ImagePlacement) -> Result<(), Error> {
        let rel = self.image_id(image)?;
        let id = self.next_drawing;
        self.next_drawing += 1;
        let cx = image.width.as_emu().to_string();
        let cy = image.height.as_emu().to_string();
        let id_str = id.to_string();
        let name = format!("Picture {id}");

        let xml = &mut self.xml;
        xml.open("w:r", &[])?;
        xml.open("w:drawing", &[])?;
        xml.open(
            "wp:inline",
            &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
        )?;
        xml.empty("wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
        xml.empty(
            "wp:docPr",
            &[("id", id_str.as_str()), ("name", name.as_str()), ("descr", image.description.as_str())],
        )?;
        xml.open("wp:cNvGraphicFramePr", &[])?;
        xml.empty("a:graphicFrameLocks", &[("noChangeAspect", "1")])?;
        xml.close("wp:cNvGraphicFramePr")?;
        xml.open("a:graphic", &[])?;
        xml.open("a:graphicData", &[("uri", PIC_NS)])?;
        xml.open("pic:pic", &[])?;
        xml.open("pic:nvPicPr", &[])?;
        xml.empty("pic:cNvPr", &[("id", "0"), ("name", name.as_str())])?;
        xml.empty("pic:cNvPicPr", &[])?;
        xml.close("pic:nvPicPr")?;
        xml.open("pic:blipFill", &[])?;
        xml.empty("a:blip", &[("r:embed", rel.as_str())])?;
        xml.open("a:stretch", &[])?;
        xml.empty("a:fillRect", &[])?;
        xml.close("a:stretch")?;
        xml.close("pic:blipFill")?;
        xml.open("pic:spPr", &[])?;
        xml.open("a:xfrm", &[])?;
        xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
        xml.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
        xml.close("a:xfrm")?;
        xml.open("a:prstGeom", &[("prst", "rect")])?;
        xml.empty("a:avLst", &[])?;
        xml.close("a:prstGeom")?;
        xml.close("pic:spPr")?;
        xml.close("pic:pic")?;
        xml.close("a:graphicData")?;
        xml.close("a:graphic")?;
        xml.close("wp:inline")?;
        xml.close("w:drawing")?;
        xml.close("w:r")?;
        Ok(())
    }

    fn run(&mut self, run: &OutputRun) -> Result<(), Error> {
        match run {
            OutputRun::Text { text, format } => text_run(&mut self.xml, text, format)?,
            OutputRun::NoBreakHyphen { format } => {
                self.xml.open("w:r", &[])?;
                run_properties(&mut self.xml, format)?;
                self.xml.empty("w:noBreakHyphen", &[])?;
                self.xml.close("w:r")?;
            }
            OutputRun::Tab => {
                self.xml.open("w:r", &[])?;
                self.xml.empty("w:tab", &[])?;
                self.xml.close("w:r")?;
            }
            OutputRun::Field {
                instruction,
                text,
                format,
            } => {
                field_char(&mut self.xml, "begin", format)?;
                self.xml.open("w:r", &[])?;
                run_properties(&mut self.xml, format)?;
                self.xml.open("w:instrText", &[("xml:space", "preserve")])?;
                self.xml.text(&format!(" {instruction} "))?;
                self.xml.close("w:instrText")?;
                self.xml.close("w:r")?;
                field_char(&mut self.xml, "separate", format)?;
                text_run(&mut self.xml, text, format)?;
                field_char(&mut self.xml, "end", format)?;
            }
            OutputRun::BookmarkStart { name } => {
                let id = self.bookmark_id(name);
                self.xml
                    .empty("w:bookmarkStart", &[("w:id", id.as_str()), ("w:name", name.as_str())])?;
            }
            OutputRun::BookmarkEnd { name } => {
                let id = self.bookmark_id(name);
                self.xml.empty("w:bookmarkEnd", &[("w:id", id.as_str())])?;
            }
            OutputRun::Image(image) => self.drawing(image)?,
            OutputRun::PageBreak => {
                self.xml.open("w:r", &[])?;
                self.xml.empty("w:br", &[("w:type", "page")])?;
                self.xml.close("w:r")?;
            }
        }
        Ok(())
    }

    fn paragraph(&mut self, p: &OutputParagraph) -> Result<(), Error> {
        self.xml.open("w:p", &[])?;
        self.xml.open("w:pPr", &[])?;
        self.xml.val("w:pStyle", &p.style)?;
        write_paragraph_format(&mut self.xml, &p.format, &p.tab_stops, None)?;
        self.xml.close("w:pPr")?;

        let mut open_link: Option<&Link> = None;
        for run in &p.runs {
            if let Some(link) = run_link(run)
                && link != open_link
            {
                if open_link.is_some() {
                    self.xml.close("w:hyperlink")?;
                }
                match link {
                    Some(Link::Url(url)) => {
                        let id = self.hyperlink_id(url);
                        self.xml.open("w:hyperlink", &[("r:id", id.as_str())])?;
                    }
                    Some(Link::Anchor(anchor)) => {
                        self.xml
                            .open("w:hyperlink", &[("w:anchor", anchor.as_str()), ("w:history", "1")])?;
                    }
                    None => {}
                }
                open_link = link;
            }
            self.run(run)?;
        }
        if open_link.is_some() {
            self.xml.close("w:hyperlink")?;
        }
        self.xml.close("w:p")?;
        Ok(())
    }

    fn table(&mut self, t: &OutputTable) -> Result<(), Error> {
        let total: Length = t.column_widths.iter().copied().sum();
        self.xml.open("w:tbl", &[])?;
        self.xml.open("w:tblPr", &[])?;
        self.xml
            .empty("w:tblW", &[("w:w", twips(total).as_str()), ("w:type", "dxa")])?;
        if t.borders {
            self.xml.open("w:tblBorders", &[])?;
            for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
                self.xml.empty(
                    side,
                    &[("w:val", "single"), ("w:sz", "4"), ("w:space", "0"), ("w:color", "auto")],
                )?;
            }
            self.xml.close("w:tblBorders")?;
        }
        self.xml.empty("w:tblLayout", &[("w:type", "fixed")])?;
        self.xml.open("w:tblCellMar", &[])?;
        let m = &t.cell_margins;
        for (side, value) in [
            ("w:top", m.top),
            ("w:left", m.left),
            ("w:bottom", m.bottom),
            ("w:right", m.right),
        ] {
            self.xml
                .empty(side, &[("w:w", twips(value).as_str()), ("w:type", "dxa")])?;
        }
        self.xml.close("w:tblCellMar")?;
        self.xml.close("w:tblPr")?;

        self.xml.open("w:tblGrid", &[])?;
        for w in &t.column_widths {
            self.xml.empty("w:gridCol", &[("w:w", twips(*w).as_str())])?;
        }
        self.xml.close("w:tblGrid")?;

        for row in &t.rows {
            self.xml.open("w:tr", &[])?;
            if row.cant_split || row.header {
                self.xml.open("w:trPr", &[])?;
                if row.cant_split {
                    self.xml.empty("w:cantSplit", &[])?;
                }
                if row.header {
                    self.xml.empty("w:tblHeader", &[])?;
                }
                self.xml.close("w:trPr")?;
            }
            for (cell, width) in row.cells.iter().zip(&t.column_widths) {
                self.xml.open("w:tc", &[])?;
                self.xml.open("w:tcPr", &[])?;
                self.xml
                    .empty("w:tcW", &[("w:w", twips(*width).as_str()), ("w:type", "dxa")])?;
                self.xml.close("w:tcPr")?;
                if cell.paragraphs.is_empty() {
                    self.xml.empty("w:p", &[])?;
                }
                for p in &cell.paragraphs {
                    self.paragraph(p)?;
                }
                self.xml.close("w:tc")?;
            }
            self.xml.close("w:tr")?;
        }
        self.xml.close("w:tbl")?;
        Ok(())
    }
}

fn section_properties(
    xml: &mut XmlWriter,
    geometry: &PageGeometry,
    footer: bool,
    page_start: Option<u32>,
) -> Result<(), Error> {
    xml.open("w:sectPr", &[])?;
    if footer {
        xml.empty(
            "w:footerReference",
            &[("w:type", "default"), ("r:id", FOOTER_REL_ID)],
        )?;
    }
    let (w, h) = (twips(geometry.page_width), twips(geometry.page_height));
    let mut size = vec![("w:w", w.as_str()), ("w:h", h.as_str())];
    if geometry.page_width > geometry.page_height {
        size.push(("w:orient", "landscape"));
    }
    xml.empty("w:pgSz", &size)?;
    xml.empty(
        "w:pgMar",
        &[
            ("w:top", twips(geometry.margin_top).as_str()),
            ("w:right", twips(geometry.margin_right).as_str()),
            ("w:bottom", twips(geometry.margin_bottom).as_str()),
            ("w:left", twips(geometry.margin_left).as_str()),
            ("w:header", twips(geometry.header).as_str()),
            ("w:footer", twips(geometry.footer).as_str()),
            ("w:gutter", "0"),
        ],
    )?;
    if let Some(start) = page_start {
        xml.empty("w:pgNumType", &[("w:start", start.to_string().as_str())])?;
    }
    xml.close("w:sectPr")
}

fn document_xml(
    body: &Body,
    title: Option<&TitleDocument>,
    parts: &mut DocumentParts,
) -> Result<Vec<u8>, Error> {
    let mut namespaces: Vec<(String, String)> = vec![
        ("w".into(), WML_NS.into()),
        ("r".into(), REL_NS.into()),
        ("wp".into(), WP_NS.into()),
        ("a".into(), A_NS.into()),
        ("pic".into(), PIC_NS.into()),
    ];
    if let Some(title) = title {
        for (prefix, uri) in &title.namespaces {
            if !namespaces.iter().any(|(p, _)| p == prefix) {
                namespaces.push((prefix.clone(), uri.clone()));
            }
        }
    }
    let attrs: Vec<(String, &str)> = namespaces
        .iter()
        .map(|(p, uri)| (format!("xmlns:{p}"), uri.as_str()))
        .collect();
    let attrs: Vec<(&str, &str)> = attrs.iter().map(|(n, v)| (n.as_str(), *v)).collect();

    let xml = &mut parts.xml;
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    xml.open("w:document", &attrs)?;
    xml.open("w:body", &[])?;

    if let Some(title) = title {
        xml.raw(&title.body_xml)?;
        xml.open("w:p", &[])?;
        xml.open("w:pPr", &[])?;
        section_properties(xml, &title.geometry, false, None)?;
        xml.close("w:pPr")?;
        xml.close("w:p")?;
    }

    for block in body.blocks() {
        match block {
            OutputBlock::Paragraph(p) => parts.paragraph(p)?,
            OutputBlock::Table(t) => parts.table(t)?,
        }
    }

    let xml = &mut parts.xml;
    if matches!(body.blocks().last(), Some(OutputBlock::Table(_))) {
        xml.empty("w:p", &[])?;
    }
    let start = title.map(|t| t.pages + 1);
    section_properties(xml, body.geometry(), true, start)?;
    xml.close("w:body")?;
    xml.close("w:document")?;
    Ok(std::mem::replace(&mut parts.xml, Writer::new(Vec::new())).into_inner())
}

fn styles_xml(styles: &StyleSheet) -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open("w:styles", &[("xmlns:w", WML_NS)])?;
        xml.open("w:docDefaults", &[])?;
        xml.open("w:rPrDefault", &[])?;
        xml.open("w:rPr", &[])?;
        write_char_format(xml, None, &styles.default_character)?;
        xml.close("w:rPr")?;
        xml.close("w:rPrDefault")?;
        xml.open("w:pPrDefault", &[])?;
        xml.open("w:pPr", &[])?;
        xml.empty("w:widowControl", &[])?;
        write_paragraph_format(xml, &styles.default_paragraph, &[], None)?;
        xml.close("w:pPr")?;
        xml.close("w:pPrDefault")?;
        xml.close("w:docDefaults")?;

        for style in styles.iter() {
            let kind = match style.kind {
                StyleKind::Paragraph => "paragraph",
                StyleKind::Character => "character",
            };
            let mut attrs = vec![("w:type", kind), ("w:styleId", style.id.as_str())];
            if style.id == "Normal" {
                attrs.push(("w:default", "1"));
            }
            xml.open("w:style", &attrs)?;
            xml.val("w:name", &style.name)?;
            if let Some(based_on) = &style.based_on {
                xml.val("w:basedOn", based_on)?;
            }
            xml.empty("w:qFormat", &[])?;
            if style.kind == StyleKind::Paragraph {
                let outline = style
                    .id
                    .strip_prefix("Heading")
                    .and_then(|n| n.parse::<u8>().ok())
                    .map(|n| n.saturating_sub(1));
                xml.open("w:pPr", &[])?;
                write_paragraph_format(xml, &style.paragraph, &[], outline)?;
                xml.close("w:pPr")?;
            }
            xml.open("w:rPr", &[])?;
            write_char_format(xml, None, &style.character)?;
            xml.close("w:rPr")?;
            xml.close("w:style")?;
        }
        xml.close("w:styles")
    })
}

fn footer_xml() -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open("w:ftr", &[("xmlns:w", WML_NS), ("xmlns:r", REL_NS)])?;
        xml.open("w:p", &[])?;
        xml.open("w:pPr", &[])?;
        xml.empty(
            "w:spacing",
            &[("w:before", "0"), ("w:after", "0"), ("w:line", "240"), ("w:lineRule", "auto")],
        )?;
        xml.empty("w:ind", &[("w:firstLine", "0")])?;
        xml.val("w:jc", "center")?;
        xml.close("w:pPr")?;
        let plain = RunFormat::default();
        field_char(xml, "begin", &plain)?;
        xml.open("w:r", &[])?;
        xml.open("w:instrText", &[("xml:space", "preserve")])?;
        xml.text(" PAGE ")?;
        xml.close("w:instrText")?;
        xml.close("w:r")?;
        field_char(xml, "separate", &plain)?;
        text_run(xml, "1", &plain)?;
        field_char(xml, "end", &plain)?;
        xml.close("w:p")?;
        xml.close("w:ftr")
    })
}

fn relationships_xml(relationships: &[Relationship]) -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open("Relationships", &[("xmlns", PKG_REL_NS)])?;
        for rel in relationships {
            let kind = format!("{DOC_REL}/{}", rel.kind);
            let mut attrs = vec![
                ("Id", rel.id.as_str()),
                ("Type", kind.as_str()),
                ("Target", rel.target.as_str()),
            ];
            if rel.external {
                attrs.push(("TargetMode", "External"));
            }
            xml.empty("Relationship", &attrs)?;
        }
        xml.close("Relationships")
    })
}

fn package_relationships_xml() -> Result<Vec<u8>, Error> {
    let package = "http://schemas.openxmlformats.org/package/2006/relationships";
    let rels = [
        ("rId1", format!("{DOC_REL}/officeDocument"), "word/document.xml"),
        ("rId2", format!("{package}/metadata/core-properties"), "docProps/core.xml"),
        ("rId3", format!("{DOC_REL}/extended-properties"), "docProps/app.xml"),
    ];
    xml_part(|xml| {
        xml.open("Relationships", &[("xmlns", PKG_REL_NS)])?;
        for (id, kind, target) in &rels {
            xml.empty(
                "Relationship",
                &[("Id", *id), ("Type", kind.as_str()), ("Target", *target)],
            )?;
        }
        xml.close("Relationships")
    })
}

fn content_types_xml() -> Result<Vec<u8>, Error> {
    let wml = "application/vnd.openxmlformats-officedocument.wordprocessingml";
    let overrides = [
        ("/word/document.xml", format!("{wml}.document.main+xml")),
        ("/word/styles.xml", format!("{wml}.styles+xml")),
        ("/word/settings.xml", format!("{wml}.settings+xml")),
        ("/word/footer1.xml", format!("{wml}.footer+xml")),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml".to_string(),
        ),
        (
            "/docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml".to_string(),
        ),
    ];
    xml_part(|xml| {
        xml.open(
            "Types",
            &[("xmlns", "http://schemas.openxmlformats.org/package/2006/content-types")],
        )?;
        for (ext, mime) in [
            ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
            ("xml", "application/xml"),
            ("png", "image/png"),
            ("jpeg", "image/jpeg"),
            ("jpg", "image/jpeg"),
            ("gif", "image/gif"),
        ] {
            xml.empty("Default", &[("Extension", ext), ("ContentType", mime)])?;
        }
        for (part, mime) in &overrides {
            xml.empty("Override", &[("PartName", *part), ("ContentType", mime.as_str())])?;
        }
        xml.close("Types")
    })
}

fn settings_xml() -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open("w:settings", &[("xmlns:w", WML_NS)])?;
        xml.val("w:defaultTabStop", "709")?;
        xml.val("w:characterSpacingControl", "doNotCompress")?;
        xml.open("w:compat", &[])?;
        xml.empty(
            "w:compatSetting",
            &[
                ("w:name", "compatibilityMode"),
                ("w:uri", "http://schemas.microsoft.com/office/word"),
                ("w:val", "15"),
            ],
        )?;
        xml.close("w:compat")?;
        xml.close("w:settings")
    })
}

fn author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "markpage".to_string())
}

fn core_xml(title: &str) -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open(
            "cp:coreProperties",
            &[
                (
                    "xmlns:cp",
                    "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
                ),
                ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
                ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ],
        )?;
        xml.open("dc:title", &[])?;
        xml.text(title)?;
        xml.close("dc:title")?;
        xml.open("dc:creator", &[])?;
        xml.text(&author())?;
        xml.close("dc:creator")?;
        xml.close("cp:coreProperties")
    })
}

fn app_xml() -> Result<Vec<u8>, Error> {
    xml_part(|xml| {
        xml.open(
            "Properties",
            &[(
                "xmlns",
                "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
            )],
        )?;
        xml.open("Application", &[])?;
        xml.text(concat!("markpage ", env!("CARGO_PKG_VERSION")))?;
        xml.close("Application")?;
        xml.close("Properties")
    })
}

/// Write `body` as a complete `.docx` package at `path`, preceded by the
/// title document when one is given.
pub fn write_docx(
    path: &Path,
    body: &Body,
    styles: &StyleSheet,
    title: Option<&TitleDocument>,
) -> Result<(), Error> {
    let t0 = std::time::Instant::now();
    let mut parts = DocumentParts::new();
    let document = document_xml(body, title, &mut parts)?;

    let doc_title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let files: Vec<(&str, Vec<u8>)> = vec![
        ("[Content_Types].xml", content_types_xml()?),
        ("_rels/.rels", package_relationships_xml()?),
        ("docProps/core.xml", core_xml(&doc_title)?),
        ("docProps/app.xml", app_xml()?),
        ("word/document.xml", document),
        ("word/styles.xml", styles_xml(styles)?),
        ("word/settings.xml", settings_xml()?),
        ("word/footer1.xml", footer_xml()?),
        ("word/_rels/document.xml.rels", relationships_xml(&parts.relationships)?),
    ];

    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in files
        .iter()
        .map(|(n, d)| (n.to_string(), d.as_slice()))
        .chain(
            parts
                .media
                .iter()
                .map(|(n, d)| (format!("word/media/{n}"), d.as_slice())),
        )
    {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
    }
    zip.finish()?;

    log::info!(
        "write: {} blocks, {} images to {} in {:.1}ms",
        body.blocks().len(),
        parts.media.len(),
        path.display(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}
