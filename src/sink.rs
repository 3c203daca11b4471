//! Concrete styled output blocks and the sink they are appended to.

use std::path::PathBuf;
use std::sync::Arc;

use crate::layout::PageGeometry;
use crate::style::{CharFormat, ParagraphFormat, TabStop};
use crate::units::Length;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum Link {
    Url(String),
    /// Bookmark inside the document.
    Anchor(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunFormat {
    pub character: CharFormat,
    /// Character style id, e.g. "Hyperlink".
    pub style: Option<String>,
    pub link: Option<Link>,
}

impl RunFormat {
    pub fn italic() -> Self {
        RunFormat {
            character: CharFormat {
                italic: Some(true),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn colored(color: [u8; 3]) -> Self {
        RunFormat {
            character: CharFormat {
                color: Some(color),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlacement {
    pub path: PathBuf,
    pub data: Option<Arc<[u8]>>,
    pub width: Length,
    pub height: Length,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutputRun {
    Text { text: String, format: RunFormat },
    NoBreakHyphen { format: RunFormat },
    Tab,
    /// Complex field whose result text is pre-computed.
    Field {
        instruction: String,
        text: String,
        format: RunFormat,
    },
    /// Writer assigns numeric ids; names must be unique.
    BookmarkStart { name: String },
    BookmarkEnd { name: String },
    Image(ImagePlacement),
    PageBreak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputParagraph {
    pub style: String,
    pub format: ParagraphFormat,
    pub tab_stops: Vec<TabStop>,
    pub runs: Vec<OutputRun>,
}

impl OutputParagraph {
    pub fn new(style: &str) -> Self {
        OutputParagraph {
            style: style.to_string(),
            format: ParagraphFormat::default(),
            tab_stops: Vec::new(),
            runs: Vec::new(),
        }
    }

    pub fn push_text(&mut self, text: &str, format: RunFormat) {
        if !text.is_empty() {
            self.runs.push(OutputRun::Text {
                text: text.to_string(),
                format,
            });
        }
    }

    /// Like [`push_text`](Self::push_text), but every `-` becomes a non-breaking hyphen.
    pub fn push_text_keep_hyphens(&mut self, text: &str, format: RunFormat) {
        let mut parts = text.split('-').peekable();
        while let Some(part) = parts.next() {
            self.push_text(part, format.clone());
            if parts.peek().is_some() {
                self.runs.push(OutputRun::NoBreakHyphen {
                    format: format.clone(),
                });
            }
        }
    }

    pub fn push_field(&mut self, instruction: String, text: String, format: RunFormat) {
        self.runs.push(OutputRun::Field {
            instruction,
            text,
            format,
        });
    }

    /// Text as laid out, with field results and hyphens as the reader sees them.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match run {
                OutputRun::Text { text, .. } | OutputRun::Field { text, .. } => out.push_str(text),
                OutputRun::NoBreakHyphen { .. } => out.push('-'),
                OutputRun::Tab => out.push('\t'),
                _ => {}
            }
        }
        out
    }

    /// Replace the result text of the first field whose instruction starts with `prefix`.
    pub fn set_field_text(&mut self, prefix: &str, value: &str) -> bool {
        for run in &mut self.runs {
            if let OutputRun::Field {
                instruction, text, ..
            } = run
                && instruction.starts_with(prefix)
            {
                *text = value.to_string();
                return true;
            }
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellMargins {
    pub top: Length,
    pub bottom: Length,
    pub left: Length,
    pub right: Length,
}

impl Default for CellMargins {
    fn default() -> Self {
        CellMargins {
            top: Length::ZERO,
            bottom: Length::ZERO,
            left: Length::pt(5.4),
            right: Length::pt(5.4),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputCell {
    pub paragraphs: Vec<OutputParagraph>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputRow {
    pub cells: Vec<OutputCell>,
    /// Repeated at the top of every page the table continues on.
    pub header: bool,
    pub cant_split: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputTable {
    pub column_widths: Vec<Length>,
    pub rows: Vec<OutputRow>,
    pub borders: bool,
    pub cell_margins: CellMargins,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutputBlock {
    Paragraph(OutputParagraph),
    Table(OutputTable),
}

impl OutputBlock {
    pub fn as_paragraph(&self) -> Option<&OutputParagraph> {
        match self {
            OutputBlock::Paragraph(p) => Some(p),
            OutputBlock::Table(_) => None,
        }
    }
}

/// Receiver of the laid-out document, in order.
pub trait OutputSink {
    fn geometry(&self) -> &PageGeometry;
    fn append(&mut self, block: OutputBlock) -> BlockId;
    fn block_mut(&mut self, id: BlockId) -> Option<&mut OutputBlock>;
}

/// In-memory document body; serialized by [`crate::docx::write_docx`].
#[derive(Clone, Debug)]
pub struct Body {
    geometry: PageGeometry,
    blocks: Vec<OutputBlock>,
}

impl Body {
    pub fn new(geometry: PageGeometry) -> Self {
        Body {
            geometry,
            blocks: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[OutputBlock] {
        &self.blocks
    }
}

impl OutputSink for Body {
    fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    fn append(&mut self, block: OutputBlock) -> BlockId {
        self.blocks.push(block);
        BlockId(self.blocks.len() - 1)
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut OutputBlock> {
        self.blocks.get_mut(id.0)
    }
}
