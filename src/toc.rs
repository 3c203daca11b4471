//! Table of contents: entries are collected from the headings before layout
//! and get their page numbers once every heading has been placed.

use crate::model::{Renderable, TocEntry};
use crate::sink::{OutputBlock, OutputSink};

pub const MAX_HEADING_LEVELS: usize = 10;

/// Per-level counters for hierarchical heading numbers.
#[derive(Clone, Debug, Default)]
pub struct HeadingCounters([u32; MAX_HEADING_LEVELS]);

impl HeadingCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a heading of `level` (1-based) and return its number path.
    /// Deeper levels restart from zero.
    pub fn enter(&mut self, level: u8) -> Vec<u32> {
        let idx = (level.max(1) as usize - 1).min(MAX_HEADING_LEVELS - 1);
        self.0[idx] += 1;
        for deeper in &mut self.0[idx + 1..] {
            *deeper = 0;
        }
        self.0[..=idx].to_vec()
    }
}

/// "1.2. " for `[1, 2]`; empty for an empty path.
pub fn format_heading_number(number: &[u32]) -> String {
    let mut out = String::new();
    for n in number {
        out.push_str(&n.to_string());
        out.push('.');
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out
}

fn toc_anchor(index: usize) -> String {
    format!("_Toc{index:08}")
}

/// Fill the first table of contents with one entry per heading that follows it.
/// Headings without an anchor get a generated one. Returns the index of the
/// table of contents block.
pub fn prepare(blocks: &mut [Renderable]) -> Option<usize> {
    let toc_index = blocks
        .iter()
        .position(|b| matches!(b, Renderable::TableOfContents(_)))?;

    let mut entries = Vec::new();
    for (i, block) in blocks.iter_mut().enumerate().skip(toc_index + 1) {
        let Renderable::Heading(heading) = block else {
            continue;
        };
        let anchor = heading.anchor.get_or_insert_with(|| toc_anchor(i)).clone();
        entries.push(TocEntry {
            level: heading.level,
            text: heading.text(),
            numbered: heading.numbered,
            number: heading.number.clone().unwrap_or_default(),
            anchor,
            heading: i,
            page: None,
            block: None,
        });
    }
    log::debug!("toc: {} entries", entries.len());

    if let Renderable::TableOfContents(toc) = &mut blocks[toc_index] {
        toc.entries = entries;
    }
    Some(toc_index)
}

/// Set each entry's page to the page its heading landed on plus `offset`,
/// in the model and in the emitted paragraph. Returns the number of entries
/// that got a page.
pub fn finalize(
    blocks: &mut [Renderable],
    toc_index: usize,
    offset: u32,
    sink: &mut dyn OutputSink,
) -> usize {
    let pages: Vec<Option<u32>> = match blocks.get(toc_index) {
        Some(Renderable::TableOfContents(toc)) => toc
            .entries
            .iter()
            .map(|e| match blocks.get(e.heading) {
                Some(Renderable::Heading(h)) => h.rendered_page,
                _ => None,
            })
            .collect(),
        _ => return 0,
    };

    let Some(Renderable::TableOfContents(toc)) = blocks.get_mut(toc_index) else {
        return 0;
    };
    let mut patched = 0;
    for (entry, page) in toc.entries.iter_mut().zip(pages) {
        let Some(page) = page else {
            log::warn!("heading {:?} was never placed", entry.text);
            continue;
        };
        let page = page + offset;
        entry.page = Some(page);
        patched += 1;
        if let Some(id) = entry.block
            && let Some(OutputBlock::Paragraph(p)) = sink.block_mut(id)
        {
            p.set_field_text("PAGEREF", &page.to_string());
        }
    }
    patched
}
