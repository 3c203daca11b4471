//! The ordered passes of a conversion: numbering, TOC collection, layout and
//! TOC page patching.

use crate::error::{Error, Warning};
use crate::fonts::FontBook;
use crate::layout::{LayoutTracker, PaginationRules, Predecessor};
use crate::model::Renderable;
use crate::numbering::{self, NumberingRegistry};
use crate::render::{CaptionLabels, RenderContext, RenderedFragment};
use crate::sink::OutputSink;
use crate::style::StyleSheet;
use crate::toc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Numbering,
    TocPrepare,
    Render,
    TocFinalize,
    Done,
}

/// Outcome of a successful run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Pages of laid-out content, front matter excluded.
    pub pages: u32,
    pub warnings: Vec<Warning>,
}

pub struct Pipeline<'a> {
    blocks: Vec<Renderable>,
    fonts: &'a FontBook,
    styles: &'a StyleSheet,
    rules: PaginationRules,
    labels: CaptionLabels,
    front_matter_pages: u32,
    stage: Stage,
    registry: NumberingRegistry,
    warnings: Vec<Warning>,
}

impl<'a> Pipeline<'a> {
    pub fn new(blocks: Vec<Renderable>, fonts: &'a FontBook, styles: &'a StyleSheet) -> Self {
        Pipeline {
            blocks,
            fonts,
            styles,
            rules: PaginationRules::default(),
            labels: CaptionLabels::default(),
            front_matter_pages: 0,
            stage: Stage::Numbering,
            registry: NumberingRegistry::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_rules(mut self, rules: PaginationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_labels(mut self, labels: CaptionLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Pages that precede the content; added to every TOC page number.
    pub fn with_front_matter_pages(mut self, pages: u32) -> Self {
        self.front_matter_pages = pages;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn blocks(&self) -> &[Renderable] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Renderable> {
        self.blocks
    }

    pub fn registry(&self) -> &NumberingRegistry {
        &self.registry
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("pipeline: {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Run every pass and append the laid-out document to `sink`.
    pub fn run(&mut self, sink: &mut dyn OutputSink) -> Result<Report, Error> {
        self.registry = NumberingRegistry::new();
        self.warnings.clear();
        self.enter(Stage::Numbering);
        numbering::number_headings(&mut self.blocks);
        numbering::assign_numbers(&mut self.blocks, &mut self.registry, &mut self.warnings);
        numbering::resolve_references(&mut self.blocks, &self.registry, &mut self.warnings);

        self.enter(Stage::TocPrepare);
        let toc_index = toc::prepare(&mut self.blocks);

        self.enter(Stage::Render);
        let pages = self.render(sink)?;

        self.enter(Stage::TocFinalize);
        if let Some(index) = toc_index {
            toc::finalize(&mut self.blocks, index, self.front_matter_pages, sink);
        }
        self.warnings
            .extend(self.fonts.fallbacks().into_iter().map(Warning::FontFallback));

        self.enter(Stage::Done);
        Ok(Report {
            pages,
            warnings: self.warnings.clone(),
        })
    }

    fn render(&mut self, sink: &mut dyn OutputSink) -> Result<u32, Error> {
        let mut tracker = LayoutTracker::new(sink.geometry());
        let ctx = RenderContext {
            fonts: self.fonts,
            styles: self.styles,
            rules: &self.rules,
            labels: &self.labels,
        };
        let mut previous: Option<Predecessor> = None;

        for i in 0..self.blocks.len() {
            let fragments = self.blocks[i].render(previous.as_ref(), &tracker, &ctx)?;
            let mut landed = None;
            for fragment in fragments {
                let RenderedFragment {
                    block,
                    height,
                    starts_next_page,
                    predecessor,
                    toc_entry,
                } = fragment;
                let page = tracker.page() + u32::from(starts_next_page);
                landed.get_or_insert(page);

                tracker.add_height(height);
                previous = Some(predecessor);
                let id = sink.append(block);
                if let Some(entry) = toc_entry
                    && let Renderable::TableOfContents(toc) = &mut self.blocks[i]
                    && let Some(entry) = toc.entries.get_mut(entry)
                {
                    entry.block = Some(id);
                }
            }
            if let Renderable::Heading(heading) = &mut self.blocks[i] {
                heading.rendered_page = landed;
                log::debug!("heading {:?} on page {:?}", heading.text(), landed);
            }
        }
        Ok(tracker.page())
    }
}
