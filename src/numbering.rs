//! Sequence numbers for figures, tables, listings and equations, and the
//! `@label` references that point at them.

use std::collections::HashMap;

use crate::error::Warning;
use crate::model::{Category, Numbered, Renderable};
use crate::toc::HeadingCounters;

/// Running count per category plus the label table.
#[derive(Clone, Debug, Default)]
pub struct NumberingRegistry {
    counters: HashMap<Category, u32>,
    labels: HashMap<String, u32>,
}

impl NumberingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `category` and return its new number.
    pub fn next(&mut self, category: Category) -> u32 {
        let counter = self.counters.entry(category).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Bind `label` to `number`, returning the number it was bound to before.
    pub fn register(&mut self, label: &str, number: u32) -> Option<u32> {
        self.labels.insert(label.to_string(), number)
    }

    pub fn lookup(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }

    pub fn count(&self, category: Category) -> u32 {
        self.counters.get(&category).copied().unwrap_or(0)
    }
}

/// Number every numbered block in document order and register its label.
pub fn assign_numbers(
    blocks: &mut [Renderable],
    registry: &mut NumberingRegistry,
    warnings: &mut Vec<Warning>,
) {
    for block in blocks.iter_mut() {
        block.for_each_numbered(&mut |item: &mut dyn Numbered| {
            let number = registry.next(item.category());
            item.set_number(number);
            if let Some(label) = item.label().filter(|l| !l.is_empty())
                && registry.register(label, number).is_some()
            {
                log::warn!("Duplicate label {label:?}; using {} {number}", item.category().name());
                warnings.push(Warning::DuplicateLabel(label.to_string()));
            }
        });
    }
}

/// Bind every reference to its label's number. Unknown labels stay unresolved.
pub fn resolve_references(
    blocks: &mut [Renderable],
    registry: &NumberingRegistry,
    warnings: &mut Vec<Warning>,
) {
    for block in blocks.iter_mut() {
        for reference in block.references_mut() {
            reference.number = registry.lookup(&reference.name);
            if reference.number.is_none() {
                log::warn!("Invalid reference: {}", reference.name);
                warnings.push(Warning::UnresolvedReference(reference.name.clone()));
            }
        }
    }
}

/// Give numbered headings their hierarchical number.
pub fn number_headings(blocks: &mut [Renderable]) {
    let mut counters = HeadingCounters::new();
    for block in blocks.iter_mut() {
        if let Renderable::Heading(heading) = block {
            heading.number = heading.numbered.then(|| counters.enter(heading.level));
        }
    }
}
