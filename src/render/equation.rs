use crate::error::Error;
use crate::layout::{LayoutTracker, Predecessor};
use crate::model::{Category, Equation};
use crate::sink::{OutputParagraph, OutputRun, RunFormat};
use crate::style::{TabAlignment, TabStop};
use crate::units::Length;

use super::paragraph::place_paragraph;
use super::{RenderContext, RenderedFragment};

/// Formula centered on a tab stop, its number in parentheses at the right margin.
pub(super) fn render_equation(
    equation: &Equation,
    previous: Option<&Predecessor>,
    tracker: &LayoutTracker,
    ctx: &RenderContext,
) -> Result<Vec<RenderedFragment>, Error> {
    let width = tracker.max_width();
    let mut out = OutputParagraph::new("Equation");
    out.tab_stops = vec![
        TabStop {
            position: Length::emu(width.as_emu() / 2),
            alignment: TabAlignment::Center,
            leader: None,
        },
        TabStop {
            position: width,
            alignment: TabAlignment::Right,
            leader: None,
        },
    ];

    out.runs.push(OutputRun::Tab);
    out.push_text(equation.formula.trim(), RunFormat::italic());
    out.runs.push(OutputRun::Tab);
    out.push_text("(", RunFormat::default());
    if let Some(label) = &equation.label {
        out.runs.push(OutputRun::BookmarkStart {
            name: label.clone(),
        });
    }
    out.push_field(
        format!("SEQ {} \\* ARABIC", Category::Equation.name()),
        equation
            .number
            .map_or_else(|| "?".to_string(), |n| n.to_string()),
        RunFormat::default(),
    );
    if let Some(label) = &equation.label {
        out.runs.push(OutputRun::BookmarkEnd {
            name: label.clone(),
        });
    }
    out.push_text(")", RunFormat::default());

    let placed = place_paragraph(out, previous, tracker, ctx, width)?;
    Ok(vec![placed.fragment])
}
