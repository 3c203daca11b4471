pub mod docx;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod markdown;
pub mod model;
pub mod numbering;
pub mod pipeline;
pub mod render;
pub mod sink;
pub mod style;
pub mod toc;
pub mod units;

pub use error::{Error, Warning};
pub use pipeline::{Pipeline, Report};

use std::path::{Path, PathBuf};
use std::time::Instant;

use docx::{Template, TitleDocument};
use fonts::FontBook;
use layout::PaginationRules;
use render::CaptionLabels;
use sink::Body;

/// Settings of one conversion.
#[derive(Clone, Debug, Default)]
pub struct ConvertOptions {
    /// `.docx` whose styles and page setup replace the built-in ones.
    pub template: Option<PathBuf>,
    /// `.docx` placed in front of the content in its own section.
    pub title: Option<PathBuf>,
    /// Pages the title document occupies.
    pub title_pages: u32,
    /// Measure with installed fonts instead of the built-in metric tables.
    pub system_fonts: bool,
    pub rules: PaginationRules,
    pub labels: CaptionLabels,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

fn check_paths(inputs: &[PathBuf], output: &Path) -> Result<(), Error> {
    let Some(first) = inputs.first() else {
        return Err(Error::MissingInput(PathBuf::new()));
    };
    for input in inputs {
        if !input.is_file() {
            return Err(Error::MissingInput(input.clone()));
        }
        if !has_extension(input, &["md", "markdown"]) {
            return Err(Error::UnsupportedInput(input.clone()));
        }
    }
    if !has_extension(output, &["docx"]) {
        return Err(Error::OutputExtension(output.to_path_buf()));
    }
    log::debug!("converting {} input(s) starting with {}", inputs.len(), first.display());
    Ok(())
}

/// Convert Markdown `inputs`, concatenated in order, into a paginated `.docx` at `output`.
pub fn convert(inputs: &[PathBuf], output: &Path, options: &ConvertOptions) -> Result<Report, Error> {
    let t0 = Instant::now();
    check_paths(inputs, output)?;

    let template = match &options.template {
        Some(path) => Template::read(path)?,
        None => Template::builtin(),
    };
    let mut warnings = Vec::new();
    let title = match &options.title {
        Some(path) => {
            let (title, dropped) = TitleDocument::read(path, options.title_pages)?;
            warnings.extend(dropped);
            Some(title)
        }
        None => None,
    };

    let mut blocks = Vec::new();
    for input in inputs {
        let text = std::fs::read_to_string(input)?;
        let base_dir = input.parent().unwrap_or(Path::new("."));
        let parsed = markdown::parse(&text, base_dir);
        blocks.extend(parsed.blocks);
        warnings.extend(parsed.warnings);
    }
    let t_parse = t0.elapsed();

    let fonts = if options.system_fonts {
        FontBook::system()
    } else {
        FontBook::builtin()
    };
    let mut body = Body::new(template.geometry.clone());
    let front_matter = title.as_ref().map_or(0, |t| t.pages);
    let mut pipeline = Pipeline::new(blocks, &fonts, &template.styles)
        .with_rules(options.rules.clone())
        .with_labels(options.labels.clone())
        .with_front_matter_pages(front_matter);
    let mut report = pipeline.run(&mut body)?;
    let t_layout = t0.elapsed();

    docx::write_docx(output, &body, &template.styles, title.as_ref())?;
    let t_total = t0.elapsed();

    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    log::info!(
        "Timing: parse={:.1}ms, layout={:.1}ms, write={:.1}ms, total={:.1}ms ({} pages, {} warnings)",
        t_parse.as_secs_f64() * 1000.0,
        (t_layout - t_parse).as_secs_f64() * 1000.0,
        (t_total - t_layout).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        report.pages,
        report.warnings.len(),
    );
    Ok(report)
}
