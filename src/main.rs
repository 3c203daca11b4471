use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use markpage::{ConvertOptions, convert};

#[derive(Parser)]
#[command(name = "markpage", version)]
#[command(about = "Convert Markdown to DOCX with page numbers, captions and TOC precomputed")]
struct Cli {
    /// Markdown files, concatenated in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file, must end in .docx
    #[arg(short, long)]
    output: PathBuf,

    /// DOCX whose styles and page setup are used
    #[arg(long)]
    template: Option<PathBuf>,

    /// DOCX placed in front of the content
    #[arg(long)]
    title: Option<PathBuf>,

    /// Pages the title document occupies
    #[arg(long, default_value_t = 1)]
    title_pages: u32,

    /// Measure text with built-in metric tables only
    #[arg(long)]
    builtin_fonts: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = ConvertOptions {
        template: cli.template,
        title: cli.title,
        title_pages: cli.title_pages,
        system_fonts: !cli.builtin_fonts,
        ..Default::default()
    };

    match convert(&cli.inputs, &cli.output, &options) {
        Ok(report) => {
            println!(
                "{} ({} pages, {} warnings)",
                cli.output.display(),
                report.pages,
                report.warnings.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}
