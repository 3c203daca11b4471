use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    MissingInput(PathBuf),
    UnsupportedInput(PathBuf),
    OutputExtension(PathBuf),
    InvalidTemplate(String),
    Xml(roxmltree::Error),
    Zip(zip::result::ZipError),
    /// "At least" line spacing cannot be predicted without the target renderer.
    UnsupportedLineSpacing { style: String },
}

impl Error {
    /// Process exit status used by the CLI for this failure class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingInput(_) => 2,
            Error::UnsupportedInput(_) => 3,
            Error::OutputExtension(_) => 4,
            Error::UnsupportedLineSpacing { .. } => 5,
            Error::InvalidTemplate(_) | Error::Xml(_) | Error::Zip(_) => 6,
            Error::Io(_) => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::MissingInput(p) => write!(f, "input file not found: {}", p.display()),
            Error::UnsupportedInput(p) => {
                write!(f, "unsupported input file (expected .md or .markdown): {}", p.display())
            }
            Error::OutputExtension(p) => {
                write!(f, "output file must have a .docx extension: {}", p.display())
            }
            Error::InvalidTemplate(msg) => write!(f, "invalid template: {msg}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::UnsupportedLineSpacing { style } => write!(
                f,
                "paragraph style {style:?} uses \"at least\" line spacing, which cannot be paginated"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Xml(e) => Some(e),
            Error::Zip(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

/// Recoverable problems; logged when they occur and collected into the conversion report.
#[derive(Clone, Debug, PartialEq)]
pub enum Warning {
    UnsupportedBlock(String),
    MissingImage(PathBuf),
    RemoteImage(String),
    DuplicateLabel(String),
    UnresolvedReference(String),
    FontFallback(String),
    DroppedTitleContent(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnsupportedBlock(kind) => write!(f, "{kind} is not supported"),
            Warning::MissingImage(p) => write!(f, "image not found: {}", p.display()),
            Warning::RemoteImage(url) => write!(f, "could not fetch image: {url}"),
            Warning::DuplicateLabel(name) => write!(f, "duplicate label: {name}"),
            Warning::UnresolvedReference(name) => write!(f, "invalid reference: {name}"),
            Warning::FontFallback(family) => write!(f, "font not found: {family}"),
            Warning::DroppedTitleContent(what) => write!(f, "title document: {what} dropped"),
        }
    }
}
