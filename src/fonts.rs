use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::OnceLock;

use memmap2::Mmap;
use ttf_parser::Face;

use crate::units::Length;

/// A logical font request as resolved from a paragraph style and run formatting.
#[derive(Clone, Debug, PartialEq)]
pub struct FontRequest {
    pub family: String,
    pub bold: bool,
    pub italic: bool,
    /// Points.
    pub size: f64,
}

impl FontRequest {
    pub fn new(family: impl Into<String>, size: f64) -> Self {
        FontRequest {
            family: family.into(),
            bold: false,
            italic: false,
            size,
        }
    }

    fn key(&self) -> (String, bool, bool) {
        (
            primary_font_name(&self.family).to_lowercase(),
            self.bold,
            self.italic,
        )
    }
}

pub(crate) fn primary_font_name(name: &str) -> &str {
    name.split(';').next().unwrap_or(name).trim()
}

/// (lowercase family name, bold, italic) -> (file path, face index within TTC)
type FontLookup = HashMap<(String, bool, bool), (PathBuf, u32)>;

static FONT_INDEX: OnceLock<FontLookup> = OnceLock::new();

fn font_family_name(face: &Face) -> Option<String> {
    // ID 1 (Family) keeps "Times New Roman" apart from its typographic group.
    for name in face.names() {
        if name.name_id == ttf_parser::name_id::FAMILY
            && name.is_unicode()
            && let Some(s) = name.to_string()
        {
            return Some(s);
        }
    }
    None
}

fn read_font_style(data: &[u8], face_index: u32) -> Option<(String, bool, bool)> {
    let face = Face::parse(data, face_index).ok()?;
    let family = font_family_name(&face)?;
    Some((family, face.is_bold(), face.is_italic()))
}

fn font_directories() -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();

    if let Ok(val) = std::env::var("MARKPAGE_FONTS") {
        let sep = if cfg!(windows) { ';' } else { ':' };
        dirs.extend(
            val.split(sep)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }

    #[cfg(target_os = "macos")]
    {
        dirs.extend([
            "/Applications/Microsoft Word.app/Contents/Resources/DFonts".into(),
            "/Library/Fonts".into(),
            "/Library/Fonts/Microsoft".into(),
            "/System/Library/Fonts".into(),
            "/System/Library/Fonts/Supplemental".into(),
        ]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.extend(["/usr/share/fonts".into(), "/usr/local/share/fonts".into()]);
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".local/share/fonts"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        match std::env::var("WINDIR") {
            Ok(windir) => dirs.push(PathBuf::from(windir).join("Fonts")),
            Err(_) => dirs.push("C:\\Windows\\Fonts".into()),
        }
    }

    dirs
}

fn is_font_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf" | "otf" | "ttc")
    )
}

fn map_file(path: &Path) -> Option<Mmap> {
    let file = std::fs::File::open(path).ok()?;
    // SAFETY: font files are opened read-only and never written while mapped.
    unsafe { Mmap::map(&file) }.ok()
}

fn scan_font_dirs() -> FontLookup {
    let t0 = std::time::Instant::now();
    let mut index = FontLookup::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut files_parsed = 0u32;

    let mut stack = font_directories();
    while let Some(dir) = stack.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if !is_font_file(&path) {
                continue;
            }
            let Some(data) = map_file(&path) else {
                continue;
            };
            files_parsed += 1;
            let face_count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
            for face_idx in 0..face_count {
                if let Some((family, bold, italic)) = read_font_style(&data, face_idx) {
                    index
                        .entry((family.to_lowercase(), bold, italic))
                        .or_insert((path.clone(), face_idx));
                }
            }
        }
    }

    log::info!(
        "Font scan: {:.1}ms, {} dirs, {} files parsed → {} entries",
        t0.elapsed().as_secs_f64() * 1000.0,
        visited.len(),
        files_parsed,
        index.len(),
    );
    index
}

fn get_font_index() -> &'static FontLookup {
    FONT_INDEX.get_or_init(scan_font_dirs)
}

/// Look up a font file by family name and style.
/// Falls back to the regular variant if the requested bold/italic is not available.
fn find_font_file(font_name: &str, bold: bool, italic: bool) -> Option<(PathBuf, u32)> {
    let index = get_font_index();
    let key = font_name.to_lowercase();
    index
        .get(&(key.clone(), bold, italic))
        .or_else(|| {
            if bold || italic {
                index.get(&(key, false, false))
            } else {
                None
            }
        })
        .cloned()
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Builtin {
    Serif,
    Mono,
}

impl Builtin {
    fn for_family(family: &str) -> Self {
        let lower = family.to_lowercase();
        if lower.contains("courier") || lower.contains("consolas") || lower.contains("mono") {
            Builtin::Mono
        } else {
            Builtin::Serif
        }
    }

    /// Advance width at 1000 units/em.
    fn advance(self, ch: char) -> u16 {
        match self {
            Builtin::Mono => 600,
            Builtin::Serif => serif_advance(ch),
        }
    }

    /// (ascender - descender + line gap) / em of Times New Roman and Courier New.
    fn line_ratio(self) -> f64 {
        match self {
            Builtin::Serif => 1.15,
            Builtin::Mono => 1.1328,
        }
    }
}

/// Times-Roman advance widths at 1000 units/em.
fn serif_advance(ch: char) -> u16 {
    match ch {
        ' ' | ',' | '.' => 250,
        '!' | '(' | ')' | '-' | '[' | ']' | '`' | 'f' | 'r' | 'I' => 333,
        '\u{2010}' | '\u{2011}' => 333,
        '"' => 408,
        '#' | '$' | '*' | '_' | '0'..='9' => 500,
        '%' => 833,
        '&' => 778,
        '\'' => 180,
        '+' | '<' | '=' | '>' => 564,
        '/' | ':' | ';' | '\\' | 'i' | 'j' | 'l' | 't' => 278,
        '?' => 444,
        '@' => 921,
        'A' | 'D' | 'G' | 'H' | 'K' | 'N' | 'O' | 'Q' | 'U' | 'V' | 'X' | 'Y' => 722,
        'B' | 'C' | 'R' => 667,
        'E' | 'L' | 'T' | 'Z' => 611,
        'F' | 'P' | 'S' => 556,
        'J' => 389,
        'M' => 889,
        'W' => 944,
        '^' => 469,
        'a' | 'c' | 'e' | 'z' => 444,
        'm' => 778,
        's' => 389,
        'w' => 722,
        '{' | '}' => 480,
        '|' => 200,
        '~' => 541,
        '\t' => 0,
        '\u{2013}' => 500,
        '\u{2014}' => 1000,
        '\u{2018}' | '\u{2019}' => 333,
        '\u{201C}' | '\u{201D}' => 444,
        '\u{2022}' => 350,
        _ => 500,
    }
}

#[derive(Clone, Copy, Debug)]
struct GlyphMetrics {
    advance: f32,
    /// Horizontal ink extents (x_min, x_max); `None` for blank glyphs.
    ink: Option<(f32, f32)>,
}

enum FaceSource {
    System { data: Mmap, index: u32 },
    Builtin(Builtin),
}

struct LoadedFace {
    source: FaceSource,
    units_per_em: f32,
    line_ratio: f64,
    monospace: bool,
    glyphs: RefCell<HashMap<char, GlyphMetrics>>,
}

impl LoadedFace {
    fn builtin(kind: Builtin) -> Self {
        LoadedFace {
            source: FaceSource::Builtin(kind),
            units_per_em: 1000.0,
            line_ratio: kind.line_ratio(),
            monospace: kind == Builtin::Mono,
            glyphs: RefCell::new(HashMap::new()),
        }
    }

    fn from_file(path: &Path, index: u32) -> Option<Self> {
        let data = map_file(path)?;
        let (units, line_ratio, monospace) = {
            let face = Face::parse(&data, index).ok()?;
            let units = face.units_per_em() as f32;
            let line_gap = face.line_gap() as f64;
            let line_ratio =
                (face.ascender() as f64 - face.descender() as f64 + line_gap) / units as f64;
            let adv = |ch| {
                face.glyph_index(ch)
                    .and_then(|gid| face.glyph_hor_advance(gid))
            };
            let monospace = matches!((adv('i'), adv('m')), (Some(i), Some(m)) if i == m);
            (units, line_ratio, monospace)
        };
        Some(LoadedFace {
            source: FaceSource::System { data, index },
            units_per_em: units,
            line_ratio,
            monospace,
            glyphs: RefCell::new(HashMap::new()),
        })
    }

    /// Fill the glyph cache for every char of `text` that has not been seen yet.
    fn load_glyphs(&self, text: &str) {
        let mut cache = self.glyphs.borrow_mut();
        let missing: Vec<char> = text.chars().filter(|c| !cache.contains_key(c)).collect();
        if missing.is_empty() {
            return;
        }
        match &self.source {
            FaceSource::Builtin(kind) => {
                for ch in missing {
                    let advance = kind.advance(ch) as f32;
                    cache.insert(ch, GlyphMetrics { advance, ink: None });
                }
            }
            FaceSource::System { data, index } => {
                let Ok(face) = Face::parse(data, *index) else {
                    return;
                };
                for ch in missing {
                    let gid = face
                        .glyph_index(ch)
                        .or_else(|| match ch {
                            '\u{2011}' | '\u{2010}' => face.glyph_index('-'),
                            _ => None,
                        });
                    let metrics = match gid {
                        Some(gid) if ch != '\t' => GlyphMetrics {
                            advance: face.glyph_hor_advance(gid).unwrap_or(0) as f32,
                            ink: face
                                .glyph_bounding_box(gid)
                                .map(|bb| (bb.x_min as f32, bb.x_max as f32)),
                        },
                        _ => GlyphMetrics {
                            advance: 0.0,
                            ink: None,
                        },
                    };
                    cache.insert(ch, metrics);
                }
            }
        }
    }

    /// Width of `text` in font units.
    fn width_units(&self, text: &str) -> f32 {
        self.load_glyphs(text);
        let cache = self.glyphs.borrow();
        let glyph = |ch: char| {
            cache.get(&ch).copied().unwrap_or(GlyphMetrics {
                advance: 0.0,
                ink: None,
            })
        };

        if self.monospace {
            let count = text.chars().count() as f32;
            return text.chars().next().map_or(0.0, |c| glyph(c).advance * count);
        }
        if matches!(self.source, FaceSource::Builtin(_)) {
            return text.chars().map(|c| glyph(c).advance).sum();
        }

        // Bounding box of the laid-out string: ink extents of outlined glyphs,
        // advance width for the rest.
        let mut pen = 0.0f32;
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        let count = text.chars().count();
        for (i, ch) in text.chars().enumerate() {
            let g = glyph(ch);
            match g.ink {
                Some((x_min, x_max)) => {
                    left = left.min(pen + x_min);
                    let edge = if i + 1 == count {
                        pen + x_max
                    } else {
                        pen + x_max.max(g.advance)
                    };
                    right = right.max(edge);
                }
                None => right = right.max(pen + g.advance),
            }
            pen += g.advance;
        }
        right - left
    }
}

/// Per-engine font metrics provider.
///
/// Faces are loaded lazily on first use and cached for the lifetime of the book.
/// The system font index behind it is process-wide and read-only.
pub struct FontBook {
    use_system: bool,
    faces: RefCell<HashMap<(String, bool, bool), Rc<LoadedFace>>>,
    fallbacks: RefCell<Vec<String>>,
}

impl FontBook {
    /// Metrics from installed fonts, built-in tables where a family is missing.
    pub fn system() -> Self {
        FontBook {
            use_system: true,
            faces: RefCell::new(HashMap::new()),
            fallbacks: RefCell::new(Vec::new()),
        }
    }

    /// Built-in metric tables only; identical results on every machine.
    pub fn builtin() -> Self {
        FontBook {
            use_system: false,
            faces: RefCell::new(HashMap::new()),
            fallbacks: RefCell::new(Vec::new()),
        }
    }

    fn face(&self, font: &FontRequest) -> Rc<LoadedFace> {
        let key = font.key();
        if let Some(face) = self.faces.borrow().get(&key) {
            return Rc::clone(face);
        }

        let t0 = std::time::Instant::now();
        let loaded = if self.use_system {
            font.family
                .split(';')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .find_map(|candidate| {
                    let (path, index) = find_font_file(candidate, font.bold, font.italic)?;
                    LoadedFace::from_file(&path, index)
                })
        } else {
            None
        };
        let face = Rc::new(loaded.unwrap_or_else(|| {
            let kind = Builtin::for_family(&font.family);
            let mut fallbacks = self.fallbacks.borrow_mut();
            if self.use_system && !fallbacks.contains(&font.family) {
                log::warn!(
                    "Font not found: {}, using built-in {:?} metrics",
                    font.family,
                    kind
                );
                fallbacks.push(font.family.clone());
            }
            LoadedFace::builtin(kind)
        }));
        log::debug!(
            "load_face: {} bold={} italic={} → {:.1}ms",
            font.family,
            font.bold,
            font.italic,
            t0.elapsed().as_secs_f64() * 1000.0,
        );

        self.faces.borrow_mut().insert(key, Rc::clone(&face));
        face
    }

    pub fn measure_text(&self, font: &FontRequest, text: &str) -> Length {
        if text.is_empty() {
            return Length::ZERO;
        }
        let face = self.face(font);
        let units = face.width_units(text);
        Length::pt(units as f64 / face.units_per_em as f64 * font.size)
    }

    pub fn line_height(&self, font: &FontRequest) -> Length {
        if let Some(h) = line_height_override(font) {
            return h;
        }
        let face = self.face(font);
        Length::pt(face.line_ratio * font.size)
    }

    pub fn is_monospace(&self, font: &FontRequest) -> bool {
        self.face(font).monospace
    }

    /// Families that had to fall back to built-in metrics so far.
    pub fn fallbacks(&self) -> Vec<String> {
        self.fallbacks.borrow().clone()
    }
}

/// Word rounds some well-known fonts to line heights that the hhea metrics do not predict.
fn line_height_override(font: &FontRequest) -> Option<Length> {
    let family = primary_font_name(&font.family).to_lowercase();
    if family.starts_with("courier") && (font.size - 12.0).abs() < f64::EPSILON {
        return Some(Length::pt(13.62));
    }
    None
}
