/// Saving and loading stories as TXT, JSON and HTML.
///
/// Files are written to a temporary file in the target directory and then
/// renamed over the final path, so a failed save never leaves a partial file.
use chrono::Local;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::core::letter::Letter;
use crate::core::text::{escape_html, join_list};
use crate::core::timeline::Timeline;
use crate::schema::character::Character;
use crate::schema::story::Story;

pub const DEFAULT_STEM_PREFIX: &str = "austen_story";
pub const LETTER_STEM_PREFIX: &str = "regency_letter";
pub const MAX_STEM_CHARS: usize = 100;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").expect("valid regex"));
static UNDERSCORE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("valid regex"));

const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("could not create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("could not read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid story JSON: {source}")]
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl PersistenceError {
    /// The path the failed operation was working on, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::CreateDir { path, .. } | Self::Write { path, .. } | Self::Read { path, .. } => {
                Some(path)
            }
            Self::Json { path, .. } => path.as_deref(),
        }
    }
}

/// Output format of a saved story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Txt,
    Json,
    Html,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown save format '{0}' (expected txt, json or html)")]
pub struct ParseFormatError(pub String);

impl Format {
    pub const ALL: [Format; 3] = [Format::Txt, Format::Json, Format::Html];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl FromStr for Format {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().trim_start_matches('.').to_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.extension() == lowered)
            .ok_or_else(|| ParseFormatError(s.to_string()))
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Writes stories into one directory.
#[derive(Debug, Clone)]
pub struct Persistence {
    dir: PathBuf,
    include_timeline: bool,
}

impl Persistence {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            include_timeline: false,
        }
    }

    /// Append a timeline of events to TXT and HTML saves.
    pub fn include_timeline(mut self, include: bool) -> Self {
        self.include_timeline = include;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a story and return the path written.
    ///
    /// Without a name the file is `austen_story_<timestamp>`, suffixed to
    /// avoid clobbering an earlier save. A given name is sanitised to a bare
    /// file stem and overwrites any earlier file of that name.
    pub fn save(
        &self,
        story: &Story,
        format: Format,
        name: Option<&str>,
    ) -> Result<PathBuf, PersistenceError> {
        let path = self.target_path(DEFAULT_STEM_PREFIX, format.extension(), name)?;

        let timeline = if self.include_timeline {
            Some(Timeline::build(story, timeline_seed(story)))
        } else {
            None
        };
        let contents = render(story, format, timeline.as_ref()).map_err(|source| {
            PersistenceError::Json {
                path: Some(path.clone()),
                source,
            }
        })?;

        write_atomic(&path, contents.as_bytes())?;
        info!("saved {} story to {}", format, path.display());
        Ok(path)
    }

    /// Save a letter as plain text and return the path written.
    ///
    /// Without a name the file is `regency_letter_<kind>_<timestamp>.txt`.
    pub fn save_letter(&self, letter: &Letter, name: Option<&str>) -> Result<PathBuf, PersistenceError> {
        let prefix = format!("{}_{}", LETTER_STEM_PREFIX, letter.kind.as_str());
        let path = self.target_path(&prefix, Format::Txt.extension(), name)?;
        write_atomic(&path, letter.render().as_bytes())?;
        info!("saved {} letter to {}", letter.kind.as_str(), path.display());
        Ok(path)
    }

    fn target_path(&self, prefix: &str, ext: &str, name: Option<&str>) -> Result<PathBuf, PersistenceError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;
        Ok(match name.and_then(sanitize_filename) {
            Some(stem) => self.dir.join(format!("{}.{}", stem, ext)),
            None => self.unique_default_path(prefix, ext),
        })
    }

    fn unique_default_path(&self, prefix: &str, ext: &str) -> PathBuf {
        let stem = format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M%S"));
        let first = self.dir.join(format!("{}.{}", stem, ext));
        if !first.exists() {
            return first;
        }
        let mut n = 2u32;
        loop {
            let candidate = self.dir.join(format!("{}_{}.{}", stem, n, ext));
            if !candidate.exists() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Reduce a user-supplied name to a safe file stem.
///
/// Keeps only the final path component, drops any extension, replaces
/// characters outside `[A-Za-z0-9_-]`, prefixes reserved device names and
/// caps the length. Returns `None` when nothing usable remains.
pub fn sanitize_filename(hint: &str) -> Option<String> {
    let last = hint
        .rsplit(['/', '\\'])
        .map(str::trim)
        .find(|part| !part.is_empty() && *part != "." && *part != "..")?;

    let stem = match last.rfind('.') {
        Some(i) if i > 0 => &last[..i],
        _ => last,
    };

    let replaced = UNSAFE_CHARS.replace_all(stem, "_");
    let collapsed = UNDERSCORE_RUNS.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches(|c: char| c == '_' || c == '-');
    if trimmed.is_empty() {
        return None;
    }

    let mut safe = if RESERVED_NAMES.contains(&trimmed.to_lowercase().as_str()) {
        format!("story_{}", trimmed)
    } else {
        trimmed.to_string()
    };
    safe.truncate(MAX_STEM_CHARS);
    Some(safe)
}

/// Parse a story from its JSON form.
pub fn load_json(bytes: &[u8]) -> Result<Story, PersistenceError> {
    serde_json::from_slice(bytes).map_err(|source| PersistenceError::Json { path: None, source })
}

/// Read a JSON story file.
pub fn load_file(path: &Path) -> Result<Story, PersistenceError> {
    let bytes = std::fs::read(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json {
        path: Some(path.to_path_buf()),
        source,
    })
}

/// Write `bytes` to `path` through a temporary file in the same directory.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| write_error(path, e))?;
    tmp.write_all(bytes).map_err(|e| write_error(path, e))?;
    tmp.flush().map_err(|e| write_error(path, e))?;
    tmp.persist(path).map_err(|e| write_error(path, e.error))?;
    Ok(())
}

fn write_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    }
}

fn timeline_seed(story: &Story) -> u64 {
    story.created_at.timestamp().unsigned_abs()
}

/// Render a story in the given format.
pub fn render(
    story: &Story,
    format: Format,
    timeline: Option<&Timeline>,
) -> Result<String, serde_json::Error> {
    match format {
        Format::Txt => Ok(render_txt(story, timeline)),
        Format::Json => serde_json::to_string_pretty(story),
        Format::Html => Ok(render_html(story, timeline)),
    }
}

fn setting_line(story: &Story) -> String {
    format!(
        "A {} tale set in {}, during the {} of {}.",
        story.style, story.setting.location, story.setting.season, story.setting.time_period
    )
}

fn character_line(c: &Character) -> String {
    let mut line = format!("{} ({})", c.name, c.role);
    let details: Vec<&str> = [c.personality.as_str(), c.social_class.as_str()]
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();
    if !details.is_empty() {
        line.push_str(", ");
        line.push_str(&details.join(" "));
    }
    let virtues: Vec<&str> = c.virtues.iter().map(String::as_str).collect();
    let flaws: Vec<&str> = c.flaws.iter().map(String::as_str).collect();
    line.push_str(&format!(
        ". Virtues: {}. Flaws: {}. Goal: {}.",
        or_none(&join_list(&virtues)),
        or_none(&join_list(&flaws)),
        or_none(&c.goal)
    ));
    line
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "none"
    } else {
        value
    }
}

fn underline(text: &str, ch: char) -> String {
    std::iter::repeat(ch).take(text.chars().count().max(3)).collect()
}

pub fn render_txt(story: &Story, timeline: Option<&Timeline>) -> String {
    let mut out = String::new();
    let title = story.title();
    out.push_str(title);
    out.push('\n');
    out.push_str(&underline(title, '='));
    out.push_str("\n\n");
    out.push_str(&setting_line(story));
    out.push_str(&format!("\nComplexity: {}\n\n", story.complexity));

    out.push_str("Characters\n----------\n");
    for c in &story.characters {
        out.push_str("- ");
        out.push_str(&character_line(c));
        out.push('\n');
    }

    for section in &story.sections {
        out.push('\n');
        out.push_str(&section.title);
        out.push('\n');
        out.push_str(&underline(&section.title, '-'));
        out.push('\n');
        out.push_str(&section.text);
        out.push('\n');
    }

    if let Some(timeline) = timeline.filter(|t| !t.is_empty()) {
        out.push_str("\nTimeline of Events\n------------------\n");
        for entry in &timeline.entries {
            out.push_str(&format!(
                "- {}: {}. {}\n",
                entry.regency_date(),
                entry.title,
                entry.summary
            ));
        }
    }
    out
}

const HTML_STYLE: &str = "\
body { font-family: 'Baskerville', 'Garamond', Georgia, serif; margin: 40px; line-height: 1.6; }
.story-container { max-width: 800px; margin: 0 auto; }
h1, h2 { color: #5B3758; }
h1 { text-align: center; }
.setting { text-align: center; font-style: italic; }
.timeline { background-color: #f8f5f0; padding: 20px; border: 1px solid #d9c9b9; margin-top: 40px; }
.timeline-date { font-weight: bold; color: #5B3758; }
.footer { margin-top: 40px; text-align: center; font-style: italic; }
";

fn html_paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>\n", escape_html(p).replace('\n', "<br>\n")))
        .collect()
}

pub fn render_html(story: &Story, timeline: Option<&Timeline>) -> String {
    let title = escape_html(story.title());
    let mut body = String::new();
    body.push_str(&format!("<h1>{}</h1>\n", title));
    body.push_str(&format!(
        "<p class=\"setting\">{}</p>\n",
        escape_html(&setting_line(story))
    ));

    body.push_str("<h2>Characters</h2>\n<ul>\n");
    for c in &story.characters {
        body.push_str(&format!("<li>{}</li>\n", escape_html(&character_line(c))));
    }
    body.push_str("</ul>\n");

    for section in &story.sections {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.title)));
        body.push_str(&html_paragraphs(&section.text));
    }

    if let Some(timeline) = timeline.filter(|t| !t.is_empty()) {
        body.push_str("<div class=\"timeline\">\n<h2>Timeline of Events</h2>\n");
        for entry in &timeline.entries {
            body.push_str(&format!(
                "<p><span class=\"timeline-date\">{}</span>: {}. {}</p>\n",
                escape_html(&entry.regency_date()),
                escape_html(&entry.title),
                escape_html(&entry.summary)
            ));
        }
        body.push_str("</div>\n");
    }

    body.push_str(&format!(
        "<div class=\"footer\">Composed on {}</div>\n",
        story.created_at.format("%B %d, %Y")
    ));

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n<div class=\"story-container\">\n{}</div>\n</body>\n</html>\n",
        title, HTML_STYLE, body
    )
}
