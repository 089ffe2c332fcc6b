/// Immutable content tables: name pools, trait lists, themes, quotes and the
/// fragment rules the composer expands. Loaded once and passed by reference.
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::grammar::{FragmentSet, GrammarError, NeutralTerms};
use crate::core::text::normalize_phrase;
use crate::schema::character::Gender;
use crate::schema::story::Style;

const AUSTEN_TABLES: &str = include_str!("../../content_data/austen/tables.ron");
const AUSTEN_FRAGMENTS: &str = include_str!("../../content_data/austen/fragments.ron");
const AUSTEN_LETTERS: &str = include_str!("../../content_data/austen/letters.ron");

/// File name of the tables inside a content directory. Every other `.ron`
/// file in the directory is read as a fragment set.
pub const TABLES_FILE: &str = "tables.ron";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("content directory not found: {}", .0.display())]
    MissingDir(PathBuf),
}

/// A built-in story theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeEntry {
    /// Stable identifier, used in `theme:<key>` selection tags.
    pub key: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub context: String,
    /// A theme word or short phrase, matched against the story theme.
    pub theme: String,
}

/// First names by gender.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamePool {
    #[serde(default)]
    pub male: Vec<String>,
    #[serde(default)]
    pub female: Vec<String>,
    #[serde(default)]
    pub other: Vec<String>,
}

impl NamePool {
    pub fn for_gender(&self, gender: Gender) -> &[String] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Other if self.other.is_empty() => &self.female,
            Gender::Other => &self.other,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Occupations {
    #[serde(default)]
    pub male: Vec<String>,
    #[serde(default)]
    pub female: Vec<String>,
    #[serde(default)]
    pub neutral: Vec<String>,
}

impl Occupations {
    /// Gender-specific occupations; `Other` has none and uses the neutral list.
    pub fn for_gender(&self, gender: Gender) -> &[String] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
            Gender::Other => &self.neutral,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentTables {
    #[serde(default)]
    pub themes: Vec<ThemeEntry>,
    #[serde(default)]
    pub first_names: NamePool,
    #[serde(default)]
    pub surnames: Vec<String>,
    #[serde(default)]
    pub virtues: Vec<String>,
    #[serde(default)]
    pub flaws: Vec<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub social_classes: Vec<String>,
    #[serde(default)]
    pub occupations: Occupations,
    #[serde(default)]
    pub personalities: Vec<String>,
    #[serde(default)]
    pub backstories: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    /// Addresses offered to letter writers.
    #[serde(default)]
    pub letter_addresses: Vec<String>,
    #[serde(default)]
    pub time_periods: Vec<String>,
    #[serde(default)]
    pub name_meanings: FxHashMap<String, String>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
    /// Quote theme words associated with each style, keyed by style name.
    #[serde(default)]
    pub style_quote_themes: FxHashMap<String, Vec<String>>,
    #[serde(default)]
    pub neutral: NeutralTerms,
    #[serde(skip)]
    pub fragments: FragmentSet,
}

impl ContentTables {
    /// The built-in Austen tables, story fragments and letter fragments.
    pub fn austen() -> Result<ContentTables, ContentError> {
        let mut content = Self::parse_ron(AUSTEN_TABLES, AUSTEN_FRAGMENTS)?;
        content.fragments.merge(FragmentSet::parse_ron(AUSTEN_LETTERS)?);
        Ok(content)
    }

    /// Parse tables and fragments from RON strings.
    pub fn parse_ron(tables: &str, fragments: &str) -> Result<ContentTables, ContentError> {
        let mut content: ContentTables = ron::from_str(tables)?;
        content.fragments = FragmentSet::parse_ron(fragments)?;
        Ok(content)
    }

    /// Load content from a directory on top of the built-in tables.
    ///
    /// `tables.ron`, when present, replaces the built-in tables wholesale.
    /// Every other `.ron` file is a fragment set merged over the built-in
    /// fragments, in file name order, later files winning.
    pub fn load_dir(dir: &Path) -> Result<ContentTables, ContentError> {
        if !dir.is_dir() {
            return Err(ContentError::MissingDir(dir.to_path_buf()));
        }
        let mut content = Self::austen()?;

        let tables_path = dir.join(TABLES_FILE);
        if tables_path.is_file() {
            debug!("loading content tables from {}", tables_path.display());
            let contents = std::fs::read_to_string(&tables_path)?;
            let replacement: ContentTables = ron::from_str(&contents)?;
            let fragments = std::mem::take(&mut content.fragments);
            content = ContentTables {
                fragments,
                ..replacement
            };
        }

        for path in fragment_files(dir)? {
            debug!("merging fragments from {}", path.display());
            content.fragments.merge(FragmentSet::load_from_ron(&path)?);
        }
        Ok(content)
    }

    /// Case-insensitive exact match of a phrase against theme keys and titles.
    pub fn match_theme(&self, phrase: &str) -> Option<&ThemeEntry> {
        let wanted = normalize_phrase(phrase).to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.themes
            .iter()
            .find(|t| t.key.to_lowercase() == wanted || t.title.to_lowercase() == wanted)
    }

    /// Selection tag for a theme phrase: `theme:<key>` or `theme:custom`.
    pub fn theme_tag(&self, phrase: &str) -> String {
        match self.match_theme(phrase) {
            Some(theme) => format!("theme:{}", theme.key),
            None => "theme:custom".to_string(),
        }
    }

    /// Pick a quote that fits the theme or the style, or any quote at all.
    ///
    /// A quote fits the theme when its theme word (or phrase) appears in the
    /// story theme as whole words.
    pub fn pick_quote<R: Rng>(&self, theme: &str, style: Style, rng: &mut R) -> Option<&Quote> {
        let theme_words = words(theme);
        let keywords: Vec<String> = self
            .match_theme(theme)
            .map(|t| t.keywords.iter().map(|k| k.to_lowercase()).collect())
            .unwrap_or_default();
        let style_words = self
            .style_quote_themes
            .get(style.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let fitting: Vec<&Quote> = self
            .quotes
            .iter()
            .filter(|q| {
                let quote_words = words(&q.theme);
                if quote_words.is_empty() {
                    return false;
                }
                let word = q.theme.trim().to_lowercase();
                theme_words
                    .windows(quote_words.len())
                    .any(|w| w == quote_words.as_slice())
                    || keywords.contains(&word)
                    || style_words.iter().any(|w| w.eq_ignore_ascii_case(&word))
            })
            .collect();

        if fitting.is_empty() {
            self.quotes.choose(rng)
        } else {
            fitting.choose(rng).copied()
        }
    }

    /// Distinct quote themes, sorted.
    pub fn quote_themes(&self) -> Vec<&str> {
        distinct(self.quotes.iter().map(|q| q.theme.as_str()))
    }

    /// Distinct quote sources (novels and letters), sorted.
    pub fn quote_sources(&self) -> Vec<&str> {
        distinct(self.quotes.iter().map(|q| q.source.as_str()))
    }

    pub fn quotes_with_theme(&self, theme: &str) -> Vec<&Quote> {
        let wanted = theme.trim();
        self.quotes
            .iter()
            .filter(|q| q.theme.trim().eq_ignore_ascii_case(wanted))
            .collect()
    }

    pub fn quotes_from_source(&self, source: &str) -> Vec<&Quote> {
        let wanted = source.trim();
        self.quotes
            .iter()
            .filter(|q| q.source.trim().eq_ignore_ascii_case(wanted))
            .collect()
    }

    pub fn name_meaning(&self, first_name: &str) -> Option<&str> {
        let wanted = first_name.trim();
        self.name_meanings
            .get(wanted)
            .or_else(|| {
                self.name_meanings
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                    .map(|(_, meaning)| meaning)
            })
            .map(String::as_str)
    }
}

/// Lowercase alphanumeric words of a phrase.
fn words(phrase: &str) -> Vec<String> {
    phrase
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn distinct<'a>(items: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut out: Vec<&str> = items.map(str::trim).filter(|s| !s.is_empty()).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Fragment `.ron` files in a directory, sorted, excluding the tables file.
fn fragment_files(dir: &Path) -> Result<Vec<PathBuf>, ContentError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_ron = path.extension().and_then(|s| s.to_str()) == Some("ron");
        let is_tables = path.file_name().and_then(|s| s.to_str()) == Some(TABLES_FILE);
        if is_ron && !is_tables {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
