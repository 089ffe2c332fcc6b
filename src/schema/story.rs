use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::character::Character;
use super::setting::Setting;

/// The narrative register a story is told in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Classic,
    Dramatic,
    Comedic,
    Romantic,
    Mystery,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown narrative style '{0}'")]
pub struct ParseStyleError(pub String);

impl Style {
    pub const ALL: [Style; 5] = [
        Style::Classic,
        Style::Dramatic,
        Style::Comedic,
        Style::Romantic,
        Style::Mystery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Dramatic => "dramatic",
            Self::Comedic => "comedic",
            Self::Romantic => "romantic",
            Self::Mystery => "mystery",
        }
    }

    /// Returns the tag string for this style (e.g., "style:romantic").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Classic => "style:classic",
            Self::Dramatic => "style:dramatic",
            Self::Comedic => "style:comedic",
            Self::Romantic => "style:romantic",
            Self::Mystery => "style:mystery",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Classic => "Classic Austen (balanced narrative)",
            Self::Dramatic => "Dramatic (intense emotional conflicts)",
            Self::Comedic => "Comedic (misunderstandings and social humor)",
            Self::Romantic => "Romantic (focus on matters of the heart)",
            Self::Mystery => "Mystery (secrets and intrigue)",
        }
    }
}

impl FromStr for Style {
    type Err = ParseStyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.as_str() == lowered)
            .ok_or_else(|| ParseStyleError(s.to_string()))
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many optional narrative sub-beats a story includes, from 1 to 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Complexity(u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("complexity must be between 1 and 3, got {0}")]
pub struct ComplexityError(pub i64);

impl Complexity {
    pub const SIMPLE: Complexity = Complexity(1);
    pub const MODERATE: Complexity = Complexity(2);
    pub const RICH: Complexity = Complexity(3);

    pub fn new(level: u8) -> Result<Self, ComplexityError> {
        if (1..=3).contains(&level) {
            Ok(Complexity(level))
        } else {
            Err(ComplexityError(level as i64))
        }
    }

    /// Clamp any integer into the valid range.
    pub fn clamped(level: i64) -> Self {
        Complexity(level.clamp(1, 3) as u8)
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for Complexity {
    fn default() -> Self {
        Self::MODERATE
    }
}

impl TryFrom<u8> for Complexity {
    type Error = ComplexityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Complexity::new(value)
    }
}

impl From<Complexity> for u8 {
    fn from(value: Complexity) -> Self {
        value.0
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One titled unit of the composed narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub text: String,
}

impl Section {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }
}

/// A composed story. Section order is the narrative order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub theme: String,
    pub style: Style,
    pub complexity: Complexity,
    pub setting: Setting,
    pub characters: Vec<Character>,
    pub sections: Vec<Section>,
    pub created_at: DateTime<Utc>,
}

impl Story {
    pub fn protagonist(&self) -> Option<&Character> {
        self.characters.first()
    }

    /// Display title: the theme, or a generic title for an empty theme.
    pub fn title(&self) -> &str {
        if self.theme.trim().is_empty() {
            "A Tale in the Style of Jane Austen"
        } else {
            &self.theme
        }
    }

    pub fn word_count(&self) -> usize {
        self.sections
            .iter()
            .map(|s| s.text.split_whitespace().count())
            .sum()
    }
}
