/// Story composition: theme, style, setting and cast in, titled sections out.
///
/// Walks a fixed per-style skeleton of sections. Each section has beats, and
/// each beat names a fragment rule plus the lowest complexity at which it
/// appears. Every beat is expanded with its own generator, derived from the
/// seed and the beat's position, so raising the complexity only ever adds
/// paragraphs and never changes the ones already present.
use chrono::Utc;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::builder::CharacterBuilder;
use crate::core::content::{ContentError, ContentTables};
use crate::core::grammar::{CastRole, SelectionContext, StoryValues};
use crate::core::text::{join_list, normalize_phrase, slugify};
use crate::schema::character::Character;
use crate::schema::setting::Setting;
use crate::schema::story::{Complexity, Section, Story, Style};

pub const QUOTE_SECTION_TITLE: &str = "A Word from Miss Austen";
pub const FALLBACK_SECTION_TITLE: &str = "The Story";

/// Mixed into the seed for drafted casts, so names and traits do not move in
/// step with the story's beats.
pub const CAST_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),
}

/// One fragment rule expansion within a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Beat {
    pub rule: &'static str,
    /// Lowest complexity level that includes this beat.
    pub min_level: u8,
    /// Expanded once per cast member, with `{character.*}` bound.
    pub per_character: bool,
}

const fn beat(rule: &'static str, min_level: u8) -> Beat {
    Beat {
        rule,
        min_level,
        per_character: false,
    }
}

const fn cast_beat(rule: &'static str, min_level: u8) -> Beat {
    Beat {
        rule,
        min_level,
        per_character: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionPlan {
    pub title: &'static str,
    pub beats: &'static [Beat],
}

const OPENING: SectionPlan = SectionPlan {
    title: "Opening",
    beats: &[
        beat("opening", 1),
        beat("opening_atmosphere", 2),
        beat("setting_detail", 3),
    ],
};

const INTRODUCTION: SectionPlan = SectionPlan {
    title: "Introduction",
    beats: &[
        beat("introduction", 1),
        cast_beat("cast_entry", 1),
        cast_beat("cast_backstory", 2),
    ],
};

const RISING_ACTION: SectionPlan = SectionPlan {
    title: "Rising Action",
    beats: &[
        beat("rising_action", 1),
        beat("theme_elaboration", 2),
        beat("character_interaction", 2),
        beat("subplot", 3),
    ],
};

const COMPLICATIONS: SectionPlan = SectionPlan {
    title: "Complications",
    beats: &[beat("complications", 1), beat("character_interaction", 3)],
};

const REVELATION: SectionPlan = SectionPlan {
    title: "Revelation",
    beats: &[beat("revelation", 1), beat("revelation_clue", 2)],
};

const CLIMAX: SectionPlan = SectionPlan {
    title: "Climax",
    beats: &[
        beat("climax", 1),
        beat("social_commentary", 2),
        beat("inner_thoughts", 3),
    ],
};

const RESOLUTION: SectionPlan = SectionPlan {
    title: "Resolution",
    beats: &[beat("resolution", 1), beat("resolution_reflection", 2)],
};

/// The ordered sections for a style.
pub fn skeleton(style: Style) -> Vec<SectionPlan> {
    match style {
        Style::Comedic => vec![
            OPENING,
            INTRODUCTION,
            RISING_ACTION,
            COMPLICATIONS,
            CLIMAX,
            RESOLUTION,
        ],
        Style::Mystery => vec![
            OPENING,
            INTRODUCTION,
            RISING_ACTION,
            REVELATION,
            CLIMAX,
            RESOLUTION,
        ],
        Style::Classic | Style::Dramatic | Style::Romantic => {
            vec![OPENING, INTRODUCTION, RISING_ACTION, CLIMAX, RESOLUTION]
        }
    }
}

/// Every fragment rule some skeleton expands directly.
pub fn skeleton_rules() -> BTreeSet<&'static str> {
    Style::ALL
        .iter()
        .flat_map(|style| skeleton(*style))
        .flat_map(|plan| plan.beats.iter().map(|b| b.rule))
        .collect()
}

/// What to compose.
#[derive(Debug, Clone)]
pub struct ComposeRequest {
    pub theme: String,
    /// Free-text description of a custom theme, told right after the opening line.
    pub theme_description: Option<String>,
    pub style: Style,
    pub complexity: Complexity,
    pub setting: Setting,
    pub characters: Vec<Character>,
    /// Append a closing section with a fitting Austen quotation.
    pub include_quote: bool,
}

/// Composes stories from a set of content tables. Built via `Composer::builder()`.
pub struct Composer {
    content: ContentTables,
    seed: u64,
}

/// Builder for constructing a `Composer`.
pub struct ComposerBuilder {
    content_dir: Option<PathBuf>,
    seed: u64,
    /// Directly provided content (for testing without files).
    content: Option<ContentTables>,
}

impl Composer {
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder {
            content_dir: None,
            seed: 0,
            content: None,
        }
    }

    pub fn content(&self) -> &ContentTables {
        &self.content
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A character builder over this composer's tables, seeded apart from
    /// the beats of a story composed with the same seed.
    pub fn character_builder(&self, seed: u64) -> CharacterBuilder<'_> {
        CharacterBuilder::new(&self.content, seed ^ CAST_SEED_SALT)
    }

    /// Compose with the seed given to the builder.
    pub fn compose_default(&self, request: &ComposeRequest) -> Story {
        self.compose(request, self.seed)
    }

    /// Compose a story. Never fails: beats that cannot be expanded are
    /// skipped, and a story with no expandable beats at all gets a single
    /// section describing the setting and the cast.
    pub fn compose(&self, request: &ComposeRequest, seed: u64) -> Story {
        let theme = normalize_phrase(&request.theme);
        let characters = if request.characters.is_empty() {
            debug!("no characters given, drafting a protagonist");
            self.character_builder(seed).random_cast(1)
        } else {
            request.characters.clone()
        };
        let setting = Setting {
            location: normalize_phrase(&request.setting.location),
            season: request.setting.season,
            time_period: normalize_phrase(&request.setting.time_period),
        };

        let mut sections = self.render_sections(request, &theme, &setting, &characters, seed);

        if request.include_quote {
            let mut rng = StdRng::seed_from_u64(beat_seed(seed, QUOTE_SECTION_TITLE, "quote", None));
            match self.content.pick_quote(&theme, request.style, &mut rng) {
                Some(quote) => {
                    let mut text = format!("\u{201C}{}\u{201D}\n\n(Jane Austen, {})", quote.text, quote.source);
                    if !quote.context.trim().is_empty() {
                        text.push_str("\n\n");
                        text.push_str(quote.context.trim());
                    }
                    sections.push(Section::new(QUOTE_SECTION_TITLE, text));
                }
                None => debug!("no quotes available"),
            }
        }

        debug!(
            "composed {} sections ({} style, complexity {})",
            sections.len(),
            request.style,
            request.complexity
        );

        Story {
            theme,
            style: request.style,
            complexity: request.complexity,
            setting,
            characters,
            sections,
            created_at: Utc::now(),
        }
    }

    fn render_sections(
        &self,
        request: &ComposeRequest,
        theme: &str,
        setting: &Setting,
        characters: &[Character],
        seed: u64,
    ) -> Vec<Section> {
        let mut ctx = SelectionContext::new(&self.content.neutral);
        ctx.values = StoryValues {
            theme: theme.to_string(),
            location: setting.location.clone(),
            season: setting.season.as_str().to_string(),
            time_period: setting.time_period.clone(),
            style: request.style.as_str().to_string(),
            ..StoryValues::default()
        };
        self.add_tags(&mut ctx, theme, request.style, setting, characters.len());
        for (role, character) in [CastRole::Protagonist, CastRole::Second, CastRole::Third]
            .into_iter()
            .zip(characters.iter())
        {
            ctx.bindings.insert(role, character);
        }

        let level = request.complexity.level();
        let description = theme_description(request);
        let mut sections = Vec::new();
        for (index, plan) in skeleton(request.style).into_iter().enumerate() {
            let mut paragraphs = Vec::new();
            for b in plan.beats.iter().filter(|b| !b.per_character && b.min_level <= level) {
                paragraphs.extend(self.render_beat(&ctx, seed, plan.title, b.rule, None));
            }
            for (i, character) in characters.iter().enumerate() {
                ctx.bindings.insert(CastRole::Character, character);
                for b in plan.beats.iter().filter(|b| b.per_character && b.min_level <= level) {
                    paragraphs.extend(self.render_beat(&ctx, seed, plan.title, b.rule, Some(i)));
                }
            }
            ctx.bindings.remove(&CastRole::Character);

            if index == 0 && !paragraphs.is_empty() {
                if let Some(text) = description {
                    paragraphs.insert(1, text.to_string());
                }
            }
            if !paragraphs.is_empty() {
                sections.push(Section::new(plan.title, paragraphs.join("\n\n")));
            }
        }

        if sections.is_empty() {
            debug!("no beat could be expanded, falling back to a single section");
            let mut section = self.fallback_section(&ctx, characters);
            if let Some(text) = description {
                section.text = format!("{}\n\n{}", text, section.text);
            }
            sections.push(section);
        }

        sections
    }

    fn add_tags(
        &self,
        ctx: &mut SelectionContext<'_>,
        theme: &str,
        style: Style,
        setting: &Setting,
        cast_size: usize,
    ) {
        ctx.tags.insert(style.tag().to_string());
        ctx.tags.insert(self.content.theme_tag(theme));
        ctx.tags.insert(setting.season.tag().to_string());
        let slug = slugify(&setting.location);
        if !slug.is_empty() {
            ctx.tags.insert(format!("location:{}", slug));
        }
        let cast = match cast_size {
            0 | 1 => "cast:solo",
            2 => "cast:pair",
            _ => "cast:ensemble",
        };
        ctx.tags.insert(cast.to_string());
    }

    fn render_beat(
        &self,
        ctx: &SelectionContext<'_>,
        seed: u64,
        section: &str,
        rule: &str,
        member: Option<usize>,
    ) -> Option<String> {
        let mut rng = StdRng::seed_from_u64(beat_seed(seed, section, rule, member));
        match self.content.fragments.expand(rule, ctx, &mut rng) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Err(e) => {
                debug!("skipping beat '{}' in {}: {}", rule, section, e);
                None
            }
        }
    }

    fn fallback_section(&self, ctx: &SelectionContext<'_>, characters: &[Character]) -> Section {
        let neutral = &self.content.neutral;
        let or_neutral = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        let names: Vec<String> = characters
            .iter()
            .map(|c| or_neutral(&c.name, &neutral.name))
            .collect();
        let text = format!(
            "In {}, during the {} of {}, a tale of {} awaited its telling.\n\nIts people: {}.",
            or_neutral(&ctx.values.location, &neutral.location),
            or_neutral(&ctx.values.season, &neutral.season),
            or_neutral(&ctx.values.time_period, &neutral.time_period),
            or_neutral(&ctx.values.theme, &neutral.theme),
            join_list(&names),
        );
        Section::new(FALLBACK_SECTION_TITLE, text)
    }
}

fn theme_description(request: &ComposeRequest) -> Option<&str> {
    request
        .theme_description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
}

/// Seed for one beat, independent of which other beats are rendered.
fn beat_seed(seed: u64, section: &str, rule: &str, member: Option<usize>) -> u64 {
    let mut hasher = FxHasher::default();
    seed.hash(&mut hasher);
    section.hash(&mut hasher);
    rule.hash(&mut hasher);
    member.hash(&mut hasher);
    hasher.finish()
}

impl ComposerBuilder {
    /// Load content from a directory (see `ContentTables::load_dir`).
    pub fn content_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.content_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide content directly (for testing without files).
    pub fn with_content(mut self, content: ContentTables) -> Self {
        self.content = Some(content);
        self
    }

    pub fn build(self) -> Result<Composer, ComposerError> {
        let content = match (self.content, self.content_dir) {
            (Some(content), _) => content,
            (None, Some(dir)) => ContentTables::load_dir(&dir)?,
            (None, None) => ContentTables::austen()?,
        };
        Ok(Composer {
            content,
            seed: self.seed,
        })
    }
}
