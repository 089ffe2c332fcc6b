/// Fragment templating runtime — types, parsing, loading, and expansion.
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::text::{capitalize_first, join_list, with_article};
use crate::schema::character::Character;

/// Nested rule references deeper than this are treated as a cycle.
pub const MAX_EXPANSION_DEPTH: usize = 12;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("template parse error: {0}")]
    TemplateParse(String),
    #[error("fragment rule not found: {0}")]
    RuleNotFound(String),
    #[error("no alternative of rule '{0}' matches the current tags")]
    NoEligibleAlternative(String),
    #[error("expansion of rule '{0}' exceeded the maximum depth")]
    DepthExceeded(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A story-wide value a template can interpolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoryValue {
    Theme,
    Location,
    Season,
    TimePeriod,
    Style,
    /// What a letter is about.
    Subject,
    /// Further particulars of a letter's subject.
    Details,
    Sender,
    Recipient,
}

impl StoryValue {
    fn parse(name: &str) -> Option<StoryValue> {
        match name {
            "theme" => Some(Self::Theme),
            "location" => Some(Self::Location),
            "season" => Some(Self::Season),
            "time_period" => Some(Self::TimePeriod),
            "style" => Some(Self::Style),
            "subject" => Some(Self::Subject),
            "details" => Some(Self::Details),
            "sender" => Some(Self::Sender),
            "recipient" => Some(Self::Recipient),
            _ => None,
        }
    }
}

/// Which cast member a field slot refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastRole {
    Protagonist,
    Second,
    Third,
    /// The character currently being iterated (cast lists).
    Character,
}

impl CastRole {
    fn parse(name: &str) -> Option<CastRole> {
        match name {
            "protagonist" => Some(Self::Protagonist),
            "second" => Some(Self::Second),
            "third" => Some(Self::Third),
            "character" => Some(Self::Character),
            _ => None,
        }
    }
}

/// A character attribute a field slot reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterField {
    Name,
    FirstName,
    Virtue,
    Virtues,
    Flaw,
    Flaws,
    Goal,
    Personality,
    Occupation,
    SocialClass,
    Backstory,
    Role,
    Subject,
    Object,
    Possessive,
    Reflexive,
}

impl CharacterField {
    fn parse(name: &str) -> Option<CharacterField> {
        let field = match name {
            "name" => Self::Name,
            "first_name" => Self::FirstName,
            "virtue" => Self::Virtue,
            "virtues" => Self::Virtues,
            "flaw" => Self::Flaw,
            "flaws" => Self::Flaws,
            "goal" => Self::Goal,
            "personality" => Self::Personality,
            "occupation" => Self::Occupation,
            "social_class" => Self::SocialClass,
            "backstory" => Self::Backstory,
            "role" => Self::Role,
            "subject" => Self::Subject,
            "object" => Self::Object,
            "possessive" => Self::Possessive,
            "reflexive" => Self::Reflexive,
            _ => return None,
        };
        Some(field)
    }
}

/// What a slot reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotSource {
    Value(StoryValue),
    Field { role: CastRole, field: CharacterField },
}

/// An interpolation slot with its modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub source: SlotSource,
    /// `a:` prefix: emit "a"/"an" before the value.
    pub article: bool,
    /// `^` prefix: capitalise the first letter of the output.
    pub capitalize: bool,
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Reference to another fragment rule: `{rule_name}`.
    RuleRef(String),
    /// Story value or character field: `{theme}`, `{^a:protagonist.virtue}`.
    Slot(Slot),
}

/// A parsed template — a sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string into a sequence of segments.
    ///
    /// Syntax:
    /// - `{rule_name}` → `RuleRef`
    /// - `{theme}`, `{location}`, `{season}`, `{time_period}`, `{style}` → value `Slot`
    /// - `{role.field}` → field `Slot`
    /// - `^` and `a:` prefixes inside the braces → capitalise / article
    /// - `{{` and `}}` → literal braces
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, GrammarError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            if chars[i] == '{' {
                // Escaped brace
                if i + 1 < len && chars[i + 1] == '{' {
                    literal_buf.push('{');
                    i += 2;
                    continue;
                }

                if !literal_buf.is_empty() {
                    segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                }

                let start = i + 1;
                let mut end = start;
                let mut closed = false;
                while end < len {
                    if chars[end] == '{' {
                        return Err(GrammarError::TemplateParse(
                            "nested braces are not allowed".to_string(),
                        ));
                    }
                    if chars[end] == '}' {
                        closed = true;
                        break;
                    }
                    end += 1;
                }

                if !closed {
                    return Err(GrammarError::TemplateParse("unclosed brace".to_string()));
                }

                let content: String = chars[start..end].iter().collect();
                if content.trim().is_empty() {
                    return Err(GrammarError::TemplateParse("empty braces".to_string()));
                }

                segments.push(Self::parse_segment(content.trim())?);
                i = end + 1;
            } else if chars[i] == '}' {
                if i + 1 < len && chars[i + 1] == '}' {
                    literal_buf.push('}');
                    i += 2;
                    continue;
                }
                return Err(GrammarError::TemplateParse(
                    "unmatched closing brace".to_string(),
                ));
            } else {
                literal_buf.push(chars[i]);
                i += 1;
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_segment(content: &str) -> Result<TemplateSegment, GrammarError> {
        let (capitalize, rest) = match content.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, content),
        };
        let (article, rest) = match rest.strip_prefix("a:") {
            Some(rest) => (true, rest),
            None => (false, rest),
        };

        if let Some(value) = StoryValue::parse(rest) {
            return Ok(TemplateSegment::Slot(Slot {
                source: SlotSource::Value(value),
                article,
                capitalize,
            }));
        }

        if let Some((role_name, field_name)) = rest.split_once('.') {
            let role = CastRole::parse(role_name).ok_or_else(|| {
                GrammarError::TemplateParse(format!("unknown cast role '{}'", role_name))
            })?;
            let field = CharacterField::parse(field_name).ok_or_else(|| {
                GrammarError::TemplateParse(format!("unknown character field '{}'", field_name))
            })?;
            return Ok(TemplateSegment::Slot(Slot {
                source: SlotSource::Field { role, field },
                article,
                capitalize,
            }));
        }

        if capitalize || article {
            return Err(GrammarError::TemplateParse(format!(
                "modifiers are not allowed on rule reference '{}'",
                content
            )));
        }

        if !rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(GrammarError::TemplateParse(format!(
                "invalid rule name '{}'",
                rest
            )));
        }

        Ok(TemplateSegment::RuleRef(rest.to_string()))
    }

    /// Names of the rules this template references.
    pub fn rule_refs(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::RuleRef(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Wording used when a template asks for something the story lacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralTerms {
    pub name: String,
    pub virtue: String,
    pub flaw: String,
    pub goal: String,
    pub personality: String,
    pub occupation: String,
    pub social_class: String,
    pub backstory: String,
    pub theme: String,
    pub location: String,
    pub season: String,
    pub time_period: String,
    pub subject: String,
    pub details: String,
    pub sender: String,
    pub recipient: String,
}

impl Default for NeutralTerms {
    fn default() -> Self {
        Self {
            name: "a mutual acquaintance".to_string(),
            virtue: "good sense".to_string(),
            flaw: "stubbornness".to_string(),
            goal: "a settled and contented life".to_string(),
            personality: "thoughtful".to_string(),
            occupation: "person of independent means".to_string(),
            social_class: "member of genteel society".to_string(),
            backstory: "of a family long known in the neighbourhood".to_string(),
            theme: "an untold tale".to_string(),
            location: "a quiet country house".to_string(),
            season: "the changing season".to_string(),
            time_period: "the Regency era".to_string(),
            subject: "our late news".to_string(),
            details: "more particulars will follow".to_string(),
            sender: "your friend".to_string(),
            recipient: "my dear friend".to_string(),
        }
    }
}

/// Story-wide strings available to `{theme}` and friends.
#[derive(Debug, Clone, Default)]
pub struct StoryValues {
    pub theme: String,
    pub location: String,
    pub season: String,
    pub time_period: String,
    pub style: String,
    pub subject: String,
    pub details: String,
    pub sender: String,
    pub recipient: String,
}

/// Everything template expansion needs to know about the story being told.
pub struct SelectionContext<'a> {
    pub tags: FxHashSet<String>,
    pub values: StoryValues,
    pub bindings: FxHashMap<CastRole, &'a Character>,
    pub neutral: &'a NeutralTerms,
}

impl<'a> SelectionContext<'a> {
    pub fn new(neutral: &'a NeutralTerms) -> Self {
        Self {
            tags: FxHashSet::default(),
            values: StoryValues::default(),
            bindings: FxHashMap::default(),
            neutral,
        }
    }

    fn resolve(&self, source: &SlotSource) -> String {
        match source {
            SlotSource::Value(value) => self.resolve_value(*value),
            SlotSource::Field { role, field } => {
                self.resolve_field(self.bindings.get(role).copied(), *field)
            }
        }
    }

    fn resolve_value(&self, value: StoryValue) -> String {
        let (found, fallback) = match value {
            StoryValue::Theme => (&self.values.theme, self.neutral.theme.as_str()),
            StoryValue::Location => (&self.values.location, self.neutral.location.as_str()),
            StoryValue::Season => (&self.values.season, self.neutral.season.as_str()),
            StoryValue::TimePeriod => (&self.values.time_period, self.neutral.time_period.as_str()),
            StoryValue::Style => (&self.values.style, "classic"),
            StoryValue::Subject => (&self.values.subject, self.neutral.subject.as_str()),
            StoryValue::Details => (&self.values.details, self.neutral.details.as_str()),
            StoryValue::Sender => (&self.values.sender, self.neutral.sender.as_str()),
            StoryValue::Recipient => (&self.values.recipient, self.neutral.recipient.as_str()),
        };
        non_empty_or(found, fallback)
    }

    fn resolve_field(&self, character: Option<&Character>, field: CharacterField) -> String {
        let n = self.neutral;
        let Some(c) = character else {
            return match field {
                CharacterField::Name | CharacterField::FirstName => n.name.clone(),
                CharacterField::Virtue | CharacterField::Virtues => n.virtue.clone(),
                CharacterField::Flaw | CharacterField::Flaws => n.flaw.clone(),
                CharacterField::Goal => n.goal.clone(),
                CharacterField::Personality => n.personality.clone(),
                CharacterField::Occupation => n.occupation.clone(),
                CharacterField::SocialClass => n.social_class.clone(),
                CharacterField::Backstory => n.backstory.clone(),
                CharacterField::Role => "acquaintance".to_string(),
                CharacterField::Subject => "they".to_string(),
                CharacterField::Object => "them".to_string(),
                CharacterField::Possessive => "their".to_string(),
                CharacterField::Reflexive => "themselves".to_string(),
            };
        };

        match field {
            CharacterField::Name => non_empty_or(&c.name, &n.name),
            CharacterField::FirstName => non_empty_or(c.first_name(), &n.name),
            CharacterField::Virtue => c.primary_virtue().unwrap_or(n.virtue.as_str()).to_string(),
            CharacterField::Virtues => list_or(&c.virtues, &n.virtue),
            CharacterField::Flaw => c.primary_flaw().unwrap_or(n.flaw.as_str()).to_string(),
            CharacterField::Flaws => list_or(&c.flaws, &n.flaw),
            CharacterField::Goal => non_empty_or(&c.goal, &n.goal),
            CharacterField::Personality => non_empty_or(&c.personality, &n.personality),
            CharacterField::Occupation => non_empty_or(&c.occupation, &n.occupation),
            CharacterField::SocialClass => non_empty_or(&c.social_class, &n.social_class),
            CharacterField::Backstory => match c.backstory.as_deref() {
                Some(b) => non_empty_or(b, &n.backstory),
                None => n.backstory.clone(),
            },
            CharacterField::Role => c.role.label().to_lowercase(),
            CharacterField::Subject => c.pronouns().subject().to_string(),
            CharacterField::Object => c.pronouns().object().to_string(),
            CharacterField::Possessive => c.pronouns().possessive().to_string(),
            CharacterField::Reflexive => c.pronouns().reflexive().to_string(),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn list_or(items: &std::collections::BTreeSet<String>, fallback: &str) -> String {
    let present: Vec<&str> = items
        .iter()
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
        .collect();
    if present.is_empty() {
        fallback.to_string()
    } else {
        join_list(&present)
    }
}

/// A weighted text alternative within a fragment rule, with tag preconditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alternative {
    pub weight: u32,
    pub requires: Vec<String>,
    pub excludes: Vec<String>,
    pub template: Template,
}

impl Alternative {
    fn is_eligible(&self, tags: &FxHashSet<String>) -> bool {
        self.requires.iter().all(|t| tags.contains(t))
            && !self.excludes.iter().any(|t| tags.contains(t))
    }
}

/// A named fragment rule with weighted alternatives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentRule {
    pub name: String,
    pub alternatives: Vec<Alternative>,
}

/// A set of named fragment rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FragmentSet {
    pub rules: FxHashMap<String, FragmentRule>,
}

// The RON file shape differs from the internal types (text vs parsed
// template, optional fields), so we go through intermediate structs.

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RonAlternative {
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default)]
    requires: Vec<String>,
    #[serde(default)]
    excludes: Vec<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Rule")]
struct RonRule {
    alternatives: Vec<RonAlternative>,
}

impl FragmentSet {
    /// Load a fragment set from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<FragmentSet, GrammarError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a fragment set from a RON string.
    pub fn parse_ron(input: &str) -> Result<FragmentSet, GrammarError> {
        let raw: FxHashMap<String, RonRule> = ron::from_str(input)?;
        let mut rules = FxHashMap::default();

        for (name, ron_rule) in raw {
            let mut alternatives = Vec::with_capacity(ron_rule.alternatives.len());
            for alt in ron_rule.alternatives {
                let template = Template::parse(&alt.text).map_err(|e| match e {
                    GrammarError::TemplateParse(msg) => {
                        GrammarError::TemplateParse(format!("rule '{}': {}", name, msg))
                    }
                    other => other,
                })?;
                alternatives.push(Alternative {
                    weight: alt.weight,
                    requires: alt.requires,
                    excludes: alt.excludes,
                    template,
                });
            }
            rules.insert(name.clone(), FragmentRule { name, alternatives });
        }

        Ok(FragmentSet { rules })
    }

    /// Merge another fragment set into this one. Rules from `other`
    /// override rules in `self` with the same name.
    pub fn merge(&mut self, other: FragmentSet) {
        for (name, rule) in other.rules {
            self.rules.insert(name, rule);
        }
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }

    /// Pick one alternative of `rule` for the given tags.
    ///
    /// Alternatives whose preconditions fail are dropped; of the rest only
    /// the most specific (most `requires` tags) are kept, and one of those
    /// is drawn by weight.
    pub fn select<'s, R: Rng>(
        &'s self,
        rule: &str,
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Result<&'s Alternative, GrammarError> {
        let fragment = self
            .rules
            .get(rule)
            .ok_or_else(|| GrammarError::RuleNotFound(rule.to_string()))?;

        let eligible: Vec<&Alternative> = fragment
            .alternatives
            .iter()
            .filter(|alt| alt.is_eligible(&ctx.tags))
            .collect();

        let specificity = eligible
            .iter()
            .map(|alt| alt.requires.len())
            .max()
            .ok_or_else(|| GrammarError::NoEligibleAlternative(rule.to_string()))?;

        let best: Vec<&Alternative> = eligible
            .into_iter()
            .filter(|alt| alt.requires.len() == specificity)
            .collect();

        let dist = WeightedIndex::new(best.iter().map(|alt| alt.weight))
            .map_err(|_| GrammarError::NoEligibleAlternative(rule.to_string()))?;
        Ok(best[dist.sample(rng)])
    }

    /// Expand a rule to text.
    pub fn expand<R: Rng>(
        &self,
        rule: &str,
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Result<String, GrammarError> {
        self.expand_at_depth(rule, ctx, rng, 0)
    }

    fn expand_at_depth<R: Rng>(
        &self,
        rule: &str,
        ctx: &SelectionContext<'_>,
        rng: &mut R,
        depth: usize,
    ) -> Result<String, GrammarError> {
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(GrammarError::DepthExceeded(rule.to_string()));
        }
        let alt = self.select(rule, ctx, rng)?;
        self.render_at_depth(&alt.template, ctx, rng, depth)
    }

    /// Render a template; rule references are expanded from this set.
    pub fn render<R: Rng>(
        &self,
        template: &Template,
        ctx: &SelectionContext<'_>,
        rng: &mut R,
    ) -> Result<String, GrammarError> {
        self.render_at_depth(template, ctx, rng, 0)
    }

    fn render_at_depth<R: Rng>(
        &self,
        template: &Template,
        ctx: &SelectionContext<'_>,
        rng: &mut R,
        depth: usize,
    ) -> Result<String, GrammarError> {
        let mut out = String::new();
        for segment in &template.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::RuleRef(name) => {
                    out.push_str(&self.expand_at_depth(name, ctx, rng, depth + 1)?);
                }
                TemplateSegment::Slot(slot) => {
                    let mut value = ctx.resolve(&slot.source);
                    if slot.article {
                        value = with_article(&value);
                    }
                    if slot.capitalize {
                        value = capitalize_first(&value);
                    }
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}
