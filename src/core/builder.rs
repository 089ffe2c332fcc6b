/// Character creation: from partial user input, or entirely at random.
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

use crate::core::content::ContentTables;
use crate::core::text::normalize_phrase;
use crate::schema::character::{Character, Gender, Role};

/// Probability that a drawn occupation is gender-specific rather than neutral.
const GENDERED_OCCUPATION_CHANCE: f64 = 0.7;

/// Supporting roles handed out by `random_cast`, in order.
const CAST_ROLES: [Role; 4] = [
    Role::Protagonist,
    Role::RomanticInterest,
    Role::Confidant,
    Role::Rival,
];

pub const MAX_CAST: usize = CAST_ROLES.len();

/// A virtue or flaw as chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitChoice {
    /// Position in the content table's list.
    Index(usize),
    /// Free text.
    Custom(String),
}

/// Partial description of a character. Anything left empty is drawn from
/// the content tables.
#[derive(Debug, Clone, Default)]
pub struct CharacterInput {
    pub name: Option<String>,
    /// Lenient gender text ("f", "Male", ...). Unrecognised text means `Other`.
    pub gender: Option<String>,
    pub virtues: Vec<TraitChoice>,
    pub flaws: Vec<TraitChoice>,
    pub goal: Option<String>,
    pub role: Option<Role>,
    pub backstory: Option<String>,
}

/// Builds characters from content tables with a seeded generator.
///
/// The same seed and the same sequence of calls always produce the same
/// characters.
pub struct CharacterBuilder<'a> {
    content: &'a ContentTables,
    rng: StdRng,
}

impl<'a> CharacterBuilder<'a> {
    pub fn new(content: &'a ContentTables, seed: u64) -> Self {
        Self {
            content,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a character from user input. Never fails: empty fields are
    /// drawn, out-of-range trait indices are replaced with a drawn trait.
    pub fn build_character(&mut self, input: CharacterInput) -> Character {
        let gender = match input.gender.as_deref().and_then(Gender::from_loose) {
            Some(gender) => gender,
            None => self.draw_gender(),
        };

        let name = match input.name.as_deref().map(normalize_phrase) {
            Some(name) if !name.is_empty() => name,
            _ => self.draw_name(gender),
        };

        let content = self.content;
        let virtues = self.resolve_traits(&input.virtues, &content.virtues, "virtue");
        let flaws = self.resolve_traits(&input.flaws, &content.flaws, "flaw");

        let goal = match input.goal.as_deref().map(normalize_phrase) {
            Some(goal) if !goal.is_empty() => goal,
            _ => self.draw(&content.goals),
        };

        let backstory = match input.backstory.as_deref().map(str::trim) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => self.draw(&content.backstories),
        };

        Character {
            name,
            gender,
            virtues,
            flaws,
            goal,
            role: input.role.unwrap_or_default(),
            social_class: self.draw(&content.social_classes),
            occupation: self.draw_occupation(gender),
            personality: self.draw(&content.personalities),
            backstory: non_empty(backstory),
        }
    }

    /// A fully random character; `gender_hint` fixes the gender.
    pub fn random_character(&mut self, gender_hint: Option<Gender>) -> Character {
        let gender = match gender_hint {
            Some(gender) => gender,
            None => self.draw_gender(),
        };
        let content = self.content;
        let name = self.draw_name(gender);
        let virtues = self.draw_set(&content.virtues);
        let flaws = self.draw_set(&content.flaws);
        let goal = self.draw(&content.goals);
        let social_class = self.draw(&content.social_classes);
        let occupation = self.draw_occupation(gender);
        let personality = self.draw(&content.personalities);
        let backstory = self.draw(&content.backstories);

        Character {
            name,
            gender,
            virtues,
            flaws,
            goal,
            role: Role::Protagonist,
            social_class,
            occupation,
            personality,
            backstory: non_empty(backstory),
        }
    }

    /// A protagonist plus supporting characters, `count` clamped to 1..=4.
    ///
    /// The romantic interest is of the other gender when the protagonist's
    /// is male or female. Names are not repeated when the tables allow it.
    pub fn random_cast(&mut self, count: usize) -> Vec<Character> {
        let count = count.clamp(1, MAX_CAST);
        let mut cast: Vec<Character> = Vec::with_capacity(count);

        for role in CAST_ROLES.into_iter().take(count) {
            let hint = match (role, cast.first().map(|c| c.gender)) {
                (Role::RomanticInterest, Some(Gender::Female)) => Some(Gender::Male),
                (Role::RomanticInterest, Some(Gender::Male)) => Some(Gender::Female),
                _ => None,
            };
            let mut character = self.random_character(hint);
            for _ in 0..8 {
                if !cast.iter().any(|c| c.name == character.name) {
                    break;
                }
                character = self.random_character(Some(character.gender));
            }
            character.role = role;
            cast.push(character);
        }
        cast
    }

    fn draw_gender(&mut self) -> Gender {
        if self.rng.gen_bool(0.5) {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    fn draw_name(&mut self, gender: Gender) -> String {
        let content = self.content;
        let first = self.draw(content.first_names.for_gender(gender));
        let surname = self.draw(&content.surnames);
        let name = format!("{} {}", first, surname);
        let name = name.trim();
        if name.is_empty() {
            content.neutral.name.clone()
        } else {
            name.to_string()
        }
    }

    fn draw_occupation(&mut self, gender: Gender) -> String {
        let content = self.content;
        let specific = content.occupations.for_gender(gender);
        let neutral = &content.occupations.neutral;
        if !specific.is_empty() && self.rng.gen_bool(GENDERED_OCCUPATION_CHANCE) {
            self.draw(specific)
        } else if !neutral.is_empty() {
            self.draw(neutral)
        } else {
            self.draw(specific)
        }
    }

    fn draw(&mut self, items: &[String]) -> String {
        items.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    fn draw_set(&mut self, items: &[String]) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        if let Some(item) = items.choose(&mut self.rng) {
            set.insert(item.clone());
        }
        set
    }

    fn resolve_traits(
        &mut self,
        choices: &[TraitChoice],
        table: &[String],
        kind: &str,
    ) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for choice in choices {
            let value = match choice {
                TraitChoice::Index(i) => match table.get(*i) {
                    Some(item) => item.clone(),
                    None => {
                        debug!("{} index {} out of range, drawing one instead", kind, i);
                        self.draw(table)
                    }
                },
                TraitChoice::Custom(text) => normalize_phrase(text),
            };
            if !value.is_empty() {
                set.insert(value);
            }
        }
        if set.is_empty() {
            set = self.draw_set(table);
        }
        set
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
