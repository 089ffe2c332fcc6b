use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Gender of a character, used to pick a name table and a pronoun set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

impl Gender {
    /// Lenient parse for interactive input: "m", "Male", "f", "woman", ...
    ///
    /// Returns `None` for empty input so the caller can draw a default.
    /// Anything non-empty and unrecognised clamps to `Other`.
    pub fn from_loose(input: &str) -> Option<Gender> {
        let lowered = input.trim().to_lowercase();
        if lowered.is_empty() {
            return None;
        }
        let gender = match lowered.as_str() {
            "m" | "male" | "man" | "gentleman" | "he" => Gender::Male,
            "f" | "female" | "woman" | "lady" | "she" => Gender::Female,
            _ => Gender::Other,
        };
        Some(gender)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }

    pub fn pronouns(&self) -> Pronouns {
        match self {
            Self::Male => Pronouns::HeHim,
            Self::Female => Pronouns::SheHer,
            Self::Other => Pronouns::TheyThem,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pronoun set for a character, used by template expansion to resolve
/// `{protagonist.subject}` and the other pronoun fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pronouns {
    /// she/her/her/herself
    SheHer,
    /// he/him/his/himself
    HeHim,
    /// they/them/their/themselves
    TheyThem,
}

impl Pronouns {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::SheHer => "she",
            Self::HeHim => "he",
            Self::TheyThem => "they",
        }
    }

    pub fn object(&self) -> &'static str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "him",
            Self::TheyThem => "them",
        }
    }

    pub fn possessive(&self) -> &'static str {
        match self {
            Self::SheHer => "her",
            Self::HeHim => "his",
            Self::TheyThem => "their",
        }
    }

    pub fn reflexive(&self) -> &'static str {
        match self {
            Self::SheHer => "herself",
            Self::HeHim => "himself",
            Self::TheyThem => "themselves",
        }
    }
}

/// The part a character plays in the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Protagonist,
    RomanticInterest,
    Confidant,
    Rival,
    Mentor,
    ComicRelief,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Protagonist,
        Role::RomanticInterest,
        Role::Confidant,
        Role::Rival,
        Role::Mentor,
        Role::ComicRelief,
    ];

    /// Human-readable label, as shown in menus and cast lists.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Protagonist => "Protagonist",
            Self::RomanticInterest => "Romantic Interest",
            Self::Confidant => "Confidant",
            Self::Rival => "Rival",
            Self::Mentor => "Mentor",
            Self::ComicRelief => "Comic Relief",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Protagonist => "The central character of your story",
            Self::RomanticInterest => "A potential or established love interest",
            Self::Confidant => "A trusted friend or family member",
            Self::Rival => "Someone who opposes or creates conflict",
            Self::Mentor => "An older, wiser guide",
            Self::ComicRelief => "A humorous or eccentric character",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A member of the cast.
///
/// Built by the character builder and owned by the story it is attached to.
/// Virtues and flaws are ordered sets so that the "first" virtue is stable
/// across runs and serialization is reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub gender: Gender,
    pub virtues: BTreeSet<String>,
    pub flaws: BTreeSet<String>,
    pub goal: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub social_class: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backstory: Option<String>,
}

impl Character {
    /// The first word of the name, or the whole name if it has one word.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    pub fn primary_virtue(&self) -> Option<&str> {
        self.virtues.iter().next().map(String::as_str)
    }

    pub fn primary_flaw(&self) -> Option<&str> {
        self.flaws.iter().next().map(String::as_str)
    }

    pub fn pronouns(&self) -> Pronouns {
        self.gender.pronouns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_character() -> Character {
        Character {
            name: "Elinor Dashwood".to_string(),
            gender: Gender::Female,
            virtues: ["prudence".to_string(), "honesty".to_string()]
                .into_iter()
                .collect(),
            flaws: BTreeSet::new(),
            goal: "securing a home for her family".to_string(),
            role: Role::Protagonist,
            social_class: "refined lady".to_string(),
            occupation: "household manager".to_string(),
            personality: "composed".to_string(),
            backstory: None,
        }
    }

    #[test]
    fn gender_loose_parsing() {
        assert_eq!(Gender::from_loose("M"), Some(Gender::Male));
        assert_eq!(Gender::from_loose(" female "), Some(Gender::Female));
        assert_eq!(Gender::from_loose("lady"), Some(Gender::Female));
        assert_eq!(Gender::from_loose("nonbinary"), Some(Gender::Other));
        assert_eq!(Gender::from_loose(""), None);
        assert_eq!(Gender::from_loose("   "), None);
    }

    #[test]
    fn pronouns_follow_gender() {
        assert_eq!(Gender::Female.pronouns().subject(), "she");
        assert_eq!(Gender::Male.pronouns().possessive(), "his");
        assert_eq!(Gender::Other.pronouns().reflexive(), "themselves");
        assert_eq!(Gender::Male.pronouns().object(), "him");
    }

    #[test]
    fn first_name_and_primary_traits() {
        let c = make_character();
        assert_eq!(c.first_name(), "Elinor");
        // BTreeSet ordering: "honesty" < "prudence"
        assert_eq!(c.primary_virtue(), Some("honesty"));
        assert_eq!(c.primary_flaw(), None);
    }

    #[test]
    fn supplemental_fields_default_when_absent() {
        let json = r#"{
            "name": "Anne Elliot",
            "gender": "female",
            "virtues": ["constancy"],
            "flaws": ["diffidence"],
            "goal": "a second chance"
        }"#;
        let c: Character = serde_json::from_str(json).unwrap();
        assert_eq!(c.role, Role::Protagonist);
        assert!(c.occupation.is_empty());
        assert!(c.backstory.is_none());
    }

    #[test]
    fn gender_serializes_lowercase() {
        let s = serde_json::to_string(&Gender::Other).unwrap();
        assert_eq!(s, "\"other\"");
        let r = serde_json::to_string(&Role::RomanticInterest).unwrap();
        assert_eq!(r, "\"romantic_interest\"");
    }
}
