/// Regency letters: six kinds of correspondence, formal or informal, written
/// from the `letter_*` fragment rules and laid out with address, date,
/// salutation and valediction.
use chrono::{Datelike, Local, NaiveDate};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::content::ContentTables;
use crate::core::grammar::SelectionContext;
use crate::core::text::{normalize_phrase, wrap_text};
use crate::core::timeline::format_regency_date;

/// Letters are dated this many years before the day they are written.
pub const REGENCY_YEAR_OFFSET: i32 = 206;
pub const LETTER_WRAP_WIDTH: usize = 70;
pub const DEFAULT_SENDER: &str = "Jane Austen";
pub const DEFAULT_RECIPIENT: &str = "Cassandra Austen";
pub const DEFAULT_ADDRESS: &str = "Pemberley, Derbyshire";

const OPENING_RULE: &str = "letter_opening_line";
const FAREWELL_RULE: &str = "letter_farewell";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LetterKind {
    Invitation,
    Congratulations,
    Gratitude,
    Apology,
    News,
    Romantic,
}

impl LetterKind {
    pub const ALL: [LetterKind; 6] = [
        LetterKind::Invitation,
        LetterKind::Congratulations,
        LetterKind::Gratitude,
        LetterKind::Apology,
        LetterKind::News,
        LetterKind::Romantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invitation => "invitation",
            Self::Congratulations => "congratulations",
            Self::Gratitude => "gratitude",
            Self::Apology => "apology",
            Self::News => "news",
            Self::Romantic => "romantic",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Invitation => "Invitation to a social event",
            Self::Congratulations => "Congratulations on a happy occasion",
            Self::Gratitude => "Expression of thanks",
            Self::Apology => "Formal apology",
            Self::News => "Sharing news or gossip",
            Self::Romantic => "Romantic correspondence",
        }
    }

    /// The fragment rule holding this kind's main paragraph.
    pub fn rule(&self) -> String {
        format!("letter_{}", self.as_str())
    }

    pub fn tag(&self) -> String {
        format!("letter:{}", self.as_str())
    }

    pub fn default_subject(&self) -> &'static str {
        match self {
            Self::Invitation => "a small dinner party",
            Self::Congratulations => "your recent engagement",
            Self::Gratitude => "the lovely book you sent",
            Self::Apology => "my regrettable lateness to your gathering",
            Self::News => "the arrival of new neighbours",
            Self::Romantic => "kind heart and lively intelligence",
        }
    }

    /// Only invitations and news carry further particulars.
    pub fn default_details(&self) -> Option<&'static str> {
        match self {
            Self::Invitation => Some("at my humble abode on Tuesday next, at six o'clock"),
            Self::News => Some("They appear to be a family of good fortune and excellent breeding"),
            _ => None,
        }
    }

    pub fn subject_prompt(&self) -> &'static str {
        match self {
            Self::Invitation => "What is the occasion?",
            Self::Congratulations => "What are you congratulating them on?",
            Self::Gratitude => "What are you thankful for?",
            Self::Apology => "What are you apologising for?",
            Self::News => "What is the news?",
            Self::Romantic => "Which of their qualities do you admire?",
        }
    }

    pub fn details_prompt(&self) -> Option<&'static str> {
        match self {
            Self::Invitation => Some("Where and when?"),
            Self::News => Some("Any further particulars?"),
            _ => None,
        }
    }
}

impl fmt::Display for LetterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formality {
    #[default]
    Formal,
    Informal,
}

impl Formality {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Formal => "tone:formal",
            Self::Informal => "tone:informal",
        }
    }

    pub fn salutation(&self, recipient: &str) -> String {
        match self {
            Self::Formal => format!("Dear {},", recipient),
            Self::Informal => format!("My dearest {},", recipient),
        }
    }

    pub fn valediction(&self) -> &'static str {
        match self {
            Self::Formal => "I remain, your faithful servant,",
            Self::Informal => "Ever yours, most affectionately,",
        }
    }
}

/// What to write. Blank fields take the kind's defaults.
#[derive(Debug, Clone)]
pub struct LetterRequest {
    pub kind: LetterKind,
    pub formality: Formality,
    pub sender: String,
    pub recipient: String,
    pub address: String,
    pub subject: String,
    pub details: String,
    /// A body written by hand replaces the composed paragraphs.
    pub body: Option<String>,
    /// Date at the head of the letter; today's Regency date when `None`.
    pub date: Option<NaiveDate>,
}

impl LetterRequest {
    pub fn new(kind: LetterKind) -> Self {
        Self {
            kind,
            formality: Formality::default(),
            sender: String::new(),
            recipient: String::new(),
            address: String::new(),
            subject: String::new(),
            details: String::new(),
            body: None,
            date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub kind: LetterKind,
    pub formality: Formality,
    pub sender: String,
    pub recipient: String,
    pub address: String,
    pub date: NaiveDate,
    pub paragraphs: Vec<String>,
}

impl Letter {
    pub fn body(&self) -> String {
        self.paragraphs.join("\n\n")
    }

    pub fn render(&self) -> String {
        format_as_letter(self, LETTER_WRAP_WIDTH)
    }
}

/// Today's date, moved back into the Regency.
pub fn regency_today() -> NaiveDate {
    regency_date(Local::now().date_naive())
}

/// The same day of the year, `REGENCY_YEAR_OFFSET` years earlier. A 29th of
/// February with no counterpart becomes the 28th.
pub fn regency_date(today: NaiveDate) -> NaiveDate {
    let year = today.year() - REGENCY_YEAR_OFFSET;
    today
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, today.month(), 28))
        .unwrap_or(today)
}

/// Write a letter. Never fails: a paragraph whose rule is missing or
/// has nothing eligible is left out, and a letter with no body at all
/// gets a single plain line about its subject.
pub fn compose_letter(content: &ContentTables, request: &LetterRequest, seed: u64) -> Letter {
    let kind = request.kind;
    let or_default = |value: &str, default: &str| {
        let value = normalize_phrase(value);
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    };
    let sender = or_default(&request.sender, DEFAULT_SENDER);
    let recipient = or_default(&request.recipient, DEFAULT_RECIPIENT);
    let address = or_default(&request.address, DEFAULT_ADDRESS);
    let subject = or_default(&request.subject, kind.default_subject());
    let details = or_default(&request.details, kind.default_details().unwrap_or_default());

    let handwritten: Vec<String> = request
        .body
        .as_deref()
        .unwrap_or_default()
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let paragraphs = if handwritten.is_empty() {
        let mut ctx = SelectionContext::new(&content.neutral);
        ctx.values.subject = subject.clone();
        ctx.values.details = details;
        ctx.values.sender = sender.clone();
        ctx.values.recipient = recipient.clone();
        ctx.values.location = address.clone();
        ctx.tags.insert(request.formality.tag().to_string());
        ctx.tags.insert(kind.tag());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut paragraphs: Vec<String> = [OPENING_RULE.to_string(), kind.rule(), FAREWELL_RULE.to_string()]
            .iter()
            .filter_map(|rule| match content.fragments.expand(rule, &ctx, &mut rng) {
                Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
                Err(e) => {
                    debug!("skipping letter paragraph '{}': {}", rule, e);
                    None
                }
            })
            .collect();
        if paragraphs.is_empty() {
            paragraphs.push(format!("I write to you concerning {}.", subject));
        }
        paragraphs
    } else {
        handwritten
    };

    Letter {
        kind,
        formality: request.formality,
        sender,
        recipient,
        address,
        date: request.date.unwrap_or_else(regency_today),
        paragraphs,
    }
}

/// Lay a letter out as plain text: address and date, salutation, the body
/// wrapped to `width`, then the valediction and signature.
pub fn format_as_letter(letter: &Letter, width: usize) -> String {
    let mut out = String::new();
    out.push_str(&letter.address);
    out.push('\n');
    out.push_str(&format_regency_date(letter.date));
    out.push_str("\n\n");
    out.push_str(&letter.formality.salutation(&letter.recipient));
    out.push_str("\n\n");
    out.push_str(&wrap_text(&letter.body(), width));
    out.push_str("\n\n");
    out.push_str(letter.formality.valediction());
    out.push('\n');
    out.push_str(&letter.sender);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grammar::FragmentSet;

    fn dated(kind: LetterKind, formality: Formality) -> LetterRequest {
        LetterRequest {
            formality,
            date: NaiveDate::from_ymd_opt(1813, 1, 28),
            ..LetterRequest::new(kind)
        }
    }

    #[test]
    fn every_kind_has_both_tones() {
        let content = ContentTables::austen().unwrap();
        for kind in LetterKind::ALL {
            for formality in [Formality::Formal, Formality::Informal] {
                let letter = compose_letter(&content, &dated(kind, formality), 3);
                assert_eq!(letter.paragraphs.len(), 3, "{:?} {:?}", kind, formality);
                let body = letter.body();
                assert!(!body.contains('{') && !body.contains('}'), "{}", body);
                assert!(
                    body.to_lowercase().contains(&kind.default_subject().to_lowercase()),
                    "{:?}: {}",
                    kind,
                    body
                );
            }
        }
    }

    #[test]
    fn tone_selects_its_own_fragments() {
        let content = ContentTables::austen().unwrap();
        for seed in 0..20 {
            let formal = compose_letter(&content, &dated(LetterKind::Gratitude, Formality::Formal), seed);
            assert!(
                formal.paragraphs[1].starts_with("I write to express")
                    || formal.paragraphs[1].starts_with("Please accept"),
                "{}",
                formal.paragraphs[1]
            );
            let informal = compose_letter(&content, &dated(LetterKind::Gratitude, Formality::Informal), seed);
            assert!(
                informal.paragraphs[1].starts_with("How very kind")
                    || informal.paragraphs[1].starts_with("Thank you"),
                "{}",
                informal.paragraphs[1]
            );
        }
    }

    #[test]
    fn user_fields_reach_the_page() {
        let content = ContentTables::austen().unwrap();
        let request = LetterRequest {
            sender: "Elizabeth Bennet".to_string(),
            recipient: "Jane".to_string(),
            address: "Longbourn, Hertfordshire".to_string(),
            subject: "a ball at Netherfield".to_string(),
            details: "on Friday week.".to_string(),
            ..dated(LetterKind::Invitation, Formality::Formal)
        };
        let letter = compose_letter(&content, &request, 9);
        assert!(letter.paragraphs[1].contains("a ball at Netherfield"));
        assert!(letter.paragraphs[1].contains("on Friday week"));

        let text = letter.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Longbourn, Hertfordshire");
        assert_eq!(lines[1], "the 28th of January, 1813");
        assert_eq!(lines[3], "Dear Jane,");
        assert_eq!(lines[lines.len() - 2], "I remain, your faithful servant,");
        assert_eq!(lines[lines.len() - 1], "Elizabeth Bennet");
        assert!(lines.iter().all(|l| l.chars().count() <= LETTER_WRAP_WIDTH));
    }

    #[test]
    fn blank_fields_take_defaults() {
        let content = ContentTables::austen().unwrap();
        let letter = compose_letter(&content, &dated(LetterKind::News, Formality::Informal), 1);
        assert_eq!(letter.sender, DEFAULT_SENDER);
        assert_eq!(letter.recipient, DEFAULT_RECIPIENT);
        assert_eq!(letter.address, DEFAULT_ADDRESS);
        assert!(letter.paragraphs[1].contains("good fortune and excellent breeding"));
        assert!(letter.render().contains("My dearest Cassandra Austen,"));
    }

    #[test]
    fn handwritten_body_replaces_fragments() {
        let content = ContentTables::austen().unwrap();
        let request = LetterRequest {
            body: Some("First thought.\n\n\n\n  Second thought.  ".to_string()),
            ..dated(LetterKind::Apology, Formality::Formal)
        };
        let letter = compose_letter(&content, &request, 1);
        assert_eq!(letter.paragraphs, vec!["First thought.", "Second thought."]);
    }

    #[test]
    fn missing_fragments_still_write_a_line() {
        let mut content = ContentTables::austen().unwrap();
        content.fragments = FragmentSet::default();
        let letter = compose_letter(&content, &dated(LetterKind::Romantic, Formality::Formal), 1);
        assert_eq!(
            letter.paragraphs,
            vec!["I write to you concerning kind heart and lively intelligence."]
        );
    }

    #[test]
    fn same_seed_same_letter() {
        let content = ContentTables::austen().unwrap();
        let request = dated(LetterKind::Congratulations, Formality::Informal);
        assert_eq!(
            compose_letter(&content, &request, 77),
            compose_letter(&content, &request, 77)
        );
    }

    #[test]
    fn regency_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(regency_date(today), NaiveDate::from_ymd_opt(1820, 10, 16).unwrap());
        let leap = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(regency_date(leap), NaiveDate::from_ymd_opt(1818, 2, 28).unwrap());
        assert_eq!(regency_today().year(), Local::now().year() - REGENCY_YEAR_OFFSET);
    }
}
