/// Section-level editing. Edits return a new story and leave the input as it was.
use thiserror::Error;

use crate::schema::story::Story;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("section {index} does not exist (story has {len} sections)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Replace the text of one section.
pub fn edit(story: &Story, index: usize, new_text: &str) -> Result<Story, EditError> {
    check_index(story, index)?;
    let mut edited = story.clone();
    edited.sections[index].text = new_text.to_string();
    Ok(edited)
}

/// Append a paragraph to one section.
pub fn append(story: &Story, index: usize, extra: &str) -> Result<Story, EditError> {
    check_index(story, index)?;
    let mut edited = story.clone();
    let text = &mut edited.sections[index].text;
    let extra = extra.trim();
    if !extra.is_empty() {
        if !text.trim().is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(extra);
    }
    Ok(edited)
}

fn check_index(story: &Story, index: usize) -> Result<(), EditError> {
    let len = story.sections.len();
    if index < len {
        Ok(())
    } else {
        Err(EditError::IndexOutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::setting::{Season, Setting};
    use crate::schema::story::{Complexity, Section, Style};
    use chrono::Utc;

    fn make_story() -> Story {
        Story {
            theme: "Family Honor and Reputation".to_string(),
            style: Style::Classic,
            complexity: Complexity::SIMPLE,
            setting: Setting {
                location: "Longbourn".to_string(),
                season: Season::Spring,
                time_period: "the early Regency era".to_string(),
            },
            characters: Vec::new(),
            sections: vec![
                Section::new("Opening", "It began."),
                Section::new("Resolution", "It ended."),
            ],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn edit_replaces_one_section() {
        let story = make_story();
        let edited = edit(&story, 1, "It ended happily.").unwrap();
        assert_eq!(edited.sections[1].text, "It ended happily.");
        assert_eq!(edited.sections[0], story.sections[0]);
        assert_eq!(story.sections[1].text, "It ended.");
    }

    #[test]
    fn out_of_range_leaves_story_alone() {
        let story = make_story();
        let before = story.clone();
        assert_eq!(
            edit(&story, 2, "x"),
            Err(EditError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(story, before);
        assert!(append(&story, 9, "x").is_err());
    }

    #[test]
    fn append_adds_a_paragraph() {
        let story = make_story();
        let edited = append(&story, 0, "  And so on.  ").unwrap();
        assert_eq!(edited.sections[0].text, "It began.\n\nAnd so on.");
        let unchanged = append(&story, 0, "   ").unwrap();
        assert_eq!(unchanged, story);
    }
}
