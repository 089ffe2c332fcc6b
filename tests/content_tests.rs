/// Content loading integration tests — embedded tables, fragment files and
/// directory overrides.

use austen_storyteller::core::composer::{skeleton_rules, ComposeRequest, Composer};
use austen_storyteller::core::content::{ContentTables, TABLES_FILE};
use austen_storyteller::core::grammar::{FragmentSet, SelectionContext};
use austen_storyteller::core::letter::{compose_letter, LetterKind, LetterRequest};
use austen_storyteller::schema::setting::{Season, Setting};
use austen_storyteller::schema::story::{Complexity, Style};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;

#[test]
fn embedded_content_covers_every_story_beat() {
    let content = ContentTables::austen().unwrap();
    for rule in skeleton_rules() {
        assert!(content.fragments.contains(rule), "Missing rule: {}", rule);
    }
    for rule in content.fragments.rules.values() {
        for alt in &rule.alternatives {
            for reference in alt.template.rule_refs() {
                assert!(
                    content.fragments.contains(reference),
                    "Rule '{}' references missing rule '{}'",
                    rule.name,
                    reference
                );
            }
        }
    }
}

#[test]
fn embedded_tables_are_populated() {
    let content = ContentTables::austen().unwrap();
    assert_eq!(content.themes.len(), 8);
    assert_eq!(content.virtues.len(), 15);
    assert_eq!(content.flaws.len(), 15);
    assert_eq!(content.goals.len(), 10);
    assert_eq!(content.locations.len(), 7);
    assert_eq!(content.time_periods.len(), 5);
    assert_eq!(content.quotes.len(), 15);
    assert!(!content.first_names.female.is_empty());
    assert!(!content.first_names.male.is_empty());
    assert!(!content.surnames.is_empty());
    assert!(!content.backstories.is_empty());
}

#[test]
fn fixture_fragments_load_and_expand() {
    let path = Path::new("tests/fixtures/test_fragments.ron");
    let fragments = FragmentSet::load_from_ron(path).unwrap();
    assert_eq!(fragments.rules.len(), 3);
    assert!(fragments.contains("greeting"));
    assert!(fragments.contains("courtship_detail"));

    let content = ContentTables::austen().unwrap();
    let mut ctx = SelectionContext::new(&content.neutral);
    ctx.values.season = "winter".to_string();
    ctx.values.location = "Hartfield".to_string();
    ctx.tags.insert("cast:solo".to_string());

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..30 {
        let text = fragments.expand("closing", &ctx, &mut rng).unwrap();
        assert!(!text.contains('{') && !text.contains('}'), "{}", text);
        // The second cast member is excluded for a solo cast.
        assert!(!text.contains("asked for the next dance"), "{}", text);
    }
}

#[test]
fn directory_fragments_override_built_in_rules() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("20_openings.ron"),
        r#"{ "opening": Rule(alternatives: [(text: "Later file wins in {location}.")]) }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("10_openings.ron"),
        r#"{ "opening": Rule(alternatives: [(text: "Earlier file loses.")]) }"#,
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not content").unwrap();

    let content = ContentTables::load_dir(dir.path()).unwrap();
    assert_eq!(content.fragments.rules["opening"].alternatives.len(), 1);
    // Untouched rules and tables come from the built-in content.
    assert!(content.fragments.contains("resolution"));
    assert_eq!(content.themes.len(), 8);

    let composer = Composer::builder()
        .content_dir(dir.path())
        .seed(1)
        .build()
        .unwrap();
    let request = ComposeRequest {
        theme: "Inheritance and Fortune".to_string(),
        theme_description: None,
        style: Style::Classic,
        complexity: Complexity::SIMPLE,
        setting: Setting {
            location: "Norland Park".to_string(),
            season: Season::Spring,
            time_period: "the year 1811".to_string(),
        },
        characters: Vec::new(),
        include_quote: false,
    };
    let story = composer.compose_default(&request);
    assert_eq!(story.sections[0].title, "Opening");
    assert_eq!(story.sections[0].text, "Later file wins in Norland Park.");
}

#[test]
fn directory_tables_replace_built_in_tables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join(TABLES_FILE),
        r#"(
            themes: [(key: "naval_life", title: "Life at Sea", description: "Officers ashore.")],
            virtues: ["steadiness"],
            locations: ["Lyme"],
        )"#,
    )
    .unwrap();

    let content = ContentTables::load_dir(dir.path()).unwrap();
    assert_eq!(content.themes.len(), 1);
    assert_eq!(content.theme_tag("life at sea"), "theme:naval_life");
    assert_eq!(content.virtues, vec!["steadiness".to_string()]);
    assert!(content.flaws.is_empty());
    // Fragments are still the built-in set.
    assert!(content.fragments.contains("opening"));
}

#[test]
fn malformed_fragment_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.ron"),
        r#"{ "opening": Rule(alternatives: [(text: "Unclosed {location")]) }"#,
    )
    .unwrap();
    let err = ContentTables::load_dir(dir.path()).unwrap_err();
    assert!(err.to_string().contains("opening"), "{}", err);
}

#[test]
fn embedded_content_covers_every_letter_kind() {
    let content = ContentTables::austen().unwrap();
    assert_eq!(content.letter_addresses.len(), 10);
    for kind in LetterKind::ALL {
        let rule = &content.fragments.rules[&kind.rule()];
        let informal = rule
            .alternatives
            .iter()
            .filter(|alt| alt.requires.iter().any(|t| t == "tone:informal"))
            .count();
        assert!(informal >= 2, "{:?}", kind);
        assert!(rule.alternatives.len() - informal >= 2, "{:?}", kind);
    }
}

#[test]
fn directory_fragments_can_rewrite_letters() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("letters.ron"),
        r#"{ "letter_apology": Rule(alternatives: [(text: "Forgive {subject}, dear {recipient}.")]) }"#,
    )
    .unwrap();
    let content = ContentTables::load_dir(dir.path()).unwrap();
    let request = LetterRequest {
        recipient: "Harriet".to_string(),
        subject: "the portrait".to_string(),
        ..LetterRequest::new(LetterKind::Apology)
    };
    let letter = compose_letter(&content, &request, 2);
    assert_eq!(letter.paragraphs[1], "Forgive the portrait, dear Harriet.");
    assert!(content.fragments.contains("letter_romantic"));
}
