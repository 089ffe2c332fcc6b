/// Composer integration tests — end-to-end story composition.

use austen_storyteller::core::builder::{CharacterInput, TraitChoice};
use austen_storyteller::core::composer::{
    ComposeRequest, Composer, FALLBACK_SECTION_TITLE, QUOTE_SECTION_TITLE,
};
use austen_storyteller::core::content::ContentTables;
use austen_storyteller::core::grammar::FragmentSet;
use austen_storyteller::schema::character::{Gender, Role};
use austen_storyteller::schema::setting::{Season, Setting};
use austen_storyteller::schema::story::{Complexity, Story, Style};
use proptest::prelude::*;

fn composer() -> Composer {
    Composer::builder().seed(42).build().unwrap()
}

fn request(composer: &Composer, theme: &str, style: Style, complexity: Complexity, cast: usize) -> ComposeRequest {
    ComposeRequest {
        theme: theme.to_string(),
        theme_description: None,
        style,
        complexity,
        setting: Setting {
            location: "Pemberley".to_string(),
            season: Season::Spring,
            time_period: "the height of the Regency period".to_string(),
        },
        characters: composer.character_builder(7).random_cast(cast),
        include_quote: true,
    }
}

fn paragraphs(story: &Story) -> Vec<(String, String)> {
    story
        .sections
        .iter()
        .flat_map(|s| {
            s.text
                .split("\n\n")
                .map(move |p| (s.title.clone(), p.to_string()))
        })
        .collect()
}

fn is_subsequence<T: PartialEq>(short: &[T], long: &[T]) -> bool {
    let mut it = long.iter();
    short.iter().all(|item| it.any(|candidate| candidate == item))
}

#[test]
fn elizabeth_and_darcy_at_pemberley() {
    let composer = composer();
    let mut builder = composer.character_builder(1);
    let elizabeth = builder.build_character(CharacterInput {
        name: Some("Elizabeth Bennet".to_string()),
        gender: Some("female".to_string()),
        virtues: vec![TraitChoice::Index(0), TraitChoice::Custom("wit".to_string())],
        flaws: vec![TraitChoice::Custom("prejudice".to_string())],
        goal: Some("marrying for love".to_string()),
        role: Some(Role::Protagonist),
        backstory: None,
    });
    let darcy = builder.build_character(CharacterInput {
        name: Some("Fitzwilliam Darcy".to_string()),
        gender: Some("m".to_string()),
        role: Some(Role::RomanticInterest),
        ..CharacterInput::default()
    });
    assert_eq!(elizabeth.gender, Gender::Female);
    assert_eq!(darcy.gender, Gender::Male);
    assert!(elizabeth.flaws.contains("prejudice"));

    let req = ComposeRequest {
        theme: "Romantic Courtship".to_string(),
        theme_description: None,
        style: Style::Romantic,
        complexity: Complexity::RICH,
        setting: Setting {
            location: "Pemberley".to_string(),
            season: Season::Summer,
            time_period: "the year 1812".to_string(),
        },
        characters: vec![elizabeth, darcy],
        include_quote: true,
    };
    let story = composer.compose(&req, 42);

    assert_eq!(story.title(), "Romantic Courtship");
    assert_eq!(story.characters.len(), 2);
    assert_eq!(story.sections.first().unwrap().title, "Opening");
    assert_eq!(story.sections.last().unwrap().title, QUOTE_SECTION_TITLE);
    let introduction = story
        .sections
        .iter()
        .find(|s| s.title == "Introduction")
        .unwrap();
    assert!(introduction.text.contains("Elizabeth"));
    assert!(introduction.text.contains("Darcy"));
    assert!(story.word_count() > 100);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn no_template_tokens_survive(
        theme_index in 0usize..9,
        style_index in 0usize..5,
        level in 1u8..=3,
        cast in 0usize..=4,
        seed in any::<u64>(),
    ) {
        let composer = composer();
        let content = composer.content();
        let theme = content
            .themes
            .get(theme_index)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| "Amateur Theatricals".to_string());
        let req = request(
            &composer,
            &theme,
            Style::ALL[style_index],
            Complexity::new(level).unwrap(),
            cast,
        );
        let story = composer.compose(&req, seed);
        prop_assert!(!story.sections.is_empty());
        for section in &story.sections {
            prop_assert!(!section.text.trim().is_empty());
            prop_assert!(
                !section.text.contains('{') && !section.text.contains('}'),
                "unsubstituted token in {}: {}",
                section.title,
                section.text
            );
        }
    }

    #[test]
    fn complexity_only_adds_content(
        style_index in 0usize..5,
        cast in 1usize..=4,
        seed in any::<u64>(),
    ) {
        let composer = composer();
        let style = Style::ALL[style_index];
        let stories: Vec<Story> = [Complexity::SIMPLE, Complexity::MODERATE, Complexity::RICH]
            .into_iter()
            .map(|level| composer.compose(&request(&composer, "Social Intrigue", style, level, cast), seed))
            .collect();

        for pair in stories.windows(2) {
            prop_assert!(pair[0].word_count() <= pair[1].word_count());
            prop_assert!(is_subsequence(&paragraphs(&pair[0]), &paragraphs(&pair[1])));
        }
    }
}

#[test]
fn same_seed_same_story() {
    let composer = composer();
    let req = request(&composer, "Family Honor and Reputation", Style::Dramatic, Complexity::RICH, 3);
    let first = composer.compose(&req, 42);
    let second = composer.compose(&req, 42);
    assert_eq!(first.sections, second.sections);
    assert_eq!(first.characters, second.characters);

    let other = composer.compose(&req, 43);
    assert_ne!(first.sections, other.sections);
}

#[test]
fn seeded_builders_agree() {
    let a = Composer::builder().seed(42).build().unwrap();
    let b = Composer::builder().seed(42).build().unwrap();
    let req_a = request(&a, "Inheritance and Fortune", Style::Comedic, Complexity::MODERATE, 2);
    let req_b = request(&b, "Inheritance and Fortune", Style::Comedic, Complexity::MODERATE, 2);
    assert_eq!(
        a.compose_default(&req_a).sections,
        b.compose_default(&req_b).sections
    );
}

#[test]
fn braces_in_user_text_are_kept_literally() {
    let composer = composer();
    let theme = "The {protagonist.name} Affair";
    let mut req = request(&composer, theme, Style::Classic, Complexity::RICH, 2);
    req.setting.location = "Castle {unknown}".to_string();
    let story = composer.compose(&req, 9);

    assert_eq!(story.theme, theme);
    let text: String = story
        .sections
        .iter()
        .map(|s| s.text.replace(theme, "").replace("Castle {unknown}", ""))
        .collect();
    assert!(!text.contains('{') && !text.contains('}'), "{}", text);
    assert!(story.sections.iter().any(|s| s.text.contains("Castle {unknown}")));
}

#[test]
fn story_without_fragments_still_has_a_section() {
    let mut content = ContentTables::austen().unwrap();
    content.fragments = FragmentSet::default();
    content.quotes.clear();
    let composer = Composer::builder().with_content(content).build().unwrap();

    let mut req = request(&composer, "{odd} theme", Style::Mystery, Complexity::RICH, 2);
    req.include_quote = true;
    let story = composer.compose(&req, 3);
    assert_eq!(story.sections.len(), 1);
    assert_eq!(story.sections[0].title, FALLBACK_SECTION_TITLE);
    assert!(story.sections[0].text.contains("{odd} theme"));
    assert!(story.sections[0].text.contains(&story.characters[1].name));
}

#[test]
fn blank_inputs_use_neutral_terms() {
    let composer = composer();
    let mut req = request(&composer, "   ", Style::Comedic, Complexity::MODERATE, 1);
    req.setting.location = String::new();
    req.setting.time_period = " ".to_string();
    let story = composer.compose(&req, 11);
    let neutral = &composer.content().neutral;
    let all: String = story.sections.iter().map(|s| s.text.as_str()).collect();
    assert!(!all.contains('{'));
    assert!(
        all.contains(&neutral.location) || all.contains(&neutral.theme),
        "{}",
        all
    );
}

#[test]
fn every_style_composes_its_skeleton() {
    let composer = composer();
    for style in Style::ALL {
        let mut req = request(&composer, "Lost Love Rekindled", style, Complexity::SIMPLE, 2);
        req.include_quote = false;
        let story = composer.compose(&req, 5);
        let titles: Vec<&str> = story.sections.iter().map(|s| s.title.as_str()).collect();
        let expected: Vec<&str> = austen_storyteller::core::composer::skeleton(style)
            .iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, expected, "style {}", style);
    }
}
