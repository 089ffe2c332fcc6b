/// Storyteller — interactive wizard for composing Austen-style stories.
///
/// Usage: storyteller [--config <path>] [--seed <n>]
///
/// From the main menu: compose a story (theme, style, setting, cast and
/// complexity, then editing, saving and storyboard export), write a Regency
/// letter, or browse Miss Austen's quotations by theme or by novel.
/// Set RUST_LOG=debug to see fragment selection and skipped beats.

use anyhow::{Context, Result};
use austen_storyteller::config::{StorytellerConfig, DEFAULT_CONFIG_FILE};
use austen_storyteller::core::builder::{CharacterInput, TraitChoice, MAX_CAST};
use austen_storyteller::core::composer::{ComposeRequest, Composer};
use austen_storyteller::core::content::ContentTables;
use austen_storyteller::core::content::Quote;
use austen_storyteller::core::editor;
use austen_storyteller::core::export::{export_for_viewer, ViewerLaunch};
use austen_storyteller::core::letter::{
    compose_letter, Formality, Letter, LetterKind, LetterRequest, DEFAULT_RECIPIENT,
    DEFAULT_SENDER,
};
use austen_storyteller::core::persist::{Format, Persistence};
use austen_storyteller::schema::character::{Character, Gender, Role};
use austen_storyteller::schema::setting::{Season, Setting};
use austen_storyteller::schema::story::{Complexity, Story, Style};
use chrono::Utc;
use inquire::validator::Validation;
use inquire::{Confirm, CustomType, InquireError, MultiSelect, Select, Text};
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

const BANNER: &str = r#"
=====================================================================
      THE AUSTEN STORYTELLER

      "It is a truth universally acknowledged, that a reader in
       possession of this program must be in want of a story."
=====================================================================
"#;

const OWN_CHOICE: &str = "Something of my own...";

const MENU: [&str; 4] = [
    "Compose a story",
    "Write a letter",
    "Browse quotations",
    "Take my leave",
];

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        if let Some(InquireError::OperationCanceled | InquireError::OperationInterrupted) =
            e.downcast_ref::<InquireError>()
        {
            println!("\nFarewell, until the next chapter.");
            return;
        }
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut seed_arg: Option<u64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = PathBuf::from(&args[i]);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed_arg = Some(
                    args[i]
                        .parse()
                        .with_context(|| format!("invalid seed '{}'", args[i]))?,
                );
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = StorytellerConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    config
        .ensure_directories()
        .context("failed to prepare output directories")?;

    let mut builder = Composer::builder();
    if let Some(ref dir) = config.content_dir {
        builder = builder.content_dir(dir);
    }
    let base_seed = seed_arg
        .or(config.seed)
        .unwrap_or_else(|| Utc::now().timestamp_nanos_opt().unwrap_or_default().unsigned_abs());
    let composer = builder
        .seed(base_seed)
        .build()
        .context("failed to load story content")?;
    log::info!("composing with seed {}", base_seed);

    println!("{}", BANNER);

    let mut round = 0u64;
    loop {
        let seed = base_seed.wrapping_add(round);
        match Select::new("What shall we do?", MENU.to_vec()).raw_prompt()?.index {
            0 => {
                let story = compose_interactively(&composer, seed)?;
                typewrite(&render_for_screen(&story), config.typing_delay_ms);

                let story = edit_loop(story)?;
                save_story(&config, &story)?;
                offer_export(&config, &story)?;
            }
            1 => {
                let letter = write_letter(composer.content(), seed)?;
                typewrite(&letter.render(), config.typing_delay_ms);
                save_letter(&config, &letter)?;
            }
            2 => browse_quotes(composer.content())?,
            _ => {
                println!(
                    "\nThank you for visiting. Your stories await you in {}.",
                    config.stories_dir.display()
                );
                return Ok(());
            }
        }
        round += 1;
    }
}

fn print_usage() {
    eprintln!("Usage: storyteller [--config <path>] [--seed <n>]");
    eprintln!();
    eprintln!("  --config <path>  RON configuration file (default: {})", DEFAULT_CONFIG_FILE);
    eprintln!("  --seed <n>       Seed for reproducible stories");
    eprintln!("  --help           Show this message");
}

fn compose_interactively(composer: &Composer, seed: u64) -> Result<Story> {
    let content = composer.content();

    let (theme, theme_description) = choose_theme(content)?;
    let style = choose_style()?;
    let setting = choose_setting(content)?;
    let characters = choose_characters(composer, seed)?;

    let complexity = CustomType::<u8>::new("Complexity (1 simple, 2 moderate, 3 rich):")
        .with_default(Complexity::default().level())
        .with_error_message("Please enter a number from 1 to 3")
        .with_validator(|level: &u8| {
            if Complexity::new(*level).is_ok() {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid("Complexity must be 1, 2 or 3".into()))
            }
        })
        .prompt()?;
    let complexity = Complexity::clamped(i64::from(complexity));

    let include_quote = Confirm::new("Close with a word from Miss Austen herself?")
        .with_default(true)
        .prompt()?;

    let request = ComposeRequest {
        theme,
        theme_description,
        style,
        complexity,
        setting,
        characters,
        include_quote,
    };
    println!("\nComposing your story...\n");
    Ok(composer.compose(&request, seed))
}

fn choose_theme(content: &ContentTables) -> Result<(String, Option<String>)> {
    let mut options: Vec<String> = content.themes.iter().map(|t| t.title.clone()).collect();
    options.push(OWN_CHOICE.to_string());

    let choice = Select::new("Choose a theme for your story:", options).raw_prompt()?;
    if let Some(theme) = content.themes.get(choice.index) {
        println!("  {}\n", theme.description);
        return Ok((theme.title.clone(), None));
    }

    let theme = Text::new("Name your theme:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Ok(Validation::Invalid("A theme needs at least a word or two".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()?;
    let description = Text::new("Describe it in a sentence (optional):").prompt()?;
    let description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
    if let Some(ref d) = description {
        println!("  A tale of {}: {}\n", theme.trim(), d);
    }
    Ok((theme, description))
}

fn choose_style() -> Result<Style> {
    let options: Vec<&str> = Style::ALL.iter().map(|s| s.description()).collect();
    let choice = Select::new("Choose a narrative style:", options).raw_prompt()?;
    Ok(Style::ALL[choice.index])
}

fn choose_from_or_own(prompt: &str, items: &[String]) -> Result<String> {
    let mut options = items.to_vec();
    options.push(OWN_CHOICE.to_string());
    let choice = Select::new(prompt, options).raw_prompt()?;
    match items.get(choice.index) {
        Some(item) => Ok(item.clone()),
        None => Ok(Text::new("Your choice:").prompt()?),
    }
}

fn choose_setting(content: &ContentTables) -> Result<Setting> {
    let location = choose_from_or_own("Where does the story take place?", &content.locations)?;
    let season = Select::new("In which season?", Season::ALL.to_vec()).prompt()?;
    let time_period = choose_from_or_own("When?", &content.time_periods)?;
    Ok(Setting {
        location,
        season,
        time_period,
    })
}

fn choose_characters(composer: &Composer, seed: u64) -> Result<Vec<Character>> {
    let mut builder = composer.character_builder(seed);
    let count = CustomType::<usize>::new("How many characters (1-4)?")
        .with_default(2)
        .with_error_message("Please enter a number")
        .with_validator(|n: &usize| {
            if (1..=MAX_CAST).contains(n) {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid(format!("Choose between 1 and {}", MAX_CAST).into()))
            }
        })
        .prompt()?;

    let detailed = Select::new(
        "How shall the cast be assembled?",
        vec!["Let fate decide (random cast)", "Create each character in detail"],
    )
    .raw_prompt()?
    .index
        == 1;

    let cast = if detailed {
        let mut cast = Vec::with_capacity(count);
        for n in 0..count {
            println!("\n--- Character {} of {} ---", n + 1, count);
            let input = character_input(composer.content(), n == 0)?;
            cast.push(builder.build_character(input));
        }
        cast
    } else {
        builder.random_cast(count)
    };

    println!("\nYour cast:");
    for c in &cast {
        print!("  {} ({}), {} {}", c.name, c.role, c.personality, c.social_class);
        if let Some(meaning) = composer.content().name_meaning(c.first_name()) {
            print!(" [{}: \"{}\"]", c.first_name(), meaning);
        }
        println!();
    }
    println!();
    Ok(cast)
}

fn character_input(content: &ContentTables, is_first: bool) -> Result<CharacterInput> {
    let role = if is_first {
        Role::Protagonist
    } else {
        let options: Vec<String> = Role::ALL
            .iter()
            .map(|r| format!("{}: {}", r.label(), r.description()))
            .collect();
        let choice = Select::new("Role:", options).raw_prompt()?;
        Role::ALL[choice.index]
    };

    let name = Text::new("Name (leave empty for a period-appropriate one):").prompt()?;
    let gender = Select::new(
        "Gender:",
        vec!["Female", "Male", "Other", "Let fate decide"],
    )
    .prompt()?;
    let gender = match gender {
        "Let fate decide" => None,
        chosen => Gender::from_loose(chosen).map(|g| g.as_str().to_string()),
    };

    let virtues = choose_traits("Virtues (space to select, enter to confirm):", &content.virtues)?;
    let flaws = choose_traits("Flaws:", &content.flaws)?;

    let mut goals = content.goals.clone();
    goals.push("Let fate decide".to_string());
    goals.push(OWN_CHOICE.to_string());
    let choice = Select::new("Personal goal:", goals).raw_prompt()?;
    let goal = if choice.index < content.goals.len() {
        Some(choice.value)
    } else if choice.value == OWN_CHOICE {
        Some(Text::new("Goal:").prompt()?)
    } else {
        None
    };

    let backstory = Text::new("Backstory (leave empty for a random one):").prompt()?;

    Ok(CharacterInput {
        name: Some(name),
        gender,
        virtues,
        flaws,
        goal,
        role: Some(role),
        backstory: Some(backstory),
    })
}

fn choose_traits(prompt: &str, table: &[String]) -> Result<Vec<TraitChoice>> {
    let picked = MultiSelect::new(prompt, table.to_vec()).raw_prompt()?;
    let mut choices: Vec<TraitChoice> = picked
        .into_iter()
        .map(|option| TraitChoice::Index(option.index))
        .collect();
    let custom = Text::new("Any others of your own (comma separated, optional):").prompt()?;
    choices.extend(
        custom
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| TraitChoice::Custom(s.to_string())),
    );
    Ok(choices)
}

fn render_for_screen(story: &Story) -> String {
    let mut out = String::new();
    let title = story.title().to_uppercase();
    out.push_str(&format!("{}\n{}\n\n", title, "=".repeat(title.chars().count())));
    for section in &story.sections {
        out.push_str(&format!("{}\n{}\n{}\n\n", section.title, "-".repeat(section.title.chars().count()), section.text));
    }
    out.push_str(&format!("({} words)\n", story.word_count()));
    out
}

fn typewrite(text: &str, delay_ms: u64) {
    if delay_ms == 0 {
        println!("{}", text);
        return;
    }
    let delay = Duration::from_millis(delay_ms);
    let mut stdout = io::stdout();
    for c in text.chars() {
        print!("{}", c);
        let _ = stdout.flush();
        if !c.is_whitespace() {
            thread::sleep(delay);
        }
    }
    println!();
}

fn edit_loop(mut story: Story) -> Result<Story> {
    while Confirm::new("Would you like to revise a section?")
        .with_default(false)
        .prompt()?
    {
        let titles: Vec<String> = story
            .sections
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {}", i + 1, s.title))
            .collect();
        let index = Select::new("Which section?", titles).raw_prompt()?.index;

        if let Some(section) = story.sections.get(index) {
            println!("\n{}\n", section.text);
        }

        let append = Select::new("Replace the text, or add to it?", vec!["Replace", "Add a paragraph"])
            .raw_prompt()?
            .index
            == 1;
        let text = Text::new("Your text:").prompt()?;

        let result = if append {
            editor::append(&story, index, &text)
        } else {
            editor::edit(&story, index, &text)
        };
        match result {
            Ok(edited) => {
                story = edited;
                println!("Section updated.\n");
            }
            Err(e) => println!("Could not edit: {}\n", e),
        }
    }
    Ok(story)
}

fn save_story(config: &StorytellerConfig, story: &Story) -> Result<()> {
    if !Confirm::new("Save this story?").with_default(true).prompt()? {
        return Ok(());
    }
    let format = Select::new("Format:", Format::ALL.to_vec()).prompt()?;
    let name = Text::new("File name (leave empty for a timestamped name):").prompt()?;
    let name = Some(name.trim()).filter(|n| !n.is_empty());

    let persistence = Persistence::new(&config.stories_dir).include_timeline(config.include_timeline);
    match persistence.save(story, format, name) {
        Ok(path) => println!("Story saved to {}\n", path.display()),
        Err(e) => println!("The story could not be saved: {}\n", e),
    }
    Ok(())
}

fn write_letter(content: &ContentTables, seed: u64) -> Result<Letter> {
    let kind = Select::new("What kind of letter?", LetterKind::ALL.to_vec()).prompt()?;
    let formality = match Select::new("In what tone?", vec!["Formal", "Informal"])
        .raw_prompt()?
        .index
    {
        1 => Formality::Informal,
        _ => Formality::Formal,
    };
    let sender = Text::new("From whom?").with_default(DEFAULT_SENDER).prompt()?;
    let recipient = Text::new("To whom?").with_default(DEFAULT_RECIPIENT).prompt()?;
    let address = choose_from_or_own("From which address?", &content.letter_addresses)?;
    let subject = Text::new(kind.subject_prompt())
        .with_default(kind.default_subject())
        .prompt()?;
    let details = match (kind.details_prompt(), kind.default_details()) {
        (Some(prompt), Some(default)) => Text::new(prompt).with_default(default).prompt()?,
        (Some(prompt), None) => Text::new(prompt).prompt()?,
        _ => String::new(),
    };

    let own_body = Select::new(
        "Who shall write it?",
        vec!["Let Miss Austen compose it", "I shall write it myself"],
    )
    .raw_prompt()?
    .index
        == 1;
    let body = if own_body {
        let mut paragraphs = Vec::new();
        loop {
            let paragraph = Text::new("Paragraph (leave empty to finish):").prompt()?;
            if paragraph.trim().is_empty() {
                break;
            }
            paragraphs.push(paragraph);
        }
        Some(paragraphs.join("\n\n"))
    } else {
        None
    };

    let request = LetterRequest {
        formality,
        sender,
        recipient,
        address,
        subject,
        details,
        body,
        ..LetterRequest::new(kind)
    };
    println!("\nDipping the quill...\n");
    Ok(compose_letter(content, &request, seed))
}

fn save_letter(config: &StorytellerConfig, letter: &Letter) -> Result<()> {
    if !Confirm::new("Save this letter?").with_default(true).prompt()? {
        return Ok(());
    }
    let name = Text::new("File name (leave empty for a timestamped name):").prompt()?;
    let name = Some(name.trim()).filter(|n| !n.is_empty());
    match Persistence::new(&config.stories_dir).save_letter(letter, name) {
        Ok(path) => println!("Letter saved to {}\n", path.display()),
        Err(e) => println!("The letter could not be saved: {}\n", e),
    }
    Ok(())
}

fn browse_quotes(content: &ContentTables) -> Result<()> {
    let by_theme = Select::new("Browse quotations", vec!["By theme", "By novel"])
        .raw_prompt()?
        .index
        == 0;
    let options = if by_theme {
        content.quote_themes()
    } else {
        content.quote_sources()
    };
    if options.is_empty() {
        println!("There are no quotations to browse.\n");
        return Ok(());
    }
    let chosen = Select::new("Which?", options).prompt()?;
    let quotes: Vec<&Quote> = if by_theme {
        content.quotes_with_theme(chosen)
    } else {
        content.quotes_from_source(chosen)
    };
    println!();
    for quote in quotes {
        println!("\u{201C}{}\u{201D}", quote.text);
        println!("    (Jane Austen, {})", quote.source);
        if !quote.context.trim().is_empty() {
            println!("    {}", quote.context.trim());
        }
        println!();
    }
    Ok(())
}

fn offer_export(config: &StorytellerConfig, story: &Story) -> Result<()> {
    if !Confirm::new("Open the story in the storyboard viewer?")
        .with_default(false)
        .prompt()?
    {
        return Ok(());
    }
    match export_for_viewer(story, &config.viewer()) {
        Ok(export) => {
            println!("Storyboard data written to {}", export.data_path.display());
            match export.viewer {
                ViewerLaunch::Launched => println!("The viewer is on its way.\n"),
                ViewerLaunch::NotFound => println!(
                    "No viewer named '{}' was found; the data file is ready for it.\n",
                    config.viewer_program
                ),
                ViewerLaunch::Failed(reason) => println!("The viewer could not be started: {}\n", reason),
            }
        }
        Err(e) => println!("Storyboard export failed: {}\n", e),
    }
    Ok(())
}
