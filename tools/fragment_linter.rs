/// Fragment Linter — validates story fragment coverage and quality.
///
/// Usage: fragment_linter [<fragments_file_or_dir>]
///
/// With no path the built-in Austen fragments are checked. A directory is
/// merged over the built-in set the same way the storyteller loads it.

use austen_storyteller::core::composer::skeleton_rules;
use austen_storyteller::core::content::{ContentTables, TABLES_FILE};
use austen_storyteller::core::grammar::FragmentSet;
use austen_storyteller::core::letter::LetterKind;
use std::path::Path;
use std::process;

/// Rules with fewer alternatives than this read the same story after story.
const MIN_ALTERNATIVES: usize = 2;

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!("Usage: fragment_linter [<fragments_file_or_dir>]");
        process::exit(0);
    }

    let content = match args.get(1).map(Path::new) {
        None => ContentTables::austen(),
        Some(path) if path.is_dir() => ContentTables::load_dir(path),
        Some(path) if path.is_file() => match FragmentSet::load_from_ron(path) {
            Ok(fragments) => ContentTables::austen().map(|mut content| {
                content.fragments = fragments;
                content
            }),
            Err(e) => {
                eprintln!("ERROR: Failed to load fragment file: {}", e);
                process::exit(1);
            }
        },
        Some(path) => {
            eprintln!("ERROR: Path '{}' does not exist", path.display());
            process::exit(1);
        }
    };

    let content = match content {
        Ok(content) => content,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} fragment rules", content.fragments.rules.len());
    if let Some(dir) = args.get(1).map(Path::new).filter(|p| p.is_dir()) {
        if dir.join(TABLES_FILE).is_file() {
            println!("Loaded tables from {}", dir.join(TABLES_FILE).display());
        }
    }

    let (errors, warnings) = lint_content(&content);

    println!("\n=== Fragment Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}

fn lint_content(content: &ContentTables) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let fragments = &content.fragments;

    for rule in skeleton_rules() {
        if !fragments.contains(rule) {
            errors.push(format!("Story beat '{}' has no fragment rule", rule));
        }
    }

    for kind in LetterKind::ALL {
        let rule = kind.rule();
        if !fragments.contains(&rule) {
            warnings.push(format!(
                "Letter kind '{}' has no fragment rule '{}'",
                kind.as_str(),
                rule
            ));
        }
    }

    let mut names: Vec<&String> = fragments.rules.keys().collect();
    names.sort();

    for name in names {
        let rule = &fragments.rules[name];

        if rule.alternatives.len() < MIN_ALTERNATIVES {
            warnings.push(format!(
                "Rule '{}' has only {} alternatives (minimum {} recommended)",
                name,
                rule.alternatives.len(),
                MIN_ALTERNATIVES
            ));
        }

        if rule.alternatives.iter().all(|alt| !alt.requires.is_empty()) {
            warnings.push(format!(
                "Rule '{}' has no unconditional alternative and may be skipped",
                name
            ));
        }

        for alt in &rule.alternatives {
            if alt.weight == 0 {
                warnings.push(format!("Rule '{}' has an alternative with weight 0", name));
            }
            for reference in alt.template.rule_refs() {
                if !fragments.contains(reference) {
                    errors.push(format!(
                        "Rule '{}' references non-existent rule '{}'",
                        name, reference
                    ));
                }
            }
        }

        let all_self_ref = rule
            .alternatives
            .iter()
            .all(|alt| alt.template.rule_refs().any(|r| r == name.as_str()));
        if !rule.alternatives.is_empty() && all_self_ref {
            errors.push(format!(
                "Rule '{}' has no non-recursive alternative (infinite recursion)",
                name
            ));
        }
    }

    for theme in &content.themes {
        let tag = format!("theme:{}", theme.key);
        let covered = fragments
            .rules
            .values()
            .flat_map(|rule| &rule.alternatives)
            .any(|alt| alt.requires.contains(&tag));
        if !covered {
            warnings.push(format!(
                "Theme '{}' has no fragment requiring '{}'",
                theme.title, tag
            ));
        }
    }

    (errors, warnings)
}
