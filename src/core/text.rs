/// Small text helpers shared by template expansion and the output formats.
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]["'”’]?(\s|$)"#).expect("valid regex"));

const QUOTE_CHARS: &[char] = &['"', '\'', '“', '”', '‘', '’', '`'];
const TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Words that start with a vowel letter but a consonant sound.
const CONSONANT_SOUND_PREFIXES: &[&str] = &["uni", "use", "usu", "eu", "one", "once", "ure"];
/// Words that start with a silent "h".
const VOWEL_SOUND_PREFIXES: &[&str] = &["hour", "honest", "honour", "honor", "heir"];

/// Choose "a" or "an" for the phrase that follows.
pub fn indefinite_article(phrase: &str) -> &'static str {
    let word = phrase.trim_start().to_lowercase();
    if VOWEL_SOUND_PREFIXES.iter().any(|p| word.starts_with(p)) {
        return "an";
    }
    if CONSONANT_SOUND_PREFIXES.iter().any(|p| word.starts_with(p)) {
        return "a";
    }
    match word.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    }
}

/// Prefix a phrase with its indefinite article: "an honest man", "a wit".
pub fn with_article(phrase: &str) -> String {
    format!("{} {}", indefinite_article(phrase), phrase)
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Normalise a user-entered noun phrase for splicing into prose.
///
/// Collapses runs of whitespace, strips surrounding quotes and trailing
/// sentence punctuation. The phrase is otherwise kept verbatim.
pub fn normalize_phrase(input: &str) -> String {
    let collapsed = WHITESPACE.replace_all(input.trim(), " ");
    let unquoted = collapsed.trim_matches(QUOTE_CHARS).trim();
    unquoted
        .trim_end_matches(TRAILING_PUNCT)
        .trim_matches(QUOTE_CHARS)
        .trim()
        .to_string()
}

/// Join items as English prose: "a", "a and b", "a, b and c".
pub fn join_list<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|s| s.as_ref()).collect();
            format!("{} and {}", head.join(", "), last.as_ref())
        }
    }
}

/// Lowercase identifier form: "Netherfield Park" -> "netherfield_park".
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_SLUG
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The first sentence of `text`, cut at `max_chars` with an ellipsis.
pub fn first_sentence(text: &str, max_chars: usize) -> String {
    let flat = WHITESPACE.replace_all(text.trim(), " ");
    let sentence = match SENTENCE_END.find(&flat) {
        Some(m) => flat[..m.end()].trim_end(),
        None => flat.as_ref(),
    };
    if sentence.chars().count() <= max_chars {
        return sentence.to_string();
    }
    let cut: String = sentence.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

/// Greedy word wrap. Paragraph breaks (blank lines) are kept, and a word
/// longer than `width` gets a line to itself.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut paragraphs = Vec::new();
    for paragraph in text.split("\n\n") {
        let mut lines: Vec<String> = Vec::new();
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
        if !lines.is_empty() {
            paragraphs.push(lines.join("\n"));
        }
    }
    paragraphs.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn articles() {
        assert_eq!(indefinite_article("apple"), "an");
        assert_eq!(indefinite_article("wit"), "a");
        assert_eq!(indefinite_article("honest gentleman"), "an");
        assert_eq!(indefinite_article("union"), "a");
        assert_eq!(indefinite_article("Impetuous heir"), "an");
        assert_eq!(indefinite_article(""), "a");
        assert_eq!(with_article("elegant lady"), "an elegant lady");
    }

    #[test]
    fn capitalisation() {
        assert_eq!(capitalize_first("she smiled"), "She smiled");
        assert_eq!(capitalize_first(""), "");
        assert_eq!(capitalize_first("élan"), "Élan");
    }

    #[test]
    fn phrase_normalisation() {
        assert_eq!(normalize_phrase("  lost   inheritance  "), "lost inheritance");
        assert_eq!(normalize_phrase("\"A Secret Engagement.\""), "A Secret Engagement");
        assert_eq!(normalize_phrase("the ball!!!"), "the ball");
        assert_eq!(normalize_phrase("   "), "");
        assert_eq!(normalize_phrase("'{protagonist.name}'"), "{protagonist.name}");
    }

    #[test]
    fn list_joining() {
        let empty: [&str; 0] = [];
        assert_eq!(join_list(&empty), "");
        assert_eq!(join_list(&["wit"]), "wit");
        assert_eq!(join_list(&["wit", "charm"]), "wit and charm");
        assert_eq!(join_list(&["wit", "charm", "prudence"]), "wit, charm and prudence");
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Netherfield Park"), "netherfield_park");
        assert_eq!(slugify("  Bath!  "), "bath");
        assert_eq!(slugify("Kellynch-Hall (Somerset)"), "kellynch_hall_somerset");
    }

    #[test]
    fn html_escaping() {
        assert_eq!(
            escape_html(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }

    #[test]
    fn sentence_extraction() {
        assert_eq!(
            first_sentence("It was a fine day. Nobody came.", 80),
            "It was a fine day."
        );
        assert_eq!(first_sentence("No terminator here", 80), "No terminator here");
        let long = first_sentence("abcdefghijklmnopqrstuvwxyz", 10);
        assert_eq!(long, "abcdefg...");
    }

    #[test]
    fn wrapping() {
        assert_eq!(
            wrap_text("It is a truth universally acknowledged", 12),
            "It is a\ntruth\nuniversally\nacknowledged"
        );
        assert_eq!(wrap_text("one\n\n\n\ntwo  three", 80), "one\n\ntwo three");
        assert_eq!(wrap_text("extraordinarily", 5), "extraordinarily");
        assert_eq!(wrap_text("   ", 10), "");
    }
}
