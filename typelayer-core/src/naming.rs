//! Deterministic name derivation for storage keys and collection names.
//!
//! Storage field names default to the snake_case form of the source field
//! name, and collection names are the pluralized snake_case form of the
//! record type name. Both transforms are pure functions of their input, so
//! the same type always maps to the same storage layout.

/// Converts an arbitrary identifier to snake_case.
///
/// Word boundaries are inserted at a lowercase-or-digit to uppercase
/// transition, at the last letter of an uppercase run that precedes a
/// lowercase letter (`HTTPServer` becomes `http_server`), and in place of any
/// non-alphanumeric character. Runs of separators collapse into a single
/// underscore and leading/trailing underscores are trimmed. Total on any
/// input, including the empty string.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev = Some(c);
            continue;
        }
        if let Some(p) = prev {
            let boundary = ((p.is_lowercase() || p.is_ascii_digit()) && c.is_uppercase())
                || (p.is_uppercase()
                    && c.is_uppercase()
                    && chars.get(i + 1).is_some_and(|n| n.is_lowercase()));
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
        prev = Some(c);
    }

    out.trim_matches('_').to_string()
}

/// Pluralizes an English word for use as a collection name.
///
/// Handles the common irregulars, the `-y`/`-ies` rule, sibilant endings
/// that take `-es`, and falls back to appending `s`. A word that already
/// ends in a plural `s` passes through unchanged, so the function is
/// idempotent.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }

    const IRREGULAR: &[(&str, &str)] = &[
        ("person", "people"),
        ("child", "children"),
        ("man", "men"),
        ("woman", "women"),
        ("foot", "feet"),
        ("tooth", "teeth"),
    ];
    for (singular, plural) in IRREGULAR {
        if let Some(prefix) = word.strip_suffix(singular) {
            return format!("{prefix}{plural}");
        }
    }

    if word.ends_with("ss")
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    // A bare trailing `s` means the word is already plural.
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .next_back()
            .is_some_and(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'));
        if !vowel_before {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// Derives the collection name for a record type name: pluralized
/// snake_case.
pub fn collection_name(type_name: &str) -> String {
    pluralize(&to_snake_case(type_name))
}
