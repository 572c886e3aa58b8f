//! English pluralization of type names

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
    ("datum", "data"),
    ("criterion", "criteria"),
    ("analysis", "analyses"),
];

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "fish",
    "information",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "staff",
];

const F_TO_VES: &[&str] = &["calf", "half", "leaf", "loaf", "self", "shelf", "thief", "wolf"];

const O_TO_OES: &[&str] = &["echo", "hero", "potato", "tomato", "veto"];

/// Plural of a simple type name, keeping the case of its first letter.
///
/// Only the last word of a camel-case name is inflected, so
/// `LineItem` becomes `LineItems` and `SalesPerson` becomes `SalesPeople`.
pub fn pluralize(name: &str) -> String {
    let split = last_word_start(name);
    let (head, word) = name.split_at(split);
    if word.is_empty() {
        return name.to_string();
    }
    format!("{}{}", head, pluralize_word(word))
}

fn last_word_start(name: &str) -> usize {
    name.char_indices()
        .filter(|(i, c)| *i > 0 && c.is_uppercase())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0)
}

fn pluralize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return match_case(word, plural);
    }

    let stem = &word[..word.len() - last_len(word)];
    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{}es", word);
    }
    if lower.ends_with('y') && !ends_with_vowel_then(&lower, 'y') {
        return format!("{}ies", stem);
    }
    if lower.ends_with("fe") {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if F_TO_VES.contains(&lower.as_str()) {
        return format!("{}ves", stem);
    }
    if O_TO_OES.contains(&lower.as_str()) {
        return format!("{}es", word);
    }
    format!("{}s", word)
}

fn last_len(word: &str) -> usize {
    word.chars().last().map(char::len_utf8).unwrap_or(0)
}

/// Whether the letter before the trailing `last` is a vowel
fn ends_with_vowel_then(lower: &str, last: char) -> bool {
    let mut chars = lower.chars().rev();
    chars.next() == Some(last) && chars.next().map_or(false, |c| "aeiou".contains(c))
}

fn match_case(original: &str, replacement: &str) -> String {
    let mut chars = replacement.chars();
    match (original.chars().next(), chars.next()) {
        (Some(first), Some(head)) if first.is_uppercase() => {
            head.to_uppercase().chain(chars).collect()
        }
        _ => replacement.to_string(),
    }
}
