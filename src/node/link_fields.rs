//! Link field naming.
//!
//! A link field holds one or more node identifiers and is recognised by the
//! content store through the reserved [`LINK_SUFFIX`]. Field names are derived
//! from entity names:
//!
//! - parent link: `{parent}___NODE` (parent name verbatim)
//! - `OneToMany` child link: `{plural(child)}___NODE`, a list of ids
//! - `OneToOne` child link: `{singular(child)}___NODE`, a single optional id
//! - asset links: `{prefix}Image___NODE` and `{prefix}Images___NODE`

use crate::schema::Cardinality;

/// Suffix marking a field whose value is a node identifier or a list of them
pub const LINK_SUFFIX: &str = "___NODE";

/// Base name of the asset link fields, combined with the type prefix
pub const ASSET_LINK_NAME: &str = "Image";

/// Words whose singular and plural forms are identical
const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "fish",
    "information",
    "media",
    "metadata",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
    "deer",
];

/// (singular, plural) pairs that the suffix rules get wrong
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("wolf", "wolves"),
    ("shelf", "shelves"),
    ("thief", "thieves"),
    ("loaf", "loaves"),
    ("hero", "heroes"),
    ("potato", "potatoes"),
    ("tomato", "tomatoes"),
    ("echo", "echoes"),
    ("analysis", "analyses"),
    ("crisis", "crises"),
    ("thesis", "theses"),
    ("criterion", "criteria"),
    ("phenomenon", "phenomena"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

/// Plural form of an English noun
///
/// Already-plural input is returned unchanged.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let (head, last) = split_last_word(word);
    let last_lower = last.to_ascii_lowercase();
    if word.is_empty() || UNCOUNTABLE.contains(&last_lower.as_str()) {
        return word.to_string();
    }

    for (singular, plural) in IRREGULAR {
        if last_lower == *singular {
            return format!("{}{}", head, match_case(last, plural));
        }
        if last_lower == *plural {
            return word.to_string();
        }
    }

    if lower.ends_with("is") {
        return format!("{}es", &word[..word.len() - 2]);
    }
    if lower.ends_with("ss") || lower.ends_with("us") {
        return format!("{}es", word);
    }
    if lower.ends_with('s') {
        return word.to_string();
    }
    if lower.ends_with('x') || lower.ends_with('z') || lower.ends_with("ch") || lower.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if ends_with_consonant_y(&lower) {
        return format!("{}ies", &word[..word.len() - 1]);
    }

    format!("{}s", word)
}

/// Singular form of an English noun
///
/// Already-singular input is returned unchanged.
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let (head, last) = split_last_word(word);
    let last_lower = last.to_ascii_lowercase();
    if word.is_empty() || UNCOUNTABLE.contains(&last_lower.as_str()) {
        return word.to_string();
    }

    for (singular, plural) in IRREGULAR {
        if last_lower == *plural {
            return format!("{}{}", head, match_case(last, singular));
        }
        if last_lower == *singular {
            return word.to_string();
        }
    }

    if lower.len() > 3 && lower.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if lower.ends_with("sses")
        || (lower.ends_with("uses") && !lower.ends_with("ouses") && !lower.ends_with("auses"))
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("xes")
        || lower.ends_with("zes")
        || lower.ends_with("ches")
        || lower.ends_with("shes")
    {
        return word[..word.len() - 2].to_string();
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    if lower.len() > 1 && lower.ends_with('s') {
        return word[..word.len() - 1].to_string();
    }

    word.to_string()
}

/// Split a compound name before its last word
///
/// Words start at a lower-to-upper case change or after `_`, `-` or a space,
/// so `salesPerson` splits into `sales` and `Person`.
fn split_last_word(word: &str) -> (&str, &str) {
    let mut start = 0;
    let mut previous: Option<char> = None;
    for (index, c) in word.char_indices() {
        if let Some(p) = previous {
            if (c.is_uppercase() && p.is_lowercase()) || matches!(p, '_' | '-' | ' ') {
                start = index;
            }
        }
        previous = Some(c);
    }
    word.split_at(start)
}

fn ends_with_consonant_y(lower: &str) -> bool {
    let mut chars = lower.chars().rev();
    match (chars.next(), chars.next()) {
        (Some('y'), Some(before)) => !matches!(before, 'a' | 'e' | 'i' | 'o' | 'u'),
        _ => false,
    }
}

/// Carry the capitalisation of the first letter of `original` over to `replacement`
fn match_case(original: &str, replacement: &str) -> String {
    let starts_upper = original
        .chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false);
    if !starts_upper {
        return replacement.to_string();
    }

    let mut chars = replacement.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn parent_link_field(parent_name: &str) -> String {
    format!("{}{}", parent_name, LINK_SUFFIX)
}

pub fn child_link_field(child_name: &str, cardinality: Cardinality) -> String {
    match cardinality {
        Cardinality::OneToMany => format!("{}{}", pluralize(child_name), LINK_SUFFIX),
        Cardinality::OneToOne => format!("{}{}", singularize(child_name), LINK_SUFFIX),
    }
}

/// Singular asset link, set only when an entity declares exactly one asset field
pub fn asset_link_field(type_prefix: &str) -> String {
    format!("{}{}{}", type_prefix, ASSET_LINK_NAME, LINK_SUFFIX)
}

/// Plural asset link, always set on nodes of entities declaring asset fields
pub fn assets_link_field(type_prefix: &str) -> String {
    format!("{}{}{}", type_prefix, pluralize(ASSET_LINK_NAME), LINK_SUFFIX)
}

pub fn is_link_field(field: &str) -> bool {
    field.len() > LINK_SUFFIX.len() && field.ends_with(LINK_SUFFIX)
}
