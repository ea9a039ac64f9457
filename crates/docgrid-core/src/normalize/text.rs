use regex::Regex;
use std::sync::LazyLock;

/// Words that never make it into a cleaned title.
const STOP_WORDS: &[&str] = &[
    "AND", "OF", "THE", "A", "AN", "TO", "FOR", "IN", "ON", "WITH", "BY", "AT", "FROM", "OR",
    "TITLE",
];

static INLINE_HSN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:HSN|HSDN|SAC)\s*(?:code)?\s*[:#]?\s*([A-Za-z0-9-]*\d[A-Za-z0-9-]*)")
        .expect("valid inline HSN regex")
});

static HSN_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:HSN|HSDN|SAC)(?:\s*/\s*SAC)?\s*(?:code)?\s*[:#]?\s*")
        .expect("valid HSN label regex")
});

/// Trim and collapse internal whitespace runs to single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a title for token statistics.
///
/// Steps:
/// 1. Uppercase, `&` becomes `AND`
/// 2. Dashes and punctuation become spaces
/// 3. Drop stop-words, pure numbers and tokens shorter than 3 characters
/// 4. Strip a simple plural `S`
pub fn clean_title(text: &str) -> String {
    let upper = text.to_uppercase().replace('&', " AND ");
    let spaced: String = upper
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| t.chars().count() >= 3)
        .map(strip_plural)
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_plural(token: &str) -> &str {
    let mut chars = token.chars().rev();
    match (chars.next(), chars.next()) {
        (Some('S'), Some(prev)) if prev.is_ascii_uppercase() => &token[..token.len() - 1],
        _ => token,
    }
}

/// Tokens of a cleaned title counted in frequency statistics.
pub fn title_tokens(title_clean: &str) -> impl Iterator<Item = &str> {
    title_clean
        .split_whitespace()
        .filter(|t| t.chars().count() >= 3)
}

/// Repair item names broken across PDF lines.
///
/// - "Hosting plan Hosting" -> "Hosting plan" (first word repeated at the end)
/// - "Deployment ServerDeployment" -> "Deployment Server" (first word glued onto the second)
pub fn repair_item_name(name: &str) -> String {
    let collapsed = collapse_whitespace(name);
    let mut tokens: Vec<String> = collapsed.split(' ').map(str::to_string).collect();

    if tokens.len() >= 2
        && tokens[tokens.len() - 1].to_lowercase() == tokens[0].to_lowercase()
    {
        tokens.pop();
    }

    if tokens.len() >= 2 {
        let first = tokens[0].to_lowercase();
        let second = tokens[1].clone();
        let second_lower = second.to_lowercase();
        if second_lower.ends_with(&first)
            && second.chars().count() > first.chars().count() + 1
        {
            let keep = second.chars().count() - first.chars().count();
            tokens[1] = second.chars().take(keep).collect();
        }
    }

    tokens.join(" ").trim().to_string()
}

/// Drop an `HSN`/`SAC` label from a code cell: "HSN 8471" -> "8471".
pub fn strip_hsn_label(code: &str) -> Option<String> {
    let code = collapse_whitespace(code);
    let stripped = HSN_LABEL.replace(&code, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Split an inline "HSN 998314" reference out of an item name.
///
/// Returns the item text without the reference and the code, if one was found.
pub fn lift_inline_hsn(item: &str) -> (String, Option<String>) {
    match INLINE_HSN.captures(item) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            let code = caps.get(1).map(|m| m.as_str().to_string());
            let rest = format!("{} {}", &item[..whole.start], &item[whole.end..]);
            (collapse_whitespace(&rest), code)
        }
        None => (item.to_string(), None),
    }
}

/// URL-safe identifier derived from a file stem: "Jordan 2019 Specs" -> "jordan_2019_specs".
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_underscore = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            prev_underscore = false;
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}
