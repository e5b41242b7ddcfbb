//! Screen signature engine: collapses a screen's text, button layout and
//! media flag into a stable 8-byte hex digest so recurring screens are
//! recognized as the same state despite numeric/time noise.

use sha2::{Digest, Sha256};

use crate::model::Button;

/// Placeholder substituted for every maximal digit run in screen text, so
/// numeric counters ("Page 3 of 42" vs "Page 7 of 42") do not fragment the
/// state space.
const DIGIT_PLACEHOLDER: char = '#';

/// Normalizes screen body text for hashing: lowercase, every maximal digit
/// run replaced by a single placeholder, whitespace collapsed to single
/// spaces, trimmed.
pub fn normalize_screen_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_digits = false;
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                out.push(DIGIT_PLACEHOLDER);
                in_digits = true;
            }
            in_space = false;
            continue;
        }
        in_digits = false;
        if c.is_whitespace() {
            if !in_space && !out.is_empty() {
                out.push(' ');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        for lc in c.to_lowercase() {
            out.push(lc);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// True for characters that carry no action identity in a button label:
/// emoji blocks, variation selectors, and the zero-width joiner. Arrows and
/// other plain symbols are kept.
fn is_decorative(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x1F000..=0x1FAFF      // emoji, symbols & pictographs
        | 0x2600..=0x27BF      // misc symbols, dingbats
        | 0x2B00..=0x2BFF      // misc symbols and arrows (stars, shapes)
        | 0xFE00..=0xFE0F      // variation selectors
        | 0x200D               // zero-width joiner
    )
}

/// Normalizes a button label for action comparison: strips emoji and
/// variation selectors, lowercases, collapses whitespace. Screen body text is
/// *not* stripped this way; only action labels are.
pub fn normalize_action_text(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !is_decorative(*c)).collect();
    let mut out = String::with_capacity(stripped.len());
    let mut in_space = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            if !in_space && !out.is_empty() {
                out.push(' ');
                in_space = true;
            }
            continue;
        }
        in_space = false;
        for lc in c.to_lowercase() {
            out.push(lc);
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Ordered concatenation of `row-text` pairs, row-separated. Identical button
/// texts in a different row/column order produce a different signature:
/// layout carries state information.
fn button_signature(rows: &[Vec<Button>]) -> String {
    rows.iter()
        .enumerate()
        .map(|(row, buttons)| {
            buttons
                .iter()
                .map(|b| format!("{}-{}", row, b.text))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Stable dedup key for a screen: first 8 bytes (16 hex chars) of SHA-256
/// over `normalized_text || "||" || button_signature || "||" || media_flag`.
/// Pure function; this is the key behind `visited_signatures`.
pub fn screen_signature(text: &str, button_rows: &[Vec<Button>], has_media: bool) -> String {
    let normalized = normalize_screen_text(text);
    let buttons = button_signature(button_rows);
    let media_flag = if has_media { "1" } else { "0" };

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hasher.update(b"||");
    hasher.update(buttons.as_bytes());
    hasher.update(b"||");
    hasher.update(media_flag.as_bytes());
    let digest = hasher.finalize();

    digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
}
