//! Keybinding normalization.
//!
//! Canonical form: lowercase, modifiers first in `ctrl`, `shift`, `alt`,
//! `meta` order, joined by `+`; chords separated by a single space.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "ctrl" | "control" => Some(Self::Ctrl),
            "shift" => Some(Self::Shift),
            "alt" | "option" => Some(Self::Alt),
            "meta" | "cmd" | "command" | "super" | "win" => Some(Self::Meta),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Ctrl => "ctrl",
            Self::Shift => "shift",
            Self::Alt => "alt",
            Self::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeybindingError {
    Empty,
    MissingKey(String),
    MultipleKeys(String),
}

impl Display for KeybindingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "keybinding must not be empty"),
            Self::MissingKey(raw) => write!(f, "keybinding `{raw}` has no key"),
            Self::MultipleKeys(raw) => {
                write!(f, "keybinding `{raw}` names more than one non-modifier key")
            }
        }
    }
}

impl Error for KeybindingError {}

/// Normalizes a keybinding, e.g. `"Alt+Ctrl+J"` → `"ctrl+alt+j"`.
pub fn normalize_key(raw: &str) -> Result<String, KeybindingError> {
    let chords: Vec<&str> = raw.split_whitespace().collect();
    if chords.is_empty() {
        return Err(KeybindingError::Empty);
    }
    let normalized = chords
        .into_iter()
        .map(normalize_chord)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(normalized.join(" "))
}

fn normalize_chord(chord: &str) -> Result<String, KeybindingError> {
    let lowered = chord.to_lowercase();
    let mut modifiers: Vec<Modifier> = Vec::new();
    let mut key: Option<String> = None;

    for token in split_chord(&lowered) {
        if let Some(modifier) = Modifier::parse(&token) {
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
            continue;
        }
        if key.replace(token).is_some() {
            return Err(KeybindingError::MultipleKeys(chord.to_string()));
        }
    }

    let key = key.ok_or_else(|| KeybindingError::MissingKey(chord.to_string()))?;
    modifiers.sort();
    let mut parts: Vec<&str> = modifiers.iter().map(|modifier| modifier.as_str()).collect();
    parts.push(&key);
    Ok(parts.join("+"))
}

/// Splits on `+`, treating a `+` right after a separator (or at the end) as the key itself.
fn split_chord(chord: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in chord.chars() {
        if ch == '+' && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
