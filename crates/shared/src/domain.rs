use std::fmt;

use serde::{Deserialize, Serialize};

/// Punctuation slots offered by the guided grid, after letters and digits.
pub const GUIDED_PUNCTUATION: &str = ".,!?;:-()'";

/// Every slot of the guided grid, in display order.
pub const GUIDED_ALPHABET: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
    "0123456789",
    ".,!?;:-()'"
);

pub const GUIDED_SLOT_COUNT: usize = 72;

pub fn is_guided_character(ch: char) -> bool {
    GUIDED_ALPHABET.contains(ch)
}

pub fn guided_slots() -> impl Iterator<Item = char> {
    GUIDED_ALPHABET.chars()
}

/// Backend-issued identifier scoping uploads and generation to one font job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_usable(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One slot per character of the fixed guided alphabet.
    #[default]
    Guided,
    /// Any single character is accepted; the character list is free text.
    Freeform,
}

impl SessionMode {
    pub fn accepts(self, ch: char) -> bool {
        match self {
            SessionMode::Guided => is_guided_character(ch),
            SessionMode::Freeform => true,
        }
    }

    pub fn total_slots(self) -> Option<usize> {
        match self {
            SessionMode::Guided => Some(GUIDED_SLOT_COUNT),
            SessionMode::Freeform => None,
        }
    }

    pub fn default_character_list(self) -> String {
        match self {
            SessionMode::Guided => {
                let alphabet: Vec<char> = guided_slots().collect();
                [&alphabet[..26], &alphabet[26..52], &alphabet[52..62], &alphabet[62..]]
                    .iter()
                    .map(|row| row.iter().collect::<String>())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            SessionMode::Freeform => CharacterSet::Basic.characters().to_string(),
        }
    }
}

/// Character list presets offered when requesting generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSet {
    Basic,
    Extended,
    Custom,
}

impl CharacterSet {
    pub fn characters(self) -> &'static str {
        match self {
            CharacterSet::Basic => {
                "ABCDEFGHIJKLMNOPQRSTUVWXYZ\nabcdefghijklmnopqrstuvwxyz\n0123456789"
            }
            CharacterSet::Extended => {
                "ABCDEFGHIJKLMNOPQRSTUVWXYZ\nabcdefghijklmnopqrstuvwxyz\n0123456789\n.,!?;:- ()[]{}"
            }
            CharacterSet::Custom => "",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(CharacterSet::Basic),
            "extended" => Some(CharacterSet::Extended),
            "custom" => Some(CharacterSet::Custom),
            _ => None,
        }
    }
}
