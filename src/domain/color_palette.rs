use serde::{Deserialize, Serialize};

pub const MIN_COLOR_ID: i64 = 1;
pub const MAX_COLOR_ID: i64 = 11;

/// Color used by events that carry no explicit color id.
pub const DEFAULT_COLOR_ID: i64 = 9;

const ENGLISH_NAMES: [&str; 11] = [
    "Lavender",
    "Sage",
    "Grape",
    "Flamingo",
    "Banana",
    "Tangerine",
    "Peacock",
    "Graphite",
    "Blueberry",
    "Basil",
    "Tomato",
];

const JAPANESE_NAMES: [&str; 11] = [
    "薄紫",
    "緑",
    "紫",
    "赤",
    "黄",
    "オレンジ",
    "水色",
    "灰色",
    "青",
    "濃い緑",
    "濃い赤",
];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Some(Self::En),
            "ja" | "ja-jp" | "japanese" => Some(Self::Ja),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }

    fn names(self) -> &'static [&'static str; 11] {
        match self {
            Self::En => &ENGLISH_NAMES,
            Self::Ja => &JAPANESE_NAMES,
        }
    }
}

/// A caller-supplied color reference before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorInput {
    Integer(i64),
    Number(f64),
    Text(String),
    Other(String),
}

impl ColorInput {
    pub fn describe(&self) -> String {
        match self {
            Self::Integer(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::Text(value) => format!("'{value}'"),
            Self::Other(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaletteEntry {
    pub id: i64,
    pub name: String,
}

/// The fixed 11-color event palette of Google Calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorPalette {
    locale: Locale,
}

impl ColorPalette {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn default_color_id(&self) -> i64 {
        DEFAULT_COLOR_ID
    }

    pub fn is_valid_id(&self, id: i64) -> bool {
        (MIN_COLOR_ID..=MAX_COLOR_ID).contains(&id)
    }

    pub fn color_name(&self, id: i64) -> Option<&'static str> {
        if !self.is_valid_id(id) {
            return None;
        }
        let index = usize::try_from(id - MIN_COLOR_ID).ok()?;
        self.locale.names().get(index).copied()
    }

    /// Exact, case-sensitive lookup across both naming sets.
    pub fn name_to_id(&self, name: &str) -> Option<i64> {
        [self.locale, Locale::En, Locale::Ja]
            .iter()
            .find_map(|locale| locale.names().iter().position(|candidate| *candidate == name))
            .and_then(|index| i64::try_from(index).ok())
            .map(|index| index + MIN_COLOR_ID)
    }

    /// Resolves a single input to a canonical id. Fractional numbers are
    /// rejected rather than truncated.
    pub fn resolve(&self, input: &ColorInput) -> Option<i64> {
        match input {
            ColorInput::Integer(id) => Some(*id).filter(|id| self.is_valid_id(*id)),
            ColorInput::Number(value) => {
                if value.fract() != 0.0 || !value.is_finite() {
                    return None;
                }
                let id = *value as i64;
                Some(id).filter(|id| self.is_valid_id(*id))
            }
            ColorInput::Text(text) => {
                match text.parse::<i64>() {
                    Ok(id) => Some(id).filter(|id| self.is_valid_id(*id)),
                    Err(_) => self.name_to_id(text),
                }
            }
            ColorInput::Other(_) => None,
        }
    }

    /// Canonical ids in first-seen order, duplicates removed, unresolvable
    /// entries dropped.
    pub fn normalize(&self, inputs: &[ColorInput]) -> Vec<i64> {
        let mut ids = Vec::new();
        for id in inputs.iter().filter_map(|input| self.resolve(input)) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Color id used for grouping and filtering: the event's own id when it
    /// is valid, otherwise the default.
    pub fn effective_color_id(&self, color_id: Option<i64>) -> i64 {
        color_id
            .filter(|id| self.is_valid_id(*id))
            .unwrap_or(DEFAULT_COLOR_ID)
    }

    /// Display name for grouping; out-of-range ids keep their own bucket.
    pub fn group_name(&self, color_id: Option<i64>) -> String {
        let id = color_id.unwrap_or(DEFAULT_COLOR_ID);
        match self.color_name(id) {
            Some(name) => name.to_string(),
            None => format!("Unknown ({id})"),
        }
    }

    pub fn label(&self, id: i64) -> String {
        match self.color_name(id) {
            Some(name) => format!("{name}({id})"),
            None => format!("Unknown({id})"),
        }
    }

    pub fn entries(&self) -> Vec<PaletteEntry> {
        (MIN_COLOR_ID..=MAX_COLOR_ID)
            .filter_map(|id| {
                self.color_name(id).map(|name| PaletteEntry {
                    id,
                    name: name.to_string(),
                })
            })
            .collect()
    }
}
