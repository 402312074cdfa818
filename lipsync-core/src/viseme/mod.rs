//! Viseme categories and the per-tick score table.

pub mod scorer;
pub mod stabilizer;

pub use scorer::score;
pub use stabilizer::VisemeStabilizer;

use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const VISEME_COUNT: usize = 15;

/// Mouth-shape class. Declaration order is the tie-break order.
///
/// Serialized with the names morph-target rigs conventionally use
/// (`sil`, `PP`, `kk`, `aa`, ...).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Viseme {
    #[default]
    #[serde(rename = "sil")]
    Silence,
    PP,
    FF,
    TH,
    DD,
    #[serde(rename = "kk")]
    KK,
    CH,
    SS,
    #[serde(rename = "nn")]
    NN,
    RR,
    #[serde(rename = "aa")]
    AA,
    E,
    I,
    O,
    U,
}

/// Shared family used by the scorer's grouped rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Silence,
    Plosive,
    Fricative,
    Vowel,
}

impl Viseme {
    pub const ALL: [Viseme; VISEME_COUNT] = [
        Viseme::Silence,
        Viseme::PP,
        Viseme::FF,
        Viseme::TH,
        Viseme::DD,
        Viseme::KK,
        Viseme::CH,
        Viseme::SS,
        Viseme::NN,
        Viseme::RR,
        Viseme::AA,
        Viseme::E,
        Viseme::I,
        Viseme::O,
        Viseme::U,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn category(self) -> Category {
        match self {
            Viseme::Silence => Category::Silence,
            Viseme::PP | Viseme::DD | Viseme::KK | Viseme::NN => Category::Plosive,
            Viseme::FF | Viseme::TH | Viseme::CH | Viseme::SS | Viseme::RR => Category::Fricative,
            Viseme::AA | Viseme::E | Viseme::I | Viseme::O | Viseme::U => Category::Vowel,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Viseme::Silence => "sil",
            Viseme::PP => "PP",
            Viseme::FF => "FF",
            Viseme::TH => "TH",
            Viseme::DD => "DD",
            Viseme::KK => "kk",
            Viseme::CH => "CH",
            Viseme::SS => "SS",
            Viseme::NN => "nn",
            Viseme::RR => "RR",
            Viseme::AA => "aa",
            Viseme::E => "E",
            Viseme::I => "I",
            Viseme::O => "O",
            Viseme::U => "U",
        }
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown viseme name: {0}")]
pub struct UnknownViseme(pub String);

impl FromStr for Viseme {
    type Err = UnknownViseme;

    /// Accepts the serialized names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Viseme::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownViseme(s.to_string()))
    }
}

/// One score per viseme; rebuilt from zero every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreTable {
    scores: [f32; VISEME_COUNT],
}

impl ScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, viseme: Viseme) -> f32 {
        self.scores[viseme.index()]
    }

    pub fn set(&mut self, viseme: Viseme, value: f32) {
        self.scores[viseme.index()] = value;
    }

    pub fn add(&mut self, viseme: Viseme, delta: f32) {
        self.scores[viseme.index()] += delta;
    }

    /// `(viseme, score)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Viseme, f32)> + '_ {
        Viseme::ALL.into_iter().zip(self.scores.iter().copied())
    }

    pub fn as_array(&self) -> &[f32; VISEME_COUNT] {
        &self.scores
    }
}

impl Index<Viseme> for ScoreTable {
    type Output = f32;

    fn index(&self, viseme: Viseme) -> &f32 {
        &self.scores[viseme.index()]
    }
}
