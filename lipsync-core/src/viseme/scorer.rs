//! Heuristic viseme scoring.
//!
//! ## Rule order
//!
//! 1. Silence: both current and averaged volume low.
//! 2. Plosive base: shared by `PP DD KK NN`, driven by volume/centroid jumps.
//! 3. Centroid-banded consonants: added on top of the plosive base.
//! 4. `FF`: overwrites.
//! 5. Vowels: formant-band shape of the averaged snapshot, with refinements
//!    that overwrite the first pass.
//!
//! The thresholds are empirically tuned against recorded speech. Changing any
//! of them changes classifier behavior and needs re-checking with
//! `viseme-trace` against fixtures.

use crate::features::FeatureSnapshot;

use super::{Category, ScoreTable, Viseme};

const SILENCE_VOLUME: f32 = 0.2;

const PLOSIVE_STEADY_VOLUME_DELTA: f32 = 0.01;
const PLOSIVE_STEADY_PENALTY: f32 = 0.5;
const PLOSIVE_QUIET_BONUS: f32 = 0.2;
const PLOSIVE_CENTROID_JUMP_BONUS: f32 = 0.2;

/// A centroid change above this (Hz) counts as an abrupt spectral jump.
const CENTROID_JUMP_HZ: f32 = 1_000.0;

const CONSONANT_CENTROID_MIN: f32 = 1_000.0;
const CONSONANT_CENTROID_MAX: f32 = 8_000.0;
const DD_CENTROID: f32 = 7_000.0;
const KK_CENTROID: f32 = 5_000.0;
const PP_CENTROID: f32 = 4_000.0;
const DD_BOOST_CENTROID_MAX: f32 = 6_000.0;
const DD_BOOST_HIGH_BAND: f32 = 0.25;

const FF_CURRENT_CENTROID: f32 = 6_000.0;
const FF_AVERAGED_CENTROID: f32 = 5_000.0;
const FF_CURRENT_HIGH_BAND: f32 = 0.4;
const FF_AVERAGED_HIGH_BAND: f32 = 0.3;

const VOWEL_MIN_VOLUME: f32 = 0.1;
const VOWEL_MAX_CENTROID: f32 = 6_000.0;
const VOWEL_FORMANT_GATE: f32 = 0.1;
const VOWEL_FLAT_SPREAD: f32 = 0.25;

/// Index of the top fricative band.
const HIGH_BAND: usize = 6;

/// Score every viseme for one tick.
///
/// `volume_delta` and `centroid_delta` are the frame-to-frame changes of the
/// current snapshot against history. Unmentioned visemes stay at zero.
pub fn score(
    current: &FeatureSnapshot,
    averaged: &FeatureSnapshot,
    volume_delta: f32,
    centroid_delta: f32,
) -> ScoreTable {
    let mut table = ScoreTable::new();

    score_silence(&mut table, current, averaged);
    score_plosives(&mut table, averaged, volume_delta, centroid_delta);
    score_centroid_consonants(&mut table, current);
    score_ff(&mut table, current, averaged, centroid_delta);
    score_vowels(&mut table, current, averaged);

    table
}

fn score_silence(table: &mut ScoreTable, current: &FeatureSnapshot, averaged: &FeatureSnapshot) {
    if averaged.volume < SILENCE_VOLUME && current.volume < SILENCE_VOLUME {
        table.set(Viseme::Silence, 1.0);
    }
}

fn score_plosives(
    table: &mut ScoreTable,
    averaged: &FeatureSnapshot,
    volume_delta: f32,
    centroid_delta: f32,
) {
    let mut base = 0.0;
    if volume_delta < PLOSIVE_STEADY_VOLUME_DELTA {
        base -= PLOSIVE_STEADY_PENALTY;
    }
    if averaged.volume < SILENCE_VOLUME {
        base += PLOSIVE_QUIET_BONUS;
    }
    if centroid_delta > CENTROID_JUMP_HZ {
        base += PLOSIVE_CENTROID_JUMP_BONUS;
    }

    for viseme in Viseme::ALL {
        if viseme.category() == Category::Plosive {
            table.set(viseme, base);
        }
    }
}

fn score_centroid_consonants(table: &mut ScoreTable, current: &FeatureSnapshot) {
    let centroid = current.centroid;
    if !(centroid > CONSONANT_CENTROID_MIN && centroid < CONSONANT_CENTROID_MAX) {
        return;
    }

    if centroid > DD_CENTROID {
        table.add(Viseme::DD, 0.6);
    } else if centroid > KK_CENTROID {
        table.add(Viseme::KK, 0.6);
    } else if centroid > PP_CENTROID {
        table.add(Viseme::PP, 1.0);
        if current.bands[HIGH_BAND] > DD_BOOST_HIGH_BAND && centroid < DD_BOOST_CENTROID_MAX {
            table.add(Viseme::DD, 1.4);
        }
    } else {
        table.add(Viseme::NN, 0.6);
    }
}

fn score_ff(
    table: &mut ScoreTable,
    current: &FeatureSnapshot,
    averaged: &FeatureSnapshot,
    centroid_delta: f32,
) {
    if centroid_delta > CENTROID_JUMP_HZ
        && current.centroid > FF_CURRENT_CENTROID
        && averaged.centroid > FF_AVERAGED_CENTROID
        && current.bands[HIGH_BAND] > FF_CURRENT_HIGH_BAND
        && averaged.bands[HIGH_BAND] > FF_AVERAGED_HIGH_BAND
    {
        table.set(Viseme::FF, 0.7);
    }
}

fn score_vowels(table: &mut ScoreTable, current: &FeatureSnapshot, averaged: &FeatureSnapshot) {
    if !(averaged.volume > VOWEL_MIN_VOLUME
        && averaged.centroid < VOWEL_MAX_CENTROID
        && current.centroid < VOWEL_MAX_CENTROID)
    {
        return;
    }

    let [b1, b2, b3, b4] = [
        averaged.bands[1],
        averaged.bands[2],
        averaged.bands[3],
        averaged.bands[4],
    ];
    if !(b3 > VOWEL_FORMANT_GATE || b4 > VOWEL_FORMANT_GATE) {
        return;
    }

    let band_diff = (b1 - b2).abs();
    let variance = (b2 - b3).abs().max((b2 - b4).abs()).max((b3 - b4).abs());

    if b4 > b3 {
        table.set(Viseme::AA, 0.8);
        if b3 > b2 {
            table.add(Viseme::AA, 0.2);
        }
    }
    if b3 > b2 && b3 > b4 {
        table.set(Viseme::I, 0.7);
    }
    if band_diff < VOWEL_FLAT_SPREAD {
        table.set(Viseme::U, 0.7);
    }
    if variance < VOWEL_FLAT_SPREAD {
        table.set(Viseme::O, 0.9);
    }
    if b2 > b3 && b3 > b4 {
        table.set(Viseme::E, 1.0);
    }

    // Refinements overwrite the first pass.
    if b3 < 0.2 && b4 > 0.3 {
        table.set(Viseme::I, 0.7);
    }
    if b3 > 0.25 && b4 > 0.25 {
        table.set(Viseme::O, 0.7);
    }
    if b3 < 0.15 && b4 < 0.15 {
        table.set(Viseme::U, 0.7);
    }
}
