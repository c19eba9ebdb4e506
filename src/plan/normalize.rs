//! Output normalizer: loose backend payload in, fixed plan contract out.

use super::category::{infer_category, scheme_for, Measure, Scheme};
use super::format::{format_seconds, join_distinct};
use super::raw::{RawExercise, RawPlan, RawScalar, RawSet, RawSets};
use super::types::{Coaching, ExerciseKind, NormalizedExercise, NormalizedPlan, SetEntry};
use crate::{Error, Result};
use serde_json::Value;
use tracing::debug;

/// Upper bound on sets taken from a `"sets": n` count.
const MAX_SETS: u32 = 10;

/// Normalizes a raw backend payload.
///
/// Never fails on malformed optional data. The only error is [`Error::EmptyPlan`], when the
/// payload has no warm-up, no main work, and no cool-down.
pub fn normalize(raw: &Value) -> Result<NormalizedPlan> {
    normalize_raw(&RawPlan::from_value(raw))
}

pub fn normalize_raw(raw: &RawPlan) -> Result<NormalizedPlan> {
    if raw.is_structurally_empty() {
        return Err(Error::EmptyPlan);
    }

    let warm_up = raw
        .warm_up
        .iter()
        .enumerate()
        .map(|(i, ex)| normalize_exercise(ex, ExerciseKind::WarmUp, i, None))
        .collect();

    let mut main = Vec::new();
    for (bi, block) in raw.main_blocks.iter().enumerate() {
        for ex in &block.exercises {
            let position = main.len();
            main.push(normalize_exercise(
                ex,
                ExerciseKind::Main,
                position,
                Some((block.name.clone(), bi)),
            ));
        }
    }
    let finisher_index = raw.main_blocks.len();
    for ex in &raw.finisher {
        let position = main.len();
        main.push(normalize_exercise(
            ex,
            ExerciseKind::Main,
            position,
            Some((Some("Finisher".to_string()), finisher_index)),
        ));
    }

    let cool_down = raw
        .cool_down
        .iter()
        .enumerate()
        .map(|(i, ex)| normalize_exercise(ex, ExerciseKind::CoolDown, i, None))
        .collect();

    let plan = NormalizedPlan {
        title: raw.title.clone().unwrap_or_else(|| "Workout".to_string()),
        estimated_duration_minutes: raw.duration_minutes.filter(|m| *m > 0),
        warm_up,
        main,
        cool_down,
    };
    debug!(exercises = plan.exercise_count(), "plan normalized");
    Ok(plan)
}

fn positive_count(s: Option<&RawScalar>) -> Option<u32> {
    s.and_then(RawScalar::as_count).filter(|n| *n > 0)
}

fn positive_seconds(s: Option<&RawScalar>) -> Option<u32> {
    s.and_then(RawScalar::as_seconds).filter(|n| *n > 0)
}

fn normalize_exercise(
    raw: &RawExercise,
    kind: ExerciseKind,
    position: usize,
    block: Option<(Option<String>, usize)>,
) -> NormalizedExercise {
    let name = raw
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Exercise {}", position + 1));
    let category = infer_category(&name, kind);
    let scheme = scheme_for(category, kind, &name);
    let rest = positive_seconds(raw.rest.as_ref()).unwrap_or(scheme.rest_seconds);

    let mut entries: Vec<SetEntry> = match &raw.sets {
        RawSets::Entries(sets) => sets
            .iter()
            .enumerate()
            .map(|(i, s)| entry_from_set(s, raw, i, rest))
            .collect(),
        RawSets::Count(n) => (0..(*n).min(MAX_SETS) as usize)
            .map(|i| entry_from_set(&RawSet::default(), raw, i, rest))
            .collect(),
        RawSets::Missing => Vec::new(),
    };

    if entries.is_empty() || (entries.len() == 1 && kind == ExerciseKind::Main) {
        entries = synthesize(raw, entries.first(), &scheme, rest);
    } else {
        for (i, entry) in entries.iter_mut().enumerate() {
            if !entry.is_performable() {
                match measure_at(&scheme, i) {
                    Measure::Reps(r) => entry.reps = Some(r),
                    Measure::Seconds(s) => entry.duration_seconds = Some(s),
                }
            }
        }
    }

    let reps: Vec<u32> = entries.iter().filter_map(|e| e.reps).collect();
    let durations: Vec<u32> = entries.iter().filter_map(|e| e.duration_seconds).collect();
    let (block_name, block_index) = match block {
        Some((name, index)) => (name, Some(index)),
        None => (None, None),
    };

    NormalizedExercise {
        name,
        kind,
        category,
        sets: entries.len() as u32,
        reps_display: join_distinct(&reps, |r| r.to_string()),
        duration_display: join_distinct(&durations, format_seconds),
        rest_display: format_seconds(entries.first().map_or(rest, |e| e.rest_seconds)),
        set_entries: entries,
        block_name,
        block_index,
        coaching: Coaching {
            notes: raw.notes.clone(),
            form_cues: raw.form_cues.clone(),
            muscle_groups: raw.muscle_groups.clone(),
            equipment: raw.equipment.clone(),
        },
    }
}

fn measure_at(scheme: &Scheme, i: usize) -> Measure {
    let last = scheme.measures.len().saturating_sub(1);
    scheme
        .measures
        .get(i.min(last))
        .copied()
        .unwrap_or(Measure::Reps(10))
}

fn entry_from_set(set: &RawSet, ex: &RawExercise, i: usize, rest: u32) -> SetEntry {
    SetEntry {
        set_number: i as u32 + 1,
        reps: positive_count(set.reps.as_ref()).or_else(|| positive_count(ex.reps.as_ref())),
        duration_seconds: positive_seconds(set.duration.as_ref())
            .or_else(|| positive_seconds(ex.duration.as_ref())),
        rest_seconds: positive_seconds(set.rest.as_ref()).unwrap_or(rest),
        weight: set.weight.as_ref().map(RawScalar::as_text),
        intensity: set.intensity.clone().or_else(|| ex.intensity.clone()),
        tempo: set.tempo.clone().or_else(|| ex.tempo.clone()),
    }
}

/// Builds the category scheme, keeping any reps or duration the backend did provide.
fn synthesize(ex: &RawExercise, single: Option<&SetEntry>, scheme: &Scheme, rest: u32) -> Vec<SetEntry> {
    let reps_hint = single
        .and_then(|e| e.reps)
        .or_else(|| positive_count(ex.reps.as_ref()));
    let duration_hint = single
        .and_then(|e| e.duration_seconds)
        .or_else(|| positive_seconds(ex.duration.as_ref()));
    let rest = single.map_or(rest, |e| e.rest_seconds);
    let weight = single.and_then(|e| e.weight.clone());
    let tempo = ex.tempo.clone().unwrap_or_else(|| scheme.tempo.to_string());

    (0..scheme.measures.len())
        .map(|i| {
            let measure = match (reps_hint, duration_hint) {
                (Some(r), _) => Measure::Reps(r),
                (None, Some(d)) => Measure::Seconds(d),
                (None, None) => measure_at(scheme, i),
            };
            let (reps, duration_seconds) = match measure {
                Measure::Reps(r) => (Some(r), None),
                Measure::Seconds(s) => (None, Some(s)),
            };
            let intensity = scheme
                .intensities
                .get(i.min(scheme.intensities.len().saturating_sub(1)))
                .map(|s| s.to_string());
            SetEntry {
                set_number: i as u32 + 1,
                reps,
                duration_seconds,
                rest_seconds: rest,
                weight: weight.clone(),
                intensity,
                tempo: Some(tempo.clone()),
            }
        })
        .collect()
}
