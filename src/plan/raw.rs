//! Tagged intermediate representation of the loose backend payload.
//!
//! The backend returns arbitrary nested JSON. Instead of deserializing it into one large
//! type, each field is read on its own and anything malformed is dropped, leaving the
//! normalizer to fill defaults.

use super::format::{parse_count, parse_seconds};
use serde_json::{Map, Value};

/// A loose scalar that may be a count, a duration, or free text.
#[derive(Debug, Clone, PartialEq)]
pub enum RawScalar {
    Number(f64),
    Text(String),
}

impl RawScalar {
    fn read(v: &Value) -> Option<Self> {
        match v {
            Value::Number(n) => n.as_f64().map(RawScalar::Number),
            Value::String(s) if !s.trim().is_empty() => Some(RawScalar::Text(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<u32> {
        match self {
            RawScalar::Number(n) if *n >= 0.0 => Some(n.round().min(u32::MAX as f64) as u32),
            RawScalar::Number(_) => None,
            RawScalar::Text(s) => parse_count(s),
        }
    }

    pub fn as_seconds(&self) -> Option<u32> {
        match self {
            RawScalar::Number(n) if *n >= 0.0 => Some(n.round().min(u32::MAX as f64) as u32),
            RawScalar::Number(_) => None,
            RawScalar::Text(s) => parse_seconds(s),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RawScalar::Number(n) => n.to_string(),
            RawScalar::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSet {
    pub reps: Option<RawScalar>,
    pub duration: Option<RawScalar>,
    pub rest: Option<RawScalar>,
    pub weight: Option<RawScalar>,
    pub intensity: Option<String>,
    pub tempo: Option<String>,
}

/// How an exercise described its sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawSets {
    #[default]
    Missing,
    /// `"sets": 3` with reps/duration on the exercise itself.
    Count(u32),
    /// `"sets": [{...}, ...]`.
    Entries(Vec<RawSet>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExercise {
    pub name: Option<String>,
    pub sets: RawSets,
    pub reps: Option<RawScalar>,
    pub duration: Option<RawScalar>,
    pub rest: Option<RawScalar>,
    pub tempo: Option<String>,
    pub intensity: Option<String>,
    pub notes: Option<String>,
    pub form_cues: Vec<String>,
    pub muscle_groups: Vec<String>,
    pub equipment: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBlock {
    pub name: Option<String>,
    pub exercises: Vec<RawExercise>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlan {
    pub title: Option<String>,
    pub duration_minutes: Option<u32>,
    pub warm_up: Vec<RawExercise>,
    pub main_blocks: Vec<RawBlock>,
    pub finisher: Vec<RawExercise>,
    pub cool_down: Vec<RawExercise>,
}

impl RawPlan {
    /// Reads a payload, accepting either a bare plan or one wrapped in `plan`/`workout`.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return RawPlan::default();
        };
        if let Some(inner) = field(obj, &["plan", "workout", "workoutPlan"]).filter(|v| v.is_object()) {
            return RawPlan::from_value(inner);
        }

        let mut main_blocks: Vec<RawBlock> = field(obj, &["blocks", "mainBlocks", "main_blocks"])
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(read_block).collect())
            .unwrap_or_default();

        match field(obj, &["main", "mainExercises", "main_exercises", "exercises", "workout_exercises"]) {
            Some(Value::Array(items)) if items.iter().any(is_block) => {
                main_blocks.extend(items.iter().filter_map(read_block));
            }
            Some(v) => {
                let exercises = read_exercises(v);
                if !exercises.is_empty() {
                    main_blocks.push(RawBlock {
                        name: None,
                        exercises,
                    });
                }
            }
            None => {}
        }

        let finisher = match field(obj, &["finisher", "finishers"]) {
            Some(v) if v.is_object() => read_block(v).map(|b| b.exercises).unwrap_or_default(),
            Some(v) => read_exercises(v),
            None => Vec::new(),
        };

        RawPlan {
            title: text(obj, &["title", "name", "workoutName"]),
            duration_minutes: field(obj, &["durationMinutes", "duration_minutes", "duration", "estimatedDuration"])
                .and_then(RawScalar::read)
                .and_then(|s| s.as_count()),
            warm_up: field(obj, &["warmUp", "warm_up", "warmup"]).map(read_exercises).unwrap_or_default(),
            main_blocks,
            finisher,
            cool_down: field(obj, &["coolDown", "cool_down", "cooldown"]).map(read_exercises).unwrap_or_default(),
        }
    }

    pub fn is_structurally_empty(&self) -> bool {
        self.warm_up.is_empty()
            && self.main_blocks.iter().all(|b| b.exercises.is_empty())
            && self.finisher.is_empty()
            && self.cool_down.is_empty()
    }
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n)).filter(|v| !v.is_null())
}

fn text(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    field(obj, names).and_then(RawScalar::read).map(|s| s.as_text())
}

fn scalar(obj: &Map<String, Value>, names: &[&str]) -> Option<RawScalar> {
    field(obj, names).and_then(RawScalar::read)
}

fn strings(obj: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    match field(obj, names) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(RawScalar::read)
            .map(|s| s.as_text())
            .collect(),
        Some(v) => RawScalar::read(v)
            .map(|s| {
                s.as_text()
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn is_block(v: &Value) -> bool {
    v.get("exercises").map_or(false, Value::is_array)
}

fn read_block(v: &Value) -> Option<RawBlock> {
    let obj = v.as_object()?;
    let exercises = field(obj, &["exercises"]).map(read_exercises)?;
    Some(RawBlock {
        name: text(obj, &["name", "title", "blockName"]),
        exercises,
    })
}

/// Reads a list of exercises; a single object is treated as a one-element list.
fn read_exercises(v: &Value) -> Vec<RawExercise> {
    match v {
        Value::Array(items) => items.iter().filter_map(read_exercise).collect(),
        Value::Object(_) => read_exercise(v).into_iter().collect(),
        _ => Vec::new(),
    }
}

fn read_exercise(v: &Value) -> Option<RawExercise> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(RawExercise {
            name: Some(s.trim().to_string()),
            ..Default::default()
        }),
        Value::Object(obj) => Some(RawExercise {
            name: text(obj, &["name", "exercise", "exerciseName", "title"]),
            sets: read_sets(obj),
            reps: scalar(obj, &["reps", "repetitions"]),
            duration: scalar(obj, &["duration", "durationSeconds", "duration_seconds", "time"]),
            rest: scalar(obj, &["rest", "restSeconds", "rest_seconds", "restTime"]),
            tempo: text(obj, &["tempo"]),
            intensity: text(obj, &["intensity", "rpe", "effort"]),
            notes: text(obj, &["notes", "instructions", "description"]),
            form_cues: strings(obj, &["formCues", "form_cues", "cues", "tips"]),
            muscle_groups: strings(obj, &["muscleGroups", "muscle_groups", "muscles", "targetMuscles"]),
            equipment: strings(obj, &["equipment"]),
        }),
        _ => None,
    }
}

fn read_sets(obj: &Map<String, Value>) -> RawSets {
    match field(obj, &["sets", "setDetails", "set_details"]) {
        Some(Value::Array(items)) => {
            RawSets::Entries(items.iter().filter_map(read_set).collect())
        }
        Some(v) => RawScalar::read(v)
            .and_then(|s| s.as_count())
            .map(RawSets::Count)
            .unwrap_or(RawSets::Missing),
        None => RawSets::Missing,
    }
}

fn read_set(v: &Value) -> Option<RawSet> {
    let obj = v.as_object()?;
    Some(RawSet {
        reps: scalar(obj, &["reps", "repetitions"]),
        duration: scalar(obj, &["duration", "durationSeconds", "duration_seconds", "time"]),
        rest: scalar(obj, &["rest", "restSeconds", "rest_seconds", "restTime"]),
        weight: scalar(obj, &["weight", "load"]),
        intensity: text(obj, &["intensity", "rpe", "effort"]),
        tempo: text(obj, &["tempo"]),
    })
}
