//! Normalized plan contract.

use serde::{Deserialize, Serialize};

/// Plan section an exercise belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    WarmUp,
    Main,
    CoolDown,
}

/// Programming category, inferred from the exercise name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseCategory {
    Compound,
    Isolation,
    Cardio,
    Core,
    Mobility,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEntry {
    pub set_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    pub rest_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intensity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<String>,
}

impl SetEntry {
    /// A set is performable when it has positive reps or a positive duration.
    pub fn is_performable(&self) -> bool {
        self.reps.map_or(false, |r| r > 0) || self.duration_seconds.map_or(false, |d| d > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coaching {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_cues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub muscle_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equipment: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedExercise {
    pub name: String,
    pub kind: ExerciseKind,
    pub category: ExerciseCategory,
    /// Number of entries in `set_entries`; never zero.
    pub sets: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_display: Option<String>,
    pub rest_display: String,
    pub set_entries: Vec<SetEntry>,
    /// Name and position of the main block this exercise came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_index: Option<usize>,
    #[serde(default)]
    pub coaching: Coaching,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedPlan {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_minutes: Option<u32>,
    pub warm_up: Vec<NormalizedExercise>,
    pub main: Vec<NormalizedExercise>,
    pub cool_down: Vec<NormalizedExercise>,
}

impl NormalizedPlan {
    pub fn exercise_count(&self) -> usize {
        self.warm_up.len() + self.main.len() + self.cool_down.len()
    }

    /// All exercises in display order.
    pub fn exercises(&self) -> impl Iterator<Item = &NormalizedExercise> {
        self.warm_up
            .iter()
            .chain(self.main.iter())
            .chain(self.cool_down.iter())
    }
}
