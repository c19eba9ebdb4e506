//! Generation requests and prompt construction.

use super::backend::GenerationHints;
use crate::cache::RequestDescriptor;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub const GENERATE_PATH: &str = "/api/workouts/generate";
pub const MIN_DURATION_MINUTES: u32 = 5;
pub const MAX_DURATION_MINUTES: u32 = 180;

/// Profile fields consumed as generation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerProfile {
    pub owner_id: String,
    pub experience: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub equipment_available: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl OwnerProfile {
    pub fn new(owner_id: impl Into<String>, experience: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            experience: experience.into(),
            goals: Vec::new(),
            equipment_available: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_goals(mut self, goals: Vec<String>) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_equipment(mut self, equipment: Vec<String>) -> Self {
        self.equipment_available = equipment;
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }
}

/// What the caller asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRequest {
    pub workout_type: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub equipment_available: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl WorkoutRequest {
    pub fn new(workout_type: impl Into<String>, duration_minutes: u32) -> Self {
        Self {
            workout_type: workout_type.into(),
            duration_minutes,
            equipment_available: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_equipment<S: Into<String>>(mut self, equipment: impl IntoIterator<Item = S>) -> Self {
        self.equipment_available = equipment.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraints<S: Into<String>>(mut self, constraints: impl IntoIterator<Item = S>) -> Self {
        self.constraints = constraints.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_workout(&self.workout_type, self.duration_minutes)
    }
}

fn validate_workout(workout_type: &str, duration_minutes: u32) -> Result<()> {
    if workout_type.trim().is_empty() {
        return Err(Error::validation_with_context(
            "workout type is required",
            ErrorContext::new()
                .with_field_path("request.workout_type")
                .with_source("request_validator"),
        ));
    }
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
        return Err(Error::validation_with_context(
            "duration out of range",
            ErrorContext::new()
                .with_field_path("request.duration_minutes")
                .with_details(format!(
                    "expected {}..={}, got {}",
                    MIN_DURATION_MINUTES, MAX_DURATION_MINUTES, duration_minutes
                ))
                .with_source("request_validator"),
        ));
    }
    Ok(())
}

/// A request merged with the owner's profile: everything generation depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub owner_id: String,
    pub workout_type: String,
    pub duration_minutes: u32,
    pub experience: String,
    pub goals: Vec<String>,
    pub equipment_available: Vec<String>,
    pub constraints: Vec<String>,
}

impl GenerationRequest {
    /// Request equipment wins when given, otherwise the profile's. Constraints are merged.
    pub fn resolve(profile: &OwnerProfile, request: &WorkoutRequest) -> Self {
        let equipment = if request.equipment_available.is_empty() {
            profile.equipment_available.clone()
        } else {
            request.equipment_available.clone()
        };
        let mut constraints = profile.constraints.clone();
        for c in &request.constraints {
            if !constraints.contains(c) {
                constraints.push(c.clone());
            }
        }
        Self {
            owner_id: profile.owner_id.clone(),
            workout_type: request.workout_type.trim().to_string(),
            duration_minutes: request.duration_minutes,
            experience: profile.experience.clone(),
            goals: profile.goals.clone(),
            equipment_available: trimmed(equipment),
            constraints: trimmed(constraints),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(Error::validation_with_context(
                "owner id is required",
                ErrorContext::new()
                    .with_field_path("request.owner_id")
                    .with_source("request_validator"),
            ));
        }
        if self.experience.trim().is_empty() {
            return Err(Error::profile_incomplete(&self.owner_id));
        }
        validate_workout(&self.workout_type, self.duration_minutes)
    }

    /// Descriptor used for both the cache key and the idempotency digest.
    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor::new("POST", GENERATE_PATH)
            .param("ownerId", &self.owner_id)
            .param("workoutType", &self.workout_type)
            .param("durationMinutes", self.duration_minutes)
            .param("experience", &self.experience)
            .param("goals", self.goals.as_slice())
            .param("equipment", self.equipment_available.as_slice())
            .param("constraints", self.constraints.as_slice())
    }

    pub fn hints(&self) -> GenerationHints {
        GenerationHints {
            workout_type: self.workout_type.clone(),
            experience: self.experience.clone(),
            duration_minutes: self.duration_minutes,
        }
    }

    pub fn prompt(&self) -> String {
        let mut p = String::new();
        let _ = writeln!(
            p,
            "Create a {}-minute {} workout for a {} trainee.",
            self.duration_minutes, self.workout_type, self.experience
        );
        if !self.goals.is_empty() {
            let _ = writeln!(p, "Goals: {}.", sorted(&self.goals).join(", "));
        }
        if self.equipment_available.is_empty() {
            let _ = writeln!(p, "Equipment: bodyweight only.");
        } else {
            let _ = writeln!(p, "Equipment: {}.", sorted(&self.equipment_available).join(", "));
        }
        if !self.constraints.is_empty() {
            let _ = writeln!(p, "Constraints: {}.", sorted(&self.constraints).join(", "));
        }
        p.push_str(
            "Respond with JSON containing warmUp, blocks (each with name and exercises), \
             optional finisher, and coolDown. Each exercise has name, sets (list of \
             {reps or duration, rest}), and optional notes, formCues and muscleGroups.",
        );
        p
    }
}

fn trimmed(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn sorted(items: &[String]) -> Vec<&str> {
    let mut v: Vec<&str> = items.iter().map(String::as_str).collect();
    v.sort_unstable();
    v
}
