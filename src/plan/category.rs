//! Exercise category inference and default programming schemes.

use super::types::{ExerciseCategory, ExerciseKind};
use once_cell::sync::Lazy;
use regex::Regex;

static MOBILITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)stretch|mobility|foam roll|\broll(ing)?\b|circles?\b|swings?\b|yoga|pose|cat[- ]cow|child'?s|rotation|opener|\bwalkout|inchworm|\bflow\b|breath")
        .expect("valid regex")
});
static CARDIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\brun|jog|sprint|jump|hop\b|burpee|skip|jacks?\b|bike|cycl|rowing|rower|mountain climber|high knees|butt kicks|shuffle|cardio|elliptical|stair")
        .expect("valid regex")
});
static CORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)plank|crunch|sit[- ]?ups?|hollow|dead ?bug|bird ?dog|russian twist|leg raise|knee raise|\babs?\b|\bcore\b|v[- ]ups?|flutter kick|pallof|side bend|superman|l[- ]sit")
        .expect("valid regex")
});
static HOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)plank|hold|hollow|wall sit|l[- ]sit|superman").expect("valid regex"));
static COMPOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)squat|deadlift|\bpress|lunge|\brows?\b|pull[- ]?ups?|chin[- ]?ups?|push[- ]?ups?|\bdips?\b|clean|snatch|thruster|step[- ]?ups?|hip thrust|glute bridge|good morning|swing|carry|split squat")
        .expect("valid regex")
});
static ISOLATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)curl|extension|raise|fly|flye|kickback|shrug|calf|pulldown|pullover|pec deck|abduct|adduct")
        .expect("valid regex")
});

/// Infers a category from the exercise name.
///
/// Names matching nothing fall back by section: warm-up and cool-down entries are
/// mobility work, main entries are treated as isolation work.
pub fn infer_category(name: &str, kind: ExerciseKind) -> ExerciseCategory {
    if MOBILITY.is_match(name) && !COMPOUND.is_match(name) {
        ExerciseCategory::Mobility
    } else if CARDIO.is_match(name) {
        ExerciseCategory::Cardio
    } else if CORE.is_match(name) {
        ExerciseCategory::Core
    } else if COMPOUND.is_match(name) {
        ExerciseCategory::Compound
    } else if ISOLATION.is_match(name) {
        ExerciseCategory::Isolation
    } else if MOBILITY.is_match(name) {
        ExerciseCategory::Mobility
    } else {
        match kind {
            ExerciseKind::Main => ExerciseCategory::Isolation,
            ExerciseKind::WarmUp | ExerciseKind::CoolDown => ExerciseCategory::Mobility,
        }
    }
}

/// How a synthesized set is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Reps(u32),
    Seconds(u32),
}

/// Default programming for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    pub measures: Vec<Measure>,
    pub rest_seconds: u32,
    pub tempo: &'static str,
    pub intensities: &'static [&'static str],
}

const PROGRESSIVE: &[&str] = &["moderate", "moderately hard", "hard"];
const STEADY: &[&str] = &["easy", "moderate", "brisk"];
const GENTLE: &[&str] = &["gentle", "easy"];

/// Scheme for a category. Main work gets two or three progressive sets, warm-up and
/// cool-down entries get a single easy set.
pub fn scheme_for(category: ExerciseCategory, kind: ExerciseKind, name: &str) -> Scheme {
    let main = kind == ExerciseKind::Main;
    let scheme = match category {
        ExerciseCategory::Compound => Scheme {
            measures: vec![Measure::Reps(10), Measure::Reps(8), Measure::Reps(6)],
            rest_seconds: 90,
            tempo: "3-1-1",
            intensities: PROGRESSIVE,
        },
        ExerciseCategory::Isolation => Scheme {
            measures: vec![Measure::Reps(12), Measure::Reps(10), Measure::Reps(8)],
            rest_seconds: 60,
            tempo: "2-1-2",
            intensities: PROGRESSIVE,
        },
        ExerciseCategory::Cardio => Scheme {
            measures: vec![Measure::Seconds(30), Measure::Seconds(40), Measure::Seconds(45)],
            rest_seconds: 30,
            tempo: "steady",
            intensities: STEADY,
        },
        ExerciseCategory::Core if HOLD.is_match(name) => Scheme {
            measures: vec![Measure::Seconds(30), Measure::Seconds(40), Measure::Seconds(45)],
            rest_seconds: 45,
            tempo: "hold",
            intensities: PROGRESSIVE,
        },
        ExerciseCategory::Core => Scheme {
            measures: vec![Measure::Reps(15), Measure::Reps(12), Measure::Reps(10)],
            rest_seconds: 45,
            tempo: "2-0-2",
            intensities: PROGRESSIVE,
        },
        ExerciseCategory::Mobility => Scheme {
            measures: vec![Measure::Seconds(30), Measure::Seconds(30)],
            rest_seconds: 15,
            tempo: "slow",
            intensities: GENTLE,
        },
    };
    if main {
        scheme
    } else {
        Scheme {
            measures: scheme.measures.into_iter().take(1).collect(),
            rest_seconds: scheme.rest_seconds.min(30),
            intensities: GENTLE,
            ..scheme
        }
    }
}
