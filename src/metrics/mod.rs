//! Metrics module - progress figures derived from session logs
//!
//! Features:
//! - Best set per log (heaviest weight) with Brzycki one-rep-max
//! - Per-exercise time series for charts
//! - Exercise name suggestions from logs or plans
//! - Linear trend over a series (linfa)

pub mod trend;

pub use trend::ProgressTrend;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Log, Plan};

/// Heaviest set of one exercise within one log
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BestSet {
    pub weight: f64,
    pub reps: i64,
    pub one_rep_max: f64,
}

impl BestSet {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Weight => self.weight,
            Metric::OneRepMax => self.one_rep_max,
        }
    }
}

/// Which figure of the best set a series tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    #[default]
    Weight,
    OneRepMax,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Weight => "Best set weight",
            Metric::OneRepMax => "Estimated 1RM",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Weight => write!(f, "weight"),
            Metric::OneRepMax => write!(f, "oneRepMax"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight" => Ok(Metric::Weight),
            "oneRepMax" | "one-rep-max" | "1rm" => Ok(Metric::OneRepMax),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

/// One chart point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: DateTime<Utc>,
    pub value: f64,
}

/// Brzycki estimate: `weight / (1.0278 - 0.0278 * reps)`, rounded.
///
/// Returns 0 unless both weight and reps are non-zero. Reps are not
/// clamped: past ~37 reps the denominator goes negative and so does the
/// estimate.
pub fn estimate_one_rep_max(weight: f64, reps: i64) -> f64 {
    if weight == 0.0 || weight.is_nan() || reps == 0 {
        return 0.0;
    }
    round_half_up(weight / (1.0278 - 0.0278 * reps as f64))
}

/// Heaviest set of `exercise` in `log`.
///
/// Only the first entry with that exact name is looked at. A set replaces the
/// current best only when strictly heavier, so ties keep the earlier set and
/// blank weights never win. No match gives all zeros.
pub fn best_set(log: &Log, exercise: &str) -> BestSet {
    let Some(entry) = log.exercises.iter().find(|e| e.name == exercise) else {
        return BestSet::default();
    };

    let (weight, reps) = entry.sets.iter().fold((0.0_f64, 0_i64), |best, set| {
        let weight = parse_weight(&set.weight);
        if weight > best.0 {
            (weight, parse_reps(&set.reps))
        } else {
            best
        }
    });

    BestSet {
        weight,
        reps,
        one_rep_max: estimate_one_rep_max(weight, reps),
    }
}

/// `(date, value)` for every log containing `exercise`, in the given order
pub fn exercise_series(logs: &[Log], exercise: &str, metric: Metric) -> Vec<SeriesPoint> {
    logs.iter()
        .filter(|log| log.exercises.iter().any(|e| e.name == exercise))
        .map(|log| SeriesPoint {
            date: log.date,
            value: best_set(log, exercise).value(metric),
        })
        .collect()
}

/// Anything holding a list of named exercises
pub trait HasExerciseNames {
    fn exercise_names(&self) -> impl Iterator<Item = &str>;
}

impl HasExerciseNames for Log {
    fn exercise_names(&self) -> impl Iterator<Item = &str> {
        self.exercises.iter().map(|e| e.name.as_str())
    }
}

impl HasExerciseNames for Plan {
    fn exercise_names(&self) -> impl Iterator<Item = &str> {
        self.exercises.iter().map(|e| e.name.as_str())
    }
}

/// Distinct non-empty exercise names, sorted, case-sensitive
pub fn unique_exercise_names<'a, T>(items: impl IntoIterator<Item = &'a T>) -> Vec<String>
where
    T: HasExerciseNames + 'a,
{
    items
        .into_iter()
        .flat_map(|item| item.exercise_names())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Lenient float parse: longest numeric prefix, `NaN` if there is none.
/// `"135kg"` gives 135, `""` gives NaN.
pub fn parse_weight(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let is_digit = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let int_start = end;
    while is_digit(end) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let mut frac_end = end + 1;
        while is_digit(frac_end) {
            frac_end += 1;
        }
        digits += frac_end - end - 1;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while is_digit(exp_end) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// Lenient integer parse: leading digits only, 0 if there are none.
/// `"8"` gives 8, `"8.5"` gives 8, `"x"` gives 0.
pub fn parse_reps(s: &str) -> i64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }

    s[..end].parse().unwrap_or(0)
}

/// Halves round towards positive infinity
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}
