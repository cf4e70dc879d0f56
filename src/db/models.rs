//! Stored records: exercises, plans and session logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Custom exercise name, used for suggestion lists only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

/// One exercise inside a plan, with its goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExercise {
    pub name: String,
    pub goal_sets: u32,
    pub goal_reps: String, // free-form, e.g. "8-12"
}

impl PlanExercise {
    pub fn new(name: impl Into<String>, goal_sets: u32, goal_reps: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal_sets,
            goal_reps: goal_reps.into(),
        }
    }
}

/// Workout template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    pub exercises: Vec<PlanExercise>,
}

/// Plan before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlan {
    pub title: String,
    pub exercises: Vec<PlanExercise>,
}

/// One performed set. Values are kept as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub weight: String,
    pub reps: String,
}

impl SetEntry {
    pub fn new(weight: impl Into<String>, reps: impl Into<String>) -> Self {
        Self {
            weight: weight.into(),
            reps: reps.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogExercise {
    pub name: String,
    pub sets: Vec<SetEntry>,
}

/// Completed session. Never updated after it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Copy of the plan title at completion time, not a reference
    pub plan_title: String,
    #[serde(with = "iso_millis")]
    pub date: DateTime<Utc>,
    pub exercises: Vec<LogExercise>,
}

/// Log before it is stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewLog {
    pub plan_title: String,
    pub date: DateTime<Utc>,
    pub exercises: Vec<LogExercise>,
}

/// Full contents of the store, in backup order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub logs: Vec<Log>,
    pub plans: Vec<Plan>,
    pub exercises: Vec<Exercise>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.plans.is_empty() && self.exercises.is_empty()
    }
}

/// RFC 3339 with milliseconds and a `Z` suffix, e.g. `2024-05-01T18:30:00.000Z`
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(date: &DateTime<Utc>) -> String {
        date.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}
