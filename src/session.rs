//! Workout session in progress: built from a plan, finished into a log

use chrono::{DateTime, Utc};
use tracing::info;

use crate::backup::{BackupManager, ExportOutcome, FileHost, export_store};
use crate::db::{Database, Log, LogExercise, NewLog, Plan, SetEntry};
use crate::error::{Error, Result};

/// Sets being recorded against a plan
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    plan_title: String,
    exercises: Vec<LogExercise>,
}

impl Session {
    /// One entry per plan exercise, in plan order, each with `goal_sets`
    /// blank sets to fill in
    pub fn from_plan(plan: &Plan) -> Self {
        let exercises = plan
            .exercises
            .iter()
            .map(|e| LogExercise {
                name: e.name.clone(),
                sets: vec![SetEntry::default(); e.goal_sets as usize],
            })
            .collect();

        Self {
            plan_title: plan.title.clone(),
            exercises,
        }
    }

    pub fn plan_title(&self) -> &str {
        &self.plan_title
    }

    pub fn exercises(&self) -> &[LogExercise] {
        &self.exercises
    }

    /// Fill in set `set` of exercise `exercise`
    pub fn record_set(&mut self, exercise: usize, set: usize, weight: &str, reps: &str) -> Result<()> {
        let entry = self
            .exercise_mut(exercise)?
            .sets
            .get_mut(set)
            .ok_or_else(|| Error::Validation(format!("no set {} in exercise {}", set, exercise)))?;
        *entry = SetEntry::new(weight, reps);
        Ok(())
    }

    /// Append a blank set; returns its index
    pub fn add_set(&mut self, exercise: usize) -> Result<usize> {
        let sets = &mut self.exercise_mut(exercise)?.sets;
        sets.push(SetEntry::default());
        Ok(sets.len() - 1)
    }

    /// Append an exercise that is not in the plan; returns its index
    pub fn add_exercise(&mut self, name: &str) -> usize {
        self.exercises.push(LogExercise {
            name: name.to_string(),
            sets: Vec::new(),
        });
        self.exercises.len() - 1
    }

    /// Close the session at `at`
    pub fn finish(self, at: DateTime<Utc>) -> NewLog {
        NewLog {
            plan_title: self.plan_title,
            date: at,
            exercises: self.exercises,
        }
    }

    fn exercise_mut(&mut self, index: usize) -> Result<&mut LogExercise> {
        self.exercises
            .get_mut(index)
            .ok_or_else(|| Error::Validation(format!("no exercise {} in session", index)))
    }
}

/// Store the finished session, then back up the whole store.
///
/// The log stays stored even if the backup fails.
pub fn complete_session<H: FileHost>(
    db: &Database,
    backup: &mut BackupManager<H>,
    session: Session,
    at: DateTime<Utc>,
) -> Result<(Log, ExportOutcome)> {
    let log = db.append_log(session.finish(at))?;
    info!("Session finished: {} ({} exercises)", log.plan_title, log.exercises.len());

    let outcome = export_store(db, backup)?;
    Ok((log, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{LocalFileHost, decode};
    use crate::db::{NewPlan, PlanExercise};
    use crate::metrics::{Metric, exercise_series};
    use chrono::TimeZone;

    fn push_day(db: &Database) -> Plan {
        db.create_plan(NewPlan {
            title: "Push Day".to_string(),
            exercises: vec![
                PlanExercise::new("Bench Press", 3, "8-12"),
                PlanExercise::new("Dips", 0, "max"),
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_from_plan_blank_sets() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::from_plan(&push_day(&db));

        assert_eq!(session.plan_title(), "Push Day");
        assert_eq!(session.exercises().len(), 2);
        assert_eq!(session.exercises()[0].sets, vec![SetEntry::default(); 3]);
        assert!(session.exercises()[1].sets.is_empty());
    }

    #[test]
    fn test_record_and_add_sets() {
        let db = Database::open_in_memory().unwrap();
        let mut session = Session::from_plan(&push_day(&db));

        session.record_set(0, 1, "135", "8").unwrap();
        let idx = session.add_set(1).unwrap();
        session.record_set(1, idx, "0", "12").unwrap();
        let extra = session.add_exercise("Cable Fly");

        assert_eq!(session.exercises()[0].sets[1], SetEntry::new("135", "8"));
        assert_eq!(session.exercises()[1].sets, vec![SetEntry::new("0", "12")]);
        assert_eq!(session.exercises()[extra].name, "Cable Fly");
    }

    #[test]
    fn test_record_set_out_of_range() {
        let db = Database::open_in_memory().unwrap();
        let mut session = Session::from_plan(&push_day(&db));

        assert!(matches!(session.record_set(5, 0, "1", "1"), Err(Error::Validation(_))));
        assert!(matches!(session.record_set(0, 3, "1", "1"), Err(Error::Validation(_))));
        assert!(matches!(session.add_set(9), Err(Error::Validation(_))));
    }

    #[test]
    fn test_complete_session_logs_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let backup_path = dir.path().join("backup.json");
        let db = Database::open_in_memory().unwrap();
        let plan = push_day(&db);

        let mut session = Session::from_plan(&plan);
        session.record_set(0, 0, "135", "8").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 18, 30, 0).unwrap();

        let mut backup = BackupManager::new(LocalFileHost::new(Some(backup_path.clone()), dir.path()));
        let (log, outcome) = complete_session(&db, &mut backup, session, at).unwrap();

        assert_eq!(log.plan_title, "Push Day");
        assert_eq!(log.date, at);
        assert_eq!(outcome, ExportOutcome::Written(backup_path.clone()));

        let saved = decode(&std::fs::read(&backup_path).unwrap()).unwrap();
        assert_eq!(saved, db.export_snapshot().unwrap());
    }

    #[test]
    fn test_push_day_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_in_memory().unwrap();
        let plan = db
            .create_plan(NewPlan {
                title: "Push Day".to_string(),
                exercises: vec![PlanExercise::new("Bench Press", 3, "8-12")],
            })
            .unwrap();

        let mut session = Session::from_plan(&plan);
        session.record_set(0, 0, "135", "8").unwrap();
        let mut backup = BackupManager::new(LocalFileHost::new(None, dir.path()));
        complete_session(&db, &mut backup, session, Utc::now()).unwrap();

        let logs = db.list_logs().unwrap();
        let values: Vec<_> = exercise_series(&logs, "Bench Press", Metric::Weight)
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(values, vec![135.0]);

        db.reset_all().unwrap();
        assert!(db.list_plans().unwrap().is_empty());
        assert!(db.list_logs().unwrap().is_empty());
        assert!(db.list_exercises().unwrap().is_empty());
    }
}
