//! CSV import of set history
//!
//! One row per set. Recognised columns (case and separator insensitive,
//! common aliases accepted): `date`, `exercise`, `weight`, `reps`,
//! `completed` (optional, defaults to true) and `muscle_group` (optional,
//! required only to build a completed workout).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ImportError, LiftRsError, Result};
use crate::models::{CompletedWorkout, MuscleGroup, SetRecord, WorkoutSet};

/// One parsed CSV row
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSet {
    pub exercise_id: String,
    pub session_date: NaiveDate,
    pub weight: f64,
    pub reps: u32,
    pub completed: bool,
    pub muscle_group: Option<MuscleGroup>,
}

impl ImportedSet {
    pub fn to_record(&self) -> SetRecord {
        SetRecord {
            exercise_id: self.exercise_id.clone(),
            session_date: self.session_date,
            weight: self.weight,
            reps: self.reps,
            completed: self.completed,
        }
    }
}

/// CSV importer with flexible column mapping
pub struct SetCsvImporter {
    column_mapping: HashMap<String, String>,
}

impl SetCsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "date", &["date", "session_date", "day", "performed_at"]);
        Self::add_mapping(&mut column_mapping, "exercise", &["exercise", "exercise_id", "lift", "movement"]);
        Self::add_mapping(&mut column_mapping, "weight", &["weight", "weight_kg", "load", "kg"]);
        Self::add_mapping(&mut column_mapping, "reps", &["reps", "repetitions", "rep_count"]);
        Self::add_mapping(&mut column_mapping, "completed", &["completed", "is_completed", "done"]);
        Self::add_mapping(&mut column_mapping, "muscle_group", &["muscle_group", "muscle", "body_part"]);

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_date(value: &str) -> Option<NaiveDate> {
        let value = value.trim();

        for format in ["%Y-%m-%d", "%Y/%m/%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(value, format) {
                return Some(date);
            }
        }

        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%SZ"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(dt.date());
            }
        }

        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    }

    fn parse_completed(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "" | "true" | "1" | "yes" | "y" => Some(true),
            "false" | "0" | "no" | "n" => Some(false),
            _ => None,
        }
    }

    /// Import every set from a CSV file
    pub fn import_file(&self, path: &Path) -> Result<Vec<ImportedSet>> {
        if !path.exists() {
            return Err(ImportError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let sets = self.import_reader(File::open(path)?)?;
        if sets.is_empty() {
            return Err(ImportError::Empty {
                path: path.to_path_buf(),
            }
            .into());
        }

        info!(path = %path.display(), sets = sets.len(), "Imported set history");
        Ok(sets)
    }

    /// Import sets from any CSV source with a header row
    pub fn import_reader<R: Read>(&self, reader: R) -> Result<Vec<ImportedSet>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| parse_error(1, e.to_string()))?
            .iter()
            .map(|h| self.normalize_column_name(h))
            .collect();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let date_col = column("date").ok_or_else(|| parse_error(1, "missing date column"))?;
        let exercise_col =
            column("exercise").ok_or_else(|| parse_error(1, "missing exercise column"))?;
        let reps_col = column("reps").ok_or_else(|| parse_error(1, "missing reps column"))?;
        let weight_col = column("weight");
        let completed_col = column("completed");
        let muscle_col = column("muscle_group");

        let mut sets = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                parse_error(line, e.to_string())
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.iter().all(|field| field.is_empty()) {
                debug!(line, "Skipping blank row");
                continue;
            }

            sets.push(Self::parse_row(
                &record,
                line,
                date_col,
                exercise_col,
                reps_col,
                weight_col,
                completed_col,
                muscle_col,
            )?);
        }

        Ok(sets)
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_row(
        record: &StringRecord,
        line: u64,
        date_col: usize,
        exercise_col: usize,
        reps_col: usize,
        weight_col: Option<usize>,
        completed_col: Option<usize>,
        muscle_col: Option<usize>,
    ) -> Result<ImportedSet> {
        let field = |idx: usize| record.get(idx).unwrap_or("");
        let optional = |idx: Option<usize>| idx.map(field).unwrap_or("");

        let session_date = Self::parse_date(field(date_col))
            .ok_or_else(|| parse_error(line, format!("invalid date '{}'", field(date_col))))?;

        let exercise_id = field(exercise_col).to_string();
        if exercise_id.is_empty() {
            return Err(parse_error(line, "empty exercise"));
        }

        let reps = field(reps_col)
            .parse::<u32>()
            .map_err(|_| parse_error(line, format!("invalid reps '{}'", field(reps_col))))?;

        let weight_raw = optional(weight_col);
        let weight = if weight_raw.is_empty() {
            0.0
        } else {
            weight_raw
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite() && *w >= 0.0)
                .ok_or_else(|| parse_error(line, format!("invalid weight '{}'", weight_raw)))?
        };

        let completed_raw = optional(completed_col);
        let completed = Self::parse_completed(completed_raw)
            .ok_or_else(|| parse_error(line, format!("invalid completed flag '{}'", completed_raw)))?;

        let muscle_raw = optional(muscle_col);
        let muscle_group = if muscle_raw.is_empty() {
            None
        } else {
            Some(muscle_raw.parse::<MuscleGroup>().map_err(|e| parse_error(line, e))?)
        };

        Ok(ImportedSet {
            exercise_id,
            session_date,
            weight,
            reps,
            completed,
            muscle_group,
        })
    }

    /// Build a completed workout from imported rows
    ///
    /// Every row must name its muscle group.
    pub fn workout_from_sets(
        id: &str,
        completed_at: DateTime<Utc>,
        duration_minutes: u32,
        personal_records: u32,
        sets: &[ImportedSet],
    ) -> Result<CompletedWorkout> {
        let workout_date = completed_at.date_naive();
        let workout_sets = sets
            .iter()
            .map(|set| {
                if set.session_date != workout_date {
                    return Err(LiftRsError::Validation(format!(
                        "set of '{}' is dated {} but the workout was completed on {}",
                        set.exercise_id, set.session_date, workout_date
                    )));
                }
                let muscle_group = set.muscle_group.ok_or_else(|| {
                    LiftRsError::Validation(format!(
                        "set of '{}' has no muscle group",
                        set.exercise_id
                    ))
                })?;
                Ok(WorkoutSet {
                    exercise_id: set.exercise_id.clone(),
                    muscle_group,
                    weight: set.weight,
                    reps: set.reps,
                    completed: set.completed,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(CompletedWorkout {
            id: id.to_string(),
            completed_at,
            duration_minutes,
            personal_records,
            sets: workout_sets,
        })
    }
}

impl Default for SetCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_error(line: u64, reason: impl Into<String>) -> LiftRsError {
    ImportError::ParseError {
        line,
        reason: reason.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Date,Exercise,Weight KG,Reps,Done,Muscle
2024-04-01,bench_press,80,8,yes,chest
2024-04-01,bench_press,80,7,no,chest
2024-04-03,pull_up,,10,,back
";

    #[test]
    fn test_import_with_aliases() {
        let importer = SetCsvImporter::new();
        let sets = importer.import_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].exercise_id, "bench_press");
        assert_eq!(sets[0].weight, 80.0);
        assert_eq!(sets[0].muscle_group, Some(MuscleGroup::Chest));
        assert!(!sets[1].completed);
        assert_eq!(sets[2].weight, 0.0);
        assert!(sets[2].completed);
        assert_eq!(
            sets[2].to_record().session_date,
            NaiveDate::from_ymd_opt(2024, 4, 3).unwrap()
        );
    }

    #[test]
    fn test_bad_reps_reports_line() {
        let importer = SetCsvImporter::new();
        let err = importer
            .import_reader("date,exercise,weight,reps\n2024-04-01,squat,100,five\n".as_bytes())
            .unwrap_err();

        match err {
            LiftRsError::Import(ImportError::ParseError { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("five"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_required_column() {
        let importer = SetCsvImporter::new();
        let err = importer
            .import_reader("date,weight,reps\n2024-04-01,100,5\n".as_bytes())
            .unwrap_err();
        assert!(err.to_string().contains("missing exercise column"));
    }

    #[test]
    fn test_import_file_errors() {
        let importer = SetCsvImporter::new();
        let missing = importer.import_file(Path::new("/nonexistent/sets.csv"));
        assert!(matches!(
            missing,
            Err(LiftRsError::Import(ImportError::FileNotFound { .. }))
        ));

        let mut empty = NamedTempFile::new().unwrap();
        writeln!(empty, "date,exercise,weight,reps").unwrap();
        assert!(matches!(
            importer.import_file(empty.path()),
            Err(LiftRsError::Import(ImportError::Empty { .. }))
        ));
    }

    #[test]
    fn test_workout_from_sets_requires_muscle_group() {
        let importer = SetCsvImporter::new();
        let at = Utc.with_ymd_and_hms(2024, 4, 1, 19, 0, 0).unwrap();

        let sets = importer
            .import_reader(SAMPLE.replace("2024-04-03", "2024-04-01").as_bytes())
            .unwrap();
        let workout = SetCsvImporter::workout_from_sets("w1", at, 55, 0, &sets).unwrap();
        assert_eq!(workout.sets.len(), 3);
        assert_eq!(workout.sets[2].muscle_group, MuscleGroup::Back);

        let bare = importer
            .import_reader("date,exercise,reps\n2024-04-01,plank,1\n".as_bytes())
            .unwrap();
        assert!(matches!(
            SetCsvImporter::workout_from_sets("w2", at, 10, 0, &bare),
            Err(LiftRsError::Validation(_))
        ));
    }

    #[test]
    fn test_workout_from_sets_rejects_other_dates() {
        let sets = SetCsvImporter::new().import_reader(SAMPLE.as_bytes()).unwrap();

        let at = Utc.with_ymd_and_hms(2024, 4, 1, 19, 0, 0).unwrap();
        let err = SetCsvImporter::workout_from_sets("w1", at, 55, 0, &sets).unwrap_err();
        assert!(matches!(err, LiftRsError::Validation(_)));
        assert!(err.to_string().contains("2024-04-03"));

        let late = Utc.with_ymd_and_hms(2024, 4, 3, 7, 30, 0).unwrap();
        assert!(SetCsvImporter::workout_from_sets("w1", late, 55, 0, &sets).is_err());
    }
}
