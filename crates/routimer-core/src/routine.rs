//! Routine definitions.
//!
//! A routine is the user-authored description of an interval workout. The
//! timer never mutates it; it only reads the four timing parameters and
//! the display name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    /// Seconds of preparation before the first set. 0 skips the step.
    #[serde(default)]
    pub preparation_secs: u64,
    /// Seconds of work per set. Must be positive.
    pub work_secs: u64,
    /// Number of work sets. At least one.
    pub sets: u32,
    /// Seconds of rest between sets. 0 skips rest steps.
    #[serde(default)]
    pub rest_secs: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

/// Parameters needed to create a routine; id and timestamps are assigned on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoutine {
    pub name: String,
    #[serde(default)]
    pub preparation_secs: u64,
    pub work_secs: u64,
    pub sets: u32,
    #[serde(default)]
    pub rest_secs: u64,
}

impl NewRoutine {
    /// Check the timing invariants: `work_secs > 0`, `sets >= 1`, non-empty name.
    pub fn validate(&self) -> Result<()> {
        validate_parts(&self.name, self.work_secs, self.sets)
    }

    pub fn into_routine(self) -> Routine {
        Routine {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            preparation_secs: self.preparation_secs,
            work_secs: self.work_secs,
            sets: self.sets,
            rest_secs: self.rest_secs,
            created_at: Utc::now(),
            last_used: None,
        }
    }
}

impl Routine {
    pub fn validate(&self) -> Result<()> {
        validate_parts(&self.name, self.work_secs, self.sets)
    }
}

fn validate_parts(name: &str, work_secs: u64, sets: u32) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "name".into(),
            message: "must not be empty".into(),
        }
        .into());
    }
    if work_secs == 0 {
        return Err(ValidationError::InvalidValue {
            field: "work_secs".into(),
            message: "must be greater than 0".into(),
        }
        .into());
    }
    if sets == 0 {
        return Err(ValidationError::InvalidValue {
            field: "sets".into(),
            message: "must be at least 1".into(),
        }
        .into());
    }
    Ok(())
}

/// One entry of the usage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineUsage {
    pub routine_id: String,
    pub routine_name: String,
    pub used_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn new_routine(work_secs: u64, sets: u32) -> NewRoutine {
        NewRoutine {
            name: "Stretch".into(),
            preparation_secs: 5,
            work_secs,
            sets,
            rest_secs: 10,
        }
    }

    #[test]
    fn valid_routine_passes() {
        assert!(new_routine(30, 3).validate().is_ok());
    }

    #[test]
    fn zero_work_is_rejected() {
        let err = new_routine(0, 3).validate().unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidValue { ref field, .. }) if field == "work_secs"
        ));
    }

    #[test]
    fn zero_sets_is_rejected() {
        assert!(new_routine(30, 0).validate().is_err());
    }

    #[test]
    fn into_routine_assigns_id() {
        let a = new_routine(30, 1).into_routine();
        let b = new_routine(30, 1).into_routine();
        assert_ne!(a.id, b.id);
        assert!(a.last_used.is_none());
    }
}
