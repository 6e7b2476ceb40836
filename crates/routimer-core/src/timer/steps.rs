use serde::{Deserialize, Serialize};

use crate::routine::Routine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Preparation,
    Work,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_type: StepType,
    pub label: String,
    /// Duration in seconds.
    pub duration_secs: u64,
}

impl Step {
    fn new(step_type: StepType, label: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            step_type,
            label: label.into(),
            duration_secs,
        }
    }
}

/// Expand a routine into its ordered timeline.
///
/// Optional preparation first, then each work set, with a rest step between
/// sets (never after the last one). Never empty for a valid routine.
pub fn generate_steps(routine: &Routine) -> Vec<Step> {
    let sets = routine.sets as usize;
    let mut steps = Vec::with_capacity(1 + sets * 2);

    if routine.preparation_secs > 0 {
        steps.push(Step::new(
            StepType::Preparation,
            "Preparation",
            routine.preparation_secs,
        ));
    }

    for i in 1..=sets {
        steps.push(Step::new(StepType::Work, format!("Work {i}"), routine.work_secs));
        if i < sets && routine.rest_secs > 0 {
            steps.push(Step::new(StepType::Rest, format!("Rest {i}"), routine.rest_secs));
        }
    }

    steps
}

/// The immutable timeline of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub steps: Vec<Step>,
}

impl Schedule {
    pub fn from_routine(routine: &Routine) -> Self {
        Self {
            steps: generate_steps(routine),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.steps.iter().map(|s| s.duration_secs).sum()
    }

    pub fn work_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.step_type == StepType::Work)
            .count()
    }

    /// Cumulative seconds up to (but not including) `step_index`.
    pub fn cumulative_secs(&self, step_index: usize) -> u64 {
        self.steps
            .iter()
            .take(step_index)
            .map(|s| s.duration_secs)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn routine(preparation_secs: u64, work_secs: u64, sets: u32, rest_secs: u64) -> Routine {
        Routine {
            id: "r1".into(),
            name: "Test".into(),
            preparation_secs,
            work_secs,
            sets,
            rest_secs,
            created_at: Utc::now(),
            last_used: None,
        }
    }

    fn labels(steps: &[Step]) -> Vec<(&str, u64)> {
        steps.iter().map(|s| (s.label.as_str(), s.duration_secs)).collect()
    }

    #[test]
    fn full_routine_expands_in_order() {
        let steps = generate_steps(&routine(10, 30, 3, 15));
        assert_eq!(
            labels(&steps),
            vec![
                ("Preparation", 10),
                ("Work 1", 30),
                ("Rest 1", 15),
                ("Work 2", 30),
                ("Rest 2", 15),
                ("Work 3", 30),
            ]
        );
    }

    #[test]
    fn single_set_without_prep_is_one_work_step() {
        let steps = generate_steps(&routine(0, 20, 1, 10));
        assert_eq!(labels(&steps), vec![("Work 1", 20)]);
    }

    #[test]
    fn zero_rest_omits_rest_steps() {
        let steps = generate_steps(&routine(0, 20, 3, 0));
        assert!(steps.iter().all(|s| s.step_type == StepType::Work));
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn schedule_totals() {
        let schedule = Schedule::from_routine(&routine(10, 30, 3, 15));
        assert_eq!(schedule.total_duration_secs(), 10 + 30 * 3 + 15 * 2);
        assert_eq!(schedule.work_count(), 3);
        assert_eq!(schedule.cumulative_secs(2), 40);
    }

    proptest! {
        #[test]
        fn step_count_matches_formula(
            prep in 0u64..100,
            work in 1u64..600,
            sets in 1u32..50,
            rest in 0u64..100,
        ) {
            let steps = generate_steps(&routine(prep, work, sets, rest));
            let expected = usize::from(prep > 0)
                + sets as usize
                + if rest > 0 { sets as usize - 1 } else { 0 };
            prop_assert_eq!(steps.len(), expected);
            prop_assert_eq!(steps.last().map(|s| s.step_type), Some(StepType::Work));
        }
    }
}
