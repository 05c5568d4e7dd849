use crate::simulation::error::{Invariant, InvalidPlanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A person whose mutated plan failed validation and who kept the original plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidPlanRecord {
    pub person_id: String,
    pub invariant: Invariant,
    pub index: usize,
    pub detail: String,
}

impl InvalidPlanRecord {
    pub fn new(person_id: &str, error: InvalidPlanError) -> Self {
        InvalidPlanRecord {
            person_id: person_id.to_string(),
            invariant: error.invariant,
            index: error.index,
            detail: error.detail,
        }
    }
}

/// End of run report. Invalid plans are recovered per person but always show up here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub persons: usize,
    pub processed: usize,
    pub mutated: usize,
    pub unchanged: usize,
    /// Decisions that changed a plan.
    pub decisions: usize,
    /// Decisions that were dropped, because their activity was already gone or was the last one.
    pub skipped_decisions: usize,
    /// Persons left untouched because the run was cancelled.
    pub skipped: usize,
    pub invalid: Vec<InvalidPlanRecord>,
    pub invalid_by_invariant: BTreeMap<Invariant, usize>,
    /// Mean normalised edit distance between original and final plans of processed persons.
    pub mean_plan_distance: f64,
    #[serde(skip)]
    pub(crate) distance_sum: f64,
}

impl RunSummary {
    pub(crate) fn record_invalid(&mut self, person_id: &str, error: InvalidPlanError) {
        *self.invalid_by_invariant.entry(error.invariant).or_default() += 1;
        self.invalid.push(InvalidPlanRecord::new(person_id, error));
    }

    pub(crate) fn add_distance(&mut self, distance: f64) {
        self.distance_sum += distance;
    }

    /// Folds the summary of another worker into this one. Records are appended in call order, so
    /// merging chunk summaries in population order keeps the records in population order.
    pub(crate) fn merge(&mut self, other: RunSummary) {
        self.persons += other.persons;
        self.processed += other.processed;
        self.mutated += other.mutated;
        self.unchanged += other.unchanged;
        self.decisions += other.decisions;
        self.skipped_decisions += other.skipped_decisions;
        self.skipped += other.skipped;
        self.invalid.extend(other.invalid);
        for (invariant, count) in other.invalid_by_invariant {
            *self.invalid_by_invariant.entry(invariant).or_default() += count;
        }
        self.distance_sum += other.distance_sum;
    }

    pub(crate) fn finish(&mut self) {
        self.mean_plan_distance = if self.processed == 0 {
            0.
        } else {
            self.distance_sum / self.processed as f64
        };
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid.len()
    }
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} persons: {} processed, {} mutated, {} unchanged, {} invalid, {} skipped. {} decisions applied, {} dropped. Mean plan distance {:.4}",
            self.persons,
            self.processed,
            self.mutated,
            self.unchanged,
            self.invalid.len(),
            self.skipped,
            self.decisions,
            self.skipped_decisions,
            self.mean_plan_distance
        )
    }
}
