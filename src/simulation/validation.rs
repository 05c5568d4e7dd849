use crate::simulation::config::Validation;
use crate::simulation::error::{Invariant, InvalidPlanError};
use crate::simulation::population::plan::{ElementKind, Plan, PlanElement};
use crate::simulation::population::time::format_time;
use tracing::trace;

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    /// Boundaries were off by no more than epsilon and have been nudged into place.
    Repaired(Plan),
}

/// Checks a plan against the plan invariants, in this order: alternation, contiguity, day span,
/// positive activity durations and non-emptiness. Gaps and overlaps of at most `epsilon` seconds are
/// nudged away; anything larger is an [`InvalidPlanError`] naming the element and the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanValidator {
    day_start: u32,
    day_end: u32,
    epsilon: u32,
}

impl Default for PlanValidator {
    fn default() -> Self {
        PlanValidator::from(&Validation::default())
    }
}

impl From<&Validation> for PlanValidator {
    fn from(config: &Validation) -> Self {
        PlanValidator {
            day_start: config.day_start,
            day_end: config.day_start.saturating_add(config.day_length),
            epsilon: config.epsilon,
        }
    }
}

impl PlanValidator {
    pub fn new(day_start: u32, day_length: u32, epsilon: u32) -> Self {
        PlanValidator {
            day_start,
            day_end: day_start.saturating_add(day_length),
            epsilon,
        }
    }

    pub fn day_start(&self) -> u32 {
        self.day_start
    }

    pub fn day_end(&self) -> u32 {
        self.day_end
    }

    pub fn day_length(&self) -> u32 {
        self.day_end - self.day_start
    }

    pub fn validate(&self, plan: &Plan) -> Result<ValidationOutcome, InvalidPlanError> {
        check_alternation(plan.elements())?;

        let mut repaired: Option<Plan> = None;
        self.check_contiguity(plan, &mut repaired)?;
        self.check_day_span(plan, &mut repaired)?;

        let checked = repaired.as_ref().unwrap_or(plan);
        check_durations(checked.elements())?;
        if checked.is_empty() {
            return Err(InvalidPlanError::new(
                Invariant::NonEmpty,
                0,
                "plan has no activities",
            ));
        }

        Ok(match repaired {
            Some(plan) => ValidationOutcome::Repaired(plan),
            None => ValidationOutcome::Valid,
        })
    }

    /// Validates and returns the plan to continue with: the input if it was valid, or its repaired
    /// version.
    pub fn validate_owned(&self, plan: Plan) -> Result<Plan, InvalidPlanError> {
        match self.validate(&plan)? {
            ValidationOutcome::Valid => Ok(plan),
            ValidationOutcome::Repaired(repaired) => Ok(repaired),
        }
    }

    fn check_contiguity(&self, plan: &Plan, repaired: &mut Option<Plan>) -> Result<(), InvalidPlanError> {
        for index in 1..plan.len() {
            let current = repaired.as_ref().unwrap_or(plan);
            let previous_end = current.elements()[index - 1].end_time();
            let start = current.elements()[index].start_time();
            if previous_end == start {
                continue;
            }
            let deviation = previous_end.abs_diff(start);
            if deviation > self.epsilon {
                let what = if start > previous_end { "gap" } else { "overlap" };
                return Err(InvalidPlanError::new(
                    Invariant::Contiguity,
                    index,
                    format!(
                        "{what} of {deviation}s between {} and {}",
                        format_time(previous_end),
                        format_time(start)
                    ),
                ));
            }
            trace!(index, deviation, "nudging start to close gap");
            repaired.get_or_insert_with(|| plan.clone()).elements_mut()[index]
                .set_start_time(previous_end);
        }
        Ok(())
    }

    fn check_day_span(&self, plan: &Plan, repaired: &mut Option<Plan>) -> Result<(), InvalidPlanError> {
        let current = repaired.as_ref().unwrap_or(plan);
        let (Some(start), Some(end)) = (current.start_time(), current.end_time()) else {
            return Ok(());
        };
        let last = current.len() - 1;

        if start != self.day_start {
            let deviation = start.abs_diff(self.day_start);
            if deviation > self.epsilon {
                return Err(InvalidPlanError::new(
                    Invariant::DaySpan,
                    0,
                    format!(
                        "plan starts at {}, expected {}",
                        format_time(start),
                        format_time(self.day_start)
                    ),
                ));
            }
            repaired.get_or_insert_with(|| plan.clone()).elements_mut()[0]
                .set_start_time(self.day_start);
        }

        if end != self.day_end {
            let deviation = end.abs_diff(self.day_end);
            if deviation > self.epsilon {
                return Err(InvalidPlanError::new(
                    Invariant::DaySpan,
                    last,
                    format!(
                        "plan ends at {}, expected {}",
                        format_time(end),
                        format_time(self.day_end)
                    ),
                ));
            }
            repaired.get_or_insert_with(|| plan.clone()).elements_mut()[last]
                .set_end_time(self.day_end);
        }
        Ok(())
    }
}

fn check_alternation(elements: &[PlanElement]) -> Result<(), InvalidPlanError> {
    for (index, element) in elements.iter().enumerate() {
        let expected = if index % 2 == 0 {
            ElementKind::Activity
        } else {
            ElementKind::Leg
        };
        if element.kind() != expected {
            return Err(InvalidPlanError::new(
                Invariant::Alternation,
                index,
                format!("found {}, expected {expected}", element.kind()),
            ));
        }
    }
    if elements.len() % 2 == 0 && !elements.is_empty() {
        return Err(InvalidPlanError::new(
            Invariant::Alternation,
            elements.len() - 1,
            "plan ends with a leg",
        ));
    }
    Ok(())
}

/// Activities need a positive duration, legs may take no time at all.
fn check_durations(elements: &[PlanElement]) -> Result<(), InvalidPlanError> {
    for (index, element) in elements.iter().enumerate() {
        let (start, end) = (element.start_time(), element.end_time());
        let valid = match element {
            PlanElement::Activity(_) => end > start,
            PlanElement::Leg(_) => end >= start,
        };
        if !valid {
            return Err(InvalidPlanError::new(
                Invariant::PositiveDuration,
                index,
                format!(
                    "{} runs from {} to {}",
                    element.kind(),
                    format_time(start),
                    format_time(end)
                ),
            ));
        }
    }
    Ok(())
}
