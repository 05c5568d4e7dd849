use crate::simulation::error::MutationError;
use crate::simulation::plan_modification::absorption::{AbsorptionStrategy, AdjacentAbsorption};
use crate::simulation::policy::{InterventionDecision, InterventionMode};
use crate::simulation::population::plan::Plan;
use crate::simulation::validation::PlanValidator;
use derive_more::Debug;
use std::cmp::Reverse;
use tracing::debug;

/// Result of a successful [`PlanModifier::apply_counted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub plan: Plan,
    pub applied: usize,
    pub skipped: usize,
}

/// Turns intervention decisions into a new plan.
///
/// Decisions are applied rightmost first, so positions of decisions not yet applied stay valid.
/// Each decision is repaired locally by the absorption strategy and the next one works on the
/// repaired plan, which lets decisions on adjacent activities cascade within one call. The final plan
/// is run through the validator. Any error discards the whole mutation; the input plan is never
/// touched.
#[derive(Debug)]
pub struct PlanModifier {
    #[debug(skip)]
    strategy: Box<dyn AbsorptionStrategy>,
    validator: PlanValidator,
}

impl Default for PlanModifier {
    fn default() -> Self {
        PlanModifier::new(PlanValidator::default())
    }
}

impl PlanModifier {
    pub fn new(validator: PlanValidator) -> Self {
        Self::with_strategy(validator, Box::new(AdjacentAbsorption))
    }

    pub fn with_strategy(validator: PlanValidator, strategy: Box<dyn AbsorptionStrategy>) -> Self {
        PlanModifier {
            strategy,
            validator,
        }
    }

    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    pub fn apply(
        &self,
        plan: &Plan,
        decisions: &[InterventionDecision],
    ) -> Result<Plan, MutationError> {
        self.apply_counted(plan, decisions).map(|m| m.plan)
    }

    /// Like [`PlanModifier::apply`], but also reports how many decisions were applied and how many
    /// were skipped. A decision is skipped if its activity was already removed by an earlier
    /// decision, or if removing it would leave the plan without any activity.
    pub fn apply_counted(
        &self,
        plan: &Plan,
        decisions: &[InterventionDecision],
    ) -> Result<Modification, MutationError> {
        if decisions.is_empty() {
            return Ok(Modification {
                plan: plan.clone(),
                applied: 0,
                skipped: 0,
            });
        }

        // stable sort, decisions on the same activity stay in policy order
        let mut ordered = decisions.to_vec();
        ordered.sort_by_key(|d| Reverse(d.activity_index));

        let mut current = plan.clone();
        let mut removed: Option<usize> = None;
        let mut applied = 0;
        let mut skipped = 0;

        for decision in ordered {
            let index = decision.activity_index;
            let policy = decision.policy;
            if removed == Some(index) {
                debug!(index, policy = policy.name.as_str(), "activity already removed");
                skipped += 1;
                continue;
            }

            current = match policy.mode {
                InterventionMode::Remove => {
                    if current.activity_count() <= 1 {
                        debug!(index, policy = policy.name.as_str(), "not removing the last activity");
                        skipped += 1;
                        continue;
                    }
                    removed = Some(index);
                    self.strategy.remove(&current, index, policy)?
                }
                InterventionMode::Resize { delta } => {
                    self.strategy.resize(&current, index, delta, policy)?
                }
            };
            applied += 1;
        }

        let plan = self.validator.validate_owned(current)?;
        Ok(Modification {
            plan,
            applied,
            skipped,
        })
    }
}
