use crate::simulation::error::{Invariant, InvalidPlanError, MutationError, StructuralError};
use crate::simulation::policy::{Absorber, InterventionPolicy};
use crate::simulation::population::plan::{Activity, ElementKind, LegSide, Plan, PlanElement};
use tracing::debug;

/// Decides which neighbour takes over the time an activity frees or claims. Implementations only
/// touch the elements next to the targeted activity and return a new plan; the caller validates it.
pub trait AbsorptionStrategy: Send + Sync {
    /// Removes the activity at `index` and hands its time to a neighbour.
    fn remove(
        &self,
        plan: &Plan,
        index: usize,
        policy: &InterventionPolicy,
    ) -> Result<Plan, MutationError>;

    /// Changes the duration of the activity at `index` by `delta` seconds, a neighbour gives or
    /// takes the difference.
    fn resize(
        &self,
        plan: &Plan,
        index: usize,
        delta: i64,
        policy: &InterventionPolicy,
    ) -> Result<Plan, MutationError>;
}

/// Repairs only the directly adjacent activity. A removed activity in the middle of the day goes to
/// the preceding activity if that one has the fallback purpose, otherwise the following activity is
/// pulled backwards. Neighbours that end up next to each other at the same place for the same
/// purpose are merged.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdjacentAbsorption;

impl AbsorptionStrategy for AdjacentAbsorption {
    fn remove(
        &self,
        plan: &Plan,
        index: usize,
        policy: &InterventionPolicy,
    ) -> Result<Plan, MutationError> {
        let removed = activity(plan, index)?;
        let previous = plan.previous_activity_index(index);
        let next = plan.next_activity_index(index);

        let (plan, merge_left) = match (previous, next) {
            (Some(prev), Some(next)) => {
                let before = activity(plan, prev)?;
                if before.act_type == policy.fallback_absorber {
                    let extended = with_times(before, before.start_time, removed.end_time);
                    let plan = plan
                        .replace(prev, extended.into())?
                        .remove_with(index, LegSide::Preceding)?;
                    (plan, Some(prev))
                } else {
                    let after = activity(plan, next)?;
                    let extended = with_times(after, removed.start_time, after.end_time);
                    let plan = plan
                        .replace(next, extended.into())?
                        .remove_with(index, LegSide::Following)?;
                    (plan, Some(prev))
                }
            }
            // first activity of the day, the next one starts when the removed one did
            (None, Some(next)) => {
                let after = activity(plan, next)?;
                let extended = with_times(after, removed.start_time, after.end_time);
                let plan = plan
                    .replace(next, extended.into())?
                    .remove_with(index, LegSide::Following)?;
                (plan, None)
            }
            (Some(prev), None) => {
                let before = activity(plan, prev)?;
                let extended = with_times(before, before.start_time, removed.end_time);
                let plan = plan
                    .replace(prev, extended.into())?
                    .remove_with(index, LegSide::Preceding)?;
                (plan, None)
            }
            (None, None) => return Err(StructuralError::LastActivity { index }.into()),
        };

        match merge_left {
            Some(left) => Ok(merge_neighbours(plan, left)?),
            None => Ok(plan),
        }
    }

    fn resize(
        &self,
        plan: &Plan,
        index: usize,
        delta: i64,
        policy: &InterventionPolicy,
    ) -> Result<Plan, MutationError> {
        let target = activity(plan, index)?;
        let Some((neighbour, side)) = choose_absorber(plan, index, policy) else {
            debug!(index, "no neighbour to absorb resize, leaving activity as is");
            return Ok(plan.clone());
        };
        let other = activity(plan, neighbour)?;

        check_duration(target, delta, index)?;
        check_duration(other, -delta, neighbour)?;

        let mut elements = plan.elements().to_vec();
        match side {
            LegSide::Following => {
                let end = shift(target.end_time, delta, index)?;
                elements[index] = with_times(target, target.start_time, end).into();
                shift_leg(&mut elements, index + 1, delta)?;
                let start = shift(other.start_time, delta, neighbour)?;
                elements[neighbour] = with_times(other, start, other.end_time).into();
            }
            LegSide::Preceding => {
                let start = shift(target.start_time, -delta, index)?;
                elements[index] = with_times(target, start, target.end_time).into();
                shift_leg(&mut elements, index - 1, -delta)?;
                let end = shift(other.end_time, -delta, neighbour)?;
                elements[neighbour] = with_times(other, other.start_time, end).into();
            }
        }
        Ok(Plan::from_elements(elements))
    }
}

/// Picks the neighbouring activity that absorbs a resize. Preferred sides fall back to the other
/// side at the ends of the plan. `None` for a plan with a single activity.
fn choose_absorber(
    plan: &Plan,
    index: usize,
    policy: &InterventionPolicy,
) -> Option<(usize, LegSide)> {
    let previous = plan
        .previous_activity_index(index)
        .map(|i| (i, LegSide::Preceding));
    let next = plan
        .next_activity_index(index)
        .map(|i| (i, LegSide::Following));

    match policy.absorber {
        Absorber::Following => next.or(previous),
        Absorber::Preceding => previous.or(next),
        Absorber::StayAtHome => {
            let is_fallback = |candidate: &(usize, LegSide)| {
                plan.activity_at(candidate.0)
                    .is_some_and(|a| a.act_type == policy.fallback_absorber)
            };
            next.filter(is_fallback)
                .or(previous.filter(is_fallback))
                .or(next)
                .or(previous)
        }
    }
}

/// Merges the activities at `left` and `left + 2` if they share purpose and location. The merged
/// activity covers both and the leg in between.
fn merge_neighbours(plan: Plan, left: usize) -> Result<Plan, StructuralError> {
    let (Some(first), Some(second)) = (plan.activity_at(left), plan.activity_at(left + 2)) else {
        return Ok(plan);
    };
    if !first.is_mergeable_with(second) {
        return Ok(plan);
    }
    debug!(index = left, act_type = first.act_type.as_str(), "merging neighbours");
    let merged = with_times(first, first.start_time, second.end_time);
    plan.replace(left, merged.into())?
        .remove_with(left + 2, LegSide::Preceding)
}

fn activity(plan: &Plan, index: usize) -> Result<&Activity, StructuralError> {
    match plan.element_at(index) {
        Some(PlanElement::Activity(a)) => Ok(a),
        Some(other) => Err(StructuralError::KindMismatch {
            index,
            expected: ElementKind::Activity,
            found: other.kind(),
        }),
        None => Err(StructuralError::IndexOutOfBounds {
            index,
            len: plan.len(),
        }),
    }
}

fn with_times(activity: &Activity, start_time: u32, end_time: u32) -> Activity {
    Activity {
        start_time,
        end_time,
        ..activity.clone()
    }
}

fn check_duration(activity: &Activity, delta: i64, index: usize) -> Result<(), InvalidPlanError> {
    let duration = i64::from(activity.end_time) - i64::from(activity.start_time) + delta;
    if duration <= 0 {
        return Err(InvalidPlanError::new(
            Invariant::PositiveDuration,
            index,
            format!(
                "{} of {}s changed by {delta}s leaves {duration}s",
                activity.act_type,
                activity.duration()
            ),
        ));
    }
    Ok(())
}

fn shift(time: u32, delta: i64, index: usize) -> Result<u32, InvalidPlanError> {
    u32::try_from(i64::from(time) + delta).map_err(|_| {
        InvalidPlanError::new(
            Invariant::DaySpan,
            index,
            format!("shifting {time}s by {delta}s leaves the representable day"),
        )
    })
}

fn shift_leg(elements: &mut [PlanElement], index: usize, delta: i64) -> Result<(), InvalidPlanError> {
    if let Some(PlanElement::Leg(leg)) = elements.get_mut(index) {
        leg.start_time = shift(leg.start_time, delta, index)?;
        leg.end_time = shift(leg.end_time, delta, index)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::policy::{InterventionMode, InterventionPolicyBuilder};
    use crate::simulation::population::plan::Leg;

    const H: u32 = 3600;

    fn policy(target: &str, absorber: Absorber) -> InterventionPolicy {
        InterventionPolicyBuilder::default()
            .name("p")
            .target(target)
            .probability(1.0)
            .mode(InterventionMode::Remove)
            .absorber(absorber)
            .build()
            .unwrap()
    }

    fn plan(acts: &[(&str, &str, u32, u32)]) -> Plan {
        let mut plan = Plan::new();
        for (i, (act_type, location, start, end)) in acts.iter().enumerate() {
            if i > 0 {
                let previous_end = acts[i - 1].3;
                plan.add_leg(Leg::new("walk", previous_end, *start));
            }
            plan.add_act(Activity::new(act_type, location, *start, *end));
        }
        plan
    }

    #[test]
    fn remove_middle_goes_to_fallback_predecessor_and_merges() {
        let p = plan(&[
            ("home", "h", 0, 8 * H),
            ("education", "e", 8 * H, 15 * H),
            ("home", "h", 15 * H, 24 * H),
        ]);
        let result = AdjacentAbsorption
            .remove(&p, 2, &policy("education", Absorber::StayAtHome))
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result.activity_at(0),
            Some(&Activity::new("home", "h", 0, 24 * H))
        );
    }

    #[test]
    fn remove_middle_without_fallback_predecessor_extends_follower() {
        let p = plan(&[
            ("home", "h", 0, 8 * H),
            ("work", "w", 8 * H + 600, 12 * H),
            ("shop", "s", 12 * H + 300, 13 * H),
            ("work", "w", 13 * H + 300, 17 * H),
            ("home", "h", 17 * H + 600, 24 * H),
        ]);
        let result = AdjacentAbsorption
            .remove(&p, 4, &policy("shop", Absorber::StayAtHome))
            .unwrap();
        // the second work block is pulled back to the start of shopping and then merged
        assert_eq!(result.activity_count(), 3);
        assert_eq!(
            result.activity_at(2),
            Some(&Activity::new("work", "w", 8 * H + 600, 17 * H))
        );
        assert_eq!(result.element_at(3).unwrap().start_time(), 17 * H);
    }

    #[test]
    fn remove_middle_keeps_different_locations_apart() {
        let p = plan(&[
            ("home", "h", 0, 8 * H),
            ("work", "w", 8 * H + 600, 12 * H),
            ("shop", "s", 12 * H + 300, 13 * H),
            ("work", "w2", 13 * H + 300, 17 * H),
            ("home", "h", 17 * H + 600, 24 * H),
        ]);
        let result = AdjacentAbsorption
            .remove(&p, 4, &policy("shop", Absorber::StayAtHome))
            .unwrap();
        assert_eq!(result.activity_count(), 4);
        // leg from the first work block now ends where shopping began
        assert_eq!(result.element_at(3).unwrap().end_time(), 12 * H + 300);
        assert_eq!(
            result.activity_at(4),
            Some(&Activity::new("work", "w2", 12 * H + 300, 17 * H))
        );
    }

    #[test]
    fn remove_first_and_last() {
        let p = plan(&[
            ("work", "w", 0, 6 * H),
            ("home", "h", 6 * H + 900, 20 * H),
            ("leisure", "l", 20 * H + 900, 24 * H),
        ]);
        let first = AdjacentAbsorption
            .remove(&p, 0, &policy("work", Absorber::StayAtHome))
            .unwrap();
        assert_eq!(first.start_time(), Some(0));
        assert_eq!(first.activity_at(0), Some(&Activity::new("home", "h", 0, 20 * H)));

        let last = AdjacentAbsorption
            .remove(&p, 4, &policy("leisure", Absorber::StayAtHome))
            .unwrap();
        assert_eq!(last.end_time(), Some(24 * H));
        assert_eq!(
            last.activity_at(2),
            Some(&Activity::new("home", "h", 6 * H + 900, 24 * H))
        );
    }

    #[test]
    fn remove_only_activity_fails() {
        let p = plan(&[("home", "h", 0, 24 * H)]);
        let err = AdjacentAbsorption
            .remove(&p, 0, &policy("home", Absorber::StayAtHome))
            .unwrap_err();
        assert_eq!(
            err,
            MutationError::Structural(StructuralError::LastActivity { index: 0 })
        );
    }

    #[test]
    fn remove_leg_fails() {
        let p = plan(&[("home", "h", 0, 8 * H), ("work", "w", 8 * H, 24 * H)]);
        let err = AdjacentAbsorption
            .remove(&p, 1, &policy("work", Absorber::StayAtHome))
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Structural(StructuralError::KindMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn shrink_absorbed_by_trailing_home() {
        let p = plan(&[
            ("home", "h", 0, 9 * H),
            ("work", "w", 9 * H, 17 * H),
            ("home", "h", 17 * H, 24 * H),
        ]);
        let result = AdjacentAbsorption
            .resize(&p, 2, -2 * i64::from(H), &policy("work", Absorber::StayAtHome))
            .unwrap();
        let expected = plan(&[
            ("home", "h", 0, 9 * H),
            ("work", "w", 9 * H, 15 * H),
            ("home", "h", 15 * H, 24 * H),
        ]);
        assert_eq!(result, expected);
    }

    #[test]
    fn extend_absorbed_by_preceding() {
        let p = plan(&[
            ("home", "h", 0, 9 * H),
            ("work", "w", 9 * H + 600, 17 * H),
            ("shop", "s", 17 * H + 600, 24 * H),
        ]);
        let result = AdjacentAbsorption
            .resize(&p, 2, i64::from(H), &policy("work", Absorber::Preceding))
            .unwrap();
        assert_eq!(result.activity_at(0).unwrap().end_time, 8 * H);
        assert_eq!(result.element_at(1).unwrap().start_time(), 8 * H);
        assert_eq!(result.element_at(1).unwrap().end_time(), 8 * H + 600);
        assert_eq!(result.activity_at(2).unwrap().start_time, 8 * H + 600);
        assert_eq!(result.activity_at(2).unwrap().end_time, 17 * H);
    }

    #[test]
    fn stay_at_home_prefers_home_before_sides() {
        let p = plan(&[
            ("home", "h", 0, 8 * H),
            ("work", "w", 8 * H, 16 * H),
            ("shop", "s", 16 * H, 24 * H),
        ]);
        let choice = choose_absorber(&p, 2, &policy("work", Absorber::StayAtHome));
        assert_eq!(choice, Some((0, LegSide::Preceding)));

        let choice = choose_absorber(&p, 2, &policy("work", Absorber::Following));
        assert_eq!(choice, Some((4, LegSide::Following)));

        // no preceding activity, falls back to the following one
        let choice = choose_absorber(&p, 0, &policy("home", Absorber::Preceding));
        assert_eq!(choice, Some((2, LegSide::Following)));
    }

    #[test]
    fn resize_to_non_positive_duration_is_invalid() {
        let p = plan(&[("home", "h", 0, 9 * H), ("work", "w", 9 * H, 24 * H)]);
        let err = AdjacentAbsorption
            .resize(&p, 2, -15 * i64::from(H), &policy("work", Absorber::StayAtHome))
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Invalid(InvalidPlanError {
                invariant: Invariant::PositiveDuration,
                index: 2,
                ..
            })
        ));

        // growing work by more than home can give
        let err = AdjacentAbsorption
            .resize(&p, 2, 9 * i64::from(H), &policy("work", Absorber::StayAtHome))
            .unwrap_err();
        assert!(matches!(
            err,
            MutationError::Invalid(InvalidPlanError { index: 0, .. })
        ));
    }

    #[test]
    fn resize_single_activity_is_noop() {
        let p = plan(&[("home", "h", 0, 24 * H)]);
        let result = AdjacentAbsorption
            .resize(&p, 0, 3600, &policy("home", Absorber::StayAtHome))
            .unwrap();
        assert_eq!(result, p);
    }
}
