use crate::simulation::error::StructuralError;
use crate::simulation::population::time::{format_time, time_format};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub act_type: String,
    pub location: String,
    #[serde(with = "time_format")]
    pub start_time: u32,
    #[serde(with = "time_format")]
    pub end_time: u32,
}

impl Activity {
    pub fn new(act_type: &str, location: &str, start_time: u32, end_time: u32) -> Self {
        Activity {
            act_type: act_type.to_string(),
            location: location.to_string(),
            start_time,
            end_time,
        }
    }

    pub fn duration(&self) -> u32 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Two activities can be merged into one if they happen at the same place for the same purpose.
    pub fn is_mergeable_with(&self, other: &Activity) -> bool {
        self.act_type == other.act_type && self.location == other.location
    }
}

/// A trip between two activities. The mode is carried along but never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub mode: String,
    #[serde(with = "time_format")]
    pub start_time: u32,
    #[serde(with = "time_format")]
    pub end_time: u32,
}

impl Leg {
    pub fn new(mode: &str, start_time: u32, end_time: u32) -> Self {
        Leg {
            mode: mode.to_string(),
            start_time,
            end_time,
        }
    }

    pub fn trav_time(&self) -> u32 {
        self.end_time.saturating_sub(self.start_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Activity,
    Leg,
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Activity => f.write_str("activity"),
            ElementKind::Leg => f.write_str("leg"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanElement {
    Activity(Activity),
    Leg(Leg),
}

impl PlanElement {
    pub fn kind(&self) -> ElementKind {
        match self {
            PlanElement::Activity(_) => ElementKind::Activity,
            PlanElement::Leg(_) => ElementKind::Leg,
        }
    }

    pub fn as_activity(&self) -> Option<&Activity> {
        if let PlanElement::Activity(act) = self {
            Some(act)
        } else {
            None
        }
    }

    pub fn as_leg(&self) -> Option<&Leg> {
        if let PlanElement::Leg(leg) = self {
            Some(leg)
        } else {
            None
        }
    }

    pub fn start_time(&self) -> u32 {
        match self {
            PlanElement::Activity(a) => a.start_time,
            PlanElement::Leg(l) => l.start_time,
        }
    }

    pub fn end_time(&self) -> u32 {
        match self {
            PlanElement::Activity(a) => a.end_time,
            PlanElement::Leg(l) => l.end_time,
        }
    }

    pub(crate) fn set_start_time(&mut self, time: u32) {
        match self {
            PlanElement::Activity(a) => a.start_time = time,
            PlanElement::Leg(l) => l.start_time = time,
        }
    }

    pub(crate) fn set_end_time(&mut self, time: u32) {
        match self {
            PlanElement::Activity(a) => a.end_time = time,
            PlanElement::Leg(l) => l.end_time = time,
        }
    }
}

impl From<Activity> for PlanElement {
    fn from(value: Activity) -> Self {
        PlanElement::Activity(value)
    }
}

impl From<Leg> for PlanElement {
    fn from(value: Leg) -> Self {
        PlanElement::Leg(value)
    }
}

/// Which of the two legs around an activity goes along with it when the activity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSide {
    Preceding,
    Following,
}

/// The day plan of one person: activities and legs, strictly alternating, beginning and ending with
/// an activity. Elements are addressed by position.
///
/// The structural operations [`Plan::remove`], [`Plan::insert`] and [`Plan::replace`] never modify
/// the plan they are called on. They either return a new plan that still alternates or fail with a
/// [`StructuralError`]. Timing is not looked at here, that is the job of the validator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan {
    elements: Vec<PlanElement>,
}

impl Plan {
    pub fn new() -> Self {
        Plan {
            elements: Vec::new(),
        }
    }

    /// Wraps elements without any checks. Feed the result through the validator before trusting it.
    pub fn from_elements(elements: Vec<PlanElement>) -> Self {
        Plan { elements }
    }

    pub fn add_act(&mut self, activity: Activity) {
        self.elements.push(PlanElement::Activity(activity));
    }

    pub fn add_leg(&mut self, leg: Leg) {
        self.elements.push(PlanElement::Leg(leg));
    }

    pub fn elements(&self) -> &[PlanElement] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<PlanElement> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element_at(&self, index: usize) -> Option<&PlanElement> {
        self.elements.get(index)
    }

    pub fn activity_at(&self, index: usize) -> Option<&Activity> {
        self.elements.get(index).and_then(PlanElement::as_activity)
    }

    pub fn acts(&self) -> impl Iterator<Item = &Activity> {
        self.elements.iter().filter_map(PlanElement::as_activity)
    }

    pub fn legs(&self) -> impl Iterator<Item = &Leg> {
        self.elements.iter().filter_map(PlanElement::as_leg)
    }

    pub fn activity_count(&self) -> usize {
        self.acts().count()
    }

    /// Positions of all activities in plan order.
    pub fn activity_indices(&self) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind() == ElementKind::Activity)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn previous_activity_index(&self, index: usize) -> Option<usize> {
        let candidate = index.checked_sub(2)?;
        self.activity_at(candidate).map(|_| candidate)
    }

    pub fn next_activity_index(&self, index: usize) -> Option<usize> {
        let candidate = index + 2;
        self.activity_at(candidate).map(|_| candidate)
    }

    pub fn start_time(&self) -> Option<u32> {
        self.elements.first().map(PlanElement::start_time)
    }

    pub fn end_time(&self) -> Option<u32> {
        self.elements.last().map(PlanElement::end_time)
    }

    /// Time between the start of the first and the end of the last element.
    pub fn duration(&self) -> u32 {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }

    /// Removes the activity at `index` together with its connecting leg. The following leg is taken,
    /// except for the last activity of the plan, which takes its preceding leg.
    pub fn remove(&self, index: usize) -> Result<Plan, StructuralError> {
        let side = if index + 1 == self.elements.len() {
            LegSide::Preceding
        } else {
            LegSide::Following
        };
        self.remove_with(index, side)
    }

    /// Removes the activity at `index` together with the leg on `side`. An activity at a boundary of
    /// the plan only has one connecting leg, which is removed regardless of `side`.
    pub fn remove_with(&self, index: usize, side: LegSide) -> Result<Plan, StructuralError> {
        let element = self.check_index(index)?;
        if element.kind() != ElementKind::Activity {
            return Err(StructuralError::KindMismatch {
                index,
                expected: ElementKind::Activity,
                found: element.kind(),
            });
        }
        if self.activity_count() <= 1 {
            return Err(StructuralError::LastActivity { index });
        }

        let has_preceding = index > 0;
        let has_following = index + 1 < self.elements.len();
        let range = match (side, has_preceding, has_following) {
            (LegSide::Following, _, true) | (LegSide::Preceding, false, true) => index..index + 2,
            (LegSide::Preceding, true, _) | (LegSide::Following, true, false) => index - 1..index + 1,
            (_, false, false) => return Err(StructuralError::LastActivity { index }),
        };

        let mut elements = self.elements.clone();
        elements.drain(range);
        check_structure(&elements)?;
        Ok(Plan { elements })
    }

    pub fn insert(&self, index: usize, element: PlanElement) -> Result<Plan, StructuralError> {
        self.insert_all(index, vec![element])
    }

    /// Inserts a run of elements before `index`. To keep alternation in a valid plan, the run has to
    /// be a leg/activity pair (or any even-length alternating sequence).
    pub fn insert_all(
        &self,
        index: usize,
        new_elements: Vec<PlanElement>,
    ) -> Result<Plan, StructuralError> {
        if index > self.elements.len() {
            return Err(StructuralError::IndexOutOfBounds {
                index,
                len: self.elements.len(),
            });
        }
        let mut elements = self.elements.clone();
        elements.splice(index..index, new_elements);
        check_structure(&elements)?;
        Ok(Plan { elements })
    }

    pub fn replace(&self, index: usize, element: PlanElement) -> Result<Plan, StructuralError> {
        let current = self.check_index(index)?;
        if current.kind() != element.kind() {
            return Err(StructuralError::KindMismatch {
                index,
                expected: current.kind(),
                found: element.kind(),
            });
        }
        let mut elements = self.elements.clone();
        elements[index] = element;
        Ok(Plan { elements })
    }

    fn check_index(&self, index: usize) -> Result<&PlanElement, StructuralError> {
        self.elements
            .get(index)
            .ok_or(StructuralError::IndexOutOfBounds {
                index,
                len: self.elements.len(),
            })
    }

    pub(crate) fn elements_mut(&mut self) -> &mut Vec<PlanElement> {
        &mut self.elements
    }
}

/// Checks alternation and that both ends of the sequence are activities.
pub(crate) fn check_structure(elements: &[PlanElement]) -> Result<(), StructuralError> {
    if let Some((i, pair)) = elements
        .windows(2)
        .enumerate()
        .find(|(_, pair)| pair[0].kind() == pair[1].kind())
    {
        return Err(StructuralError::AdjacentSameKind {
            index: i + 1,
            kind: pair[1].kind(),
        });
    }
    let first = elements.first().map(PlanElement::kind);
    let last = elements.last().map(PlanElement::kind);
    if first.is_some_and(|k| k != ElementKind::Activity)
        || last.is_some_and(|k| k != ElementKind::Activity)
    {
        return Err(StructuralError::BoundaryNotActivity);
    }
    Ok(())
}

impl Display for PlanElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanElement::Activity(a) => write!(
                f,
                "{}({}-{})",
                a.act_type,
                format_time(a.start_time),
                format_time(a.end_time)
            ),
            PlanElement::Leg(l) => write!(
                f,
                "[{} {}-{}]",
                l.mode,
                format_time(l.start_time),
                format_time(l.end_time)
            ),
        }
    }
}

impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.elements.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join(" "))
    }
}
