use crate::simulation::error::ConfigurationError;
use crate::simulation::policy::person_filter::PersonFilter;
use crate::simulation::population::Person;
use crate::simulation::population::plan::Plan;
use derive_builder::Builder;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

pub mod person_filter;

pub const DEFAULT_PURPOSES: [&str; 5] = ["home", "work", "education", "shop", "leisure"];
pub const DEFAULT_FALLBACK_ABSORBER: &str = "home";

/// Which activities a policy looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PurposeTarget {
    All,
    Purpose(String),
}

impl PurposeTarget {
    pub fn matches(&self, act_type: &str) -> bool {
        match self {
            PurposeTarget::All => true,
            PurposeTarget::Purpose(p) => p == act_type,
        }
    }
}

impl From<String> for PurposeTarget {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("all") {
            PurposeTarget::All
        } else {
            PurposeTarget::Purpose(value)
        }
    }
}

impl From<&str> for PurposeTarget {
    fn from(value: &str) -> Self {
        PurposeTarget::from(value.to_string())
    }
}

impl From<PurposeTarget> for String {
    fn from(value: PurposeTarget) -> Self {
        match value {
            PurposeTarget::All => "all".to_string(),
            PurposeTarget::Purpose(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionMode {
    /// Drop the activity, neighbours take over its time.
    #[default]
    Remove,
    /// Change the activity's duration by `delta` seconds. Negative values shrink it.
    Resize { delta: i64 },
}

/// The neighbour that gives or takes the time when an activity is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Absorber {
    /// A neighbouring activity with the fallback purpose, following before preceding. Without such a
    /// neighbour the following activity is used, and the preceding one at the end of the plan.
    #[default]
    StayAtHome,
    Preceding,
    Following,
}

fn default_fallback() -> String {
    DEFAULT_FALLBACK_ABSORBER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct InterventionPolicy {
    pub name: String,
    pub target: PurposeTarget,
    pub probability: f64,
    #[serde(default)]
    #[builder(default)]
    pub mode: InterventionMode,
    #[serde(default = "default_fallback")]
    #[builder(default = "default_fallback()")]
    pub fallback_absorber: String,
    #[serde(default)]
    #[builder(default)]
    pub absorber: Absorber,
    #[serde(default)]
    #[builder(default, setter(into, strip_option))]
    pub person_filter: Option<PersonFilter>,
}

impl InterventionPolicy {
    fn check(&self, purposes: &BTreeSet<String>) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyPolicyName);
        }
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigurationError::ProbabilityOutOfRange {
                policy: self.name.clone(),
                probability: self.probability,
            });
        }
        if let PurposeTarget::Purpose(purpose) = &self.target {
            if !purposes.contains(purpose) {
                return Err(ConfigurationError::UnknownPurpose {
                    policy: self.name.clone(),
                    purpose: purpose.clone(),
                });
            }
        }
        if !purposes.contains(&self.fallback_absorber) {
            return Err(ConfigurationError::UnknownPurpose {
                policy: self.name.clone(),
                purpose: self.fallback_absorber.clone(),
            });
        }
        if self.mode == (InterventionMode::Resize { delta: 0 }) {
            return Err(ConfigurationError::ZeroResize {
                policy: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// A policy hit on one activity of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterventionDecision<'p> {
    pub activity_index: usize,
    pub policy: &'p InterventionPolicy,
}

/// Decides which activities of a plan are affected by the configured interventions.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policies: Vec<InterventionPolicy>,
    purposes: BTreeSet<String>,
}

impl PolicyEngine {
    /// Checks all policies against the known purposes. Any malformed policy fails the whole
    /// construction.
    pub fn new<I, S>(policies: Vec<InterventionPolicy>, purposes: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let purposes: BTreeSet<String> = purposes.into_iter().map(Into::into).collect();
        for policy in &policies {
            policy.check(&purposes)?;
        }
        Ok(PolicyEngine { policies, purposes })
    }

    pub fn with_default_purposes(policies: Vec<InterventionPolicy>) -> Result<Self, ConfigurationError> {
        Self::new(policies, DEFAULT_PURPOSES)
    }

    pub fn policies(&self) -> &[InterventionPolicy] {
        &self.policies
    }

    pub fn purposes(&self) -> &BTreeSet<String> {
        &self.purposes
    }

    /// Draws one sample in [0, 1) for every (activity, policy) pair whose purpose target matches,
    /// in plan order and then policy order. A decision is emitted when the sample is below the
    /// policy's probability and the person passes the policy's filter. The draw happens even if the
    /// filter rejects the person, so neither probabilities nor filters shift the draws of other pairs.
    pub fn evaluate<'p, R>(
        &'p self,
        plan: &Plan,
        person: &Person,
        rng: &mut R,
    ) -> Vec<InterventionDecision<'p>>
    where
        R: Rng,
    {
        let mut decisions = Vec::new();
        for (index, element) in plan.elements().iter().enumerate() {
            let Some(act) = element.as_activity() else {
                continue;
            };
            for policy in &self.policies {
                if !policy.target.matches(&act.act_type) {
                    continue;
                }
                let sample: f64 = rng.random();
                let selected = policy
                    .person_filter
                    .as_ref()
                    .is_none_or(|filter| filter.matches(person));
                if selected && sample < policy.probability {
                    trace!(
                        person = person.id(),
                        index,
                        policy = policy.name.as_str(),
                        "intervention selected"
                    );
                    decisions.push(InterventionDecision {
                        activity_index: index,
                        policy,
                    });
                }
            }
        }
        decisions
    }
}
