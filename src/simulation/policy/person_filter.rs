use crate::simulation::population::Person;
use serde::{Deserialize, Serialize};

/// Restricts a policy to a subset of the population, e.g. school closures only hitting children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonFilter {
    AgeBelow(u32),
    AgeAtLeast(u32),
    Role(String),
    /// Members of any of the listed households, e.g. quarantined households.
    Households(Vec<String>),
    AttributeEquals { key: String, value: String },
    AllOf(Vec<PersonFilter>),
}

impl PersonFilter {
    /// Persons lacking the attribute a filter looks at never match.
    pub fn matches(&self, person: &Person) -> bool {
        let attributes = person.attributes();
        match self {
            PersonFilter::AgeBelow(limit) => attributes.age.is_some_and(|age| age < *limit),
            PersonFilter::AgeAtLeast(limit) => attributes.age.is_some_and(|age| age >= *limit),
            PersonFilter::Role(role) => attributes.role.as_ref() == Some(role),
            PersonFilter::Households(households) => attributes
                .household
                .as_ref()
                .is_some_and(|h| households.contains(h)),
            PersonFilter::AttributeEquals { key, value } => {
                attributes.get(key).as_ref() == Some(value)
            }
            PersonFilter::AllOf(filters) => filters.iter().all(|f| f.matches(person)),
        }
    }
}
