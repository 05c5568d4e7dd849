use crate::simulation::population::plan::Plan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod plan;
pub mod plan_encoding;
pub mod time;

/// Attributes of a person that intervention policies may look at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PersonAttributes {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub household: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl PersonAttributes {
    /// Looks up an attribute by name. The named fields shadow entries in `extra`.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "age" => self.age.map(|a| a.to_string()),
            "role" => self.role.clone(),
            "household" => self.household.clone(),
            _ => self.extra.get(key).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    id: String,
    plan: Plan,
    #[serde(default)]
    attributes: PersonAttributes,
}

impl Person {
    pub fn new(id: &str, plan: Plan) -> Self {
        Person {
            id: id.to_string(),
            plan,
            attributes: PersonAttributes::default(),
        }
    }

    pub fn with_attributes(id: &str, plan: Plan, attributes: PersonAttributes) -> Self {
        Person {
            id: id.to_string(),
            plan,
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn attributes(&self) -> &PersonAttributes {
        &self.attributes
    }

    /// Swaps in a new plan and hands back the old one.
    pub fn replace_plan(&mut self, plan: Plan) -> Plan {
        std::mem::replace(&mut self.plan, plan)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Population {
    pub persons: Vec<Person>,
}

impl Population {
    pub fn new() -> Self {
        Population {
            persons: Vec::new(),
        }
    }

    pub fn add_person(&mut self, person: Person) {
        self.persons.push(person);
    }

    pub fn get(&self, id: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.persons.iter().map(Person::plan)
    }

    pub fn stats(&self) -> PopulationStats {
        let mut stats = PopulationStats {
            persons: self.persons.len(),
            ..PopulationStats::default()
        };
        for plan in self.plans() {
            for act in plan.acts() {
                stats.activities += 1;
                *stats
                    .activities_by_purpose
                    .entry(act.act_type.clone())
                    .or_default() += 1;
            }
            stats.legs += plan.legs().count();
        }
        stats
    }
}

impl FromIterator<Person> for Population {
    fn from_iter<T: IntoIterator<Item = Person>>(iter: T) -> Self {
        Population {
            persons: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PopulationStats {
    pub persons: usize,
    pub activities: usize,
    pub legs: usize,
    pub activities_by_purpose: BTreeMap<String, usize>,
}
