use rand::Rng;

use crate::simulation::policy::DEFAULT_PURPOSES;
use crate::simulation::population::plan::{Activity, Leg, Plan};
use crate::simulation::population::time::DAY_SECONDS;
use crate::simulation::population::{Person, PersonAttributes, Population};
use crate::simulation::random::get_rnd;

pub const HOUR: u32 = 3600;

/// Builds a plan from `(purpose, location, start, end)` tuples. Consecutive activities are
/// connected by walk legs from the end of one to the start of the next.
pub fn create_plan(acts: &[(&str, &str, u32, u32)]) -> Plan {
    let mut plan = Plan::new();
    let mut previous_end = None;
    for (act_type, location, start, end) in acts {
        if let Some(previous_end) = previous_end {
            plan.add_leg(Leg::new("walk", previous_end, *start));
        }
        plan.add_act(Activity::new(act_type, location, *start, *end));
        previous_end = Some(*end);
    }
    plan
}

/// Home 00:00-08:00, education 08:00-15:00, home 15:00-24:00 with instant legs.
pub fn school_day_plan() -> Plan {
    create_plan(&[
        ("home", "h", 0, 8 * HOUR),
        ("education", "school", 8 * HOUR, 15 * HOUR),
        ("home", "h", 15 * HOUR, 24 * HOUR),
    ])
}

/// Home 00:00-09:00, work 09:00-17:00, home 17:00-24:00 with instant legs.
pub fn work_day_plan() -> Plan {
    create_plan(&[
        ("home", "h", 0, 9 * HOUR),
        ("work", "office", 9 * HOUR, 17 * HOUR),
        ("home", "h", 17 * HOUR, 24 * HOUR),
    ])
}

pub fn create_person(id: &str, plan: Plan, age: Option<u32>) -> Person {
    Person::with_attributes(
        id,
        plan,
        PersonAttributes {
            age,
            ..PersonAttributes::default()
        },
    )
}

/// A valid plan spanning one day. Starts and ends at home, with up to five activities in between
/// and legs of up to 30 minutes.
pub fn random_plan<R: Rng>(rng: &mut R) -> Plan {
    let inner = rng.random_range(0..=5);

    // one slot per activity, each slot but the last ends with the leg to the next activity
    let mut bounds: Vec<u32> = (0..inner + 1)
        .map(|_| rng.random_range(1..DAY_SECONDS))
        .collect();
    bounds.push(0);
    bounds.push(DAY_SECONDS);
    bounds.sort_unstable();
    bounds.dedup();

    let slots = bounds.len() - 1;
    let mut plan = Plan::new();
    for (i, slot) in bounds.windows(2).enumerate() {
        let (start, end) = (slot[0], slot[1]);
        let is_boundary = i == 0 || i + 1 == slots;
        let act_type = if is_boundary {
            "home"
        } else {
            DEFAULT_PURPOSES[rng.random_range(0..DEFAULT_PURPOSES.len())]
        };
        let location = if act_type == "home" {
            "h".to_string()
        } else {
            format!("{act_type}_{}", rng.random_range(0..3))
        };

        if i + 1 == slots {
            plan.add_act(Activity::new(act_type, &location, start, end));
        } else {
            let trav_time = rng.random_range(0..=1800).min((end - start) / 2);
            plan.add_act(Activity::new(act_type, &location, start, end - trav_time));
            plan.add_leg(Leg::new("car", end - trav_time, end));
        }
    }
    plan
}

/// A population of `size` persons with random plans and ages, reproducible from `seed`.
pub fn random_population(seed: u64, size: usize) -> Population {
    (0..size)
        .map(|i| {
            let id = format!("person_{i}");
            let mut rng = get_rnd(seed, &id);
            let age = rng.random_range(0..90);
            let plan = random_plan(&mut rng);
            create_person(&id, plan, Some(age))
        })
        .collect()
}
