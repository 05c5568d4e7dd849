use crate::simulation::population::plan::{Plan, PlanElement};
use ahash::HashMap;
use itertools::Itertools;

pub const TRAVEL: &str = "travel";
const UNKNOWN: char = '#';

/// Encodes plans as character sequences so that they can be compared with an edit distance. Each
/// activity purpose (and travel) gets one symbol, which is repeated once per `resolution` seconds
/// of the element's duration. Elements shorter than one resolution step still leave one symbol.
#[derive(Debug, Clone)]
pub struct PlanEncoder {
    symbols: HashMap<String, char>,
    resolution: u32,
}

impl PlanEncoder {
    pub fn new<I, S>(activity_classes: I, resolution: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes = activity_classes
            .into_iter()
            .map(Into::into)
            .chain(std::iter::once(TRAVEL.to_string()))
            .sorted()
            .dedup();

        let symbols = classes
            .enumerate()
            .map(|(i, class)| {
                let symbol = char::from_u32('a' as u32 + i as u32).unwrap_or(UNKNOWN);
                (class, symbol)
            })
            .collect();

        PlanEncoder {
            symbols,
            resolution: resolution.max(1),
        }
    }

    /// Builds an encoder that knows every activity purpose occurring in `plans`.
    pub fn from_plans<'a, I>(plans: I, resolution: u32) -> Self
    where
        I: IntoIterator<Item = &'a Plan>,
    {
        let classes = plans
            .into_iter()
            .flat_map(|p| p.acts().map(|a| a.act_type.clone()))
            .collect::<Vec<_>>();
        Self::new(classes, resolution)
    }

    pub fn symbol(&self, class: &str) -> char {
        self.symbols.get(class).copied().unwrap_or(UNKNOWN)
    }

    pub fn encode(&self, plan: &Plan) -> Vec<char> {
        let mut encoded = Vec::new();
        for element in plan.elements() {
            let (symbol, duration) = match element {
                PlanElement::Activity(a) => (self.symbol(&a.act_type), a.duration()),
                PlanElement::Leg(l) => (self.symbol(TRAVEL), l.trav_time()),
            };
            let repeat = (duration / self.resolution).max(1);
            encoded.extend(std::iter::repeat_n(symbol, repeat as usize));
        }
        encoded
    }
}

/// Normalised edit distance in [0, 1]: `1 - (len_a + len_b - d) / (len_a + len_b)` where `d` is the
/// edit distance with substitutions counting as two edits.
pub fn levenshtein_distance<T: PartialEq>(a: &[T], b: &[T]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 0.;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + if ca == cb { 0 } else { 2 };
            let deletion = previous[j + 1] + 1;
            let insertion = current[j] + 1;
            current[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    let edits = previous[b.len()];

    edits as f64 / total as f64
}

pub fn plan_distance(encoder: &PlanEncoder, a: &Plan, b: &Plan) -> f64 {
    levenshtein_distance(&encoder.encode(a), &encoder.encode(b))
}

/// Indices of the `n` plans most similar to `plans[target]`, closest first. The target itself is
/// never part of the result.
pub fn closest_matches(encoder: &PlanEncoder, plans: &[&Plan], target: usize, n: usize) -> Vec<usize> {
    let Some(reference) = plans.get(target) else {
        return Vec::new();
    };
    let reference = encoder.encode(reference);
    plans
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != target)
        .map(|(i, p)| (i, levenshtein_distance(&reference, &encoder.encode(p))))
        .sorted_by(|(ia, da), (ib, db)| da.total_cmp(db).then(ia.cmp(ib)))
        .take(n)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::population::plan::{Activity, Leg};
    use assert_approx_eq::assert_approx_eq;

    const H: u32 = 3600;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn identical_strings_have_zero_distance() {
        assert_eq!(levenshtein_distance(&chars("aa"), &chars("aa")), 0.);
    }

    #[test]
    fn completely_different_strings_have_distance_one() {
        assert_eq!(levenshtein_distance(&chars("aa"), &chars("bb")), 1.);
    }

    #[test]
    fn substitution_costs_two_edits() {
        assert_approx_eq!(levenshtein_distance(&chars("aa"), &chars("ab")), 0.5);
        assert_approx_eq!(levenshtein_distance(&chars("ba"), &chars("aa")), 0.5);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = chars("hhhwwwhh");
        let b = chars("hhhhhhhh");
        assert_approx_eq!(levenshtein_distance(&a, &b), levenshtein_distance(&b, &a));
    }

    #[test]
    fn empty_sequences() {
        let empty: Vec<char> = vec![];
        assert_eq!(levenshtein_distance(&empty, &empty), 0.);
        assert_eq!(levenshtein_distance(&chars("ab"), &empty), 1.);
    }

    fn plan(work_hours: u32) -> Plan {
        let mut plan = Plan::new();
        plan.add_act(Activity::new("home", "h", 0, 8 * H));
        plan.add_leg(Leg::new("car", 8 * H, 8 * H));
        plan.add_act(Activity::new("work", "w", 8 * H, (8 + work_hours) * H));
        plan.add_leg(Leg::new("car", (8 + work_hours) * H, (8 + work_hours) * H));
        plan.add_act(Activity::new("home", "h", (8 + work_hours) * H, 24 * H));
        plan
    }

    #[test]
    fn encode_repeats_symbols_by_duration() {
        let encoder = PlanEncoder::new(["work", "home"], H);
        let encoded: String = encoder.encode(&plan(8)).into_iter().collect();
        // home = a, travel = b, work = c; zero length legs still leave a trace
        assert_eq!(encoded, format!("{}b{}b{}", "a".repeat(8), "c".repeat(8), "a".repeat(8)));
    }

    #[test]
    fn unknown_purpose_uses_placeholder() {
        let encoder = PlanEncoder::new(["home"], H);
        assert_eq!(encoder.symbol("shop"), '#');
    }

    #[test]
    fn closest_matches_are_ordered_by_distance() {
        let plans = [plan(8), plan(7), plan(2), plan(8)];
        let refs: Vec<&Plan> = plans.iter().collect();
        let encoder = PlanEncoder::from_plans(plans.iter(), H);

        let matches = closest_matches(&encoder, &refs, 0, 3);
        assert_eq!(matches, vec![3, 1, 2]);

        let mut last = 0.;
        for i in matches {
            let d = plan_distance(&encoder, &plans[0], &plans[i]);
            assert!(d >= last);
            last = d;
        }
    }
}
