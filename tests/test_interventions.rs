use rust_pam::simulation::config::{CommandLineArgs, Config};
use rust_pam::simulation::controller::BatchRunner;
use rust_pam::simulation::error::{ConfigurationError, PamError};
use rust_pam::simulation::io::{read_json, read_population, write_json};
use rust_pam::simulation::controller::RunSummary;
use rust_pam::simulation::population::plan::{Activity, Leg, Plan};
use rust_pam::test_utils::HOUR;

const CONFIG: &str = "./tests/resources/interventions/config.yml";

fn load(config: &Config) -> rust_pam::simulation::population::Population {
    read_population(&config.population_file().unwrap()).unwrap()
}

#[test]
fn school_closure_and_shorter_shifts() {
    let config = Config::try_from(CommandLineArgs::new_with_path(CONFIG)).unwrap();
    let mut population = load(&config);
    let retiree_before = population.get("retiree").unwrap().plan().clone();

    let summary = BatchRunner::from_config(&config)
        .unwrap()
        .run(&mut population)
        .unwrap();

    // education removed, the two home blocks merge into one
    let mut kid = Plan::new();
    kid.add_act(Activity::new("home", "hh1", 0, 24 * HOUR));
    assert_eq!(population.get("kid").unwrap().plan(), &kid);

    // work shrinks by two hours, trailing home absorbs them
    let mut worker = Plan::new();
    worker.add_act(Activity::new("home", "hh1", 0, 9 * HOUR));
    worker.add_leg(Leg::new("car", 9 * HOUR, 9 * HOUR));
    worker.add_act(Activity::new("work", "office", 9 * HOUR, 15 * HOUR));
    worker.add_leg(Leg::new("car", 15 * HOUR, 15 * HOUR));
    worker.add_act(Activity::new("home", "hh1", 15 * HOUR, 24 * HOUR));
    assert_eq!(population.get("worker").unwrap().plan(), &worker);

    // no policy targets leisure
    assert_eq!(population.get("retiree").unwrap().plan(), &retiree_before);

    assert_eq!(summary.persons, 3);
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.mutated, 2);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(summary.decisions, 2);
    assert_eq!(summary.invalid_count(), 0);
    assert!(summary.mean_plan_distance > 0.);
}

#[test]
fn overrides_change_the_run() {
    let mut args = CommandLineArgs::new_with_path(CONFIG);
    args.overrides = vec![
        ("runner.num_threads".to_string(), "1".to_string()),
        ("validation.day_length".to_string(), "20:00:00".to_string()),
        ("validation.epsilon".to_string(), "0".to_string()),
    ];
    let config = Config::try_from(args).unwrap();
    let mut population = load(&config);
    let before = population.clone();

    // every input plan ends at 24:00, so each mutated plan fails the shorter day
    let summary = BatchRunner::from_config(&config)
        .unwrap()
        .run(&mut population)
        .unwrap();
    assert_eq!(population, before);
    assert_eq!(summary.invalid_count(), 2);
    assert_eq!(summary.mutated, 0);
}

#[test]
fn summary_round_trips_through_json() {
    let config = Config::try_from(CommandLineArgs::new_with_path(CONFIG)).unwrap();
    let mut population = load(&config);
    let summary = BatchRunner::from_config(&config)
        .unwrap()
        .run(&mut population)
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_summary.json");
    write_json(&summary, &path).unwrap();
    let read: RunSummary = read_json(&path).unwrap();
    assert_eq!(read.mutated, summary.mutated);
    assert_eq!(read.mean_plan_distance, summary.mean_plan_distance);
}

#[test]
fn probability_out_of_range_fails_before_processing() {
    let config = Config::try_from(CommandLineArgs::new_with_path(
        "./tests/resources/interventions/invalid_probability.yml",
    ))
    .unwrap();
    let err = BatchRunner::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        PamError::Configuration(ConfigurationError::ProbabilityOutOfRange { .. })
    ));
}

#[test]
fn unknown_purpose_fails_before_processing() {
    let config = Config::try_from(CommandLineArgs::new_with_path(
        "./tests/resources/interventions/unknown_purpose.yml",
    ))
    .unwrap();
    let err = BatchRunner::from_config(&config).unwrap_err();
    assert!(matches!(
        err,
        PamError::Configuration(ConfigurationError::UnknownPurpose { ref purpose, .. }) if purpose == "gym"
    ));
}
