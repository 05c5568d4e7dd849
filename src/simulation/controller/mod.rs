use crate::simulation::config::Config;
use crate::simulation::error::{MutationError, PamError};
use crate::simulation::plan_modification::plan_modifier::PlanModifier;
use crate::simulation::policy::{InterventionMode, PolicyEngine};
use crate::simulation::population::plan_encoding::{PlanEncoder, plan_distance};
use crate::simulation::population::{Person, Population};
use crate::simulation::random::get_rnd;
use derive_builder::Builder;
use derive_more::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, dispatcher, info, warn};

pub mod run_summary;

pub use run_summary::{InvalidPlanRecord, RunSummary};

/// Applies the configured interventions to every person of a population.
///
/// Persons are independent of each other. The population is split into contiguous chunks, one per
/// worker thread, and every person draws from its own random stream derived from the seed and the
/// person id. Results therefore do not depend on the number of threads.
#[derive(Debug, Builder)]
#[builder(pattern = "owned")]
pub struct BatchRunner {
    engine: PolicyEngine,
    #[builder(default)]
    modifier: PlanModifier,
    seed: u64,
    #[builder(default = "1")]
    num_threads: usize,
    #[builder(default = "1")]
    passes: u32,
    #[builder(default = "600")]
    encoding_resolution: u32,
    #[builder(default)]
    #[debug(skip)]
    cancelled: Arc<AtomicBool>,
}

struct Worker<'r> {
    runner: &'r BatchRunner,
    encoder: &'r PlanEncoder,
}

impl BatchRunner {
    pub fn from_config(config: &Config) -> Result<Self, PamError> {
        let policies = config.policies();
        let runner = config.runner();
        let engine = policies.engine()?;
        Ok(BatchRunner {
            engine,
            modifier: PlanModifier::new(config.validation().validator()),
            seed: policies.seed,
            num_threads: runner.num_threads,
            passes: runner.passes,
            encoding_resolution: runner.encoding_resolution,
            cancelled: Arc::default(),
        })
    }

    /// Setting the returned flag stops workers from picking up further persons. Persons already
    /// being processed are finished.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Mutates the plans of `population` in place. Plans that fail validation are kept as they
    /// were and reported in the summary. Structural errors abort the run.
    pub fn run(&self, population: &mut Population) -> Result<RunSummary, PamError> {
        let stats = population.stats();
        info!(
            persons = stats.persons,
            activities = stats.activities,
            legs = stats.legs,
            "Starting intervention run with {} policies",
            self.engine.policies().len()
        );

        let encoder = PlanEncoder::new(
            self.engine.purposes().iter().cloned(),
            self.encoding_resolution,
        );
        let worker = Worker {
            runner: self,
            encoder: &encoder,
        };

        let num_threads = self.num_threads.clamp(1, population.len().max(1));
        let chunk_size = population.len().div_ceil(num_threads).max(1);

        // workers log into the subscriber of the calling thread
        let dispatch = dispatcher::get_default(|d| d.clone());

        let results: Vec<Result<RunSummary, PamError>> = thread::scope(|scope| {
            let mut handles = Vec::new();
            for (i, chunk) in population.persons.chunks_mut(chunk_size).enumerate() {
                let worker = &worker;
                let dispatch = &dispatch;
                let handle = thread::Builder::new()
                    .name(format!("pam-worker-{i}"))
                    .spawn_scoped(scope, move || {
                        dispatcher::with_default(dispatch, || worker.process(chunk))
                    })
                    .map_err(PamError::Spawn);
                handles.push(handle);
            }
            handles
                .into_iter()
                .map(|handle| -> Result<RunSummary, PamError> {
                    handle?.join().map_err(|_| PamError::WorkerPanicked)?
                })
                .collect()
        });

        let mut summary = RunSummary::default();
        for result in results {
            summary.merge(result?);
        }
        summary.finish();

        let stats = population.stats();
        info!(
            persons = stats.persons,
            activities = stats.activities,
            legs = stats.legs,
            "Finished intervention run"
        );
        info!("{summary}");
        Ok(summary)
    }
}

impl Worker<'_> {
    fn process(&self, persons: &mut [Person]) -> Result<RunSummary, PamError> {
        let mut summary = RunSummary {
            persons: persons.len(),
            ..RunSummary::default()
        };

        for person in persons.iter_mut() {
            if self.runner.cancelled.load(Ordering::Relaxed) {
                summary.skipped += 1;
                continue;
            }
            self.process_person(person, &mut summary)?;
        }
        Ok(summary)
    }

    #[tracing::instrument(level = "trace", skip_all, fields(person = person.id()))]
    fn process_person(&self, person: &mut Person, summary: &mut RunSummary) -> Result<(), PamError> {
        let runner = self.runner;
        let mut rng = get_rnd(runner.seed, person.id());
        let mut current = person.plan().clone();
        let mut applied = 0;
        let mut skipped = 0;

        for pass in 0..runner.passes {
            let mut decisions = runner.engine.evaluate(&current, person, &mut rng);
            // durations change once, later passes only pick up removals
            if pass > 0 {
                decisions.retain(|d| d.policy.mode == InterventionMode::Remove);
            }
            if decisions.is_empty() {
                break;
            }
            debug!(person = person.id(), pass, decisions = decisions.len(), "applying decisions");

            match runner.modifier.apply_counted(&current, &decisions) {
                Ok(modification) => {
                    applied += modification.applied;
                    skipped += modification.skipped;
                    current = modification.plan;
                }
                Err(MutationError::Invalid(e)) => {
                    warn!(
                        person = person.id(),
                        invariant = %e.invariant,
                        index = e.index,
                        "Discarding mutation: {}",
                        e.detail
                    );
                    summary.processed += 1;
                    summary.unchanged += 1;
                    summary.record_invalid(person.id(), e);
                    return Ok(());
                }
                Err(MutationError::Structural(e)) => return Err(e.into()),
            }
        }

        summary.processed += 1;
        summary.skipped_decisions += skipped;
        if current == *person.plan() {
            summary.unchanged += 1;
        } else {
            summary.mutated += 1;
            summary.decisions += applied;
            summary.add_distance(plan_distance(self.encoder, person.plan(), &current));
            person.replace_plan(current);
        }
        Ok(())
    }
}
