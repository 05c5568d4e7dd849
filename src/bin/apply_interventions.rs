use clap::Parser;
use rust_pam::simulation::config::{CommandLineArgs, Config};
use rust_pam::simulation::controller::BatchRunner;
use rust_pam::simulation::error::{ConfigurationError, PamError};
use rust_pam::simulation::io::{read_population, write_json, write_population};
use rust_pam::simulation::logging::{init_logging, init_std_out_logging_thread_local};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let _guard = init_std_out_logging_thread_local();

    let args = CommandLineArgs::parse();
    info!("Started with args: {:?}", args);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: CommandLineArgs) -> Result<(), PamError> {
    let config = Config::try_from(args)?;
    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir).map_err(|source| PamError::Io {
        path: output_dir.clone(),
        source,
    })?;
    let _guards = init_logging(&config);

    let population_file = config
        .population_file()
        .ok_or(ConfigurationError::MissingPopulation)?;
    let mut population = read_population(&population_file)?;

    let runner = BatchRunner::from_config(&config)?;
    let summary = runner.run(&mut population)?;

    info!("Writing output files:");
    info!("    ... Config ...");
    config.write(&output_dir)?;
    info!("    ... Population ...");
    write_population(&population, &output_dir.join("output_population.json"))?;
    info!("    ... Summary ...");
    write_json(&summary, &output_dir.join("run_summary.json"))?;
    Ok(())
}
