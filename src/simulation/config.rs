use crate::simulation::error::ConfigurationError;
use crate::simulation::io::resolve_path;
use crate::simulation::policy::{DEFAULT_PURPOSES, InterventionPolicy, PolicyEngine};
use crate::simulation::population::time::{DAY_SECONDS, time_format};
use crate::simulation::validation::PlanValidator;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Registers an override handler for a specific config key
macro_rules! register_override {
    ($key:literal, $func:expr) => {
        inventory::submit! {
            OverrideHandler {
                key: $key,
                apply: $func,
            }
        }
    };
}

struct OverrideHandler {
    key: &'static str,
    apply: fn(config: &mut Config, value: &str) -> Result<(), String>,
}

// Collect all OverrideHandler submitted from anywhere in this module
inventory::collect!(OverrideHandler);

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineArgs {
    #[arg(long, short)]
    pub config: String,
    #[arg(long = "set", value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,
}

impl CommandLineArgs {
    pub fn new_with_path(path: impl ToString) -> Self {
        CommandLineArgs {
            config: path.to_string(),
            overrides: Vec::new(),
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=');
    match pos {
        Some(pos) => Ok((s[..pos].to_string(), s[pos + 1..].to_string())),
        None => Err(format!("invalid KEY=VALUE: no `=` found in `{}`", s)),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    modules: Modules,
    #[serde(skip)]
    context: Option<PathBuf>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Modules {
    #[serde(default)]
    pub policies: Option<Policies>,
    #[serde(default)]
    pub runner: Option<Runner>,
    #[serde(default)]
    pub validation: Option<Validation>,
    #[serde(default)]
    pub output: Option<Output>,
    #[serde(default)]
    pub input: Option<Input>,
}

impl TryFrom<CommandLineArgs> for Config {
    type Error = ConfigurationError;

    fn try_from(args: CommandLineArgs) -> Result<Self, Self::Error> {
        let mut config = Config::from_file(Path::new(&args.config))?;
        config.apply_overrides(&args.overrides)?;
        Ok(config)
    }
}

impl Config {
    pub fn from_file(config_path: &Path) -> Result<Self, ConfigurationError> {
        let file = File::open(config_path).map_err(|source| ConfigurationError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        let deserializer = serde_yaml::Deserializer::from_reader(BufReader::new(file));
        let mut config: Config =
            serde_path_to_error::deserialize(deserializer).map_err(|source| {
                ConfigurationError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                }
            })?;
        config.check()?;
        config.set_context(Some(config_path.to_path_buf()));
        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn set_context(&mut self, context: Option<PathBuf>) {
        self.context = context;
    }

    pub fn context(&self) -> &Option<PathBuf> {
        &self.context
    }

    pub fn modules(&self) -> &Modules {
        &self.modules
    }

    /// Apply generic key-value overrides to the config, e.g. runner.num_threads=8
    pub fn apply_overrides(&mut self, overrides: &[(String, String)]) -> Result<(), ConfigurationError> {
        info!("Applying overrides: {:?}", overrides);

        for (key, value) in overrides {
            if let Some(handler) = inventory::iter::<OverrideHandler>().find(|h| h.key == key) {
                (handler.apply)(self, value).map_err(|reason| ConfigurationError::InvalidOverride {
                    key: key.clone(),
                    value: value.clone(),
                    reason,
                })?;
            } else {
                warn!("No override handler found for key: {}", key);
            }
        }
        self.check()
    }

    fn check(&self) -> Result<(), ConfigurationError> {
        let validation = self.validation();
        if validation.day_length == 0
            || validation.day_start.checked_add(validation.day_length).is_none()
        {
            return Err(ConfigurationError::InvalidDayLength);
        }
        Ok(())
    }

    pub fn policies(&self) -> Policies {
        self.modules.policies.clone().unwrap_or_default()
    }

    pub fn set_policies(&mut self, policies: Policies) {
        self.modules.policies = Some(policies);
    }

    pub fn runner(&self) -> Runner {
        self.modules.runner.clone().unwrap_or_default()
    }

    pub fn set_runner(&mut self, runner: Runner) {
        self.modules.runner = Some(runner);
    }

    pub fn validation(&self) -> Validation {
        self.modules.validation.clone().unwrap_or_default()
    }

    pub fn set_validation(&mut self, validation: Validation) {
        self.modules.validation = Some(validation);
    }

    pub fn output(&self) -> Output {
        self.modules.output.clone().unwrap_or_default()
    }

    pub fn set_output(&mut self, output: Output) {
        self.modules.output = Some(output);
    }

    pub fn input(&self) -> Input {
        self.modules.input.clone().unwrap_or_default()
    }

    pub fn set_input(&mut self, input: Input) {
        self.modules.input = Some(input);
    }

    /// Population file, relative paths are resolved against the config file's directory.
    pub fn population_file(&self) -> Option<PathBuf> {
        self.input()
            .population
            .map(|p| resolve_path(&self.context, &p))
    }

    /// Output directory, relative paths are resolved against the config file's directory.
    pub fn output_dir(&self) -> PathBuf {
        resolve_path(&self.context, &self.output().output_dir)
    }

    /// Writes the effective configuration as `output_config.yml` into `output_path`.
    pub fn write(&self, output_path: &Path) -> Result<PathBuf, ConfigurationError> {
        let output_config = output_path.join("output_config.yml");
        let file = File::create(&output_config).map_err(|source| ConfigurationError::Io {
            path: output_config.clone(),
            source,
        })?;
        serde_yaml::to_writer(BufWriter::new(file), self).map_err(|source| {
            ConfigurationError::Write {
                path: output_config.clone(),
                source,
            }
        })?;
        Ok(output_config)
    }
}

fn default_seed() -> u64 {
    4711
}

fn default_purposes() -> Vec<String> {
    DEFAULT_PURPOSES.iter().map(|p| p.to_string()).collect()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Policies {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_purposes")]
    pub purposes: Vec<String>,
    #[serde(default)]
    pub interventions: Vec<InterventionPolicy>,
}

impl Default for Policies {
    fn default() -> Self {
        Policies {
            seed: default_seed(),
            purposes: default_purposes(),
            interventions: Vec::new(),
        }
    }
}

impl Policies {
    pub fn engine(&self) -> Result<PolicyEngine, ConfigurationError> {
        PolicyEngine::new(self.interventions.clone(), self.purposes.iter().cloned())
    }
}

register_override!("policies.seed", |config, value| {
    let mut policies = config.policies();
    policies.seed = value.parse().map_err(|e| format!("{e}"))?;
    config.set_policies(policies);
    Ok(())
});

fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_to_1() -> u32 {
    1
}

fn default_encoding_resolution() -> u32 {
    600
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Runner {
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// Rounds of evaluate + apply per person. Stops early once a round yields no decisions.
    #[serde(default = "default_to_1")]
    pub passes: u32,
    /// Seconds per symbol when plans are encoded for the similarity summary.
    #[serde(default = "default_encoding_resolution")]
    pub encoding_resolution: u32,
}

impl Default for Runner {
    fn default() -> Self {
        Runner {
            num_threads: default_num_threads(),
            passes: default_to_1(),
            encoding_resolution: default_encoding_resolution(),
        }
    }
}

register_override!("runner.num_threads", |config, value| {
    let mut runner = config.runner();
    runner.num_threads = value.parse().map_err(|e| format!("{e}"))?;
    config.set_runner(runner);
    Ok(())
});

register_override!("runner.passes", |config, value| {
    let mut runner = config.runner();
    runner.passes = value.parse().map_err(|e| format!("{e}"))?;
    config.set_runner(runner);
    Ok(())
});

fn default_day_length() -> u32 {
    DAY_SECONDS
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Validation {
    #[serde(default, with = "time_format")]
    pub day_start: u32,
    #[serde(default = "default_day_length", with = "time_format")]
    pub day_length: u32,
    /// Largest gap or overlap in seconds that is repaired instead of rejected.
    #[serde(default = "default_to_1")]
    pub epsilon: u32,
}

impl Default for Validation {
    fn default() -> Self {
        Validation {
            day_start: 0,
            day_length: default_day_length(),
            epsilon: default_to_1(),
        }
    }
}

impl Validation {
    pub fn validator(&self) -> PlanValidator {
        PlanValidator::from(self)
    }
}

register_override!("validation.epsilon", |config, value| {
    let mut validation = config.validation();
    validation.epsilon = value.parse().map_err(|e| format!("{e}"))?;
    config.set_validation(validation);
    Ok(())
});

register_override!("validation.day_length", |config, value| {
    let mut validation = config.validation();
    validation.day_length = value
        .parse()
        .ok()
        .or_else(|| crate::simulation::population::time::parse_time(value))
        .ok_or_else(|| "expected seconds or HH:MM:SS".to_string())?;
    config.set_validation(validation);
    Ok(())
});

/// Have this extra layer of log level enum, as tracing subscriber has no
/// off/none option by default.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Logging {
    None,
    #[default]
    Info,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Output {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            output_dir: default_output_dir(),
            logging: Logging::default(),
        }
    }
}

register_override!("output.output_dir", |config, value| {
    let mut output = config.output();
    output.output_dir = PathBuf::from(value);
    config.set_output(output);
    Ok(())
});

register_override!("output.logging", |config, value| {
    let mut output = config.output();
    output.logging = match value.to_lowercase().as_str() {
        "info" => Logging::Info,
        "none" => Logging::None,
        _ => return Err(format!("unknown logging level {value}")),
    };
    config.set_output(output);
    Ok(())
});

/// Where the population handed to the runner comes from. Only used by the command line entry point.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Input {
    #[serde(default)]
    pub population: Option<PathBuf>,
}

register_override!("input.population", |config, value| {
    let mut input = config.input();
    input.population = Some(PathBuf::from(value));
    config.set_input(input);
    Ok(())
});
