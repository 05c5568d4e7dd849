use crate::simulation::error::PamError;
use crate::simulation::population::Population;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn resolve_path(config_path: &Option<PathBuf>, file_path: &Path) -> PathBuf {
    // paths starting with ./ are meant relative to the working directory
    if file_path.is_absolute() || file_path.starts_with("./") {
        return file_path.to_path_buf();
    }

    if let Some(path) = config_path.as_ref().and_then(|c| c.parent()) {
        path.join(file_path)
    } else {
        file_path.to_path_buf()
    }
}

pub fn read_population(path: &Path) -> Result<Population, PamError> {
    info!("Loading population from {:?}", path);
    let population: Population = read_json(path)?;
    info!("Loaded {} persons", population.len());
    Ok(population)
}

pub fn write_population(population: &Population, path: &Path) -> Result<(), PamError> {
    info!("Writing population to {:?}", path);
    write_json(population, path)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PamError> {
    let file = File::open(path).map_err(|source| PamError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PamError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `value` as pretty printed json. Missing parent directories are created.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), PamError> {
    let io_err = |source| PamError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    serde_json::to_writer_pretty(BufWriter::new(file), value).map_err(|source| PamError::Json {
        path: path.to_path_buf(),
        source,
    })
}
