use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory, relative to the working directory, holding the configuration files.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variables that override file values.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator between nested keys, e.g. `APP_DATABASE__HOST`.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by top level configuration structs loaded with [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are split on `,` into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// One file layer of the configuration.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Base,
    Environment(Environment),
}

impl Layer {
    fn file_stem(&self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Base => f.write_str("base configuration"),
            Layer::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {layer} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        layer: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {layer} from `{path}`: {source}")]
    ConfigurationFileLoad {
        layer: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),
}

/// Loads `T` from `./configuration`, layering the base file, the environment file selected by
/// `APP_ENVIRONMENT` and finally `APP_`-prefixed environment variables.
///
/// Nested keys are separated by `__` in variable names (`APP_SERVER__PORT=8443`).
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let directory = std::env::current_dir()
        .map_err(LoadConfigError::CurrentDir)?
        .join(CONFIGURATION_DIR);
    let environment = Environment::load()?;

    load_config_from::<T>(&directory, environment)
}

/// Same as [`load_config`] but reads the files from an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let mut builder = config::Config::builder();
    for layer in [Layer::Base, Layer::Environment(environment)] {
        let path = find_layer_file(directory, layer)?;
        builder = builder.add_source(config::File::from(path.clone()));

        // Building eagerly attributes parse errors to the file that caused them.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::ConfigurationFileLoad {
                layer: layer.to_string(),
                path,
                source,
            })?;
    }

    let settings = builder
        .add_source(environment_source::<T>())
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_source<T: Config>() -> config::Environment {
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

fn find_layer_file(directory: &Path, layer: Layer) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.file_stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}
