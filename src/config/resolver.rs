//! Layer resolution.

use std::collections::HashMap;
use std::path::PathBuf;

use super::{Config, Layer, OptionKey, Options, SearchPaths};
use crate::error::{Error, Result};

/// Builds [`Config`]s from the declared sources only.
///
/// The environment is an explicit snapshot so resolution is deterministic;
/// the CLI passes `std::env::vars()`.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    env: HashMap<String, String>,
    cli: Options,
    search: SearchPaths,
    formats: Option<Vec<String>>,
}

impl ConfigResolver {
    /// A resolver with an empty environment, no command line and no
    /// config file discovery.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an environment snapshot.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Use command-line options.
    pub fn with_cli(mut self, cli: Options) -> Self {
        self.cli = cli;
        self
    }

    /// Discover a config file in these locations when none is given.
    pub fn with_search_paths(mut self, search: SearchPaths) -> Self {
        self.search = search;
        self
    }

    /// Restrict `FORMAT` to these identifiers (case-insensitive).
    pub fn with_formats<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.formats = Some(ids.into_iter().map(|s| s.as_ref().to_uppercase()).collect());
        self
    }

    /// Resolve the run configuration: defaults, config file, environment and
    /// command line, then validate it.
    pub fn resolve(&self) -> Result<Config> {
        let config = self.resolve_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the layers without the cross-option checks.
    pub fn resolve_unchecked(&self) -> Result<Config> {
        let env = Options::from_env(&self.env)?;
        let mut config = Config::default();

        if let Some((path, layer)) = self.config_file(&env) {
            log::debug!("Loading config file {} (from {})", path.display(), layer);
            let file = Options::from_yaml_file(&path).map_err(|e| match e {
                Error::Io(io) => Error::invalid_option(
                    OptionKey::ConfigFile.name(),
                    layer,
                    format!("cannot read {}: {}", path.display(), io),
                ),
                other => other,
            })?;
            self.apply(&mut config, &file, Layer::ConfigFile)?;
            config.config_file = Some(path);
            config.apply(
                &Options {
                    config_file: config.config_file.clone(),
                    ..Options::default()
                },
                layer,
            );
        }

        self.apply(&mut config, &env, Layer::Environment)?;
        self.apply(&mut config, &self.cli, Layer::CommandLine)?;
        config.log_provenance();
        Ok(config)
    }

    /// Resolve one batch job: apply its row on top of `base` and check that
    /// it names a document.
    pub fn resolve_job(&self, base: &Config, job: &Options) -> Result<Config> {
        let mut config = base.clone();
        self.apply(&mut config, job, Layer::Job)?;
        config.validate_input()?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config, options: &Options, layer: Layer) -> Result<()> {
        if let (Some(format), Some(known)) = (&options.format, &self.formats) {
            if !known.iter().any(|id| id == format) {
                return Err(Error::invalid_option(
                    OptionKey::Format.name(),
                    layer,
                    format!("unknown format {:?}, expected one of {}", format, known.join(", ")),
                ));
            }
        }
        config.apply(options, layer);
        Ok(())
    }

    /// `CONFIG_FILE` is resolved before every other option: command line,
    /// then environment, then discovery.
    fn config_file(&self, env: &Options) -> Option<(PathBuf, Layer)> {
        if let Some(path) = &self.cli.config_file {
            return Some((path.clone(), Layer::CommandLine));
        }
        if let Some(path) = &env.config_file {
            return Some((path.clone(), Layer::Environment));
        }
        self.search.find().map(|path| (path, Layer::Default))
    }
}
