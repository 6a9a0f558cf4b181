//! Option values of a single configuration layer.

use std::path::{Path, PathBuf};

use serde_yaml::Value as YamlValue;

use super::{parse_bool, Layer, OptionKey, DEFAULT_VERBOSITY, MAX_VERBOSITY};
use crate::error::{Error, Result};

/// Options defined by one layer; `None` leaves the lower layer's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub verbosity: Option<u8>,
    pub batch: Option<PathBuf>,
    /// Zero or negative selects every available core
    pub n_workers: Option<i64>,
    pub out_path: Option<PathBuf>,
    pub save_pdf: Option<bool>,
    pub url: Option<String>,
    pub pdf: Option<PathBuf>,
    pub format: Option<String>,
    pub config_file: Option<PathBuf>,
    pub separate_out: Option<bool>,
    pub prefix_out: Option<String>,
    pub targets: Option<PathBuf>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Coerce a raw string for `key`. Blank values leave the key unset.
    pub fn set(&mut self, key: OptionKey, raw: &str, layer: Layer) -> Result<()> {
        let value = raw.trim();
        if value.is_empty() {
            return Ok(());
        }
        match key {
            OptionKey::Verbosity => {
                let level = value
                    .parse::<u8>()
                    .ok()
                    .filter(|v| *v <= MAX_VERBOSITY)
                    .ok_or_else(|| {
                        Error::invalid_option(
                            key.name(),
                            layer,
                            format!("{:?} is not an integer between 0 and {}", value, MAX_VERBOSITY),
                        )
                    })?;
                self.verbosity = Some(level);
            }
            OptionKey::NWorkers => {
                let workers = value.parse::<i64>().map_err(|_| {
                    Error::invalid_option(key.name(), layer, format!("{:?} is not an integer", value))
                })?;
                self.n_workers = Some(workers);
            }
            OptionKey::SavePdf => self.save_pdf = Some(bool_option(key, value, layer)?),
            OptionKey::SeparateOutFiles => self.separate_out = Some(bool_option(key, value, layer)?),
            OptionKey::Batch => self.batch = Some(PathBuf::from(value)),
            OptionKey::OutCsv => self.out_path = Some(PathBuf::from(value)),
            OptionKey::Pdf => self.pdf = Some(PathBuf::from(value)),
            OptionKey::ConfigFile => self.config_file = Some(PathBuf::from(value)),
            OptionKey::Targets => self.targets = Some(PathBuf::from(value)),
            OptionKey::Url => self.url = Some(value.to_string()),
            OptionKey::Format => self.format = Some(value.to_uppercase()),
            OptionKey::PrefixOut => self.prefix_out = Some(value.to_string()),
        }
        Ok(())
    }

    /// Keys this layer defines.
    pub fn keys(&self) -> Vec<OptionKey> {
        OptionKey::ALL
            .into_iter()
            .filter(|key| self.is_set(*key))
            .collect()
    }

    /// Whether this layer defines `key`.
    pub fn is_set(&self, key: OptionKey) -> bool {
        match key {
            OptionKey::Verbosity => self.verbosity.is_some(),
            OptionKey::Batch => self.batch.is_some(),
            OptionKey::NWorkers => self.n_workers.is_some(),
            OptionKey::OutCsv => self.out_path.is_some(),
            OptionKey::SavePdf => self.save_pdf.is_some(),
            OptionKey::Url => self.url.is_some(),
            OptionKey::Pdf => self.pdf.is_some(),
            OptionKey::Format => self.format.is_some(),
            OptionKey::ConfigFile => self.config_file.is_some(),
            OptionKey::SeparateOutFiles => self.separate_out.is_some(),
            OptionKey::PrefixOut => self.prefix_out.is_some(),
            OptionKey::Targets => self.targets.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }

    /// Read the `FREEPORTS_*` variables out of an environment snapshot.
    /// Unrelated variables are ignored.
    pub fn from_env<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::new();
        for (name, value) in vars {
            if let Some(key) = OptionKey::ALL
                .into_iter()
                .find(|k| k.env_var() == name.as_ref())
            {
                options.set(key, value.as_ref(), Layer::Environment)?;
            }
        }
        Ok(options)
    }

    /// Parse a YAML config file body. Unknown keys are rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut options = Self::new();
        let doc: YamlValue = serde_yaml::from_str(yaml)?;
        let mapping = match doc {
            YamlValue::Null => return Ok(options),
            YamlValue::Mapping(m) => m,
            _ => {
                return Err(Error::invalid_option(
                    "CONFIG_FILE",
                    Layer::ConfigFile,
                    "top level must be a mapping",
                ))
            }
        };

        for (name, value) in mapping {
            let name = yaml_scalar(&name).unwrap_or_default();
            let key = OptionKey::from_yaml_key(&name).ok_or_else(|| {
                Error::invalid_option(name.clone(), Layer::ConfigFile, "unknown key")
            })?;
            if value.is_null() {
                continue;
            }
            let raw = yaml_scalar(&value).ok_or_else(|| {
                Error::invalid_option(key.name(), Layer::ConfigFile, "expected a scalar value")
            })?;
            options.set(key, &raw, Layer::ConfigFile)?;
        }
        Ok(options)
    }

    /// Read and parse a YAML config file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Apply `-v`/`-q` counts to the default verbosity, clamped to 0..=5.
    pub fn with_verbosity_delta(mut self, increase: u8, decrease: u8) -> Result<Self> {
        if increase > 0 && decrease > 0 {
            return Err(Error::invalid_option(
                OptionKey::Verbosity.name(),
                Layer::CommandLine,
                "cannot increase and decrease verbosity",
            ));
        }
        let delta = i32::from(increase) - i32::from(decrease);
        if delta != 0 {
            let level = (i32::from(DEFAULT_VERBOSITY) + delta).clamp(0, i32::from(MAX_VERBOSITY));
            self.verbosity = Some(level as u8);
        }
        Ok(self)
    }
}

fn bool_option(key: OptionKey, value: &str, layer: Layer) -> Result<bool> {
    parse_bool(value).ok_or_else(|| {
        Error::invalid_option(key.name(), layer, format!("{:?} is not a boolean", value))
    })
}

fn yaml_scalar(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::String(s) => Some(s.clone()),
        YamlValue::Bool(b) => Some(b.to_string()),
        YamlValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
