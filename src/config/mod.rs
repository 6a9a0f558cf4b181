//! Layered run configuration.
//!
//! Options are resolved from five ordered layers, each overwriting only the
//! keys it defines:
//!
//! defaults → config file → environment → command line → job row
//!
//! Every layer is parsed into an [`Options`] value (all keys optional) and
//! applied onto a [`Config`], which records the layer each key came from.

mod discovery;
mod options;
mod resolver;

pub use discovery::SearchPaths;
pub use options::Options;
pub use resolver::ConfigResolver;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::LevelFilter;

use crate::error::{Error, Result};

/// Prefix of every environment variable read by the resolver.
pub const ENV_PREFIX: &str = "FREEPORTS_";

/// Verbosity used when no layer sets one.
pub const DEFAULT_VERBOSITY: u8 = 2;

/// Highest accepted verbosity.
pub const MAX_VERBOSITY: u8 = 5;

/// Archive suffix accepted as a batch output path.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Where an option value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Default,
    ConfigFile,
    Environment,
    CommandLine,
    Job,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Default => "defaults",
            Layer::ConfigFile => "config file",
            Layer::Environment => "environment",
            Layer::CommandLine => "command line",
            Layer::Job => "job row",
        };
        f.write_str(name)
    }
}

/// Configuration option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Verbosity,
    Batch,
    NWorkers,
    OutCsv,
    SavePdf,
    Url,
    Pdf,
    Format,
    ConfigFile,
    SeparateOutFiles,
    PrefixOut,
    Targets,
}

impl OptionKey {
    pub const ALL: [OptionKey; 12] = [
        OptionKey::Verbosity,
        OptionKey::Batch,
        OptionKey::NWorkers,
        OptionKey::OutCsv,
        OptionKey::SavePdf,
        OptionKey::Url,
        OptionKey::Pdf,
        OptionKey::Format,
        OptionKey::ConfigFile,
        OptionKey::SeparateOutFiles,
        OptionKey::PrefixOut,
        OptionKey::Targets,
    ];

    /// Canonical option name, e.g. `SAVE_PDF`.
    pub fn name(&self) -> &'static str {
        match self {
            OptionKey::Verbosity => "VERBOSITY",
            OptionKey::Batch => "BATCH",
            OptionKey::NWorkers => "N_WORKERS",
            OptionKey::OutCsv => "OUT_CSV",
            OptionKey::SavePdf => "SAVE_PDF",
            OptionKey::Url => "URL",
            OptionKey::Pdf => "PDF",
            OptionKey::Format => "FORMAT",
            OptionKey::ConfigFile => "CONFIG_FILE",
            OptionKey::SeparateOutFiles => "SEPARATE_OUT_FILES",
            OptionKey::PrefixOut => "PREFIX_OUT",
            OptionKey::Targets => "TARGETS",
        }
    }

    /// Environment variable name, e.g. `FREEPORTS_SAVE_PDF`.
    pub fn env_var(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.name())
    }

    /// Key in the YAML config file. `CONFIG_FILE` has none.
    pub fn yaml_key(&self) -> Option<&'static str> {
        let key = match self {
            OptionKey::Verbosity => "verbosity",
            OptionKey::Batch => "batch_path",
            OptionKey::NWorkers => "n_workers",
            OptionKey::OutCsv => "out_path",
            OptionKey::SavePdf => "save_pdf",
            OptionKey::Url => "url",
            OptionKey::Pdf => "pdf",
            OptionKey::Format => "format",
            OptionKey::ConfigFile => return None,
            OptionKey::SeparateOutFiles => "separate_out",
            OptionKey::PrefixOut => "prefix_out",
            OptionKey::Targets => "targets",
        };
        Some(key)
    }

    /// Column header in a batch job file, for the keys a job may override.
    pub fn job_header(&self) -> Option<&'static str> {
        match self {
            OptionKey::Url => Some("url"),
            OptionKey::SavePdf => Some("save pdf"),
            OptionKey::Pdf => Some("pdf"),
            OptionKey::Format => Some("format"),
            OptionKey::PrefixOut => Some("prefix out"),
            _ => None,
        }
    }

    /// Look up a key by its YAML name.
    pub fn from_yaml_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.yaml_key() == Some(key))
    }

    /// Look up a key by its job header, ignoring case and surrounding space.
    pub fn from_job_header(header: &str) -> Option<Self> {
        let header = header.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.job_header() == Some(header.as_str()))
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a boolean option, case-insensitively.
///
/// Accepts `true/on/yes/y/t/1` and `false/off/no/n/f/0`.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "y" | "t" | "1" => Some(true),
        "false" | "off" | "no" | "n" | "f" | "0" => Some(false),
        _ => None,
    }
}

/// Map a verbosity level to a log filter; higher is more detailed.
pub fn verbosity_to_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 | 1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Worker count used when none is configured.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fully resolved configuration of a run or of one batch job.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Log detail, 0 to 5
    pub verbosity: u8,
    /// Job file; set means batch mode
    pub batch: Option<PathBuf>,
    /// Worker threads (batch jobs or page ranges)
    pub n_workers: usize,
    /// Output file, directory or archive; `None` writes to stdout
    pub out_path: Option<PathBuf>,
    /// Keep downloaded PDFs on disk
    pub save_pdf: bool,
    pub url: Option<String>,
    pub pdf: Option<PathBuf>,
    /// Explicit format identifier
    pub format: Option<String>,
    pub config_file: Option<PathBuf>,
    /// One CSV per job instead of a merged table (batch mode)
    pub separate_out: bool,
    /// Output name prefix (batch mode)
    pub prefix_out: Option<String>,
    /// Issuer names restricting extraction
    pub targets: Option<PathBuf>,
    provenance: BTreeMap<OptionKey, Layer>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbosity: DEFAULT_VERBOSITY,
            batch: None,
            n_workers: available_workers(),
            out_path: None,
            save_pdf: true,
            url: None,
            pdf: None,
            format: None,
            config_file: None,
            separate_out: false,
            prefix_out: None,
            targets: None,
            provenance: OptionKey::ALL.iter().map(|k| (*k, Layer::Default)).collect(),
        }
    }
}

impl Config {
    /// Overwrite the keys `options` defines, recording `layer` as their source.
    pub fn apply(&mut self, options: &Options, layer: Layer) {
        if let Some(v) = options.verbosity {
            self.verbosity = v;
        }
        if let Some(v) = &options.batch {
            self.batch = Some(v.clone());
        }
        if let Some(v) = options.n_workers {
            self.n_workers = if v <= 0 {
                available_workers()
            } else {
                v as usize
            };
        }
        if let Some(v) = &options.out_path {
            self.out_path = Some(v.clone());
        }
        if let Some(v) = options.save_pdf {
            self.save_pdf = v;
        }
        if let Some(v) = &options.url {
            self.url = Some(v.clone());
        }
        if let Some(v) = &options.pdf {
            self.pdf = Some(v.clone());
        }
        if let Some(v) = &options.format {
            self.format = Some(v.clone());
        }
        if let Some(v) = &options.config_file {
            self.config_file = Some(v.clone());
        }
        if let Some(v) = options.separate_out {
            self.separate_out = v;
        }
        if let Some(v) = &options.prefix_out {
            self.prefix_out = Some(v.clone());
        }
        if let Some(v) = &options.targets {
            self.targets = Some(v.clone());
        }
        for key in options.keys() {
            self.provenance.insert(key, layer);
        }
    }

    /// Set options directly, as the command line would.
    pub fn with_options(mut self, options: &Options) -> Self {
        self.apply(options, Layer::CommandLine);
        self
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.with_options(&Options {
            url: Some(url.into()),
            ..Options::default()
        })
    }

    pub fn with_pdf(self, pdf: impl Into<PathBuf>) -> Self {
        self.with_options(&Options {
            pdf: Some(pdf.into()),
            ..Options::default()
        })
    }

    /// Set an explicit format identifier (uppercased).
    pub fn with_format(self, format: &str) -> Self {
        self.with_options(&Options {
            format: Some(format.trim().to_uppercase()),
            ..Options::default()
        })
    }

    pub fn with_save_pdf(self, save: bool) -> Self {
        self.with_options(&Options {
            save_pdf: Some(save),
            ..Options::default()
        })
    }

    /// Switch to batch mode over a job file.
    pub fn with_batch(self, batch: impl Into<PathBuf>) -> Self {
        self.with_options(&Options {
            batch: Some(batch.into()),
            ..Options::default()
        })
    }

    pub fn with_out_path(self, out: impl Into<PathBuf>) -> Self {
        self.with_options(&Options {
            out_path: Some(out.into()),
            ..Options::default()
        })
    }

    /// Set the worker count; zero or negative uses every core.
    pub fn with_workers(self, workers: i64) -> Self {
        self.with_options(&Options {
            n_workers: Some(workers),
            ..Options::default()
        })
    }

    pub fn with_separate_out(self, separate: bool) -> Self {
        self.with_options(&Options {
            separate_out: Some(separate),
            ..Options::default()
        })
    }

    pub fn with_prefix_out(self, prefix: impl Into<String>) -> Self {
        self.with_options(&Options {
            prefix_out: Some(prefix.into()),
            ..Options::default()
        })
    }

    /// Layer the current value of `key` came from.
    pub fn layer_of(&self, key: OptionKey) -> Layer {
        self.provenance.get(&key).copied().unwrap_or(Layer::Default)
    }

    /// Every key with its source layer.
    pub fn provenance(&self) -> &BTreeMap<OptionKey, Layer> {
        &self.provenance
    }

    /// Whether a job file is configured.
    pub fn is_batch(&self) -> bool {
        self.batch.is_some()
    }

    /// Log filter for the configured verbosity.
    pub fn log_level(&self) -> LevelFilter {
        verbosity_to_level(self.verbosity)
    }

    /// Check cross-option rules of the run configuration.
    ///
    /// In batch mode the job file must exist and the output path must name a
    /// directory or a `.tar.gz` archive. Otherwise an input must be given and
    /// the output file's directory must exist.
    pub fn validate(&self) -> Result<()> {
        match &self.batch {
            Some(batch) => {
                if !batch.is_file() {
                    return Err(Error::ConfigurationInconsistent(format!(
                        "batch file {} does not exist",
                        batch.display()
                    )));
                }
                let out = self.out_path.as_deref().ok_or_else(|| {
                    Error::ConfigurationInconsistent(
                        "batch mode needs an output directory or .tar.gz archive".into(),
                    )
                })?;
                if !is_batch_output(out) {
                    return Err(Error::ConfigurationInconsistent(format!(
                        "batch output {} must be a directory or a {} archive file",
                        out.display(),
                        ARCHIVE_SUFFIX
                    )));
                }
                Ok(())
            }
            None => {
                self.validate_input()?;
                if let Some(parent) = self.out_path.as_deref().and_then(Path::parent) {
                    if !parent.as_os_str().is_empty() && !parent.is_dir() {
                        return Err(Error::ConfigurationInconsistent(format!(
                            "output directory {} does not exist",
                            parent.display()
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    /// Check that a document source is configured.
    pub fn validate_input(&self) -> Result<()> {
        if self.url.is_none() && self.pdf.is_none() {
            return Err(Error::ConfigurationInconsistent(
                "either a URL or a PDF path is required".into(),
            ));
        }
        Ok(())
    }

    /// Log the configuration and the source of each key.
    pub fn log_provenance(&self) {
        log::debug!("Resolved configuration: {:?}", self);
        for (key, layer) in &self.provenance {
            log::debug!("  {} from {}", key, layer);
        }
    }
}

/// Whether `path` is usable as a batch output: an existing directory, a
/// new name without extension, or a `.tar.gz` archive that is not a
/// directory.
pub fn is_batch_output(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name.ends_with(ARCHIVE_SUFFIX) {
        return !path.is_dir();
    }
    path.is_dir() || (!name.contains('.') && !path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for t in ["true", "On", "YES", "y", "T", "1", " yes "] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "OFF", "no", "N", "f", "0"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_option_key_names() {
        assert_eq!(OptionKey::SavePdf.env_var(), "FREEPORTS_SAVE_PDF");
        assert_eq!(OptionKey::from_yaml_key("out_path"), Some(OptionKey::OutCsv));
        assert_eq!(OptionKey::from_job_header(" Prefix Out "), Some(OptionKey::PrefixOut));
        assert_eq!(OptionKey::from_job_header("comment"), None);
        assert_eq!(OptionKey::ConfigFile.yaml_key(), None);
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_to_level(0), LevelFilter::Error);
        assert_eq!(verbosity_to_level(2), LevelFilter::Warn);
        assert_eq!(verbosity_to_level(5), LevelFilter::Trace);
    }

    #[test]
    fn test_apply_records_layer() {
        let mut config = Config::default();
        let options = Options {
            url: Some("https://example.com/a.pdf".into()),
            n_workers: Some(3),
            ..Options::default()
        };
        config.apply(&options, Layer::Environment);
        assert_eq!(config.n_workers, 3);
        assert_eq!(config.layer_of(OptionKey::Url), Layer::Environment);
        assert_eq!(config.layer_of(OptionKey::Pdf), Layer::Default);
    }

    #[test]
    fn test_builders_record_command_line() {
        let config = Config::default()
            .with_url("https://example.com/a.pdf")
            .with_format(" eurizon ")
            .with_save_pdf(false)
            .with_workers(2);
        assert_eq!(config.url.as_deref(), Some("https://example.com/a.pdf"));
        assert_eq!(config.format.as_deref(), Some("EURIZON"));
        assert!(!config.save_pdf);
        assert_eq!(config.n_workers, 2);
        assert_eq!(config.layer_of(OptionKey::SavePdf), Layer::CommandLine);
        assert_eq!(config.layer_of(OptionKey::Batch), Layer::Default);
    }

    #[test]
    fn test_non_positive_workers_use_all_cores() {
        let mut config = Config::default();
        config.apply(
            &Options {
                n_workers: Some(0),
                ..Options::default()
            },
            Layer::CommandLine,
        );
        assert_eq!(config.n_workers, available_workers());
    }

    #[test]
    fn test_batch_output_shapes() {
        assert!(is_batch_output(Path::new("out/results")));
        assert!(is_batch_output(Path::new("results.tar.gz")));
        assert!(!is_batch_output(Path::new("results.csv")));
    }

    #[test]
    fn test_existing_paths_as_batch_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive_dir = dir.path().join("results.tar.gz");
        std::fs::create_dir(&archive_dir).unwrap();
        assert!(!is_batch_output(&archive_dir));

        let plain_file = dir.path().join("results");
        std::fs::write(&plain_file, "").unwrap();
        assert!(!is_batch_output(&plain_file));

        let old_archive = dir.path().join("old.tar.gz");
        std::fs::write(&old_archive, "").unwrap();
        assert!(is_batch_output(&old_archive));
        assert!(is_batch_output(dir.path()));
    }

    #[test]
    fn test_validate_requires_input() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigurationInconsistent(_))
        ));
    }
}
