//! Batch orchestration.
//!
//! `parse job file → resolve per-job config → dispatch → collect →
//! aggregate → archive`. Every job row is resolved before the first job
//! starts. Each job then runs end to end on one worker; a failing job is
//! recorded and never cancels its siblings.

mod aggregate;
mod archive;
mod jobs;
mod pool;

pub use aggregate::{
    merge, numbered_name, separate_file_name, write_merged, write_separate, FORMAT_COLUMN,
    MERGED_FILE, REPORT_COLUMN,
};
pub use archive::OutputDir;
pub use jobs::{parse_job_file, parse_jobs};
pub use pool::run_ordered;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{Config, ConfigResolver};
use crate::error::{Error, FailureKind, Result, Stage};
use crate::job::{download_path, job_identity, JobRunner};
use crate::model::Table;

/// A recorded job failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub stage: Stage,
    pub message: String,
}

impl From<&Error> for JobFailure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

/// Result of one batch job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    /// Position in the job file, 0-based
    pub index: usize,
    /// URL or PDF path of the job
    pub identity: String,
    pub prefix: Option<String>,
    pub result: std::result::Result<Table, JobFailure>,
}

impl JobOutcome {
    pub fn table(&self) -> Option<&Table> {
        self.result.as_ref().ok()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.result.as_ref().err()
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// One outcome per job, in job file order
    pub outcomes: Vec<JobOutcome>,
    /// Output directory or archive
    pub output: PathBuf,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }
}

type ProgressFn = dyn Fn(&JobOutcome) + Send + Sync;

/// Runs a job file.
#[derive(Clone)]
pub struct BatchRunner {
    runner: JobRunner,
    resolver: ConfigResolver,
    progress: Option<Arc<ProgressFn>>,
}

impl BatchRunner {
    /// Jobs run single-threaded: batch mode parallelizes across jobs only.
    pub fn new(runner: JobRunner, resolver: ConfigResolver) -> Self {
        let extractor = runner.extractor().clone().with_workers(1);
        Self {
            runner: runner.with_extractor(extractor),
            resolver,
            progress: None,
        }
    }

    /// Call `progress` as each job finishes (from the worker thread).
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(&JobOutcome) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Number of jobs in the configured job file.
    pub fn job_count(&self, base: &Config) -> Result<usize> {
        let batch = batch_path(base)?;
        Ok(parse_job_file(batch)?.len())
    }

    /// Resolve the configuration of every job in the job file.
    ///
    /// The first malformed or inconsistent row fails the whole batch. Jobs
    /// that would download into the same file get numbered file names.
    pub fn resolve_jobs(&self, base: &Config) -> Result<Vec<Config>> {
        let batch = batch_path(base)?;
        let mut configs = Vec::new();
        for (index, options) in parse_job_file(batch)?.iter().enumerate() {
            let config = self
                .resolver
                .resolve_job(base, options)
                .map_err(|e| e.for_job(index + 1))?;
            configs.push(config);
        }
        assign_download_paths(&mut configs);
        Ok(configs)
    }

    /// Run every job of `base.batch` and write the results under
    /// `base.out_path`.
    ///
    /// Configuration errors, including those of single job rows, fail the
    /// whole batch before any job runs; job errors are recorded in the report.
    pub fn run(&self, base: &Config) -> Result<BatchReport> {
        base.validate()?;
        let out = base.out_path.as_deref().ok_or_else(|| {
            Error::ConfigurationInconsistent("batch mode needs an output path".into())
        })?;
        let jobs = self.resolve_jobs(base)?;

        let output = OutputDir::prepare(out)?;
        log::info!(
            "Running {} jobs on {} workers into {}",
            jobs.len(),
            base.n_workers,
            output.dir().display()
        );

        let outcomes = run_ordered(jobs, base.n_workers, |index, config| {
            let outcome = self.run_job(index, &config);
            if let Some(progress) = &self.progress {
                progress(&outcome);
            }
            outcome
        });

        if base.separate_out {
            write_separate(output.dir(), &outcomes)?;
        } else {
            write_merged(output.dir(), &outcomes)?;
        }
        let output = output.finish()?;

        let report = BatchReport { outcomes, output };
        log::info!(
            "Batch done: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    fn run_job(&self, index: usize, config: &Config) -> JobOutcome {
        let identity = job_identity(config);
        log::debug!("Job {} ({}) starting", index + 1, identity);
        let result = self.runner.run(config).map_err(|e| {
            log::error!("Job {} ({}) failed at {}: {}", index + 1, identity, e.stage(), e);
            JobFailure::from(&e)
        });
        JobOutcome {
            index,
            identity,
            prefix: config.prefix_out.clone(),
            result,
        }
    }
}

/// Give later jobs that would save their download over an earlier job's
/// file a numbered PDF path of their own.
fn assign_download_paths(configs: &mut [Config]) {
    let mut claimed: HashSet<PathBuf> = HashSet::new();
    for (index, config) in configs.iter_mut().enumerate() {
        let Some(path) = download_path(config) else {
            continue;
        };
        if !claimed.contains(&path) {
            claimed.insert(path);
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let renamed = path.with_file_name(numbered_name(&name, index + 1, |candidate| {
            let candidate = path.with_file_name(candidate);
            claimed.contains(&candidate) || candidate.exists()
        }));
        log::warn!(
            "Job {} would overwrite {}, saving to {}",
            index + 1,
            path.display(),
            renamed.display()
        );
        config.pdf = Some(renamed.clone());
        claimed.insert(renamed);
    }
}

fn batch_path(base: &Config) -> Result<&std::path::Path> {
    base.batch
        .as_deref()
        .ok_or_else(|| Error::ConfigurationInconsistent("no batch file configured".into()))
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("runner", &self.runner)
            .field("resolver", &self.resolver)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_assign_download_paths() {
        let dir = TempDir::new().unwrap();
        let shared = dir.path().join("report.pdf");
        let mut configs = vec![
            Config::default().with_url("https://a.example/x.pdf").with_pdf(shared.clone()),
            Config::default().with_url("https://b.example/y.pdf").with_pdf(shared.clone()),
            Config::default().with_url("https://c.example/q/other.pdf"),
            Config::default().with_url("https://d.example/r/other.pdf"),
            Config::default()
                .with_url("https://e.example/other.pdf")
                .with_save_pdf(false),
        ];
        assign_download_paths(&mut configs);

        assert_eq!(configs[0].pdf, Some(shared));
        assert_eq!(configs[1].pdf, Some(dir.path().join("report-2.pdf")));
        assert_eq!(configs[2].pdf, None);
        assert_eq!(configs[3].pdf, Some(PathBuf::from("other-4.pdf")));
        assert_eq!(configs[4].pdf, None);
    }
}
