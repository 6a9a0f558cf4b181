//! freeports CLI - extract holdings tables from PDF financial reports

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

use freeports::config::{verbosity_to_level, SearchPaths, DEFAULT_VERBOSITY};
use freeports::fetch::default_fetcher;
use freeports::{
    BatchReport, BatchRunner, Config, ConfigResolver, Error, Extractor, FormatRegistry, JobRunner,
    LopdfRenderer, Options, Renderer, Targets,
};

#[derive(Parser)]
#[command(name = "freeports")]
#[command(version)]
#[command(about = "Extract holdings tables from issuer-specific PDF financial reports", long_about = None)]
struct Cli {
    /// URL of the report
    #[arg(short, long)]
    url: Option<String>,

    /// Local report path (read if it exists, otherwise the download target)
    #[arg(short = 'i', long, value_name = "FILE")]
    pdf: Option<PathBuf>,

    /// Activate batch mode with this CSV job file
    #[arg(short, long, value_name = "FILE")]
    batch: Option<PathBuf>,

    /// Parallel workers; 0 or less uses every available core
    #[arg(short = 'j', long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Report format (see --list-formats)
    #[arg(short, long)]
    format: Option<String>,

    /// Don't save downloaded reports locally
    #[arg(long)]
    no_download: bool,

    /// Write one CSV per job instead of a merged table (batch mode)
    #[arg(long)]
    separate_out: bool,

    /// Output file name prefix (batch mode)
    #[arg(long, value_name = "PREFIX")]
    prefix_out: Option<String>,

    /// CSV of issuer names to keep (first column)
    #[arg(long, value_name = "FILE")]
    targets: Option<PathBuf>,

    /// Custom configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Additional format table (YAML)
    #[arg(long, value_name = "FILE")]
    format_table: Option<PathBuf>,

    /// Output CSV (stdout if not specified); a directory or .tar.gz in batch mode
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    quiet: u8,

    /// List the available formats and exit
    #[arg(long)]
    list_formats: bool,

    /// Print the rendered page blocks as JSON lines instead of extracting
    #[arg(long)]
    dump_blocks: bool,
}

impl Cli {
    fn options(&self) -> freeports::Result<Options> {
        let options = Options {
            url: self.url.clone(),
            pdf: self.pdf.clone(),
            batch: self.batch.clone(),
            n_workers: self.workers,
            format: self.format.as_ref().map(|f| f.trim().to_uppercase()),
            save_pdf: self.no_download.then_some(false),
            separate_out: self.separate_out.then_some(true),
            prefix_out: self.prefix_out.clone(),
            targets: self.targets.clone(),
            config_file: self.config.clone(),
            out_path: self.out.clone(),
            ..Options::default()
        };
        options.with_verbosity_delta(self.verbose, self.quiet)
    }
}

fn main() {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Trace)
        .format_timestamp(None)
        .init();
    log::set_max_level(verbosity_to_level(DEFAULT_VERBOSITY));

    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{} [{}]: {}", "Error".red().bold(), e.stage(), e);
            std::process::exit(1);
        }
    }
}

/// Returns `false` when some batch job failed.
fn run(cli: &Cli) -> freeports::Result<bool> {
    let mut registry = FormatRegistry::with_defaults()?;
    if let Some(path) = &cli.format_table {
        registry.load_file(path)?;
    }

    if cli.list_formats {
        cmd_list_formats(&registry);
        return Ok(true);
    }

    let resolver = ConfigResolver::new()
        .with_env(std::env::vars())
        .with_cli(cli.options()?)
        .with_search_paths(SearchPaths::standard(|k| std::env::var(k).ok()))
        .with_formats(registry.ids());
    let config = resolver.resolve()?;
    log::set_max_level(config.log_level());

    let targets = match &config.targets {
        Some(path) => Targets::from_path(path)?,
        None => Targets::default(),
    };
    log::debug!("{} targets loaded", targets.len());

    let renderer: Arc<dyn Renderer> = Arc::new(LopdfRenderer::new());
    let extractor = Extractor::new(renderer.clone()).with_workers(config.n_workers);
    let runner = JobRunner::new(Arc::new(registry), default_fetcher()?, extractor)
        .with_targets(targets);

    if cli.dump_blocks {
        cmd_dump_blocks(&runner, renderer.as_ref(), &config)?;
        return Ok(true);
    }

    if config.is_batch() {
        let report = cmd_batch(runner, resolver, &config)?;
        return Ok(!report.has_failures());
    }

    cmd_single(&runner, &config)?;
    Ok(true)
}

fn cmd_list_formats(registry: &FormatRegistry) {
    println!("{}", "Formats".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for format in registry.iter() {
        println!("{:<14} {}", format.id().bold(), format.description());
    }
}

fn cmd_dump_blocks(
    runner: &JobRunner,
    renderer: &dyn Renderer,
    config: &Config,
) -> freeports::Result<()> {
    config.validate_input()?;
    let bytes = runner.acquire(config)?;
    let blocks = renderer.render(&bytes)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for block in &blocks {
        let line = serde_json::to_string(block).map_err(|e| Error::Other(e.to_string()))?;
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_single(runner: &JobRunner, config: &Config) -> freeports::Result<()> {
    let table = runner.run(config)?;
    match &config.out_path {
        Some(path) => {
            table.write_csv(BufWriter::new(File::create(path)?))?;
            eprintln!(
                "{} {} rows ({}) to {}",
                "Saved".green(),
                table.len(),
                table.format,
                path.display()
            );
        }
        None => table.write_csv(io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_batch(
    runner: JobRunner,
    resolver: ConfigResolver,
    config: &Config,
) -> freeports::Result<BatchReport> {
    let batch = BatchRunner::new(runner, resolver);
    let total = batch.job_count(config)?;

    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    let progress = pb.clone();
    let batch = batch.with_progress(move |outcome| {
        progress.set_message(outcome.identity.clone());
        progress.inc(1);
    });

    let report = batch.run(config)?;
    pb.finish_and_clear();

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(table) => println!(
                "  {} {} {} ({} rows)",
                "ok".green(),
                outcome.identity,
                table.format.dimmed(),
                table.len()
            ),
            Err(failure) => eprintln!(
                "  {} {} [{}]: {}",
                "failed".red().bold(),
                outcome.identity,
                failure.stage,
                failure.message
            ),
        }
    }
    println!(
        "\n{} {} succeeded, {} failed, output in {}",
        "Done!".green().bold(),
        report.succeeded(),
        report.failed(),
        report.output.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_to_options() {
        let cli = Cli::parse_from([
            "freeports",
            "-u",
            "https://www.arcafondi.it/r.pdf",
            "-f",
            "arca",
            "--no-download",
            "-j",
            "-1",
            "-vv",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.format.as_deref(), Some("ARCA"));
        assert_eq!(options.save_pdf, Some(false));
        assert_eq!(options.n_workers, Some(-1));
        assert_eq!(options.verbosity, Some(4));
        assert!(options.separate_out.is_none());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let cli = Cli::parse_from(["freeports", "-v", "-q"]);
        assert!(matches!(cli.options(), Err(Error::InvalidOption { .. })));
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
