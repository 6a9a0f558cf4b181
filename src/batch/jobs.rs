//! Batch job file parsing.

use std::io::Read;
use std::path::Path;

use crate::config::{Layer, OptionKey, Options};
use crate::error::Result;

/// Parse a CSV job file with a header row.
///
/// Headers are matched case-insensitively against `url`, `save pdf`,
/// `pdf`, `format` and `prefix out`; other columns are ignored. Empty cells
/// leave the option unset so the job inherits it. A malformed cell fails
/// the whole file, naming its job.
pub fn parse_jobs<R: Read>(reader: R) -> Result<Vec<Options>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<Option<OptionKey>> = csv
        .headers()?
        .iter()
        .map(|h| {
            let key = OptionKey::from_job_header(h);
            if key.is_none() {
                log::debug!("Ignoring job column {:?}", h);
            }
            key
        })
        .collect();

    let mut jobs = Vec::new();
    for (row, record) in csv.records().enumerate() {
        let record = record?;
        let options = parse_row(&columns, &record).map_err(|e| e.for_job(row + 1))?;
        jobs.push(options);
    }
    log::info!("{} jobs read", jobs.len());
    Ok(jobs)
}

/// Parse a job file from disk.
pub fn parse_job_file<P: AsRef<Path>>(path: P) -> Result<Vec<Options>> {
    let file = std::fs::File::open(path)?;
    parse_jobs(file)
}

fn parse_row(columns: &[Option<OptionKey>], record: &csv::StringRecord) -> Result<Options> {
    let mut options = Options::new();
    for (key, value) in columns.iter().zip(record.iter()) {
        if let Some(key) = key {
            options.set(*key, value, Layer::Job)?;
        }
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::path::PathBuf;

    #[test]
    fn test_parse_jobs() {
        let data = "URL, Save PDF ,pdf,Format,Prefix Out,notes\n\
                    https://a.example/1.pdf,no,,eurizon,jan,first\n\
                    ,,local.pdf,,,\n";
        let jobs = parse_jobs(data.as_bytes()).unwrap();
        assert_eq!(jobs.len(), 2);

        let first = &jobs[0];
        assert_eq!(first.url.as_deref(), Some("https://a.example/1.pdf"));
        assert_eq!(first.save_pdf, Some(false));
        assert_eq!(first.format.as_deref(), Some("EURIZON"));
        assert_eq!(first.prefix_out.as_deref(), Some("jan"));
        assert!(first.pdf.is_none());

        let second = &jobs[1];
        assert_eq!(second.pdf, Some(PathBuf::from("local.pdf")));
        assert_eq!(second.keys(), vec![OptionKey::Pdf]);
    }

    #[test]
    fn test_bad_cell_fails_job_file() {
        let data = "url,save pdf\na,yes\nb,maybe\n";
        match parse_jobs(data.as_bytes()).unwrap_err() {
            Error::InvalidOption { key, layer, reason } => {
                assert_eq!(key, "SAVE_PDF");
                assert_eq!(layer, Layer::Job);
                assert!(reason.starts_with("job 2: "), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_only() {
        assert!(parse_jobs("url,pdf\n".as_bytes()).unwrap().is_empty());
    }
}
