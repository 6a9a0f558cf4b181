//! Config file discovery.

use std::path::{Path, PathBuf};

use regex::RegexBuilder;

const FILE_NAMES: [&str; 2] = ["freeports.yaml", "freeports.yml"];

const LOCAL_PATTERNS: [&str; 2] = [
    r"^\.?(config|conf)[-._]?freeports\.ya?ml$",
    r"^\.?freeports[-._]?(config|conf)\.ya?ml$",
];

/// Directories searched for a config file when none is given.
///
/// Search order: the local directory (by name pattern), then the user
/// config directories, then the system directories. The first hit wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPaths {
    pub local: Option<PathBuf>,
    pub user: Vec<PathBuf>,
    pub system: Vec<PathBuf>,
}

impl SearchPaths {
    /// No discovery at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Standard locations: working directory, `$XDG_CONFIG_HOME` (or
    /// `~/.config`), then `/etc`.
    pub fn standard<F>(env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut user = Vec::new();
        match env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
            Some(xdg) => user.push(PathBuf::from(xdg)),
            None => {
                if let Some(home) = env("HOME").filter(|v| !v.is_empty()) {
                    user.push(Path::new(&home).join(".config"));
                }
            }
        }
        let system = if cfg!(unix) {
            vec![PathBuf::from("/etc")]
        } else {
            Vec::new()
        };
        Self {
            local: std::env::current_dir().ok(),
            user,
            system,
        }
    }

    /// Locate the first config file.
    pub fn find(&self) -> Option<PathBuf> {
        if let Some(found) = self.local.as_deref().and_then(find_local) {
            log::debug!("Found local config file {}", found.display());
            return Some(found);
        }
        for dir in self.user.iter().chain(self.system.iter()) {
            for name in FILE_NAMES {
                let candidate = dir.join(name);
                log::trace!("Looking for config file {}", candidate.display());
                if candidate.is_file() {
                    log::debug!("Found config file {}", candidate.display());
                    return Some(candidate);
                }
            }
        }
        None
    }
}

fn find_local(dir: &Path) -> Option<PathBuf> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    for pattern in LOCAL_PATTERNS {
        let re = RegexBuilder::new(pattern).case_insensitive(true).build().ok()?;
        for name in &names {
            let path = dir.join(name);
            if re.is_match(name) && path.is_file() {
                return Some(path);
            }
        }
    }
    None
}
