use crate::config::Config;
use crate::error::{DailyFlowError, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// A data origin found two levels below the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub category: String,
    pub name: String,
}

impl Source {
    pub fn new<C: Into<String>, N: Into<String>>(category: C, name: N) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// `<category>/<name>`, the form used in destination paths.
    pub fn id(&self) -> String {
        format!("{}/{}", self.category, self.name)
    }

    /// Plugin suffix and manifest entity; only the last segment is used.
    pub fn entity(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.name)
    }
}

pub struct SourceScanner<'a> {
    config: &'a Config,
}

impl<'a> SourceScanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Lists every `<category>/<entry>` under the data directory.
    ///
    /// First-level entries that are not directories are skipped. Every
    /// second-level entry counts, file or directory. Both levels are sorted
    /// by file name so the result does not depend on the platform's listing
    /// order. Duplicates are not removed. Names must be valid UTF-8, since
    /// they end up in plugin names and the manifest.
    pub fn scan(&self) -> Result<Vec<Source>> {
        let data_path = self.config.data_path()?;

        let mut sources = Vec::new();
        for category in list_entries(&data_path)? {
            let category_path = data_path.join(&category);
            // `is_dir` follows symlinks, so a linked category is still scanned.
            if !category_path.is_dir() {
                log::debug!("Skipping non-directory {}", category_path.display());
                continue;
            }

            let category_name = utf8_name(&data_path, category)?;
            for name in list_entries(&category_path)? {
                let name = utf8_name(&category_path, name)?;
                sources.push(Source::new(category_name.clone(), name));
            }
        }

        log::info!("Source listing complete: {} source(s)", sources.len());
        Ok(sources)
    }
}

/// Names of the direct children of `dir`, sorted, exactly as stored on disk.
pub(crate) fn list_entries(dir: &Path) -> Result<Vec<OsString>> {
    // Report a missing or unreadable directory against its own path.
    std::fs::read_dir(dir).map_err(|e| DailyFlowError::filesystem(dir, e))?;

    let mut names = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(dir).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory loop detected"));
            DailyFlowError::filesystem(path, source)
        })?;
        names.push(entry.file_name().to_os_string());
    }

    Ok(names)
}

fn utf8_name(dir: &Path, name: OsString) -> Result<String> {
    name.into_string().map_err(|name| {
        DailyFlowError::filesystem(
            dir.join(name),
            io::Error::new(io::ErrorKind::InvalidData, "entry name is not valid UTF-8"),
        )
    })
}

/// Enumerate the available sources under `<root>/<data_dir>`.
pub fn enumerate_sources(config: &Config) -> Result<Vec<Source>> {
    SourceScanner::new(config).scan()
}
