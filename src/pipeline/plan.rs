use crate::config::Config;
use crate::error::Result;
use crate::layout::ManifestEntry;
use crate::run_date::RunDate;
use crate::scanner::Source;
use crate::tool::{CommandFactory, ToolCommand};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub id: String,
    pub command: ToolCommand,
}

impl Step {
    fn new<S: Into<String>>(id: S, command: ToolCommand) -> Self {
        Self {
            id: id.into(),
            command,
        }
    }
}

/// The sequential steps that extract one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBranch {
    pub source: Source,
    pub steps: Vec<Step>,
    pub entry: ManifestEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelinePlan {
    pub date: RunDate,
    pub branches: Vec<SourceBranch>,
    pub manifest_path: PathBuf,
    pub closing: Vec<Step>,
    pub warnings: Vec<String>,
}

impl PipelinePlan {
    /// Lays out one branch per source, in the given order, plus the
    /// closing consolidation steps.
    pub fn build(config: &Config, date: &RunDate, sources: Vec<Source>) -> Result<Self> {
        let factory = CommandFactory::new(config)?;
        let warnings = source_warnings(&sources);
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        let branches = sources
            .into_iter()
            .map(|source| {
                let entity = source.entity().to_string();
                let steps = vec![
                    Step::new(
                        format!("set_destination_{}", entity),
                        factory.configure_destination(&source, date),
                    ),
                    Step::new(format!("extract_{}", entity), factory.extract_load(&source)),
                ];
                let entry = ManifestEntry::new(entity, factory.destination(&source, date));
                SourceBranch {
                    source,
                    steps,
                    entry,
                }
            })
            .collect();

        let closing = vec![
            Step::new("set_manifest_definition", factory.configure_manifest()),
            Step::new("load_consolidated", factory.consolidate()),
        ];

        Ok(Self {
            date: date.clone(),
            branches,
            manifest_path: config.manifest_path()?,
            closing,
            warnings,
        })
    }

    /// Manifest entries in branch order.
    pub fn manifest_entries(&self) -> Vec<ManifestEntry> {
        self.branches.iter().map(|b| b.entry.clone()).collect()
    }

    pub fn step_count(&self) -> usize {
        self.branches.iter().map(|b| b.steps.len()).sum::<usize>() + self.closing.len()
    }
}

static PLUGIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("plugin name pattern is valid")
});

/// Flags names that will collide or read badly as tool plugin names.
///
/// Nothing is renamed or dropped; the run proceeds with the raw names.
fn source_warnings(sources: &[Source]) -> Vec<String> {

    let mut warnings = Vec::new();
    let mut by_entity: HashMap<&str, Vec<String>> = HashMap::new();
    for source in sources {
        by_entity.entry(source.entity()).or_default().push(source.id());
        if !PLUGIN_NAME.is_match(source.entity()) {
            warnings.push(format!(
                "Source '{}' has a name that is unusual for a plugin: '{}'",
                source.id(),
                source.entity()
            ));
        }
    }

    let mut duplicates: Vec<_> = by_entity.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    duplicates.sort();
    for (entity, ids) in duplicates {
        warnings.push(format!(
            "Entity '{}' is produced by {} sources ({}); they share plugin names and manifest entity",
            entity,
            ids.len(),
            ids.join(", ")
        ));
    }

    warnings
}
