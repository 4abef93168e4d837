use crate::config::Config;
use crate::error::{DailyFlowError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Mode for a manifest written where none existed before.
#[cfg(unix)]
const NEW_MANIFEST_MODE: u32 = 0o644;

/// One consolidated output location, read by the final load step.
///
/// Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub entity: String,
    pub path: String,
}

impl ManifestEntry {
    pub fn new<E: Into<String>, P: Into<String>>(entity: E, path: P) -> Self {
        Self {
            entity: entity.into(),
            path: path.into(),
        }
    }
}

pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.manifest_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the manifest with `entries`, in order.
    ///
    /// The parent directory must already exist. Content goes to a temporary
    /// file next to the target first, so the previous manifest stays intact
    /// until the new one is complete. An existing manifest keeps its
    /// permissions; a new one is readable by everyone.
    pub fn write(&self, entries: &[ManifestEntry]) -> Result<&Path> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut content = serde_json::to_vec_pretty(entries)?;
        content.push(b'\n');

        let mut temp = NamedTempFile::new_in(parent).map_err(|e| self.error(e))?;
        if let Some(permissions) = self.target_permissions() {
            temp.as_file()
                .set_permissions(permissions)
                .map_err(|e| self.error(e))?;
        }
        temp.write_all(&content).map_err(|e| self.error(e))?;
        temp.as_file().sync_all().map_err(|e| self.error(e))?;
        temp.persist(&self.path).map_err(|e| self.error(e.error))?;

        log::info!(
            "Manifest written with {} entr{} to {}",
            entries.len(),
            if entries.len() == 1 { "y" } else { "ies" },
            self.path.display()
        );
        Ok(&self.path)
    }

    pub fn load(&self) -> Result<Vec<ManifestEntry>> {
        let content = fs::read(&self.path).map_err(|e| self.error(e))?;
        Ok(serde_json::from_slice(&content)?)
    }

    fn target_permissions(&self) -> Option<fs::Permissions> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(_) => default_permissions(),
        }
    }

    fn error(&self, source: std::io::Error) -> DailyFlowError {
        DailyFlowError::Manifest {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn default_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(NEW_MANIFEST_MODE))
}

#[cfg(not(unix))]
fn default_permissions() -> Option<fs::Permissions> {
    None
}

/// Serialize `entries` to the configured manifest location.
pub fn write_manifest(config: &Config, entries: &[ManifestEntry]) -> Result<PathBuf> {
    let writer = ManifestWriter::from_config(config)?;
    writer.write(entries)?;
    Ok(writer.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Vec<ManifestEntry> {
        vec![
            ManifestEntry::new("a", "p1"),
            ManifestEntry::new("b", "p2"),
        ]
    }

    #[test]
    fn test_written_manifest_parses_back() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));

        writer.write(&sample()).unwrap();

        assert_eq!(writer.load().unwrap(), sample());
        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(writer.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!([
                {"entity": "a", "path": "p1"},
                {"entity": "b", "path": "p2"}
            ])
        );
    }

    #[test]
    fn test_key_order_is_entity_then_path() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));
        writer.write(&[ManifestEntry::new("orders", "../data/x/orders/d")]).unwrap();

        let text = fs::read_to_string(writer.path()).unwrap();
        let entity_at = text.find("\"entity\"").unwrap();
        let path_at = text.find("\"path\"").unwrap();
        assert!(entity_at < path_at);
    }

    #[test]
    fn test_overwrite_is_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));

        fs::write(writer.path(), b"stale content that is much longer than the new one").unwrap();
        writer.write(&sample()).unwrap();
        let first = fs::read(writer.path()).unwrap();
        writer.write(&sample()).unwrap();
        let second = fs::read(writer.path()).unwrap();

        assert_eq!(first, second);
        assert!(!String::from_utf8(first).unwrap().contains("stale"));
    }

    #[test]
    fn test_empty_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));
        writer.write(&[]).unwrap();
        assert!(writer.load().unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));
        let entries = vec![
            ManifestEntry::new("orders", "../data/csv/orders/d"),
            ManifestEntry::new("orders", "../data/postgres-northwind/orders/d"),
        ];
        writer.write(&entries).unwrap();
        assert_eq!(writer.load().unwrap().len(), 2);
    }

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn test_new_manifest_is_world_readable() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));

        writer.write(&sample()).unwrap();
        assert_eq!(mode_of(writer.path()), 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_keeps_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("config.json"));
        fs::write(writer.path(), b"[]").unwrap();
        fs::set_permissions(writer.path(), fs::Permissions::from_mode(0o640)).unwrap();

        writer.write(&sample()).unwrap();
        assert_eq!(mode_of(writer.path()), 0o640);

        fs::set_permissions(writer.path(), fs::Permissions::from_mode(0o644)).unwrap();
        writer.write(&sample()).unwrap();
        assert_eq!(mode_of(writer.path()), 0o644);
    }

    #[test]
    fn test_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(temp_dir.path().join("absent/config.json"));

        let err = writer.write(&sample()).unwrap_err();
        assert!(matches!(err, DailyFlowError::Manifest { .. }));
        assert!(!temp_dir.path().join("absent").exists());
    }

    #[test]
    fn test_write_manifest_uses_configured_location() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("indicium-challenge")).unwrap();
        let mut config = Config::default();
        config.paths.root = Some(temp_dir.path().to_path_buf());

        let path = write_manifest(&config, &sample()).unwrap();
        assert_eq!(path, temp_dir.path().join("indicium-challenge/config.json"));
        assert!(path.is_file());
    }
}
