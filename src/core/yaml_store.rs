//! Plain-text data source: one YAML file per entity
//!
//! ```text
//! <root>/
//!   .bodyshop/config.yaml
//!   opportunities/OPP-1.yaml
//!   workfiles/WF-01J....yaml
//!   tasks/TASK-01J....yaml
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::config::{Config, CONFIG_FILE, SHOP_DIR};
use crate::core::entity::Entity;
use crate::core::identity::{EntityKind, TaskId, WorkfileId};
use crate::core::store::{DataSource, Snapshot, StoreError};
use crate::entities::{Opportunity, Task, Workfile};

fn dir_name(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Opportunity => "opportunities",
        EntityKind::Workfile => "workfiles",
        EntityKind::Task => "tasks",
        EntityKind::Technician => "technicians",
    }
}

/// File-safe form of an id
///
/// Bytes outside `[A-Za-z0-9_-]` become `%XX`, so distinct ids map to
/// distinct names.
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

/// Just enough of a record to see whose file it is
#[derive(Deserialize)]
struct StoredId {
    id: String,
}

#[derive(Debug, Clone)]
pub struct YamlSource {
    root: PathBuf,
}

impl YamlSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout and a default shop config
    ///
    /// An existing config is left alone unless `force` is set.
    pub fn init(root: impl Into<PathBuf>, force: bool) -> Result<Self, StoreError> {
        let source = Self::new(root);
        for kind in [EntityKind::Opportunity, EntityKind::Workfile, EntityKind::Task] {
            fs::create_dir_all(source.kind_dir(kind))?;
        }
        let shop_dir = source.root.join(SHOP_DIR);
        fs::create_dir_all(&shop_dir)?;
        let config = shop_dir.join(CONFIG_FILE);
        if force || !config.exists() {
            fs::write(&config, Config::default_yaml())?;
        }
        Ok(source)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when `root` looks like an initialized data directory
    pub fn is_initialized(root: &Path) -> bool {
        root.join(SHOP_DIR).is_dir()
    }

    fn kind_dir(&self, kind: EntityKind) -> PathBuf {
        self.root.join(dir_name(kind))
    }

    pub fn path_for(&self, kind: EntityKind, id: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.yaml", file_stem(id)))
    }

    fn read_all<T: DeserializeOwned>(&self, kind: EntityKind) -> Result<Vec<T>, StoreError> {
        let dir = self.kind_dir(kind);
        match fs::symlink_metadata(&dir) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&dir).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() || !path.extension().is_some_and(|ext| ext == "yaml") {
                continue;
            }
            let content = fs::read_to_string(path)?;
            let item = serde_yml::from_str(&content).map_err(|e| StoreError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            items.push(item);
        }
        debug!(kind = %kind, count = items.len(), "loaded entities");
        Ok(items)
    }

    /// Refuse to replace a file that holds a different record, which happens
    /// when ids differ only in case on a case-insensitive file system
    fn check_owner(&self, path: &Path, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredId = serde_yml::from_str(&content).map_err(|e| StoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if stored.id != id {
            return Err(StoreError::PathCollision {
                kind,
                id: id.to_string(),
                existing: stored.id,
            });
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the target
    fn write_one<T: Entity + Serialize>(&self, item: &T) -> Result<(), StoreError> {
        let path = self.path_for(T::KIND, item.id_str());
        self.check_owner(&path, T::KIND, item.id_str())?;
        let yaml = serde_yml::to_string(item).map_err(|e| StoreError::Serialize {
            id: item.id_str().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove_one(&self, kind: EntityKind, id: &str) -> Result<(), StoreError> {
        let path = self.path_for(kind, id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl DataSource for YamlSource {
    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            opportunities: self.read_all(EntityKind::Opportunity)?,
            workfiles: self.read_all(EntityKind::Workfile)?,
            tasks: self.read_all(EntityKind::Task)?,
        })
    }

    fn write_opportunity(&self, opportunity: &Opportunity) -> Result<(), StoreError> {
        self.write_one(opportunity)
    }

    fn write_workfile(&self, workfile: &Workfile) -> Result<(), StoreError> {
        self.write_one(workfile)
    }

    fn remove_workfile(&self, id: &WorkfileId) -> Result<(), StoreError> {
        self.remove_one(EntityKind::Workfile, id.as_str())
    }

    fn write_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_one(task)
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        self.remove_one(EntityKind::Task, id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::Repository;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_layout() {
        let tmp = tempdir().unwrap();
        YamlSource::init(tmp.path(), false).unwrap();

        assert!(YamlSource::is_initialized(tmp.path()));
        assert!(tmp.path().join("opportunities").is_dir());
        assert!(tmp.path().join("workfiles").is_dir());
        assert!(tmp.path().join("tasks").is_dir());
        assert!(tmp.path().join(".bodyshop/config.yaml").is_file());
    }

    #[test]
    fn test_init_keeps_existing_config() {
        let tmp = tempdir().unwrap();
        YamlSource::init(tmp.path(), false).unwrap();
        let config = tmp.path().join(".bodyshop/config.yaml");
        fs::write(&config, "upload_window_hours: 48\n").unwrap();

        YamlSource::init(tmp.path(), false).unwrap();
        assert_eq!(fs::read_to_string(&config).unwrap(), "upload_window_hours: 48\n");
    }

    #[test]
    fn test_write_then_load() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::init(tmp.path(), false).unwrap();

        let mut opp = Opportunity::new("OPP-1", Utc::now());
        opp.vehicle.make = "Mazda".into();
        source.write_opportunity(&opp).unwrap();
        let task = Task::new("Call owner", "sam", Utc::now());
        source.write_task(&task).unwrap();

        assert!(source.path_for(EntityKind::Opportunity, "OPP-1").is_file());
        let snapshot = source.load().unwrap();
        assert_eq!(snapshot.opportunities, vec![opp]);
        assert_eq!(snapshot.tasks, vec![task.clone()]);

        source.delete_task(&task.id).unwrap();
        source.delete_task(&task.id).unwrap();
        assert!(source.load().unwrap().tasks.is_empty());
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::init(tmp.path(), false).unwrap();
        fs::write(tmp.path().join("opportunities/OPP-9.yaml"), "id: [unclosed").unwrap();

        let err = source.load().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_repository_over_yaml() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::init(tmp.path(), false).unwrap();
        source
            .write_opportunity(&Opportunity::new("OPP-1", Utc::now()))
            .unwrap();

        let repo = Repository::open(Arc::new(source.clone())).unwrap();
        repo.modify_opportunity(&"OPP-1".into(), |opp| {
            opp.notes = Some("hail damage".into());
            Ok(())
        })
        .unwrap();

        let reloaded = source.load().unwrap();
        assert_eq!(reloaded.opportunities[0].notes.as_deref(), Some("hail damage"));
    }

    #[test]
    fn test_file_stem_encodes_unsafe_bytes() {
        assert_eq!(file_stem("OPP/1 a"), "OPP%2F1%20a");
        assert_eq!(file_stem("WF-01ABC"), "WF-01ABC");
        assert_eq!(file_stem("OPP_1"), "OPP_1");
        assert_eq!(file_stem("50%"), "50%25");
    }

    #[test]
    fn test_similar_ids_keep_separate_files() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::init(tmp.path(), false).unwrap();
        let repo = Repository::open(Arc::new(source.clone())).unwrap();

        repo.add_opportunity(Opportunity::new("OPP 1", Utc::now())).unwrap();
        repo.add_opportunity(Opportunity::new("OPP_1", Utc::now())).unwrap();

        let reopened = Repository::open(Arc::new(source)).unwrap();
        let ids: Vec<_> = reopened
            .opportunities()
            .into_iter()
            .map(|o| o.id.to_string())
            .collect();
        assert_eq!(ids, vec!["OPP 1", "OPP_1"]);
    }

    #[test]
    fn test_write_refuses_file_owned_by_another_id() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::init(tmp.path(), false).unwrap();
        let other = Opportunity::new("opp-1", Utc::now());
        let yaml = serde_yml::to_string(&other).unwrap();
        fs::write(source.path_for(EntityKind::Opportunity, "OPP-1"), yaml).unwrap();

        let err = source
            .write_opportunity(&Opportunity::new("OPP-1", Utc::now()))
            .unwrap_err();
        assert!(matches!(err, StoreError::PathCollision { ref existing, .. } if existing == "opp-1"));

        let snapshot = source.load().unwrap();
        assert_eq!(snapshot.opportunities, vec![other]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_fails_load() {
        let tmp = tempdir().unwrap();
        let source = YamlSource::new(tmp.path());
        assert!(source.load().unwrap().opportunities.is_empty());

        // Self-referencing link: the scan cannot resolve it
        std::os::unix::fs::symlink("opportunities", tmp.path().join("opportunities")).unwrap();
        let err = source.load().unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
