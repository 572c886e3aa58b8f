//! A directory of type-fact files loaded into a metadata service

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use metaweave_engine::{
    EngineConfig, EngineError, InMemoryFacts, MetadataService, MetadataValue, TypeFacts,
};
use metaweave_ids::{Identifier, IdentifierError, TypeKey};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid type facts in {path}: {source}")]
    Facts {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Type facts read from `*.json` files under a root, with the built-in
/// providers active over them
pub struct Project {
    root: PathBuf,
    facts: Arc<InMemoryFacts>,
    service: MetadataService,
    /// Which type each file last declared
    files: HashMap<PathBuf, TypeKey>,
}

impl Project {
    /// Load every fact file under `root` and activate the built-in providers
    pub fn open(root: &Path, config: EngineConfig) -> Result<Self> {
        let facts = Arc::new(InMemoryFacts::new());
        let service = MetadataService::with_config(facts.clone(), config);
        metaweave_providers::register_builtin(&service)?;

        let mut project = Self {
            root: root.to_path_buf(),
            facts,
            service,
            files: HashMap::new(),
        };
        project.load_all()?;
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn service(&self) -> &MetadataService {
        &self.service
    }

    pub fn facts(&self) -> &InMemoryFacts {
        &self.facts
    }

    fn load_all(&mut self) -> Result<()> {
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_fact_file(e.path()))
        {
            self.load_file(entry.path())?;
        }
        tracing::info!("loaded {} types from {}", self.facts.len(), self.root.display());
        Ok(())
    }

    /// Read one fact file, returning every type whose facts changed
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<TypeKey>> {
        let source = fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let facts: TypeFacts = serde_json::from_str(&source).map_err(|source| CliError::Facts {
            path: path.to_path_buf(),
            source,
        })?;

        let key = facts.key();
        let mut changed = vec![key.clone()];
        if let Some(previous) = self.files.insert(path.to_path_buf(), key.clone()) {
            if previous != key {
                self.facts.remove(&previous);
                changed.push(previous);
            }
        }
        self.facts.put(facts);
        Ok(changed)
    }

    /// Forget a deleted fact file, returning the type it declared
    pub fn remove_file(&mut self, path: &Path) -> Option<TypeKey> {
        let key = self.files.remove(path)?;
        self.facts.remove(&key);
        Some(key)
    }

    /// Compute every identifier the active providers own
    pub fn derive_all(&self) -> Result<Vec<(Identifier, MetadataValue)>> {
        self.service
            .rescan()
            .into_iter()
            .map(|id| {
                let value = self.service.get(&id)?;
                Ok((id, value))
            })
            .collect()
    }

    /// Announce changed types and recompute what they invalidated
    pub fn refresh(&self, keys: &[TypeKey]) -> Result<Vec<(Identifier, MetadataValue)>> {
        let mut invalidated = BTreeSet::new();
        for key in keys {
            let report = self.service.notify_type_changed(key);
            invalidated.extend(report.invalidated.into_iter().filter(|id| !id.is_physical()));
        }
        invalidated
            .into_iter()
            .map(|id| {
                let value = self.service.get(&id)?;
                Ok((id, value))
            })
            .collect()
    }

    /// Apply a file system event, returning the types it changed
    pub fn apply_event(&mut self, event: Event) -> Result<Vec<TypeKey>> {
        let mut changed = Vec::new();
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                for path in event.paths.iter().filter(|p| is_fact_file(p)) {
                    if path.exists() {
                        changed.extend(self.load_file(path)?);
                    } else {
                        changed.extend(self.remove_file(path));
                    }
                }
            }
            EventKind::Remove(_) => {
                for path in event.paths.iter().filter(|p| is_fact_file(p)) {
                    changed.extend(self.remove_file(path));
                }
            }
            _ => {}
        }
        Ok(changed)
    }

    /// Apply each event and recompute what it invalidated, handing every
    /// outcome to `report`; a failed event does not end the loop
    pub fn follow<I, F>(&mut self, events: I, mut report: F)
    where
        I: IntoIterator<Item = notify::Result<Event>>,
        F: FnMut(&Self, Result<Vec<(Identifier, MetadataValue)>>),
    {
        for event in events {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("watch error: {}", e);
                    continue;
                }
            };
            let refreshed = match self.apply_event(event) {
                Ok(changed) if changed.is_empty() => continue,
                Ok(changed) => self.refresh(&changed),
                Err(e) => Err(e),
            };
            report(self, refreshed);
        }
    }

    /// Start watching the root; events arrive on the returned channel
    pub fn watch(&self) -> Result<(RecommendedWatcher, Receiver<notify::Result<Event>>)> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        Ok((watcher, rx))
    }
}

fn is_fact_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}
