use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serenity::futures::future::join_all;
use tracing::{debug, warn};

use crate::config::Config;
use crate::definition::{HandlerDefinition, HandlerKind};
use crate::error::LoadError;

const DEFINITION_EXTENSION: &str = "toml";
const DECLARATION_SUFFIX: &str = ".d.toml";

/// What one load of a kind produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadOutcome {
    pub definitions: Vec<HandlerDefinition>,
    /// File stems of definition files that exist but failed to parse.
    /// Whatever was loaded from them before must be kept, not dropped.
    pub unparsed: Vec<String>,
}

impl LoadOutcome {
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl From<Vec<HandlerDefinition>> for LoadOutcome {
    fn from(definitions: Vec<HandlerDefinition>) -> Self {
        Self {
            definitions,
            unparsed: Vec::new(),
        }
    }
}

/// Where handler definitions come from.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn load(&self, kind: HandlerKind) -> Result<LoadOutcome, LoadError>;
}

/// Scans the configured directories of each kind.
pub struct DirectorySource {
    base: PathBuf,
    directories: HashMap<HandlerKind, Vec<PathBuf>>,
}

impl DirectorySource {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            directories: HashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut source = Self::new(&config.definitions_root);
        for kind in HandlerKind::ALL {
            source = source.with_directories(kind, config.directories_for(kind).iter().cloned());
        }
        source
    }

    pub fn with_directories(
        mut self,
        kind: HandlerKind,
        directories: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        self.directories.entry(kind).or_default().extend(directories);
        self
    }
}

#[async_trait]
impl DefinitionSource for DirectorySource {
    async fn load(&self, kind: HandlerKind) -> Result<LoadOutcome, LoadError> {
        let Some(directories) = self.directories.get(&kind) else {
            return Ok(LoadOutcome::default());
        };
        load_definitions(kind, &self.base, directories).await
    }
}

/// A fixed set of definitions.
#[derive(Default)]
pub struct StaticSource {
    definitions: parking_lot::RwLock<Vec<HandlerDefinition>>,
}

impl StaticSource {
    pub fn new(definitions: Vec<HandlerDefinition>) -> Self {
        Self {
            definitions: parking_lot::RwLock::new(definitions),
        }
    }

    /// Swaps the table, as editing files would for a directory source.
    pub fn replace(&self, definitions: Vec<HandlerDefinition>) {
        *self.definitions.write() = definitions;
    }
}

#[async_trait]
impl DefinitionSource for StaticSource {
    async fn load(&self, kind: HandlerKind) -> Result<LoadOutcome, LoadError> {
        let definitions: Vec<HandlerDefinition> = self
            .definitions
            .read()
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect();
        Ok(definitions.into())
    }
}

/// Loads every definition of `kind` found in `directories`.
///
/// Relative directories resolve against `base`. A missing directory
/// only warns; any other I/O failure aborts the load. Files that fail to
/// parse are warned about and listed in [`LoadOutcome::unparsed`].
pub async fn load_definitions(
    kind: HandlerKind,
    base: &Path,
    directories: &[PathBuf],
) -> Result<LoadOutcome, LoadError> {
    let mut files = Vec::new();
    for directory in directories {
        let directory = if directory.is_absolute() {
            directory.clone()
        } else {
            base.join(directory)
        };
        files.extend(list_definition_files(&directory)?);
    }

    let loaded = join_all(files.into_iter().map(|path| load_file(kind, path))).await;

    let mut outcome = LoadOutcome::default();
    for result in loaded {
        match result? {
            FileOutcome::Loaded(definition) => outcome.definitions.push(definition),
            FileOutcome::Empty => {}
            FileOutcome::Unparsed(stem) => outcome.unparsed.push(stem),
        }
    }
    debug!(
        "Loaded {} {} definition(s), {} unparsed",
        outcome.definitions.len(),
        kind,
        outcome.unparsed.len()
    );
    Ok(outcome)
}

fn list_definition_files(directory: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Definition directory {:?} does not exist, skipping", directory);
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(LoadError::Io {
                path: directory.to_path_buf(),
                source,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && is_definition_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_definition_file(path: &Path) -> bool {
    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.extension().is_some_and(|ext| ext == DEFINITION_EXTENSION)
        && !file_name.ends_with(DECLARATION_SUFFIX)
}

enum FileOutcome {
    Loaded(HandlerDefinition),
    Empty,
    Unparsed(String),
}

async fn load_file(kind: HandlerKind, path: PathBuf) -> Result<FileOutcome, LoadError> {
    let source = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    match HandlerDefinition::from_toml(kind, stem, &source) {
        Ok(Some(definition)) => Ok(FileOutcome::Loaded(definition)),
        Ok(None) => {
            debug!("{:?} declares no definition, skipping", path);
            Ok(FileOutcome::Empty)
        }
        Err(e) => {
            warn!("Failed to parse {} definition {:?}, keeping its previous state: {}", kind, path, e);
            Ok(FileOutcome::Unparsed(stem.to_string()))
        }
    }
}
